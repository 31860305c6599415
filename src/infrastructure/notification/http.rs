//! Notifier that hands the welcome message to an HTTP mail relay

use async_trait::async_trait;
use reqwest::Client;
use std::time::Duration;
use tracing::debug;

use super::{Notifier, WelcomeTemplate};
use crate::domain::DomainError;

/// Posts composed messages as JSON to a relay endpoint
#[derive(Debug, Clone)]
pub struct HttpNotifier {
    endpoint: String,
    template: WelcomeTemplate,
    client: Client,
}

impl HttpNotifier {
    pub fn new(
        endpoint: impl Into<String>,
        template: WelcomeTemplate,
        timeout: Duration,
    ) -> Result<Self, DomainError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| DomainError::configuration(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            endpoint: endpoint.into(),
            template,
            client,
        })
    }
}

#[async_trait]
impl Notifier for HttpNotifier {
    async fn notify_registration(&self, name: &str, email: &str) -> Result<(), DomainError> {
        let message = self.template.compose(name, email)?;

        debug!(endpoint = %self.endpoint, to_email = %message.to_email, "Sending welcome notification");

        let response = self
            .client
            .post(&self.endpoint)
            .json(&message)
            .send()
            .await
            .map_err(|e| {
                let reason = if e.is_timeout() {
                    "Request timed out".to_string()
                } else if e.is_connect() {
                    "Connection failed".to_string()
                } else {
                    e.to_string()
                };
                DomainError::internal(format!("Notification relay unreachable: {}", reason))
            })?;

        let status = response.status();

        if !status.is_success() {
            return Err(DomainError::internal(format!(
                "Notification relay returned HTTP {}",
                status.as_u16()
            )));
        }

        Ok(())
    }
}
