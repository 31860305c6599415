//! Registration notifications
//!
//! A `Notifier` delivers the welcome message after a user registers. Delivery
//! is fire-and-forget from the caller's point of view: the identity service
//! spawns it and only logs failures.

mod http;

use async_trait::async_trait;
use serde::Serialize;
use std::fmt::Debug;
use tracing::info;

use crate::domain::DomainError;

pub use http::HttpNotifier;

/// Trait for sending registration notifications
#[async_trait]
pub trait Notifier: Send + Sync + Debug {
    /// Send the welcome message to a newly registered user
    async fn notify_registration(&self, name: &str, email: &str) -> Result<(), DomainError>;
}

/// Sender address and wording of the welcome message
#[derive(Debug, Clone)]
pub struct WelcomeTemplate {
    pub from: String,
    pub subject: String,
    pub body: String,
}

impl Default for WelcomeTemplate {
    fn default() -> Self {
        Self {
            from: "no-reply@localhost".to_string(),
            subject: "Welcome to the User API!".to_string(),
            body: "Thank you for signing up!".to_string(),
        }
    }
}

/// A composed message ready for delivery
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WelcomeMessage {
    pub from: String,
    pub to_name: String,
    pub to_email: String,
    pub subject: String,
    pub body: String,
}

impl WelcomeTemplate {
    /// Compose a message for one recipient
    pub fn compose(&self, name: &str, email: &str) -> Result<WelcomeMessage, DomainError> {
        if email.trim().is_empty() {
            return Err(DomainError::validation("Recipient email is required"));
        }

        if self.body.is_empty() {
            return Err(DomainError::configuration("Welcome message body is empty"));
        }

        Ok(WelcomeMessage {
            from: self.from.clone(),
            to_name: name.to_string(),
            to_email: email.to_string(),
            subject: self.subject.clone(),
            body: self.body.clone(),
        })
    }
}

/// Notifier that only writes the message to the log
#[derive(Debug, Clone, Default)]
pub struct LogNotifier {
    template: WelcomeTemplate,
}

impl LogNotifier {
    pub fn new(template: WelcomeTemplate) -> Self {
        Self { template }
    }
}

#[async_trait]
impl Notifier for LogNotifier {
    async fn notify_registration(&self, name: &str, email: &str) -> Result<(), DomainError> {
        let message = self.template.compose(name, email)?;

        info!(
            to_name = %message.to_name,
            to_email = %message.to_email,
            subject = %message.subject,
            "Welcome notification (log only)"
        );

        Ok(())
    }
}

#[cfg(test)]
pub mod mock {
    use super::*;
    use std::sync::Arc;
    use tokio::sync::{Mutex, Notify};

    /// Notifier that records calls and can be told to fail
    #[derive(Debug, Default, Clone)]
    pub struct RecordingNotifier {
        sent: Arc<Mutex<Vec<(String, String)>>>,
        delivered: Arc<Notify>,
        fail: bool,
    }

    impl RecordingNotifier {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn failing() -> Self {
            Self {
                fail: true,
                ..Self::default()
            }
        }

        /// Wait until one delivery attempt has finished
        pub async fn wait(&self) {
            self.delivered.notified().await;
        }

        pub async fn sent(&self) -> Vec<(String, String)> {
            self.sent.lock().await.clone()
        }
    }

    #[async_trait]
    impl Notifier for RecordingNotifier {
        async fn notify_registration(&self, name: &str, email: &str) -> Result<(), DomainError> {
            self.sent
                .lock()
                .await
                .push((name.to_string(), email.to_string()));
            self.delivered.notify_one();

            if self.fail {
                return Err(DomainError::internal("Notifier configured to fail"));
            }

            Ok(())
        }
    }
}
