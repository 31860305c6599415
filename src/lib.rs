//! PMP User API
//!
//! Registration, login and bearer-token identity service:
//! - Argon2id password hashing
//! - HS256 JWT issuance and validation
//! - In-memory or PostgreSQL user storage
//! - Fire-and-forget welcome notifications

pub mod api;
pub mod cli;
pub mod config;
pub mod domain;
pub mod infrastructure;

pub use config::AppConfig;

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use api::state::{AppState, UserServiceTrait};
use config::{AuthConfig, DatabaseConfig, NotifierConfig, NotifierKind, PasswordConfig};
use infrastructure::{
    auth::{JwtConfig, JwtService, TokenIssuer},
    notification::{HttpNotifier, LogNotifier, Notifier, WelcomeTemplate},
    storage::{connect_pool, run_migrations, PostgresConfig, StorageType},
    user::{
        Argon2Config, Argon2Hasher, InMemoryUserRepository, PostgresUserRepository,
        UserIdentityService,
    },
};
use rand::Rng;
use tracing::{info, warn};

/// Longest accepted `auth.token_ttl_hours`: one year
pub const MAX_TOKEN_TTL_HOURS: u64 = 24 * 365;

/// Create the application state with all services initialized
pub async fn create_app_state_with_config(config: &AppConfig) -> anyhow::Result<AppState> {
    let backend = StorageType::from_str(&config.storage.backend)
        .with_context(|| format!("Unknown storage backend '{}'", config.storage.backend))?;

    info!("Storage backend: {:?}", backend);

    let hasher = Arc::new(create_password_hasher(&config.password)?);
    let tokens = create_token_issuer(&config.auth)?;
    let notifier = create_notifier(&config.notifier)?;

    let user_service: Arc<dyn UserServiceTrait> = match backend {
        StorageType::InMemory => Arc::new(UserIdentityService::new(
            Arc::new(InMemoryUserRepository::new()),
            hasher,
            tokens.clone(),
            notifier,
        )),
        StorageType::Postgres => {
            let pool = connect_pool(&postgres_config(&config.database)).await?;

            if config.database.run_migrations {
                run_migrations(&pool).await?;
            }

            Arc::new(UserIdentityService::new(
                Arc::new(PostgresUserRepository::new(pool)),
                hasher,
                tokens.clone(),
                notifier,
            ))
        }
    };

    Ok(AppState::new(user_service, tokens))
}

/// Pool settings from the `database` section
pub fn postgres_config(database: &DatabaseConfig) -> PostgresConfig {
    PostgresConfig::new(database.url.clone())
        .with_max_connections(database.max_connections)
        .with_connect_timeout(database.connect_timeout_secs)
}

fn create_password_hasher(config: &PasswordConfig) -> anyhow::Result<Argon2Hasher> {
    let hasher = Argon2Hasher::with_config(Argon2Config {
        memory_kib: config.memory_kib,
        iterations: config.iterations,
        parallelism: config.parallelism,
    })?;

    Ok(hasher)
}

/// Generate a random signing secret
fn generate_random_secret() -> String {
    use rand::distributions::Alphanumeric;

    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(64)
        .map(char::from)
        .collect()
}

/// Create the token issuer from the configured secret, or a random one
fn create_token_issuer(config: &AuthConfig) -> anyhow::Result<Arc<dyn TokenIssuer>> {
    if !(1..=MAX_TOKEN_TTL_HOURS).contains(&config.token_ttl_hours) {
        anyhow::bail!(
            "auth.token_ttl_hours must be between 1 and {}, got {}",
            MAX_TOKEN_TTL_HOURS,
            config.token_ttl_hours
        );
    }

    let secret = config
        .jwt_secret
        .clone()
        .filter(|s| !s.trim().is_empty())
        .unwrap_or_else(|| {
            warn!(
                "No auth.jwt_secret configured. Generating random secret. \
                Tokens will NOT survive restarts. \
                Set APP__AUTH__JWT_SECRET for persistent sessions."
            );
            generate_random_secret()
        });

    Ok(Arc::new(JwtService::new(JwtConfig::new(
        secret,
        config.token_ttl_hours,
    ))))
}

fn create_notifier(config: &NotifierConfig) -> anyhow::Result<Arc<dyn Notifier>> {
    let template = WelcomeTemplate {
        from: config.from.clone(),
        subject: config.subject.clone(),
        body: config.body.clone(),
    };

    match config.kind {
        NotifierKind::Log => Ok(Arc::new(LogNotifier::new(template))),
        NotifierKind::Http => {
            let endpoint = config
                .endpoint
                .clone()
                .filter(|e| !e.trim().is_empty())
                .context("notifier.endpoint is required when notifier.kind is 'http'")?;

            info!(endpoint = %endpoint, "Using HTTP notification relay");

            let notifier = HttpNotifier::new(
                endpoint,
                template,
                Duration::from_secs(config.timeout_secs),
            )?;

            Ok(Arc::new(notifier))
        }
    }
}
