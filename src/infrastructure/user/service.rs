//! User identity service: registration, authentication and user management

use std::sync::Arc;

use tracing::{debug, error, info, instrument, warn};

use crate::domain::user::{
    normalize_email, validate_confirmation, validate_email, validate_first_name,
    validate_last_name, validate_password, User, UserId, UserRepository,
};
use crate::domain::DomainError;
use crate::infrastructure::auth::{IssuedToken, TokenIssuer};
use crate::infrastructure::notification::Notifier;

use super::password::PasswordHasher;

/// Verified against when the email is unknown, so both failure paths cost a hash
const DUMMY_PASSWORD: &str = "dummy-password-for-timing";

/// Request for registering a new user
#[derive(Debug, Clone)]
pub struct RegisterRequest {
    pub first_name: String,
    pub last_name: Option<String>,
    pub email: String,
    pub password: String,
    pub confirm_password: String,
}

/// Request for authenticating with email and password
#[derive(Debug, Clone)]
pub struct AuthenticateRequest {
    pub email: String,
    pub password: String,
    pub confirm_password: String,
}

/// Partial update; absent or empty fields are left untouched
#[derive(Debug, Clone, Default)]
pub struct UpdateUserRequest {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub email: Option<String>,
    pub password: Option<String>,
    pub confirm_password: Option<String>,
}

/// Successful authentication
#[derive(Debug, Clone)]
pub struct AuthenticatedUser {
    pub user: User,
    pub token: IssuedToken,
}

/// User identity service
#[derive(Debug)]
pub struct UserIdentityService<R: UserRepository, H: PasswordHasher> {
    repository: Arc<R>,
    hasher: Arc<H>,
    tokens: Arc<dyn TokenIssuer>,
    notifier: Arc<dyn Notifier>,
    dummy_hash: Option<String>,
}

impl<R: UserRepository, H: PasswordHasher + 'static> UserIdentityService<R, H> {
    /// Create a new user identity service
    ///
    /// Computes the dummy hash that unknown-email logins are verified against.
    pub fn new(
        repository: Arc<R>,
        hasher: Arc<H>,
        tokens: Arc<dyn TokenIssuer>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        let dummy_hash = hasher
            .hash(DUMMY_PASSWORD)
            .inspect_err(|e| warn!(error = %e, "Failed to compute dummy password hash"))
            .ok();

        Self {
            repository,
            hasher,
            tokens,
            notifier,
            dummy_hash,
        }
    }

    /// Authenticate with email and password and issue a token
    ///
    /// An unknown email and a wrong password both yield
    /// `DomainError::InvalidCredentials`, after the same amount of hashing work.
    #[instrument(skip_all)]
    pub async fn authenticate(
        &self,
        request: AuthenticateRequest,
    ) -> Result<AuthenticatedUser, DomainError> {
        validate_confirmation(&request.password, &request.confirm_password)
            .map_err(|e| DomainError::validation(e.to_string()))?;

        let email = normalize_email(&request.email);
        let user = self.repository.get_by_email(&email).await.inspect_err(log_failure)?;

        let user = match user {
            Some(user) => {
                let hash = user.password_hash().to_string();
                if !self.verify_password(&request.password, hash).await? {
                    debug!("Authentication failed");
                    return Err(DomainError::invalid_credentials());
                }
                user
            }
            None => {
                if let Some(dummy) = self.dummy_hash.clone() {
                    self.verify_password(&request.password, dummy).await?;
                }
                debug!("Authentication failed");
                return Err(DomainError::invalid_credentials());
            }
        };

        let token = self.tokens.issue(&user)?;
        info!(user_id = %user.id(), "User authenticated");

        Ok(AuthenticatedUser { user, token })
    }

    /// Register a new user and send the welcome notification in the background
    #[instrument(skip_all)]
    pub async fn register(&self, request: RegisterRequest) -> Result<User, DomainError> {
        validate_confirmation(&request.password, &request.confirm_password)
            .map_err(|e| DomainError::validation(e.to_string()))?;
        validate_password(&request.password).map_err(|e| DomainError::validation(e.to_string()))?;
        validate_first_name(&request.first_name)
            .map_err(|e| DomainError::validation(e.to_string()))?;

        let last_name = supplied(&request.last_name).map(|l| l.trim().to_string());
        if let Some(last_name) = &last_name {
            validate_last_name(last_name).map_err(|e| DomainError::validation(e.to_string()))?;
        }

        let email = normalize_email(&request.email);
        validate_email(&email).map_err(|e| DomainError::validation(e.to_string()))?;

        // Fast path only; the repository's insert is what enforces uniqueness
        if self.repository.email_exists(&email).await.inspect_err(log_failure)? {
            return Err(email_taken(&email));
        }

        let password_hash = self.hash_password(&request.password).await?;
        let user = User::new(
            UserId::generate(),
            request.first_name.trim(),
            last_name,
            email,
            password_hash,
        );

        let user = self.repository.create(user).await.inspect_err(log_failure)?;
        info!(user_id = %user.id(), "User registered");

        self.spawn_welcome(&user);

        Ok(user)
    }

    /// Get a user by ID
    pub async fn get(&self, id: &str) -> Result<User, DomainError> {
        let user_id = parse_id(id)?;
        self.get_required(&user_id).await
    }

    /// List all users
    pub async fn list(&self) -> Result<Vec<User>, DomainError> {
        self.repository.list().await.inspect_err(log_failure)
    }

    /// Count users
    pub async fn count(&self) -> Result<usize, DomainError> {
        self.repository.count().await.inspect_err(log_failure)
    }

    /// Apply a partial update
    ///
    /// Nothing is written unless every check passes; `updated_at` moves forward
    /// on every successful call.
    #[instrument(skip(self, request))]
    pub async fn update(&self, id: &str, request: UpdateUserRequest) -> Result<User, DomainError> {
        let password = request.password.as_deref().filter(|p| !p.is_empty());
        let confirm = request.confirm_password.as_deref().filter(|p| !p.is_empty());

        if password.is_some() || confirm.is_some() {
            validate_confirmation(password.unwrap_or_default(), confirm.unwrap_or_default())
                .map_err(|e| DomainError::validation(e.to_string()))?;
        }

        let user_id = parse_id(id)?;
        let mut user = self.get_required(&user_id).await?;

        if let Some(email) = supplied(&request.email) {
            let email = normalize_email(email);
            validate_email(&email).map_err(|e| DomainError::validation(e.to_string()))?;

            if email != user.email() {
                if self.repository.email_exists(&email).await.inspect_err(log_failure)? {
                    return Err(email_taken(&email));
                }
                user.set_email(email);
            }
        }

        if let Some(first_name) = supplied(&request.first_name) {
            validate_first_name(first_name).map_err(|e| DomainError::validation(e.to_string()))?;
            user.set_first_name(first_name.trim());
        }

        if let Some(last_name) = supplied(&request.last_name) {
            validate_last_name(last_name).map_err(|e| DomainError::validation(e.to_string()))?;
            user.set_last_name(last_name.trim());
        }

        if let Some(password) = password {
            validate_password(password).map_err(|e| DomainError::validation(e.to_string()))?;
            user.set_password_hash(self.hash_password(password).await?);
        }

        user.touch();

        let user = self.repository.update(&user).await.inspect_err(log_failure)?;
        info!(user_id = %user.id(), "User updated");

        Ok(user)
    }

    /// Delete a user permanently
    #[instrument(skip(self))]
    pub async fn delete(&self, id: &str) -> Result<(), DomainError> {
        let user_id = parse_id(id)?;
        self.repository.delete(&user_id).await.inspect_err(log_failure)?;

        info!(user_id = %user_id, "User deleted");
        Ok(())
    }

    async fn get_required(&self, id: &UserId) -> Result<User, DomainError> {
        self.repository
            .get(id)
            .await
            .inspect_err(log_failure)?
            .ok_or_else(|| DomainError::not_found(format!("User '{}' not found", id)))
    }

    // Argon2 is CPU-bound, keep it off the async workers
    async fn hash_password(&self, password: &str) -> Result<String, DomainError> {
        let hasher = Arc::clone(&self.hasher);
        let password = password.to_string();

        tokio::task::spawn_blocking(move || hasher.hash(&password))
            .await
            .map_err(|e| DomainError::internal(format!("Password hashing task failed: {}", e)))?
    }

    async fn verify_password(&self, password: &str, hash: String) -> Result<bool, DomainError> {
        let hasher = Arc::clone(&self.hasher);
        let password = password.to_string();

        tokio::task::spawn_blocking(move || hasher.verify(&password, &hash))
            .await
            .map_err(|e| {
                DomainError::internal(format!("Password verification task failed: {}", e))
            })
    }

    fn spawn_welcome(&self, user: &User) {
        let notifier = Arc::clone(&self.notifier);
        let name = user.display_name();
        let email = user.email().to_string();
        let user_id = *user.id();

        tokio::spawn(async move {
            if let Err(e) = notifier.notify_registration(&name, &email).await {
                warn!(user_id = %user_id, error = %e, "Failed to send welcome notification");
            }
        });
    }
}

/// Storage failures are logged where they surface, then returned unchanged
fn log_failure(e: &DomainError) {
    if e.is_retryable() {
        error!(error = %e, "User store operation failed");
    }
}

fn parse_id(id: &str) -> Result<UserId, DomainError> {
    UserId::parse(id).map_err(|e| DomainError::validation(e.to_string()))
}

fn supplied(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|v| !v.trim().is_empty())
}

fn email_taken(email: &str) -> DomainError {
    DomainError::conflict(format!("Email '{}' is already taken", email))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use crate::domain::user::MockUserRepository;
    use crate::infrastructure::auth::{JwtConfig, JwtService};
    use crate::infrastructure::notification::mock::RecordingNotifier;
    use crate::infrastructure::user::password::{test_hasher, Argon2Hasher};
    use crate::infrastructure::user::repository::InMemoryUserRepository;

    type TestService = UserIdentityService<InMemoryUserRepository, Argon2Hasher>;

    fn token_service() -> Arc<JwtService> {
        Arc::new(JwtService::new(JwtConfig::new("test-secret-key-12345", 24)))
    }

    fn create_service_with(notifier: RecordingNotifier) -> (TestService, Arc<JwtService>) {
        let tokens = token_service();
        let service = UserIdentityService::new(
            Arc::new(InMemoryUserRepository::new()),
            Arc::new(test_hasher()),
            tokens.clone(),
            Arc::new(notifier),
        );
        (service, tokens)
    }

    fn create_service() -> TestService {
        create_service_with(RecordingNotifier::new()).0
    }

    fn register_request(first_name: &str, email: &str, password: &str) -> RegisterRequest {
        RegisterRequest {
            first_name: first_name.to_string(),
            last_name: None,
            email: email.to_string(),
            password: password.to_string(),
            confirm_password: password.to_string(),
        }
    }

    fn auth_request(email: &str, password: &str) -> AuthenticateRequest {
        AuthenticateRequest {
            email: email.to_string(),
            password: password.to_string(),
            confirm_password: password.to_string(),
        }
    }

    /// Hasher wrapper counting hashes and verifications
    #[derive(Debug)]
    struct CountingHasher {
        inner: Argon2Hasher,
        hashes: AtomicUsize,
        verifications: AtomicUsize,
    }

    impl CountingHasher {
        fn new() -> Self {
            Self {
                inner: test_hasher(),
                hashes: AtomicUsize::new(0),
                verifications: AtomicUsize::new(0),
            }
        }
    }

    impl PasswordHasher for CountingHasher {
        fn hash(&self, password: &str) -> Result<String, DomainError> {
            self.hashes.fetch_add(1, Ordering::SeqCst);
            self.inner.hash(password)
        }

        fn verify(&self, password: &str, hash: &str) -> bool {
            self.verifications.fetch_add(1, Ordering::SeqCst);
            self.inner.verify(password, hash)
        }
    }

    #[tokio::test]
    async fn test_register_and_authenticate_scenario() {
        let (service, tokens) = create_service_with(RecordingNotifier::new());

        service
            .register(register_request("Ann", "ann@example.com", "Secret1"))
            .await
            .unwrap();

        let duplicate = service
            .register(register_request("Ann", "ann@example.com", "Secret1"))
            .await;
        assert!(matches!(duplicate, Err(DomainError::Conflict { .. })));

        let authenticated = service
            .authenticate(auth_request("ann@example.com", "Secret1"))
            .await
            .unwrap();
        assert!(!authenticated.token.token.is_empty());
        assert_eq!(
            tokens.resolve(&authenticated.token.token),
            Some(*authenticated.user.id())
        );

        let wrong = service
            .authenticate(AuthenticateRequest {
                email: "ann@example.com".to_string(),
                password: "wrong".to_string(),
                confirm_password: "wrong".to_string(),
            })
            .await;
        assert!(matches!(wrong, Err(DomainError::InvalidCredentials)));
    }

    #[tokio::test]
    async fn test_register_normalizes_email() {
        let service = create_service();

        let user = service
            .register(register_request("Ann", "  Ann@Example.COM ", "Secret1"))
            .await
            .unwrap();
        assert_eq!(user.email(), "ann@example.com");

        let duplicate = service
            .register(register_request("Other", "ANN@example.com", "Secret2"))
            .await;
        assert!(matches!(duplicate, Err(DomainError::Conflict { .. })));

        service
            .authenticate(auth_request("ANN@EXAMPLE.COM", "Secret1"))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_register_sets_fields() {
        let service = create_service();

        let user = service
            .register(RegisterRequest {
                last_name: Some("Lee".to_string()),
                ..register_request("Ann", "ann@example.com", "Secret1")
            })
            .await
            .unwrap();

        assert_eq!(user.first_name(), "Ann");
        assert_eq!(user.last_name(), Some("Lee"));
        assert_eq!(user.created_at(), user.updated_at());
        assert_ne!(user.password_hash(), "Secret1");
        assert!(user.password_hash().starts_with("$argon2id$"));
    }

    #[tokio::test]
    async fn test_register_password_mismatch() {
        let service = create_service();

        let result = service
            .register(RegisterRequest {
                confirm_password: "Secret2".to_string(),
                ..register_request("Ann", "ann@example.com", "Secret1")
            })
            .await;

        assert!(matches!(result, Err(DomainError::Validation { .. })));
        assert_eq!(service.count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_register_invalid_email() {
        let service = create_service();

        let result = service
            .register(register_request("Ann", "not-an-email", "Secret1"))
            .await;

        assert!(matches!(result, Err(DomainError::Validation { .. })));
    }

    #[tokio::test]
    async fn test_register_requires_first_name() {
        let service = create_service();

        let result = service
            .register(register_request("  ", "ann@example.com", "Secret1"))
            .await;

        assert!(matches!(result, Err(DomainError::Validation { .. })));
    }

    #[tokio::test]
    async fn test_register_sends_welcome_notification() {
        let notifier = RecordingNotifier::new();
        let (service, _) = create_service_with(notifier.clone());

        service
            .register(RegisterRequest {
                last_name: Some("Lee".to_string()),
                ..register_request("Ann", "ann@example.com", "Secret1")
            })
            .await
            .unwrap();

        notifier.wait().await;
        assert_eq!(
            notifier.sent().await,
            vec![("Ann Lee".to_string(), "ann@example.com".to_string())]
        );
    }

    #[tokio::test]
    async fn test_notifier_failure_does_not_fail_registration() {
        let notifier = RecordingNotifier::failing();
        let (service, _) = create_service_with(notifier.clone());

        let user = service
            .register(register_request("Ann", "ann@example.com", "Secret1"))
            .await
            .unwrap();

        notifier.wait().await;
        assert!(service.get(&user.id().to_string()).await.is_ok());
    }

    #[tokio::test]
    async fn test_conflict_found_at_insert_time() {
        let repository = Arc::new(MockUserRepository::new());
        let service = UserIdentityService::new(
            repository.clone(),
            Arc::new(test_hasher()),
            token_service(),
            Arc::new(RecordingNotifier::new()),
        );

        let first = service
            .register(register_request("Ann", "ann@example.com", "Secret1"))
            .await
            .unwrap();

        // Pre-check sees nothing, as if a concurrent insert landed in between
        repository.set_skip_lookups(true).await;

        let result = service
            .register(register_request("Ann", "ann@example.com", "Secret1"))
            .await;

        match result {
            Err(DomainError::Conflict { message }) => {
                assert_eq!(message, "Email 'ann@example.com' is already taken")
            }
            other => panic!("Expected conflict, got {:?}", other),
        }

        let stored = repository.stored(first.id()).await.unwrap();
        assert_eq!(stored.password_hash(), first.password_hash());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_registrations_same_email() {
        let service = Arc::new(create_service());

        let handles: Vec<_> = (0..8)
            .map(|i| {
                let service = Arc::clone(&service);
                tokio::spawn(async move {
                    service
                        .register(register_request(
                            &format!("User{}", i),
                            "race@example.com",
                            "Secret1",
                        ))
                        .await
                })
            })
            .collect();

        let mut created = 0;
        let mut conflicts = 0;

        for handle in handles {
            match handle.await.unwrap() {
                Ok(_) => created += 1,
                Err(DomainError::Conflict { .. }) => conflicts += 1,
                Err(e) => panic!("Unexpected error: {}", e),
            }
        }

        assert_eq!(created, 1);
        assert_eq!(conflicts, 7);
        assert_eq!(service.count().await.unwrap(), 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_registrations_distinct_emails() {
        let service = Arc::new(create_service());

        let handles: Vec<_> = (0..10)
            .map(|i| {
                let service = Arc::clone(&service);
                tokio::spawn(async move {
                    service
                        .register(register_request(
                            "User",
                            &format!("user{}@example.com", i),
                            "Secret1",
                        ))
                        .await
                })
            })
            .collect();

        for result in futures::future::join_all(handles).await {
            result.unwrap().unwrap();
        }

        let users = service.list().await.unwrap();
        assert_eq!(users.len(), 10);

        let mut emails: Vec<_> = users.iter().map(|u| u.email().to_string()).collect();
        emails.sort();
        emails.dedup();
        assert_eq!(emails.len(), 10);
    }

    #[tokio::test]
    async fn test_authenticate_password_mismatch() {
        let service = create_service();

        let result = service
            .authenticate(AuthenticateRequest {
                email: "ann@example.com".to_string(),
                password: "Secret1".to_string(),
                confirm_password: "Secret2".to_string(),
            })
            .await;

        assert!(matches!(result, Err(DomainError::Validation { .. })));
    }

    #[tokio::test]
    async fn test_authenticate_failures_are_indistinguishable() {
        let hasher = Arc::new(CountingHasher::new());
        let service = UserIdentityService::new(
            Arc::new(InMemoryUserRepository::new()),
            hasher.clone(),
            token_service(),
            Arc::new(RecordingNotifier::new()),
        );

        service
            .register(register_request("Ann", "ann@example.com", "Secret1"))
            .await
            .unwrap();
        let hashes = hasher.hashes.load(Ordering::SeqCst);

        let wrong_password = service
            .authenticate(auth_request("ann@example.com", "Wrong1"))
            .await
            .unwrap_err();
        assert_eq!(hasher.verifications.load(Ordering::SeqCst), 1);

        let unknown_email = service
            .authenticate(auth_request("nobody@example.com", "Secret1"))
            .await
            .unwrap_err();
        assert_eq!(hasher.verifications.load(Ordering::SeqCst), 2);
        assert_eq!(hasher.hashes.load(Ordering::SeqCst), hashes);

        assert!(matches!(wrong_password, DomainError::InvalidCredentials));
        assert!(matches!(unknown_email, DomainError::InvalidCredentials));
        assert_eq!(wrong_password.to_string(), unknown_email.to_string());
    }

    #[tokio::test]
    async fn test_dummy_hash_computed_at_construction() {
        let hasher = Arc::new(CountingHasher::new());
        let service = UserIdentityService::new(
            Arc::new(InMemoryUserRepository::new()),
            hasher.clone(),
            token_service(),
            Arc::new(RecordingNotifier::new()),
        );
        assert_eq!(hasher.hashes.load(Ordering::SeqCst), 1);

        let result = service
            .authenticate(auth_request("nobody@example.com", "Secret1"))
            .await;

        assert!(matches!(result, Err(DomainError::InvalidCredentials)));
        assert_eq!(hasher.hashes.load(Ordering::SeqCst), 1);
        assert_eq!(hasher.verifications.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_get_by_id() {
        let service = create_service();

        let user = service
            .register(register_request("Ann", "ann@example.com", "Secret1"))
            .await
            .unwrap();

        let found = service.get(&user.id().to_string()).await.unwrap();
        assert_eq!(found.email(), "ann@example.com");

        let missing = service.get(&UserId::generate().to_string()).await;
        assert!(matches!(missing, Err(DomainError::NotFound { .. })));

        let malformed = service.get("not-a-uuid").await;
        assert!(matches!(malformed, Err(DomainError::Validation { .. })));
    }

    #[tokio::test]
    async fn test_update_password_mismatch_leaves_record_untouched() {
        let service = create_service();

        let user = service
            .register(register_request("Ann", "ann@example.com", "Secret1"))
            .await
            .unwrap();

        let result = service
            .update(
                &user.id().to_string(),
                UpdateUserRequest {
                    first_name: Some("Anna".to_string()),
                    password: Some("NewSecret".to_string()),
                    confirm_password: Some("Different".to_string()),
                    ..Default::default()
                },
            )
            .await;
        assert!(matches!(result, Err(DomainError::Validation { .. })));

        let stored = service.get(&user.id().to_string()).await.unwrap();
        assert_eq!(stored.password_hash(), user.password_hash());
        assert_eq!(stored.updated_at(), user.updated_at());
        assert_eq!(stored.first_name(), "Ann");
    }

    #[tokio::test]
    async fn test_update_first_name_only() {
        let service = create_service();

        let user = service
            .register(register_request("Ann", "ann@example.com", "Secret1"))
            .await
            .unwrap();

        let updated = service
            .update(
                &user.id().to_string(),
                UpdateUserRequest {
                    first_name: Some("Anna".to_string()),
                    email: Some(String::new()),
                    password: Some(String::new()),
                    confirm_password: Some(String::new()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        assert_eq!(updated.first_name(), "Anna");
        assert_eq!(updated.email(), user.email());
        assert_eq!(updated.password_hash(), user.password_hash());
        assert!(updated.updated_at() > user.updated_at());
        assert_eq!(updated.created_at(), user.created_at());
    }

    #[tokio::test]
    async fn test_update_without_changes_still_advances_timestamp() {
        let service = create_service();

        let user = service
            .register(register_request("Ann", "ann@example.com", "Secret1"))
            .await
            .unwrap();

        let updated = service
            .update(&user.id().to_string(), UpdateUserRequest::default())
            .await
            .unwrap();

        assert!(updated.updated_at() > user.updated_at());
    }

    #[tokio::test]
    async fn test_update_password() {
        let service = create_service();

        let user = service
            .register(register_request("Ann", "ann@example.com", "Secret1"))
            .await
            .unwrap();

        service
            .update(
                &user.id().to_string(),
                UpdateUserRequest {
                    password: Some("NewSecret".to_string()),
                    confirm_password: Some("NewSecret".to_string()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        let old = service
            .authenticate(auth_request("ann@example.com", "Secret1"))
            .await;
        assert!(matches!(old, Err(DomainError::InvalidCredentials)));

        service
            .authenticate(auth_request("ann@example.com", "NewSecret"))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_update_email_conflict() {
        let service = create_service();

        service
            .register(register_request("Ann", "ann@example.com", "Secret1"))
            .await
            .unwrap();
        let bob = service
            .register(register_request("Bob", "bob@example.com", "Secret1"))
            .await
            .unwrap();

        let result = service
            .update(
                &bob.id().to_string(),
                UpdateUserRequest {
                    email: Some("ANN@example.com".to_string()),
                    ..Default::default()
                },
            )
            .await;
        assert!(matches!(result, Err(DomainError::Conflict { .. })));

        // Re-submitting one's own email is not a conflict
        let same = service
            .update(
                &bob.id().to_string(),
                UpdateUserRequest {
                    email: Some("Bob@Example.com".to_string()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(same.email(), "bob@example.com");
    }

    #[tokio::test]
    async fn test_update_conflict_found_at_write_time() {
        let repository = Arc::new(MockUserRepository::new());
        let service = UserIdentityService::new(
            repository.clone(),
            Arc::new(test_hasher()),
            token_service(),
            Arc::new(RecordingNotifier::new()),
        );

        service
            .register(register_request("Ann", "ann@example.com", "Secret1"))
            .await
            .unwrap();
        let bob = service
            .register(register_request("Bob", "bob@example.com", "Secret1"))
            .await
            .unwrap();

        // Pre-check sees nothing, as if Ann's row landed after it ran
        repository.set_skip_lookups(true).await;

        let result = service
            .update(
                &bob.id().to_string(),
                UpdateUserRequest {
                    first_name: Some("Robert".to_string()),
                    email: Some("ann@example.com".to_string()),
                    ..Default::default()
                },
            )
            .await;
        assert!(matches!(result, Err(DomainError::Conflict { .. })));

        let stored = repository.stored(bob.id()).await.unwrap();
        assert_eq!(stored.email(), "bob@example.com");
        assert_eq!(stored.first_name(), "Bob");
        assert_eq!(stored.updated_at(), bob.updated_at());
    }

    #[tokio::test]
    async fn test_update_email() {
        let service = create_service();

        let user = service
            .register(register_request("Ann", "ann@example.com", "Secret1"))
            .await
            .unwrap();

        service
            .update(
                &user.id().to_string(),
                UpdateUserRequest {
                    email: Some("ann.lee@example.com".to_string()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        service
            .authenticate(auth_request("ann.lee@example.com", "Secret1"))
            .await
            .unwrap();

        // Old address is free for someone else
        service
            .register(register_request("Other", "ann@example.com", "Secret1"))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_update_missing_user() {
        let service = create_service();

        let result = service
            .update(&UserId::generate().to_string(), UpdateUserRequest::default())
            .await;

        assert!(matches!(result, Err(DomainError::NotFound { .. })));
    }

    #[tokio::test]
    async fn test_delete_keeps_token_structurally_valid() {
        let (service, tokens) = create_service_with(RecordingNotifier::new());

        let user = service
            .register(register_request("Ann", "ann@example.com", "Secret1"))
            .await
            .unwrap();
        let authenticated = service
            .authenticate(auth_request("ann@example.com", "Secret1"))
            .await
            .unwrap();

        service.delete(&user.id().to_string()).await.unwrap();

        // No revocation: the token still verifies
        assert_eq!(tokens.resolve(&authenticated.token.token), Some(*user.id()));

        let lookup = service.get(&user.id().to_string()).await;
        assert!(matches!(lookup, Err(DomainError::NotFound { .. })));

        let again = service.delete(&user.id().to_string()).await;
        assert!(matches!(again, Err(DomainError::NotFound { .. })));
    }

    #[tokio::test]
    async fn test_storage_failures_surface_as_retryable() {
        let repository = Arc::new(MockUserRepository::new());
        let service = UserIdentityService::new(
            repository.clone(),
            Arc::new(test_hasher()),
            token_service(),
            Arc::new(RecordingNotifier::new()),
        );

        repository.set_should_fail(true).await;

        let err = service
            .register(register_request("Ann", "ann@example.com", "Secret1"))
            .await
            .unwrap_err();
        assert!(err.is_retryable());

        let err = service.list().await.unwrap_err();
        assert!(matches!(err, DomainError::Storage { .. }));
    }

    #[tokio::test]
    async fn test_list() {
        let service = create_service();

        service
            .register(register_request("Ann", "ann@example.com", "Secret1"))
            .await
            .unwrap();
        service
            .register(register_request("Bob", "bob@example.com", "Secret1"))
            .await
            .unwrap();

        assert_eq!(service.list().await.unwrap().len(), 2);
        assert_eq!(service.count().await.unwrap(), 2);
    }
}
