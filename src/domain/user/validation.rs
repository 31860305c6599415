//! User validation utilities

use thiserror::Error;
use validator::ValidateEmail;

/// Errors that can occur during user validation
#[derive(Debug, Error, Clone, PartialEq)]
pub enum UserValidationError {
    #[error("User ID is not a valid UUID: '{0}'")]
    InvalidId(String),

    #[error("First name cannot be empty")]
    EmptyFirstName,

    #[error("{field} exceeds maximum length of {max} characters")]
    NameTooLong { field: &'static str, max: usize },

    #[error("Email cannot be empty")]
    EmptyEmail,

    #[error("Email exceeds maximum length of {0} characters")]
    EmailTooLong(usize),

    #[error("Email '{0}' is not a valid email address")]
    InvalidEmail(String),

    #[error("Password cannot be empty")]
    EmptyPassword,

    #[error("Password exceeds maximum length of {0} characters")]
    PasswordTooLong(usize),

    #[error("Password and Confirmation do not match.")]
    PasswordMismatch,
}

const MAX_NAME_LENGTH: usize = 100;
const MAX_EMAIL_LENGTH: usize = 254;
const MAX_PASSWORD_LENGTH: usize = 128;

/// Canonical form used for storage and uniqueness checks
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// Validate an email address (expects the normalized form)
///
/// Rules:
/// - Cannot be empty
/// - Maximum 254 characters
/// - Must be a syntactically valid address
pub fn validate_email(email: &str) -> Result<(), UserValidationError> {
    if email.is_empty() {
        return Err(UserValidationError::EmptyEmail);
    }

    if email.len() > MAX_EMAIL_LENGTH {
        return Err(UserValidationError::EmailTooLong(MAX_EMAIL_LENGTH));
    }

    if !email.validate_email() {
        return Err(UserValidationError::InvalidEmail(email.to_string()));
    }

    Ok(())
}

/// Validate a first name
pub fn validate_first_name(name: &str) -> Result<(), UserValidationError> {
    if name.trim().is_empty() {
        return Err(UserValidationError::EmptyFirstName);
    }

    validate_name_length("First name", name)
}

/// Validate an optional last name
pub fn validate_last_name(name: &str) -> Result<(), UserValidationError> {
    validate_name_length("Last name", name)
}

fn validate_name_length(field: &'static str, name: &str) -> Result<(), UserValidationError> {
    if name.chars().count() > MAX_NAME_LENGTH {
        return Err(UserValidationError::NameTooLong {
            field,
            max: MAX_NAME_LENGTH,
        });
    }

    Ok(())
}

/// Validate a password
///
/// Rules:
/// - Cannot be empty
/// - Maximum 128 characters
pub fn validate_password(password: &str) -> Result<(), UserValidationError> {
    if password.is_empty() {
        return Err(UserValidationError::EmptyPassword);
    }

    if password.chars().count() > MAX_PASSWORD_LENGTH {
        return Err(UserValidationError::PasswordTooLong(MAX_PASSWORD_LENGTH));
    }

    Ok(())
}

/// Password and confirmation must be byte-for-byte equal
pub fn validate_confirmation(password: &str, confirm: &str) -> Result<(), UserValidationError> {
    if password.as_bytes() != confirm.as_bytes() {
        return Err(UserValidationError::PasswordMismatch);
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_email() {
        assert_eq!(normalize_email("  Ann@Example.COM "), "ann@example.com");
        assert_eq!(normalize_email("bob@example.com"), "bob@example.com");
    }

    #[test]
    fn test_valid_emails() {
        assert!(validate_email("ann@example.com").is_ok());
        assert!(validate_email("first.last+tag@sub.example.org").is_ok());
    }

    #[test]
    fn test_empty_email() {
        assert_eq!(validate_email(""), Err(UserValidationError::EmptyEmail));
    }

    #[test]
    fn test_invalid_email() {
        assert_eq!(
            validate_email("not-an-email"),
            Err(UserValidationError::InvalidEmail("not-an-email".to_string()))
        );
        assert!(validate_email("ann@").is_err());
        assert!(validate_email("@example.com").is_err());
    }

    #[test]
    fn test_email_too_long() {
        let long_email = format!("{}@example.com", "a".repeat(250));
        assert_eq!(
            validate_email(&long_email),
            Err(UserValidationError::EmailTooLong(254))
        );
    }

    #[test]
    fn test_first_name() {
        assert!(validate_first_name("Ann").is_ok());
        assert_eq!(
            validate_first_name("   "),
            Err(UserValidationError::EmptyFirstName)
        );
        assert_eq!(
            validate_first_name(&"a".repeat(101)),
            Err(UserValidationError::NameTooLong {
                field: "First name",
                max: 100
            })
        );
    }

    #[test]
    fn test_last_name_may_be_empty() {
        assert!(validate_last_name("").is_ok());
        assert!(validate_last_name("Smith").is_ok());
    }

    #[test]
    fn test_password() {
        assert!(validate_password("Secret1").is_ok());
        assert_eq!(validate_password(""), Err(UserValidationError::EmptyPassword));
        assert_eq!(
            validate_password(&"a".repeat(129)),
            Err(UserValidationError::PasswordTooLong(128))
        );
    }

    #[test]
    fn test_confirmation() {
        assert!(validate_confirmation("Secret1", "Secret1").is_ok());
        assert_eq!(
            validate_confirmation("Secret1", "secret1"),
            Err(UserValidationError::PasswordMismatch)
        );
        assert_eq!(
            validate_confirmation("Secret1", "Secret1 "),
            Err(UserValidationError::PasswordMismatch)
        );
    }
}
