// ============================
// crates/backend-lib/src/validation/mod.rs
// ============================
//! Request input validation.

use regex::Regex;
use std::sync::LazyLock;
use thiserror::Error;

const MAX_IDENTIFIER_LENGTH: usize = 254; // RFC 5321 SMTP limit
const MAX_SECRET_LENGTH: usize = 128;

static EMAIL_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[a-zA-Z0-9._%+-]+@[a-zA-Z0-9.-]+\.[a-zA-Z]{2,}$")
        .unwrap_or_else(|e| panic!("email pattern does not compile: {e}"))
});

/// Possible validation errors
#[derive(Error, Debug, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Invalid identifier: {0}")]
    InvalidIdentifier(String),

    #[error("Invalid secret: {0}")]
    InvalidSecret(String),

    #[error("Invalid email: {0}")]
    InvalidEmail(String),
}

/// Result type for validation operations
pub type ValidationResult<T> = Result<T, ValidationError>;

/// Validate a login identifier. Only shape is checked; whether an account
/// exists is the guard's business.
pub fn validate_identifier(identifier: &str) -> ValidationResult<&str> {
    if identifier.trim().is_empty() {
        return Err(ValidationError::InvalidIdentifier(
            "Identifier must not be empty".to_string(),
        ));
    }

    if identifier.len() > MAX_IDENTIFIER_LENGTH {
        return Err(ValidationError::InvalidIdentifier(format!(
            "Identifier must be at most {MAX_IDENTIFIER_LENGTH} characters"
        )));
    }

    Ok(identifier)
}

/// Validate a supplied secret. Strength rules apply when a password is set,
/// not at login.
pub fn validate_secret(secret: &str) -> ValidationResult<&str> {
    if secret.is_empty() {
        return Err(ValidationError::InvalidSecret(
            "Password must not be empty".to_string(),
        ));
    }

    if secret.len() > MAX_SECRET_LENGTH {
        return Err(ValidationError::InvalidSecret(format!(
            "Password must be at most {MAX_SECRET_LENGTH} characters"
        )));
    }

    Ok(secret)
}

/// Validate an email address used to provision an account
pub fn validate_email(email: &str) -> ValidationResult<&str> {
    if email.is_empty() {
        return Err(ValidationError::InvalidEmail(
            "Email must not be empty".to_string(),
        ));
    }

    if email.len() > MAX_IDENTIFIER_LENGTH {
        return Err(ValidationError::InvalidEmail(format!(
            "Email must be at most {MAX_IDENTIFIER_LENGTH} characters"
        )));
    }

    if !EMAIL_REGEX.is_match(email) {
        return Err(ValidationError::InvalidEmail(
            "Invalid email format".to_string(),
        ));
    }

    Ok(email)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_identifier() {
        assert!(validate_identifier("manager@example.com").is_ok());
        // Login does not insist on email shape
        assert!(validate_identifier("legacy-user").is_ok());

        assert!(validate_identifier("").is_err());
        assert!(validate_identifier("   ").is_err());
        assert!(validate_identifier(&"a".repeat(255)).is_err());
        assert!(validate_identifier(&"a".repeat(254)).is_ok());
    }

    #[test]
    fn test_validate_secret() {
        assert!(validate_secret("x").is_ok());
        assert!(validate_secret(&"p".repeat(128)).is_ok());

        assert_eq!(
            validate_secret(""),
            Err(ValidationError::InvalidSecret(
                "Password must not be empty".to_string()
            ))
        );
        assert!(validate_secret(&"p".repeat(129)).is_err());
    }

    #[test]
    fn test_validate_email() {
        let valid_emails = [
            "manager@example.com",
            "sales.assistant@showroom.co.uk",
            "first+last@domain.org",
        ];
        for email in valid_emails {
            assert!(validate_email(email).is_ok(), "{email} should be valid");
        }

        let invalid_emails = ["", "plainaddress", "@missing-local.com", "user@", "user@host"];
        for email in invalid_emails {
            assert!(validate_email(email).is_err(), "{email} should be invalid");
        }

        let long = format!("{}@example.com", "a".repeat(250));
        assert!(validate_email(&long).is_err());
    }
}
