//! Input validation shared by the request types.
//!
//! Lengths are counted in Unicode scalar values, not bytes.

use thiserror::Error;

pub const USERNAME_LEN: (usize, usize) = (3, 20);
pub const NAME_LEN: (usize, usize) = (1, 50);
pub const CONTENT_LEN: (usize, usize) = (1, 500);
pub const PASSWORD_MIN: usize = 6;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("{field} must be between {min} and {max} characters")]
    Length {
        field: &'static str,
        min: usize,
        max: usize,
    },

    #[error("{field} must be at least {min} characters")]
    TooShort { field: &'static str, min: usize },

    #[error("{field} must be a valid email address")]
    InvalidEmail { field: &'static str },
}

pub fn check_length(
    field: &'static str,
    value: &str,
    (min, max): (usize, usize),
) -> Result<(), ValidationError> {
    let len = value.chars().count();
    if len < min || len > max {
        return Err(ValidationError::Length { field, min, max });
    }
    Ok(())
}

pub fn check_min(field: &'static str, value: &str, min: usize) -> Result<(), ValidationError> {
    if value.chars().count() < min {
        return Err(ValidationError::TooShort { field, min });
    }
    Ok(())
}

/// Structural check only: `local@domain.tld`, no whitespace.
pub fn check_email(field: &'static str, value: &str) -> Result<(), ValidationError> {
    let invalid = || ValidationError::InvalidEmail { field };

    if value.chars().any(char::is_whitespace) {
        return Err(invalid());
    }
    let (local, domain) = value.split_once('@').ok_or_else(invalid)?;
    if local.is_empty() || domain.contains('@') {
        return Err(invalid());
    }
    match domain.rsplit_once('.') {
        Some((host, tld)) if !host.is_empty() && tld.len() >= 2 => Ok(()),
        _ => Err(invalid()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn email_shapes() {
        assert!(check_email("email", "a@b.co").is_ok());
        assert!(check_email("email", "first.last@mail.example.org").is_ok());
        assert!(check_email("email", "@b.co").is_err());
        assert!(check_email("email", "a@b").is_err());
        assert!(check_email("email", "a@@b.co").is_err());
        assert!(check_email("email", "a b@c.co").is_err());
        assert!(check_email("email", "a@.co").is_err());
    }

    #[test]
    fn error_display() {
        let err = ValidationError::Length {
            field: "content",
            min: 1,
            max: 500,
        };
        assert_eq!(err.to_string(), "content must be between 1 and 500 characters");
    }

    #[test]
    fn password_minimum() {
        assert!(check_min("password", "12345", PASSWORD_MIN).is_err());
        assert!(check_min("password", "123456", PASSWORD_MIN).is_ok());
    }
}
