//! Error Types for CauseHive Core

use thiserror::Error;

pub type Result<T> = std::result::Result<T, CoreError>;

#[derive(Error, Debug)]
pub enum CoreError {
    /// A user-supplied field failed validation
    #[error("Invalid {field}: {reason}")]
    Validation { field: String, reason: String },

    #[error("Cause not in cart: {0}")]
    NotInCart(String),

    #[error("Cause not found: {0}")]
    CauseNotFound(String),

    #[error("Not authenticated")]
    Unauthenticated,

    /// The auth collaborator rejected the request
    #[error("Auth error: {0}")]
    Auth(String),

    /// The CauseHive API answered with an unsuccessful envelope
    #[error("API error: {0}")]
    Api(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl CoreError {
    pub fn validation(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Validation {
            field: field.into(),
            reason: reason.into(),
        }
    }

    /// Field to report the error next to, for inline validation messages
    pub fn field(&self) -> Option<&str> {
        match self {
            Self::Validation { field, .. } => Some(field),
            _ => None,
        }
    }

    /// Check if this error is retryable
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::Network(_) | Self::Io(_) | Self::Storage(_))
    }

    /// Get user-friendly message
    pub fn user_message(&self) -> String {
        match self {
            Self::Validation { reason, .. } => reason.clone(),
            Self::NotInCart(_) => "This cause is no longer in your cart.".into(),
            Self::CauseNotFound(_) => "We couldn't find that cause.".into(),
            Self::Unauthenticated => "Please log in to continue.".into(),
            Self::Auth(msg) | Self::Api(msg) => msg.clone(),
            Self::Network(_) => "Unable to reach CauseHive. Please check your connection.".into(),
            _ => "An unexpected error occurred.".into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_field() {
        let err = CoreError::validation("amount", "Please enter a valid amount");
        assert_eq!(err.field(), Some("amount"));
        assert_eq!(err.user_message(), "Please enter a valid amount");
        assert!(!err.is_retryable());
    }

    #[test]
    fn test_non_validation_has_no_field() {
        assert_eq!(CoreError::Unauthenticated.field(), None);
        assert!(CoreError::Storage("disk full".into()).is_retryable());
    }
}
