//! Payment Error Types

use causehive_core::CoreError;
use thiserror::Error;

/// Result type alias
pub type Result<T> = std::result::Result<T, PaymentError>;

/// Checkout and payment errors
#[derive(Error, Debug)]
pub enum PaymentError {
    /// Checkout attempted without a signed-in user
    #[error("Authentication required for checkout")]
    Unauthenticated,

    /// Checkout attempted with nothing in the cart
    #[error("Cart is empty")]
    EmptyCart,

    /// A checkout field failed validation
    #[error("Invalid {field}: {reason}")]
    Validation { field: String, reason: String },

    #[error("Unknown payment method: {0}")]
    UnknownMethod(String),

    /// The gateway refused to create the transaction
    #[error("Payment initialization failed: {0}")]
    GatewayInit(String),

    /// Any other unsuccessful gateway answer
    #[error("Payment gateway error: {0}")]
    Gateway(String),

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    /// Webhook signature verification failed
    #[error("Webhook signature invalid: {0}")]
    WebhookSignature(String),

    /// Webhook payload parsing failed
    #[error("Webhook parse error: {0}")]
    WebhookParse(String),

    #[error(transparent)]
    Core(#[from] CoreError),
}

impl PaymentError {
    pub fn validation(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Validation {
            field: field.into(),
            reason: reason.into(),
        }
    }

    /// Field to report the error next to
    pub fn field(&self) -> Option<&str> {
        match self {
            Self::Validation { field, .. } => Some(field),
            Self::Core(e) => e.field(),
            _ => None,
        }
    }

    /// Check if this error is retryable
    pub const fn is_retryable(&self) -> bool {
        match self {
            Self::Network(_) | Self::Gateway(_) => true,
            Self::Core(e) => e.is_retryable(),
            _ => false,
        }
    }

    /// Get user-friendly message
    pub fn user_message(&self) -> String {
        match self {
            Self::Unauthenticated => "Please log in to complete your donation.".into(),
            Self::EmptyCart => "Your cart is empty.".into(),
            Self::Validation { reason, .. } => reason.clone(),
            Self::UnknownMethod(_) => "Please choose a supported payment method.".into(),
            Self::GatewayInit(_) => "Failed to initialize payment. Please try again.".into(),
            Self::Gateway(_) | Self::Network(_) => "Payment service is unavailable. Please try again.".into(),
            Self::Config(_) => "Payments are not configured.".into(),
            Self::Core(e) => e.user_message(),
            _ => "An error occurred processing your request.".into(),
        }
    }
}
