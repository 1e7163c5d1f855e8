//! Payment Gateway Integration
//!
//! The external collaborator that creates transactions and verifies them by
//! reference. PayStack in production, a scripted gateway in tests.

mod mock;
mod paystack;

pub use mock::ScriptedGateway;
pub use paystack::{PaystackClient, PaystackConfig};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::intent::PaymentIntent;

/// Handle returned when a transaction is created
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Authorization {
    /// Hosted payment page for redirect-style collection
    pub authorization_url: String,
    /// Code for the embedded widget
    pub access_code: String,
    pub reference: String,
}

/// Transaction status as reported by the gateway
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransactionStatus {
    Success,
    Failed,
    Reversed,
    Abandoned,
    Pending,
    Ongoing,
    Processing,
    Queued,
    #[serde(other)]
    Unknown,
}

impl TransactionStatus {
    pub const fn is_success(self) -> bool {
        matches!(self, Self::Success)
    }

    /// The payment will not complete
    pub const fn is_failure(self) -> bool {
        matches!(self, Self::Failed | Self::Reversed)
    }
}

/// Result of verifying a transaction by reference
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Verification {
    pub reference: String,
    pub status: TransactionStatus,
    /// Settled amount in major units
    pub amount: Decimal,
    pub currency: String,
    #[serde(default)]
    pub paid_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub gateway_response: Option<String>,
    #[serde(default)]
    pub customer_email: Option<String>,
}

/// Payment gateway trait
///
/// Implement this for each provider.
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    /// Create a transaction for `intent`
    async fn initialize(&self, intent: &PaymentIntent) -> Result<Authorization>;

    /// Look up a transaction by reference
    async fn verify(&self, reference: &str) -> Result<Verification>;

    /// Gateway name
    fn name(&self) -> &str;
}
