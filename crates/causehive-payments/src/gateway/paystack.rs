//! PayStack Gateway
//!
//! REST client for `POST /transaction/initialize` and
//! `GET /transaction/verify/{reference}`. Amounts cross the wire in minor
//! units.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use super::{Authorization, PaymentGateway, TransactionStatus, Verification};
use crate::error::{PaymentError, Result};
use crate::intent::{IntentMetadata, PaymentIntent, from_minor_units};

pub const DEFAULT_BASE_URL: &str = "https://api.paystack.co";

/// PayStack credentials and endpoint
#[derive(Clone)]
pub struct PaystackConfig {
    pub secret_key: String,
    pub base_url: String,
}

impl PaystackConfig {
    pub fn new(secret_key: impl Into<String>) -> Self {
        Self {
            secret_key: secret_key.into(),
            base_url: DEFAULT_BASE_URL.into(),
        }
    }

    /// Create from environment variables
    pub fn from_env() -> Result<Self> {
        let secret_key = std::env::var("PAYSTACK_SECRET_KEY")
            .map_err(|_| PaymentError::Config("PAYSTACK_SECRET_KEY not set".into()))?;
        let base_url = std::env::var("PAYSTACK_BASE_URL").unwrap_or_else(|_| DEFAULT_BASE_URL.into());

        Ok(Self {
            secret_key,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }
}

/// PayStack response envelope
#[derive(Debug, Deserialize)]
struct Envelope<T> {
    status: bool,
    #[serde(default)]
    message: String,
    data: Option<T>,
}

#[derive(Serialize)]
struct InitializeRequest<'a> {
    email: &'a str,
    amount: i64,
    currency: &'a str,
    reference: &'a str,
    callback_url: &'a str,
    channels: &'a [String],
    metadata: &'a IntentMetadata,
}

#[derive(Debug, Deserialize)]
struct VerifyData {
    status: TransactionStatus,
    reference: String,
    amount: i64,
    currency: String,
    #[serde(default)]
    paid_at: Option<DateTime<Utc>>,
    #[serde(default)]
    gateway_response: Option<String>,
    #[serde(default)]
    customer: Option<Customer>,
}

#[derive(Debug, Deserialize)]
struct Customer {
    #[serde(default)]
    email: Option<String>,
}

impl From<VerifyData> for Verification {
    fn from(data: VerifyData) -> Self {
        Self {
            reference: data.reference,
            status: data.status,
            amount: from_minor_units(data.amount),
            currency: data.currency,
            paid_at: data.paid_at,
            gateway_response: data.gateway_response,
            customer_email: data.customer.and_then(|c| c.email),
        }
    }
}

/// PayStack REST client
pub struct PaystackClient {
    client: reqwest::Client,
    config: PaystackConfig,
}

impl PaystackClient {
    pub fn new(config: PaystackConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            config,
        }
    }

    /// Create from environment variables
    pub fn from_env() -> Result<Self> {
        Ok(Self::new(PaystackConfig::from_env()?))
    }

    /// Secret used to sign webhooks
    pub fn webhook_secret(&self) -> &str {
        &self.config.secret_key
    }

    /// Read the envelope, turning an unsuccessful answer into `failed`
    async fn read_envelope<T: DeserializeOwned + Send>(
        response: reqwest::Response,
        failed: fn(String) -> PaymentError,
    ) -> Result<T> {
        let status = response.status();
        let envelope: Envelope<T> = response
            .json()
            .await
            .map_err(|e| failed(format!("unreadable response ({status}): {e}")))?;

        if !status.is_success() || !envelope.status {
            return Err(failed(envelope.message));
        }
        envelope
            .data
            .ok_or_else(|| failed(format!("{} (no data)", envelope.message)))
    }
}

#[async_trait]
impl PaymentGateway for PaystackClient {
    async fn initialize(&self, intent: &PaymentIntent) -> Result<Authorization> {
        let body = InitializeRequest {
            email: intent.email(),
            amount: intent.amount_minor()?,
            currency: intent.currency().code(),
            reference: intent.reference(),
            callback_url: intent.callback_url(),
            channels: intent.channels(),
            metadata: intent.metadata(),
        };

        tracing::info!(
            reference = %intent.reference(),
            amount = %intent.total_amount(),
            currency = %intent.currency(),
            "Initializing PayStack transaction"
        );

        let response = self
            .client
            .post(format!("{}/transaction/initialize", self.config.base_url))
            .bearer_auth(&self.config.secret_key)
            .json(&body)
            .send()
            .await?;

        let authorization: Authorization = Self::read_envelope(response, PaymentError::GatewayInit).await?;
        tracing::debug!(reference = %authorization.reference, "PayStack transaction created");
        Ok(authorization)
    }

    async fn verify(&self, reference: &str) -> Result<Verification> {
        let response = self
            .client
            .get(format!("{}/transaction/verify/{reference}", self.config.base_url))
            .bearer_auth(&self.config.secret_key)
            .send()
            .await?;

        let data: VerifyData = Self::read_envelope(response, PaymentError::Gateway).await?;
        tracing::debug!(reference, status = ?data.status, "PayStack verification");
        Ok(data.into())
    }

    fn name(&self) -> &str {
        "PayStack"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_verify_payload_conversion() {
        let envelope: Envelope<VerifyData> = serde_json::from_str(
            r#"{
                "status": true,
                "message": "Verification successful",
                "data": {
                    "status": "success",
                    "reference": "CAUSEHIVE_1700000000000_AB12CD",
                    "amount": 3550,
                    "currency": "GHS",
                    "transaction_date": "2024-01-05T10:00:00.000Z",
                    "paid_at": "2024-01-05T10:00:05.000Z",
                    "gateway_response": "Approved",
                    "customer": { "email": "ama@example.com" }
                }
            }"#,
        )
        .unwrap();

        let verification: Verification = envelope.data.unwrap().into();
        assert!(verification.status.is_success());
        assert_eq!(verification.amount, dec!(35.50));
        assert_eq!(verification.customer_email.as_deref(), Some("ama@example.com"));
        assert!(verification.paid_at.is_some());
    }

    #[test]
    fn test_failed_envelope_shape() {
        let envelope: Envelope<Authorization> =
            serde_json::from_str(r#"{"status": false, "message": "Invalid key"}"#).unwrap();
        assert!(!envelope.status);
        assert!(envelope.data.is_none());
        assert_eq!(envelope.message, "Invalid key");
    }

    #[test]
    fn test_default_base_url() {
        let config = PaystackConfig::new("sk_test_x");
        assert_eq!(config.base_url, "https://api.paystack.co");
    }
}
