//! PayStack Webhook Handling
//!
//! PayStack signs each webhook body with HMAC-SHA512 keyed by the secret
//! key and sends the hex digest in `x-paystack-signature`.

use hmac::{Hmac, Mac};
use rust_decimal::Decimal;
use serde::Deserialize;
use sha2::Sha512;

use crate::error::{PaymentError, Result};
use crate::intent::from_minor_units;

type HmacSha512 = Hmac<Sha512>;

/// Header carrying the signature
pub const SIGNATURE_HEADER: &str = "x-paystack-signature";

/// Parsed webhook event
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum WebhookEvent {
    /// Payment collected
    ChargeSuccess {
        reference: String,
        amount: Decimal,
        currency: String,
        customer_email: Option<String>,
    },

    /// Payment attempt failed
    ChargeFailed { reference: String, reason: String },

    /// Unhandled event type
    Other { event_type: String },
}

impl WebhookEvent {
    pub fn reference(&self) -> Option<&str> {
        match self {
            Self::ChargeSuccess { reference, .. } | Self::ChargeFailed { reference, .. } => Some(reference),
            Self::Other { .. } => None,
        }
    }
}

#[derive(Deserialize)]
struct RawEvent {
    event: String,
    #[serde(default)]
    data: Option<serde_json::Value>,
}

#[derive(Deserialize)]
struct ChargeData {
    reference: String,
    #[serde(default)]
    amount: i64,
    #[serde(default)]
    currency: String,
    #[serde(default)]
    gateway_response: Option<String>,
    #[serde(default)]
    customer: Option<Customer>,
}

#[derive(Deserialize)]
struct Customer {
    #[serde(default)]
    email: Option<String>,
}

/// Webhook handler
pub struct WebhookHandler {
    secret: String,
}

impl WebhookHandler {
    pub fn new(secret: impl Into<String>) -> Self {
        Self { secret: secret.into() }
    }

    /// Check `signature` against the raw request body
    pub fn verify_signature(&self, payload: &[u8], signature: &str) -> Result<()> {
        let expected = hex::decode(signature.trim())
            .map_err(|e| PaymentError::WebhookSignature(format!("malformed signature: {e}")))?;

        let mut mac = HmacSha512::new_from_slice(self.secret.as_bytes())
            .map_err(|e| PaymentError::Config(format!("invalid webhook secret: {e}")))?;
        mac.update(payload);
        mac.verify_slice(&expected)
            .map_err(|_| PaymentError::WebhookSignature("signature mismatch".into()))
    }

    /// Verify and parse a webhook
    pub fn handle(&self, payload: &[u8], signature: &str) -> Result<WebhookEvent> {
        self.verify_signature(payload, signature)?;
        let event = parse_event(payload)?;

        match &event {
            WebhookEvent::ChargeSuccess {
                reference,
                amount,
                currency,
                ..
            } => {
                tracing::info!(reference = %reference, amount = %amount, currency = %currency, "PayStack charge succeeded");
            }
            WebhookEvent::ChargeFailed { reference, reason } => {
                tracing::warn!(reference = %reference, reason = %reason, "PayStack charge failed");
            }
            WebhookEvent::Other { event_type } => {
                tracing::debug!(event_type = %event_type, "Unhandled webhook event");
            }
        }

        Ok(event)
    }
}

/// Parse a webhook body into an event
pub fn parse_event(payload: &[u8]) -> Result<WebhookEvent> {
    let raw: RawEvent = serde_json::from_slice(payload).map_err(|e| PaymentError::WebhookParse(e.to_string()))?;

    let charge = |raw: RawEvent| -> Result<ChargeData> {
        let data = raw
            .data
            .filter(|d| !d.is_null())
            .ok_or_else(|| PaymentError::WebhookParse(format!("{} without data", raw.event)))?;
        serde_json::from_value(data).map_err(|e| PaymentError::WebhookParse(e.to_string()))
    };

    match raw.event.as_str() {
        "charge.success" => {
            let data = charge(raw)?;
            Ok(WebhookEvent::ChargeSuccess {
                reference: data.reference,
                amount: from_minor_units(data.amount),
                currency: data.currency,
                customer_email: data.customer.and_then(|c| c.email),
            })
        }
        "charge.failed" => {
            let data = charge(raw)?;
            Ok(WebhookEvent::ChargeFailed {
                reference: data.reference,
                reason: data.gateway_response.unwrap_or_else(|| "Payment failed".into()),
            })
        }
        _ => Ok(WebhookEvent::Other { event_type: raw.event }),
    }
}
