//! Payment Intents
//!
//! A `PaymentIntent` is built once per checkout attempt from the cart and the
//! signed-in user. It cannot be changed after construction, so what the
//! gateway receives is exactly what was built.

use causehive_core::auth::UserIdentity;
use causehive_core::cart::CartItem;
use causehive_core::Currency;
use chrono::{DateTime, Utc};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

use crate::error::{PaymentError, Result};
use crate::methods::{self, MobileNetwork, CARD_CHANNELS, MOBILE_MONEY_CHANNELS};

/// How the donor chose to pay
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PaymentSelection {
    #[default]
    Card,
    MobileMoney { network: MobileNetwork, phone: String },
}

impl PaymentSelection {
    /// Selection for a catalog method id; mobile-money methods need a phone
    pub fn from_method(method_id: &str, phone: Option<&str>) -> Result<Self> {
        let method = methods::find(method_id)?;
        match method.network {
            Some(network) => {
                let phone = phone
                    .map(str::trim)
                    .filter(|p| !p.is_empty())
                    .ok_or_else(|| PaymentError::validation("phone", "Phone number is required for mobile money"))?;
                Ok(Self::MobileMoney {
                    network,
                    phone: phone.to_string(),
                })
            }
            None => Ok(Self::Card),
        }
    }
}

/// One donation inside a checkout
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DonationLine {
    pub cause_id: String,
    pub cause_title: String,
    pub amount: Decimal,
    pub is_anonymous: bool,
    #[serde(default)]
    pub message: Option<String>,
}

impl From<&CartItem> for DonationLine {
    fn from(item: &CartItem) -> Self {
        Self {
            cause_id: item.cause_id.clone(),
            cause_title: item.cause_title.clone(),
            amount: item.amount,
            is_anonymous: item.is_anonymous,
            message: item.donor_message.clone(),
        }
    }
}

/// Metadata attached to the gateway transaction
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct IntentMetadata {
    pub donations: Vec<DonationLine>,
    pub donor_name: String,
    pub total_causes: usize,
    pub customer_name: String,
    #[serde(default)]
    pub customer_phone: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payment_method: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub network: Option<MobileNetwork>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone_number: Option<String>,
}

/// An immutable request to collect one payment
#[derive(Clone, Debug, Serialize)]
pub struct PaymentIntent {
    reference: String,
    email: String,
    total_amount: Decimal,
    currency: Currency,
    callback_url: String,
    channels: Vec<String>,
    metadata: IntentMetadata,
    created_at: DateTime<Utc>,
}

impl PaymentIntent {
    /// Build an intent for `items`, all of which must be in `currency`
    pub fn new(
        reference: String,
        payer: &UserIdentity,
        items: &[CartItem],
        currency: Currency,
        callback_url: String,
        selection: &PaymentSelection,
    ) -> Result<Self> {
        if items.is_empty() {
            return Err(PaymentError::EmptyCart);
        }
        if items.iter().any(|i| i.currency != currency) {
            return Err(PaymentError::validation(
                "currency",
                "All donations in one checkout must use the same currency",
            ));
        }

        let customer_name = payer.full_name();
        let mut metadata = IntentMetadata {
            donations: items.iter().map(DonationLine::from).collect(),
            donor_name: customer_name.clone(),
            total_causes: items.len(),
            customer_name,
            customer_phone: payer.phone.clone(),
            payment_method: None,
            network: None,
            phone_number: None,
        };

        let channels = match selection {
            PaymentSelection::Card => CARD_CHANNELS,
            PaymentSelection::MobileMoney { network, phone } => {
                metadata.phone_number = Some(methods::validate_phone(*network, phone)?);
                metadata.payment_method = Some("mobile_money".into());
                metadata.network = Some(*network);
                MOBILE_MONEY_CHANNELS
            }
        };

        Ok(Self {
            reference,
            email: payer.email.clone(),
            total_amount: items.iter().map(|i| i.amount).sum(),
            currency,
            callback_url,
            channels: channels.iter().map(|c| (*c).to_string()).collect(),
            metadata,
            created_at: Utc::now(),
        })
    }

    pub fn reference(&self) -> &str {
        &self.reference
    }

    pub fn email(&self) -> &str {
        &self.email
    }

    pub const fn total_amount(&self) -> Decimal {
        self.total_amount
    }

    pub const fn currency(&self) -> Currency {
        self.currency
    }

    pub fn callback_url(&self) -> &str {
        &self.callback_url
    }

    pub fn channels(&self) -> &[String] {
        &self.channels
    }

    pub const fn metadata(&self) -> &IntentMetadata {
        &self.metadata
    }

    pub const fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Total in the currency's minor unit (pesewas, cents)
    pub fn amount_minor(&self) -> Result<i64> {
        to_minor_units(self.total_amount)
    }
}

/// Convert a major-unit amount to minor units, rounding half away from zero
pub fn to_minor_units(amount: Decimal) -> Result<i64> {
    (amount * dec!(100))
        .round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero)
        .to_i64()
        .ok_or_else(|| PaymentError::validation("amount", "Amount is out of range"))
}

/// Convert a minor-unit amount back to major units
pub fn from_minor_units(amount: i64) -> Decimal {
    Decimal::new(amount, 2)
}
