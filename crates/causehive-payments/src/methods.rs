//! Payment Methods
//!
//! The PayStack methods offered at checkout, their processing fees, and
//! mobile-money phone validation for the Ghanaian networks.

use rust_decimal::{Decimal, RoundingStrategy};
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

use crate::error::{PaymentError, Result};

/// PayStack channels opened for card payments
pub const CARD_CHANNELS: &[&str] = &["card", "bank", "ussd", "qr"];

/// PayStack channels opened for mobile money
pub const MOBILE_MONEY_CHANNELS: &[&str] = &["mobile_money"];

const GHANA_DIALING_CODE: &str = "233";

/// Kind of payment method
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MethodKind {
    Card,
    MobileMoney,
    BankTransfer,
}

/// Ghanaian mobile-money networks
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MobileNetwork {
    Mtn,
    Vodafone,
    AirtelTigo,
}

impl MobileNetwork {
    pub const fn label(self) -> &'static str {
        match self {
            Self::Mtn => "MTN",
            Self::Vodafone => "Vodafone",
            Self::AirtelTigo => "AirtelTigo",
        }
    }

    /// Two-digit prefixes that follow the country code
    const fn prefixes(self) -> &'static [&'static str] {
        match self {
            Self::Mtn => &["24", "25", "53", "54", "55", "59"],
            Self::Vodafone => &["20", "50"],
            Self::AirtelTigo => &["26", "27", "56", "57"],
        }
    }

    /// Whether `phone` is a valid number on this network.
    ///
    /// Accepts `233XXXXXXXXX` and the local `0XXXXXXXXX` form; any
    /// separators are ignored.
    pub fn accepts(self, phone: &str) -> bool {
        national_number(phone).is_some_and(|national| {
            self.prefixes().iter().any(|prefix| national.starts_with(prefix))
        })
    }
}

/// The nine digits after the country code, if the number is well formed
fn national_number(phone: &str) -> Option<String> {
    let digits: String = phone.chars().filter(char::is_ascii_digit).collect();
    let national = if let Some(rest) = digits.strip_prefix(GHANA_DIALING_CODE) {
        rest
    } else if digits.len() == 10 {
        digits.strip_prefix('0')?
    } else {
        return None;
    };
    (national.len() == 9).then(|| national.to_string())
}

/// Normalize a Ghanaian number to `233XXXXXXXXX`
pub fn format_phone(phone: &str) -> String {
    let digits: String = phone.chars().filter(char::is_ascii_digit).collect();
    match digits.strip_prefix('0') {
        Some(rest) if digits.len() == 10 => format!("{GHANA_DIALING_CODE}{rest}"),
        _ => digits,
    }
}

/// Validate a mobile-money number and return it formatted
pub fn validate_phone(network: MobileNetwork, phone: &str) -> Result<String> {
    if network.accepts(phone) {
        Ok(format_phone(phone))
    } else {
        Err(PaymentError::validation(
            "phone",
            format!("Please enter a valid {} number", network.label()),
        ))
    }
}

/// A payment method offered at checkout
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentMethod {
    pub id: String,
    pub name: String,
    pub description: String,
    pub kind: MethodKind,
    /// Percentage fee, e.g. `1.95` for 1.95%
    pub fee_percentage: Decimal,
    pub fixed_fee: Decimal,
    pub supported_countries: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub network: Option<MobileNetwork>,
}

impl PaymentMethod {
    fn new(
        id: &str,
        name: &str,
        description: &str,
        kind: MethodKind,
        fee_percentage: Decimal,
        countries: &[&str],
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            description: description.into(),
            kind,
            fee_percentage,
            fixed_fee: Decimal::ZERO,
            supported_countries: countries.iter().map(|c| (*c).to_string()).collect(),
            network: None,
        }
    }

    fn on_network(mut self, network: MobileNetwork) -> Self {
        self.network = Some(network);
        self
    }

    /// Processing fee for `amount`, rounded to cents
    pub fn fee_for(&self, amount: Decimal) -> Decimal {
        (amount * self.fee_percentage / dec!(100) + self.fixed_fee)
            .round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
    }

    pub fn supports_country(&self, country: &str) -> bool {
        self.supported_countries.iter().any(|c| c.eq_ignore_ascii_case(country))
    }

    /// Gateway channels to open for this method
    pub const fn channels(&self) -> &'static [&'static str] {
        match self.kind {
            MethodKind::MobileMoney => MOBILE_MONEY_CHANNELS,
            MethodKind::Card | MethodKind::BankTransfer => CARD_CHANNELS,
        }
    }
}

/// All payment methods, in display order
pub fn catalog() -> Vec<PaymentMethod> {
    vec![
        PaymentMethod::new(
            "paystack_card",
            "Card Payment",
            "Pay with Visa, Mastercard, or Verve",
            MethodKind::Card,
            dec!(1.95),
            &["GH", "NG", "ZA", "KE"],
        ),
        PaymentMethod::new(
            "mtn_momo",
            "MTN Mobile Money",
            "Pay with your MTN MoMo wallet",
            MethodKind::MobileMoney,
            dec!(1.5),
            &["GH"],
        )
        .on_network(MobileNetwork::Mtn),
        PaymentMethod::new(
            "vodafone_cash",
            "Vodafone Cash",
            "Pay with your Vodafone Cash wallet",
            MethodKind::MobileMoney,
            dec!(1.5),
            &["GH"],
        )
        .on_network(MobileNetwork::Vodafone),
        PaymentMethod::new(
            "airtel_tigo_money",
            "AirtelTigo Money",
            "Pay with your AirtelTigo Money wallet",
            MethodKind::MobileMoney,
            dec!(1.5),
            &["GH"],
        )
        .on_network(MobileNetwork::AirtelTigo),
        PaymentMethod::new(
            "paystack_bank",
            "Bank Transfer",
            "Pay directly from your bank account",
            MethodKind::BankTransfer,
            dec!(0.5),
            &["GH", "NG"],
        ),
    ]
}

/// Look up a method by id
pub fn find(id: &str) -> Result<PaymentMethod> {
    catalog()
        .into_iter()
        .find(|m| m.id == id)
        .ok_or_else(|| PaymentError::UnknownMethod(id.to_string()))
}

/// Methods available in a country
pub fn for_country(country: &str) -> Vec<PaymentMethod> {
    catalog().into_iter().filter(|m| m.supports_country(country)).collect()
}
