//! Donation Cart
//!
//! Local list of pending donation intents. Every committed mutation is saved
//! to [`ClientStorage`] and then published to subscribers; the cart is
//! rehydrated from storage when loaded.

use std::sync::Arc;

use rust_decimal::Decimal;
use rust_decimal::RoundingStrategy;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use tokio::sync::{RwLock, watch};

use crate::error::{CoreError, Result};
use crate::model::{Cause, Currency};
use crate::storage::{self, ClientStorage};

/// Storage key holding the serialized item list
pub const CART_STORAGE_KEY: &str = "causehive_donation_cart";

/// Longest donor message accepted, in characters
pub const MAX_MESSAGE_CHARS: usize = 500;

/// Shared handle to the cart for views and flows that mutate it
pub type CartHandle = Arc<RwLock<CartStore>>;

/// A pending donation to one cause
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartItem {
    pub cause_id: String,
    pub cause_title: String,
    pub amount: Decimal,
    pub currency: Currency,
    pub is_anonymous: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub donor_message: Option<String>,
}

/// Partial update of a cart item. `None` leaves a field untouched; an empty
/// `donor_message` clears the message.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartItemUpdate {
    #[serde(default)]
    pub amount: Option<Decimal>,
    #[serde(default)]
    pub currency: Option<Currency>,
    #[serde(default)]
    pub is_anonymous: Option<bool>,
    #[serde(default)]
    pub donor_message: Option<String>,
}

/// Processing fee estimate: `percentage`% of the amount plus `fixed`
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeeSchedule {
    pub percentage: Decimal,
    pub fixed: Decimal,
}

impl Default for FeeSchedule {
    fn default() -> Self {
        Self {
            percentage: dec!(2.5),
            fixed: dec!(0.30),
        }
    }
}

impl FeeSchedule {
    pub const fn new(percentage: Decimal, fixed: Decimal) -> Self {
        Self { percentage, fixed }
    }

    /// Fee for one amount, rounded half-up to cents
    pub fn fee_for(&self, amount: Decimal) -> Decimal {
        (amount * self.percentage / Decimal::ONE_HUNDRED + self.fixed)
            .round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
    }
}

/// Cart limits and fee schedule
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CartConfig {
    /// Largest single donation accepted
    pub max_amount: Decimal,
    pub fees: FeeSchedule,
}

impl Default for CartConfig {
    fn default() -> Self {
        Self {
            max_amount: dec!(100000),
            fees: FeeSchedule::default(),
        }
    }
}

impl CartConfig {
    /// Read `CAUSEHIVE_MAX_DONATION`, falling back to defaults
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Some(max) = std::env::var("CAUSEHIVE_MAX_DONATION")
            .ok()
            .and_then(|v| v.parse::<Decimal>().ok())
            .filter(|v| *v > Decimal::ZERO)
        {
            config.max_amount = max;
        }
        config
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartTotals {
    pub item_count: usize,
    pub total_amount: Decimal,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeeSummary {
    pub subtotal: Decimal,
    pub fees: Decimal,
    pub grand_total: Decimal,
}

/// Published view of the cart after a mutation
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartSnapshot {
    pub items: Vec<CartItem>,
    pub totals: CartTotals,
}

/// The donation cart
pub struct CartStore {
    items: Vec<CartItem>,
    storage: Arc<dyn ClientStorage>,
    config: CartConfig,
    notifier: watch::Sender<CartSnapshot>,
}

impl CartStore {
    /// Rehydrate the cart from storage.
    ///
    /// Unreadable or invalid stored data is logged and skipped; the cart then
    /// starts with whatever valid items remain.
    pub fn load(storage: Arc<dyn ClientStorage>, config: CartConfig) -> Self {
        let stored: Vec<CartItem> = match storage::load_json(storage.as_ref(), CART_STORAGE_KEY) {
            Ok(items) => items.unwrap_or_default(),
            Err(e) => {
                tracing::warn!(error = %e, "Failed to load donation cart, starting empty");
                Vec::new()
            }
        };

        let mut items: Vec<CartItem> = Vec::with_capacity(stored.len());
        for item in stored {
            if let Err(e) = validate_amount(item.amount, config.max_amount) {
                tracing::warn!(cause_id = %item.cause_id, error = %e, "Dropping invalid stored cart item");
                continue;
            }
            match items.iter_mut().find(|i| i.cause_id == item.cause_id) {
                Some(existing) => *existing = item,
                None => items.push(item),
            }
        }

        tracing::debug!(items = items.len(), "Loaded donation cart");

        let (notifier, _) = watch::channel(snapshot_of(&items));
        Self {
            items,
            storage,
            config,
            notifier,
        }
    }

    /// Wrap into a shareable handle
    pub fn into_handle(self) -> CartHandle {
        Arc::new(RwLock::new(self))
    }

    /// Observe cart snapshots; the receiver starts at the current state
    pub fn subscribe(&self) -> watch::Receiver<CartSnapshot> {
        self.notifier.subscribe()
    }

    pub fn config(&self) -> &CartConfig {
        &self.config
    }

    pub fn items(&self) -> &[CartItem] {
        &self.items
    }

    pub fn get(&self, cause_id: &str) -> Option<&CartItem> {
        self.items.iter().find(|i| i.cause_id == cause_id)
    }

    pub fn is_in_cart(&self, cause_id: &str) -> bool {
        self.get(cause_id).is_some()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Add a donation, or overwrite the existing entry for the same cause
    pub fn add_or_update(
        &mut self,
        cause: &Cause,
        amount: Decimal,
        currency: Currency,
        is_anonymous: bool,
        donor_message: Option<String>,
    ) -> Result<&CartItem> {
        if !cause.status.accepts_donations() {
            return Err(CoreError::validation(
                "cause",
                format!("{} is not accepting donations", cause.title),
            ));
        }
        validate_amount(amount, self.config.max_amount)?;
        let donor_message = normalize_message(donor_message)?;

        let index = match self.items.iter().position(|i| i.cause_id == cause.id) {
            Some(index) => {
                let item = &mut self.items[index];
                item.cause_title.clone_from(&cause.title);
                item.amount = amount;
                item.currency = currency;
                item.is_anonymous = is_anonymous;
                item.donor_message = donor_message;
                index
            }
            None => {
                self.items.push(CartItem {
                    cause_id: cause.id.clone(),
                    cause_title: cause.title.clone(),
                    amount,
                    currency,
                    is_anonymous,
                    donor_message,
                });
                self.items.len() - 1
            }
        };

        tracing::debug!(cause_id = %cause.id, amount = %amount, currency = %currency, "Cart item saved");
        self.commit();
        Ok(&self.items[index])
    }

    /// Remove the entry for a cause, returning it if present
    pub fn remove(&mut self, cause_id: &str) -> Option<CartItem> {
        let index = self.items.iter().position(|i| i.cause_id == cause_id)?;
        let removed = self.items.remove(index);
        self.commit();
        Some(removed)
    }

    /// Apply a partial update to an existing entry
    pub fn update(&mut self, cause_id: &str, update: CartItemUpdate) -> Result<&CartItem> {
        let index = self
            .items
            .iter()
            .position(|i| i.cause_id == cause_id)
            .ok_or_else(|| CoreError::NotInCart(cause_id.to_string()))?;

        // Validate everything before touching the item
        if let Some(amount) = update.amount {
            validate_amount(amount, self.config.max_amount)?;
        }
        let donor_message = update.donor_message.map(|m| normalize_message(Some(m))).transpose()?;

        let item = &mut self.items[index];
        if let Some(amount) = update.amount {
            item.amount = amount;
        }
        if let Some(currency) = update.currency {
            item.currency = currency;
        }
        if let Some(is_anonymous) = update.is_anonymous {
            item.is_anonymous = is_anonymous;
        }
        if let Some(message) = donor_message {
            item.donor_message = message;
        }

        self.commit();
        Ok(&self.items[index])
    }

    pub fn clear(&mut self) {
        self.items.clear();
        self.commit();
    }

    pub fn totals(&self) -> CartTotals {
        totals_of(&self.items)
    }

    /// Sums per currency, in first-seen order
    pub fn totals_by_currency(&self) -> Vec<(Currency, Decimal)> {
        let mut sums: Vec<(Currency, Decimal)> = Vec::new();
        for item in &self.items {
            match sums.iter_mut().find(|(c, _)| *c == item.currency) {
                Some((_, sum)) => *sum += item.amount,
                None => sums.push((item.currency, item.amount)),
            }
        }
        sums
    }

    /// Subtotal, estimated processing fees and grand total
    pub fn fee_summary(&self) -> FeeSummary {
        let subtotal = self.totals().total_amount;
        let fees: Decimal = self.items.iter().map(|i| self.config.fees.fee_for(i.amount)).sum();
        FeeSummary {
            subtotal,
            fees,
            grand_total: subtotal + fees,
        }
    }

    /// The one currency every item shares, `None` for an empty cart
    pub fn checkout_currency(&self) -> Result<Option<Currency>> {
        let mut currencies = self.items.iter().map(|i| i.currency);
        let Some(first) = currencies.next() else {
            return Ok(None);
        };
        if currencies.any(|c| c != first) {
            return Err(CoreError::validation(
                "currency",
                "All donations in one checkout must use the same currency",
            ));
        }
        Ok(Some(first))
    }

    pub fn snapshot(&self) -> CartSnapshot {
        snapshot_of(&self.items)
    }

    /// Save then notify. A failed save keeps the in-memory change.
    fn commit(&self) {
        if let Err(e) = storage::save_json(self.storage.as_ref(), CART_STORAGE_KEY, &self.items) {
            tracing::error!(error = %e, "Failed to save donation cart");
        }
        self.notifier.send_replace(self.snapshot());
    }
}

fn totals_of(items: &[CartItem]) -> CartTotals {
    CartTotals {
        item_count: items.len(),
        total_amount: items.iter().map(|i| i.amount).sum(),
    }
}

fn snapshot_of(items: &[CartItem]) -> CartSnapshot {
    CartSnapshot {
        items: items.to_vec(),
        totals: totals_of(items),
    }
}

fn validate_amount(amount: Decimal, max: Decimal) -> Result<()> {
    if amount <= Decimal::ZERO {
        return Err(CoreError::validation("amount", "Please enter a valid amount"));
    }
    if amount > max {
        return Err(CoreError::validation(
            "amount",
            format!("Maximum donation amount is {max}"),
        ));
    }
    Ok(())
}

fn normalize_message(message: Option<String>) -> Result<Option<String>> {
    let Some(message) = message else {
        return Ok(None);
    };
    let trimmed = message.trim();
    if trimmed.is_empty() {
        return Ok(None);
    }
    if trimmed.chars().count() > MAX_MESSAGE_CHARS {
        return Err(CoreError::validation(
            "donor_message",
            format!("Message must be at most {MAX_MESSAGE_CHARS} characters"),
        ));
    }
    Ok(Some(trimmed.to_string()))
}
