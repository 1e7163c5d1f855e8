//! Checkout Orchestration
//!
//! Turns the cart into a payment intent, hands it to the gateway and the
//! payment widget, and reconciles the outcome with the cart.
//!
//! ```text
//! cart ──▶ guards ──▶ PaymentIntent ──▶ gateway.initialize ──▶ widget
//!                                                               │
//!                    Completed ──▶ clear cart, success view ◀───┤
//!                    Cancelled ──▶ cart untouched          ◀───┤
//!                    Redirected ─▶ poll by reference       ◀───┘
//! ```

use std::sync::Arc;

use async_trait::async_trait;
use causehive_core::auth::UserIdentity;
use causehive_core::cart::{CartHandle, CartItem};
use causehive_core::storage::{self, ClientStorage};
use serde::{Deserialize, Serialize};

use crate::error::{PaymentError, Result};
use crate::gateway::{Authorization, PaymentGateway};
use crate::intent::{PaymentIntent, PaymentSelection};
use crate::reference::ReferenceGenerator;

/// Storage key for the reference of the checkout in flight
pub const PENDING_REFERENCE_KEY: &str = "current_payment_reference";

/// Storage key for the cart items submitted with that checkout
pub const CART_BACKUP_KEY: &str = "payment_cart_backup";

pub const SUCCESS_PATH: &str = "/donations/success";

const DEFAULT_APP_URL: &str = "http://localhost:3001";

/// Path of the success view for `reference`
pub fn success_path(reference: &str) -> String {
    format!("{SUCCESS_PATH}?reference={reference}")
}

/// What the payment widget reported back
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum WidgetOutcome {
    /// The donor paid inside the widget
    Completed,
    /// The donor closed the widget
    Cancelled,
    /// The donor was sent to the hosted payment page
    Redirected,
}

/// External payment collection step (embedded widget or redirect)
#[async_trait]
pub trait PaymentWidget: Send + Sync {
    async fn collect(&self, intent: &PaymentIntent, authorization: &Authorization) -> Result<WidgetOutcome>;
}

/// Redirect-style collection: the caller sends the donor to the
/// authorization URL and the outcome is resolved by polling
pub struct RedirectWidget;

#[async_trait]
impl PaymentWidget for RedirectWidget {
    async fn collect(&self, intent: &PaymentIntent, authorization: &Authorization) -> Result<WidgetOutcome> {
        tracing::info!(
            reference = %intent.reference(),
            url = %authorization.authorization_url,
            "Redirecting donor to hosted payment page"
        );
        Ok(WidgetOutcome::Redirected)
    }
}

/// Result of a checkout attempt
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum CheckoutOutcome {
    Completed {
        reference: String,
        redirect_to: String,
    },
    Cancelled {
        reference: String,
    },
    AwaitingConfirmation {
        reference: String,
        authorization_url: String,
        access_code: String,
    },
}

impl CheckoutOutcome {
    pub fn reference(&self) -> &str {
        match self {
            Self::Completed { reference, .. }
            | Self::Cancelled { reference }
            | Self::AwaitingConfirmation { reference, .. } => reference,
        }
    }
}

/// The checkout in flight, as saved before the widget opens
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingCheckout {
    pub reference: String,
    pub items: Vec<CartItem>,
}

#[derive(Clone, Debug)]
pub struct CheckoutConfig {
    /// Public origin of the web app, used for the gateway callback
    pub app_url: String,
}

impl Default for CheckoutConfig {
    fn default() -> Self {
        Self {
            app_url: DEFAULT_APP_URL.into(),
        }
    }
}

impl CheckoutConfig {
    /// Read `CAUSEHIVE_APP_URL`
    pub fn from_env() -> Self {
        let app_url = std::env::var("CAUSEHIVE_APP_URL").unwrap_or_else(|_| DEFAULT_APP_URL.into());
        Self {
            app_url: app_url.trim_end_matches('/').to_string(),
        }
    }
}

/// Drives one checkout attempt at a time per call
pub struct CheckoutOrchestrator {
    gateway: Arc<dyn PaymentGateway>,
    storage: Arc<dyn ClientStorage>,
    references: ReferenceGenerator,
    config: CheckoutConfig,
}

impl CheckoutOrchestrator {
    pub fn new(gateway: Arc<dyn PaymentGateway>, storage: Arc<dyn ClientStorage>, config: CheckoutConfig) -> Self {
        Self {
            gateway,
            storage,
            references: ReferenceGenerator::new(),
            config,
        }
    }

    pub fn gateway(&self) -> Arc<dyn PaymentGateway> {
        Arc::clone(&self.gateway)
    }

    /// Where the gateway sends the donor after paying
    pub fn callback_url(&self, reference: &str) -> String {
        format!("{}{}", self.config.app_url, success_path(reference))
    }

    /// Run a checkout for the current cart.
    ///
    /// Nothing reaches the gateway unless the payer is signed in, the cart
    /// is non-empty and single-currency, and the payment selection is valid.
    /// Initialization failures are returned as-is and never retried.
    pub async fn checkout(
        &self,
        cart: &CartHandle,
        payer: Option<&UserIdentity>,
        selection: &PaymentSelection,
        widget: &dyn PaymentWidget,
    ) -> Result<CheckoutOutcome> {
        let payer = payer.ok_or(PaymentError::Unauthenticated)?;

        let (items, currency) = {
            let cart = cart.read().await;
            let currency = cart.checkout_currency()?.ok_or(PaymentError::EmptyCart)?;
            (cart.items().to_vec(), currency)
        };

        let reference = self.references.next_reference();
        let intent = PaymentIntent::new(
            reference.clone(),
            payer,
            &items,
            currency,
            self.callback_url(&reference),
            selection,
        )?;

        self.save_pending(&reference, &items);

        let authorization = match self.gateway.initialize(&intent).await {
            Ok(authorization) => authorization,
            Err(e) => {
                tracing::error!(reference = %reference, gateway = self.gateway.name(), error = %e, "Payment initialization failed");
                self.discard_pending();
                return Err(e);
            }
        };

        let outcome = match widget.collect(&intent, &authorization).await {
            Ok(outcome) => outcome,
            Err(e) => {
                tracing::warn!(reference = %reference, error = %e, "Payment widget failed");
                self.discard_pending();
                return Err(e);
            }
        };

        match outcome {
            WidgetOutcome::Completed => {
                cart.write().await.clear();
                tracing::info!(reference = %reference, amount = %intent.total_amount(), "Checkout completed");
                Ok(CheckoutOutcome::Completed {
                    redirect_to: success_path(&reference),
                    reference,
                })
            }
            WidgetOutcome::Cancelled => {
                tracing::info!(reference = %reference, "Checkout cancelled by donor");
                self.discard_pending();
                Ok(CheckoutOutcome::Cancelled { reference })
            }
            WidgetOutcome::Redirected => Ok(CheckoutOutcome::AwaitingConfirmation {
                reference,
                authorization_url: authorization.authorization_url,
                access_code: authorization.access_code,
            }),
        }
    }

    /// The saved checkout, without removing it
    pub fn pending_checkout(&self) -> Result<Option<PendingCheckout>> {
        let Some(reference) = self.storage.get(PENDING_REFERENCE_KEY)? else {
            return Ok(None);
        };
        let items = match storage::load_json(self.storage.as_ref(), CART_BACKUP_KEY) {
            Ok(items) => items.unwrap_or_default(),
            Err(e) => {
                tracing::warn!(error = %e, "Ignoring unreadable cart backup");
                Vec::new()
            }
        };
        Ok(Some(PendingCheckout { reference, items }))
    }

    /// Consume the saved checkout (success view)
    pub fn take_pending_checkout(&self) -> Result<Option<PendingCheckout>> {
        let pending = self.pending_checkout()?;
        if pending.is_some() {
            self.storage.remove(PENDING_REFERENCE_KEY)?;
            self.storage.remove(CART_BACKUP_KEY)?;
        }
        Ok(pending)
    }

    fn save_pending(&self, reference: &str, items: &[CartItem]) {
        let saved = self
            .storage
            .set(PENDING_REFERENCE_KEY, reference)
            .and_then(|()| storage::save_json(self.storage.as_ref(), CART_BACKUP_KEY, items));
        if let Err(e) = saved {
            tracing::warn!(reference, error = %e, "Failed to save pending checkout");
        }
    }

    fn discard_pending(&self) {
        for key in [PENDING_REFERENCE_KEY, CART_BACKUP_KEY] {
            if let Err(e) = self.storage.remove(key) {
                tracing::warn!(key, error = %e, "Failed to discard pending checkout");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::ScriptedGateway;
    use causehive_core::auth::Role;
    use causehive_core::repository::demo_causes;
    use causehive_core::{CartConfig, CartStore, Cause, Currency, MemoryStorage};
    use rust_decimal_macros::dec;

    struct FixedWidget(WidgetOutcome);

    #[async_trait]
    impl PaymentWidget for FixedWidget {
        async fn collect(&self, _intent: &PaymentIntent, _authorization: &Authorization) -> Result<WidgetOutcome> {
            Ok(self.0)
        }
    }

    fn payer() -> UserIdentity {
        UserIdentity {
            id: "1".into(),
            email: "demo@causehive.com".into(),
            first_name: "Demo".into(),
            last_name: "User".into(),
            phone: None,
            location: None,
            is_verified: true,
            role: Role::User,
        }
    }

    fn cause(id: &str) -> Cause {
        demo_causes().into_iter().find(|c| c.id == id).unwrap()
    }

    struct Fixture {
        storage: Arc<MemoryStorage>,
        gateway: Arc<ScriptedGateway>,
        cart: CartHandle,
        orchestrator: CheckoutOrchestrator,
    }

    fn fixture(gateway: ScriptedGateway) -> Fixture {
        let storage = Arc::new(MemoryStorage::new());
        let gateway = Arc::new(gateway);
        let cart = CartStore::load(storage.clone(), CartConfig::default()).into_handle();
        let orchestrator = CheckoutOrchestrator::new(gateway.clone(), storage.clone(), CheckoutConfig::default());
        Fixture {
            storage,
            gateway,
            cart,
            orchestrator,
        }
    }

    async fn fill(cart: &CartHandle) {
        let mut cart = cart.write().await;
        cart.add_or_update(&cause("1"), dec!(10.00), Currency::Usd, false, None).unwrap();
        cart.add_or_update(&cause("2"), dec!(25.00), Currency::Usd, true, Some("Stay strong".into()))
            .unwrap();
    }

    #[tokio::test]
    async fn test_requires_authentication() {
        let f = fixture(ScriptedGateway::new());
        fill(&f.cart).await;

        let result = f
            .orchestrator
            .checkout(&f.cart, None, &PaymentSelection::Card, &RedirectWidget)
            .await;
        assert!(matches!(result, Err(PaymentError::Unauthenticated)));
        assert!(f.gateway.initialized().is_empty());
    }

    #[tokio::test]
    async fn test_empty_cart_never_initializes() {
        let f = fixture(ScriptedGateway::new());

        let result = f
            .orchestrator
            .checkout(&f.cart, Some(&payer()), &PaymentSelection::Card, &RedirectWidget)
            .await;
        assert!(matches!(result, Err(PaymentError::EmptyCart)));
        assert!(f.gateway.initialized().is_empty());
        assert!(f.orchestrator.pending_checkout().unwrap().is_none());
    }

    #[tokio::test]
    async fn test_mixed_currency_rejected() {
        let f = fixture(ScriptedGateway::new());
        fill(&f.cart).await;
        f.cart
            .write()
            .await
            .add_or_update(&cause("3"), dec!(50), Currency::Ghs, false, None)
            .unwrap();

        let err = f
            .orchestrator
            .checkout(&f.cart, Some(&payer()), &PaymentSelection::Card, &RedirectWidget)
            .await
            .unwrap_err();
        assert_eq!(err.field(), Some("currency"));
        assert!(f.gateway.initialized().is_empty());
    }

    #[tokio::test]
    async fn test_completed_clears_cart() {
        let f = fixture(ScriptedGateway::new());
        fill(&f.cart).await;

        let outcome = f
            .orchestrator
            .checkout(&f.cart, Some(&payer()), &PaymentSelection::Card, &FixedWidget(WidgetOutcome::Completed))
            .await
            .unwrap();

        let CheckoutOutcome::Completed { reference, redirect_to } = outcome else {
            panic!("expected completed checkout");
        };
        assert_eq!(redirect_to, format!("/donations/success?reference={reference}"));
        assert!(f.cart.read().await.is_empty());

        let intent = &f.gateway.initialized()[0];
        assert_eq!(intent.total_amount(), dec!(35.00));
        assert_eq!(
            intent.callback_url(),
            format!("http://localhost:3001/donations/success?reference={reference}")
        );
        assert_eq!(intent.metadata().donations[1].message.as_deref(), Some("Stay strong"));

        let pending = f.orchestrator.take_pending_checkout().unwrap().unwrap();
        assert_eq!(pending.reference, reference);
        assert_eq!(pending.items.len(), 2);
        assert!(f.orchestrator.take_pending_checkout().unwrap().is_none());
    }

    #[tokio::test]
    async fn test_cancelled_leaves_cart_untouched() {
        let f = fixture(ScriptedGateway::new());
        fill(&f.cart).await;

        let outcome = f
            .orchestrator
            .checkout(&f.cart, Some(&payer()), &PaymentSelection::Card, &FixedWidget(WidgetOutcome::Cancelled))
            .await
            .unwrap();

        assert!(matches!(outcome, CheckoutOutcome::Cancelled { .. }));
        assert_eq!(f.cart.read().await.totals().total_amount, dec!(35.00));
        assert!(f.storage.get(PENDING_REFERENCE_KEY).unwrap().is_none());
    }

    #[tokio::test]
    async fn test_init_failure_surfaces_error() {
        let f = fixture(ScriptedGateway::failing_init("Invalid key"));
        fill(&f.cart).await;

        let err = f
            .orchestrator
            .checkout(&f.cart, Some(&payer()), &PaymentSelection::Card, &RedirectWidget)
            .await
            .unwrap_err();

        assert!(matches!(err, PaymentError::GatewayInit(_)));
        assert_eq!(err.user_message(), "Failed to initialize payment. Please try again.");
        assert_eq!(f.cart.read().await.items().len(), 2);
        assert!(f.orchestrator.pending_checkout().unwrap().is_none());
    }

    #[tokio::test]
    async fn test_redirect_awaits_confirmation_with_fresh_references() {
        let f = fixture(ScriptedGateway::new());
        fill(&f.cart).await;

        let first = f
            .orchestrator
            .checkout(&f.cart, Some(&payer()), &PaymentSelection::Card, &RedirectWidget)
            .await
            .unwrap();
        let second = f
            .orchestrator
            .checkout(&f.cart, Some(&payer()), &PaymentSelection::Card, &RedirectWidget)
            .await
            .unwrap();

        let CheckoutOutcome::AwaitingConfirmation { authorization_url, .. } = &first else {
            panic!("expected redirect");
        };
        assert!(authorization_url.ends_with(first.reference()));
        assert_ne!(first.reference(), second.reference());
        assert_eq!(
            f.orchestrator.pending_checkout().unwrap().unwrap().reference,
            second.reference()
        );
        assert_eq!(f.cart.read().await.items().len(), 2);
    }
}
