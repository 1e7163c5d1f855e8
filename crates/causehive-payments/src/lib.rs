//! # causehive-payments
//!
//! Checkout and payment reconciliation for CauseHive, on top of PayStack.
//!
//! ## Flow
//!
//! ```text
//! ┌──────────┐  intent   ┌──────────────┐  authorization  ┌──────────────┐
//! │   Cart   │──────────▶│   PayStack   │────────────────▶│   Widget /   │
//! │ (core)   │           │  initialize  │                 │   redirect   │
//! └──────────┘           └──────────────┘                 └──────┬───────┘
//!      ▲                                                         │
//!      │ clear on success   ┌──────────────┐   verify/5s         │
//!      └────────────────────│    Poller    │◀────────────────────┘
//!                           │ (300s budget)│
//!                           └──────────────┘
//! ```
//!
//! Embedded widgets report completion directly and the cart is cleared
//! right away. Redirect-style checkouts return an authorization URL and the
//! poller resolves the payment by reference. PayStack webhooks are verified
//! with [`WebhookHandler`].
//!
//! ## Usage
//!
//! ```rust,ignore
//! use causehive_payments::{
//!     spawn_poller, CheckoutConfig, CheckoutOrchestrator, CheckoutOutcome,
//!     PaymentSelection, PaystackClient, PollerConfig, RedirectWidget,
//! };
//!
//! let gateway = Arc::new(PaystackClient::from_env()?);
//! let orchestrator = CheckoutOrchestrator::new(gateway.clone(), storage, CheckoutConfig::from_env());
//!
//! let outcome = orchestrator
//!     .checkout(&cart, session.user(), &PaymentSelection::Card, &RedirectWidget)
//!     .await?;
//!
//! if let CheckoutOutcome::AwaitingConfirmation { reference, authorization_url, .. } = outcome {
//!     // Send the donor to `authorization_url`, then:
//!     let poller = spawn_poller(gateway, cart.clone(), reference, PollerConfig::default());
//! }
//! ```

mod checkout;
mod error;
pub mod gateway;
mod intent;
pub mod methods;
mod poller;
mod reference;
mod webhook;

pub use checkout::{
    CART_BACKUP_KEY, CheckoutConfig, CheckoutOrchestrator, CheckoutOutcome, PENDING_REFERENCE_KEY, PaymentWidget,
    PendingCheckout, RedirectWidget, WidgetOutcome, success_path,
};
pub use error::{PaymentError, Result};
pub use gateway::{
    Authorization, PaymentGateway, PaystackClient, PaystackConfig, ScriptedGateway, TransactionStatus, Verification,
};
pub use intent::{DonationLine, IntentMetadata, PaymentIntent, PaymentSelection};
pub use methods::{MobileNetwork, PaymentMethod};
pub use poller::{
    FailureReason, PaymentPoller, PaymentStatus, PollSnapshot, PollerConfig, PollerHandle, TickAction, format_remaining,
    spawn_poller,
};
pub use reference::ReferenceGenerator;
pub use webhook::{SIGNATURE_HEADER, WebhookEvent, WebhookHandler, parse_event};
