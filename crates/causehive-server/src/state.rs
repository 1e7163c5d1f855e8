//! Application State

use std::collections::HashMap;
use std::sync::Arc;

use causehive_core::{AuthProvider, AuthSession, CartConfig, CartHandle, CartStore, CauseRepository, ClientStorage, Preferences};
use causehive_payments::{
    CheckoutConfig, CheckoutOrchestrator, PaymentGateway, PaymentStatus, PollSnapshot, PollerConfig, PollerHandle,
    WebhookHandler, spawn_poller,
};
use tokio::sync::{Mutex, RwLock};

/// Payment services, present only when a gateway is configured
pub struct Payments {
    pub checkout: CheckoutOrchestrator,
    pub webhooks: WebhookHandler,
    pub poller_config: PollerConfig,
    /// Status pollers by payment reference
    pub pollers: Mutex<HashMap<String, PollerHandle>>,
}

impl Payments {
    /// Poll `reference` unless it is already tracked, returning its latest snapshot
    pub async fn track(&self, cart: &CartHandle, reference: &str) -> PollSnapshot {
        let mut pollers = self.pollers.lock().await;
        pollers.retain(|_, handle| !handle.is_finished());

        let snapshot = pollers
            .entry(reference.to_string())
            .or_insert_with(|| spawn_poller(self.checkout.gateway(), cart.clone(), reference, self.poller_config))
            .snapshot();
        if is_final(&snapshot) {
            pollers.remove(reference);
        }
        snapshot
    }

    /// Latest snapshot of a tracked poll; a final snapshot is reported once
    pub async fn status(&self, reference: &str) -> Option<PollSnapshot> {
        let mut pollers = self.pollers.lock().await;
        let snapshot = pollers.get(reference)?.snapshot();
        if is_final(&snapshot) {
            pollers.remove(reference);
        }
        Some(snapshot)
    }

    pub async fn is_tracked(&self, reference: &str) -> bool {
        self.pollers.lock().await.contains_key(reference)
    }

    pub async fn tracked(&self) -> usize {
        self.pollers.lock().await.len()
    }
}

/// Nothing further will change: failed, or succeeded with the redirect set
fn is_final(snapshot: &PollSnapshot) -> bool {
    match snapshot.status {
        PaymentStatus::Failed => true,
        PaymentStatus::Success => snapshot.redirect_to.is_some(),
        PaymentStatus::Checking | PaymentStatus::Pending => false,
    }
}

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    /// Cause catalog (demo data or the CauseHive API)
    pub causes: Arc<dyn CauseRepository>,

    /// Auth collaborator and the signed-in session
    pub auth: Arc<dyn AuthProvider>,
    pub session: Arc<RwLock<AuthSession>>,

    pub cart: CartHandle,
    pub preferences: Arc<RwLock<Preferences>>,

    /// Payments (optional - None if not configured)
    pub payments: Option<Arc<Payments>>,
}

impl AppState {
    /// Restore client state from `storage`
    pub fn new(
        storage: Arc<dyn ClientStorage>,
        causes: Arc<dyn CauseRepository>,
        auth: Arc<dyn AuthProvider>,
        cart_config: CartConfig,
    ) -> Self {
        Self {
            causes,
            auth,
            session: Arc::new(RwLock::new(AuthSession::restore(storage.clone()))),
            cart: CartStore::load(storage.clone(), cart_config).into_handle(),
            preferences: Arc::new(RwLock::new(Preferences::load(storage))),
            payments: None,
        }
    }

    /// Enable checkout, status polling and webhooks
    pub fn with_payments(
        mut self,
        storage: Arc<dyn ClientStorage>,
        gateway: Arc<dyn PaymentGateway>,
        webhook_secret: &str,
        checkout_config: CheckoutConfig,
        poller_config: PollerConfig,
    ) -> Self {
        self.payments = Some(Arc::new(Payments {
            checkout: CheckoutOrchestrator::new(gateway, storage, checkout_config),
            webhooks: WebhookHandler::new(webhook_secret),
            poller_config,
            pollers: Mutex::new(HashMap::new()),
        }));
        self
    }
}
