//! CauseHive HTTP Server
//!
//! Axum-based server exposing the cause catalog, the donation cart and
//! PayStack checkout with payment status polling.

mod handlers;
mod routes;
mod state;

use std::sync::Arc;

use causehive_core::auth::{DemoAuthProvider, HttpAuthProvider};
use causehive_core::{
    AuthProvider, CartConfig, CauseRepository, ClientStorage, FileStorage, HttpCauseRepository,
    InMemoryCauseRepository, MemoryStorage,
};
use causehive_payments::{CheckoutConfig, PaystackClient, PollerConfig};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info,tower_http=debug".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load environment
    dotenvy::dotenv().ok();

    // Client-side storage for cart, session and preferences
    let storage_dir = std::env::var("CAUSEHIVE_STORAGE_DIR").unwrap_or_else(|_| ".causehive".into());
    let storage: Arc<dyn ClientStorage> = match FileStorage::open(&storage_dir) {
        Ok(storage) => {
            tracing::info!("✓ Storing client state in {}", storage_dir);
            Arc::new(storage)
        }
        Err(e) => {
            tracing::warn!("⚠ Cannot open {} ({}) - state will not survive restarts", storage_dir, e);
            Arc::new(MemoryStorage::new())
        }
    };

    // Cause catalog and auth: the CauseHive API when configured, demo data otherwise
    let causes: Arc<dyn CauseRepository> = match HttpCauseRepository::from_env() {
        Ok(repo) => {
            tracing::info!("✓ Using CauseHive API at {}", repo.base_url());
            Arc::new(repo)
        }
        Err(_) => {
            tracing::warn!("⚠ CAUSEHIVE_API_URL not set - serving demo causes");
            Arc::new(InMemoryCauseRepository::demo())
        }
    };
    let auth: Arc<dyn AuthProvider> = match HttpAuthProvider::from_env() {
        Ok(provider) => Arc::new(provider),
        Err(_) => {
            tracing::warn!("  Demo login: {} / demo123", DemoAuthProvider::DEMO_EMAIL);
            Arc::new(DemoAuthProvider::new())
        }
    };

    let mut state = AppState::new(storage.clone(), causes, auth, CartConfig::from_env());

    // Initialize payments
    match PaystackClient::from_env() {
        Ok(paystack) => {
            tracing::info!("✓ PayStack configured");
            let secret = paystack.webhook_secret().to_string();
            state = state.with_payments(
                storage,
                Arc::new(paystack),
                &secret,
                CheckoutConfig::from_env(),
                PollerConfig::from_env(),
            );
        }
        Err(_) => {
            tracing::warn!("⚠ PayStack not configured - payments disabled");
            tracing::warn!("  Set PAYSTACK_SECRET_KEY in .env");
        }
    }

    // Validate a restored session against the auth service
    {
        let mut session = state.session.write().await;
        if let Some(user) = session.refresh_user(state.auth.as_ref()).await {
            tracing::info!("✓ Restored session for {}", user.email);
        }
    }

    let app = routes::router(state);

    // Start server
    let addr = std::env::var("BIND_ADDR").unwrap_or_else(|_| "0.0.0.0:3000".into());
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    tracing::info!("══════════════════════════════════════════════════");
    tracing::info!("🚀 CauseHive server running on http://{}", addr);
    tracing::info!("══════════════════════════════════════════════════");
    tracing::info!("");
    tracing::info!("Endpoints:");
    tracing::info!("  GET  /health                         - Health check");
    tracing::info!("  GET  /api/causes                     - Search causes");
    tracing::info!("  GET  /api/cart                       - View cart");
    tracing::info!("  POST /api/cart/items                 - Add donation");
    tracing::info!("  POST /api/checkout                   - Start PayStack checkout");
    tracing::info!("  GET  /api/payments/{{ref}}/status      - Payment status");
    tracing::info!("  POST /webhook/paystack               - PayStack webhook");
    tracing::info!("");

    axum::serve(listener, app).await?;

    Ok(())
}
