//! Router

use axum::{
    Router,
    routing::{delete, get, patch, post},
};
use tower_http::{
    cors::{Any, CorsLayer},
    services::ServeDir,
    trace::TraceLayer,
};

use crate::handlers::{
    add_cart_item, cancel_payment_poll, clear_cart, create_checkout, current_user, get_cart, get_cause,
    get_pending_checkout, get_preferences, health_check, list_categories, list_causes, list_payment_methods, login,
    logout, payment_status, paystack_webhook, remove_cart_item, take_pending_checkout, toggle_bookmark,
    update_cart_item, update_preferences,
};
use crate::state::AppState;

/// Build the application router
pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        // Health
        .route("/health", get(health_check))
        // Catalog
        .route("/api/causes", get(list_causes))
        .route("/api/causes/{id}", get(get_cause))
        .route("/api/categories", get(list_categories))
        // Cart
        .route("/api/cart", get(get_cart).delete(clear_cart))
        .route("/api/cart/items", post(add_cart_item))
        .route("/api/cart/items/{cause_id}", patch(update_cart_item).delete(remove_cart_item))
        // Checkout & payment status
        .route("/api/payment-methods", get(list_payment_methods))
        .route("/api/checkout", post(create_checkout))
        .route("/api/checkout/pending", get(get_pending_checkout).delete(take_pending_checkout))
        .route("/api/payments/{reference}/status", get(payment_status))
        .route("/api/payments/{reference}", delete(cancel_payment_poll))
        .route("/webhook/paystack", post(paystack_webhook))
        // Session & preferences
        .route("/api/auth/login", post(login))
        .route("/api/auth/logout", post(logout))
        .route("/api/auth/me", get(current_user))
        .route("/api/preferences", get(get_preferences).patch(update_preferences))
        .route("/api/bookmarks/{cause_id}", post(toggle_bookmark))
        // Static files (web frontend)
        .fallback_service(ServeDir::new("static"))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
