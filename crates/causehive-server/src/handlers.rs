//! HTTP Handlers

use std::sync::Arc;

use axum::{
    Json,
    body::Bytes,
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
};
use causehive_core::auth::LoginCredentials;
use causehive_core::{
    CartItem, CartItemUpdate, CartStore, CartTotals, Category, Cause, CauseStatus, CoreError, Currency, FeeSummary, Page,
    SearchFilters, SortBy, SortOrder, Theme, UserIdentity,
};
use causehive_payments::methods;
use causehive_payments::{
    CheckoutOutcome, PaymentError, PaymentMethod, PaymentSelection, PendingCheckout, PollSnapshot, RedirectWidget,
    SIGNATURE_HEADER, WebhookEvent,
};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::state::{AppState, Payments};

// ============================================================================
// Response Types
// ============================================================================

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
    pub catalog: String,
    pub auth: String,
    pub payments_configured: bool,
    pub active_payment_polls: usize,
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,
}

pub type ApiError = (StatusCode, Json<ErrorResponse>);

type ApiResult<T> = Result<Json<T>, ApiError>;

#[derive(Debug, Serialize)]
pub struct CurrencyTotal {
    pub currency: Currency,
    pub total: Decimal,
    pub formatted: String,
}

#[derive(Debug, Serialize)]
pub struct CartView {
    pub items: Vec<CartItem>,
    pub totals: CartTotals,
    pub fees: FeeSummary,
    pub by_currency: Vec<CurrencyTotal>,
}

impl From<&CartStore> for CartView {
    fn from(cart: &CartStore) -> Self {
        Self {
            items: cart.items().to_vec(),
            totals: cart.totals(),
            fees: cart.fee_summary(),
            by_currency: cart
                .totals_by_currency()
                .into_iter()
                .map(|(currency, total)| CurrencyTotal {
                    currency,
                    total,
                    formatted: currency.format(total),
                })
                .collect(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct PreferencesView {
    pub theme: Theme,
    pub currency: Currency,
    pub bookmarks: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct BookmarkResponse {
    pub cause_id: String,
    pub bookmarked: bool,
}

// ============================================================================
// Request Types
// ============================================================================

#[derive(Debug, Default, Deserialize)]
pub struct CauseQuery {
    #[serde(default)]
    pub search: Option<String>,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub status: Option<CauseStatus>,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub min_amount: Option<Decimal>,
    #[serde(default)]
    pub max_amount: Option<Decimal>,
    #[serde(default)]
    pub currency: Option<Currency>,
    #[serde(default)]
    pub sort_by: Option<SortBy>,
    #[serde(default)]
    pub sort_order: Option<SortOrder>,
    #[serde(default)]
    pub page: Option<usize>,
    #[serde(default)]
    pub page_size: Option<usize>,
}

impl CauseQuery {
    fn filters(&self) -> SearchFilters {
        SearchFilters {
            query: self.search.clone(),
            category: self.category.clone(),
            status: self.status,
            location: self.location.clone(),
            min_amount: self.min_amount,
            max_amount: self.max_amount,
            currency: self.currency,
            sort_by: self.sort_by.unwrap_or_default(),
            sort_order: self.sort_order.unwrap_or_default(),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct AddItemRequest {
    pub cause_id: String,
    pub amount: Decimal,
    /// Defaults to the cause's own currency
    #[serde(default)]
    pub currency: Option<Currency>,
    #[serde(default)]
    pub is_anonymous: bool,
    #[serde(default)]
    pub donor_message: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct MethodQuery {
    #[serde(default)]
    pub country: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct CheckoutRequest {
    #[serde(default = "default_method")]
    pub payment_method: String,
    /// Mobile-money number, required for mobile-money methods
    #[serde(default)]
    pub phone: Option<String>,
}

fn default_method() -> String {
    "paystack_card".into()
}

#[derive(Debug, Default, Deserialize)]
pub struct PreferencesUpdate {
    #[serde(default)]
    pub theme: Option<Theme>,
    #[serde(default)]
    pub currency: Option<Currency>,
}

// ============================================================================
// Error mapping
// ============================================================================

fn api_error(status: StatusCode, code: &str, error: impl Into<String>) -> ApiError {
    (
        status,
        Json(ErrorResponse {
            error: error.into(),
            code: code.into(),
            field: None,
        }),
    )
}

fn core_error(e: &CoreError) -> ApiError {
    let (status, code) = match e {
        CoreError::Validation { .. } => (StatusCode::UNPROCESSABLE_ENTITY, "VALIDATION_ERROR"),
        CoreError::NotInCart(_) => (StatusCode::NOT_FOUND, "NOT_IN_CART"),
        CoreError::CauseNotFound(_) => (StatusCode::NOT_FOUND, "CAUSE_NOT_FOUND"),
        CoreError::Unauthenticated => (StatusCode::UNAUTHORIZED, "UNAUTHENTICATED"),
        CoreError::Auth(_) => (StatusCode::UNAUTHORIZED, "AUTH_ERROR"),
        CoreError::Api(_) | CoreError::Network(_) => (StatusCode::BAD_GATEWAY, "UPSTREAM_ERROR"),
        _ => {
            tracing::error!(error = %e, "Internal error");
            (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR")
        }
    };
    let (status, Json(mut body)) = api_error(status, code, e.user_message());
    body.field = e.field().map(str::to_string);
    (status, Json(body))
}

fn payment_error(e: &PaymentError) -> ApiError {
    let (status, code) = match e {
        PaymentError::Core(core) => return core_error(core),
        PaymentError::Unauthenticated => (StatusCode::UNAUTHORIZED, "UNAUTHENTICATED"),
        PaymentError::EmptyCart => (StatusCode::BAD_REQUEST, "EMPTY_CART"),
        PaymentError::Validation { .. } => (StatusCode::UNPROCESSABLE_ENTITY, "VALIDATION_ERROR"),
        PaymentError::UnknownMethod(_) => (StatusCode::BAD_REQUEST, "UNKNOWN_PAYMENT_METHOD"),
        PaymentError::GatewayInit(_) => (StatusCode::BAD_GATEWAY, "PAYMENT_INIT_FAILED"),
        PaymentError::Gateway(_) | PaymentError::Network(_) => (StatusCode::BAD_GATEWAY, "PAYMENT_GATEWAY_ERROR"),
        PaymentError::WebhookSignature(_) => (StatusCode::BAD_REQUEST, "INVALID_SIGNATURE"),
        PaymentError::WebhookParse(_) => (StatusCode::BAD_REQUEST, "INVALID_WEBHOOK"),
        PaymentError::Config(_) => (StatusCode::SERVICE_UNAVAILABLE, "PAYMENTS_DISABLED"),
    };
    let (status, Json(mut body)) = api_error(status, code, e.user_message());
    body.field = e.field().map(str::to_string);
    (status, Json(body))
}

fn payments(state: &AppState) -> Result<&Arc<Payments>, ApiError> {
    state.payments.as_ref().ok_or_else(|| {
        api_error(
            StatusCode::SERVICE_UNAVAILABLE,
            "PAYMENTS_DISABLED",
            "Payments not configured",
        )
    })
}

// ============================================================================
// Handlers
// ============================================================================

/// Health check endpoint
pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    let active_payment_polls = match &state.payments {
        Some(payments) => payments.tracked().await,
        None => 0,
    };
    Json(HealthResponse {
        status: "healthy",
        version: env!("CARGO_PKG_VERSION"),
        catalog: state.causes.name().to_string(),
        auth: state.auth.name().to_string(),
        payments_configured: state.payments.is_some(),
        active_payment_polls,
    })
}

/// Search the cause catalog
pub async fn list_causes(State(state): State<AppState>, Query(query): Query<CauseQuery>) -> ApiResult<Page<Cause>> {
    let page = query.page.unwrap_or(1);
    let page_size = query.page_size.unwrap_or(Page::<Cause>::DEFAULT_PAGE_SIZE);

    let causes = state
        .causes
        .list(&query.filters(), page, page_size)
        .await
        .map_err(|e| core_error(&e))?;
    Ok(Json(causes))
}

pub async fn get_cause(State(state): State<AppState>, Path(id): Path<String>) -> ApiResult<Cause> {
    let cause = state.causes.get(&id).await.map_err(|e| core_error(&e))?;
    Ok(Json(cause))
}

pub async fn list_categories(State(state): State<AppState>) -> ApiResult<Vec<Category>> {
    let categories = state.causes.categories().await.map_err(|e| core_error(&e))?;
    Ok(Json(categories))
}

pub async fn get_cart(State(state): State<AppState>) -> Json<CartView> {
    let cart = state.cart.read().await;
    Json(CartView::from(&*cart))
}

/// Add a donation to the cart, or overwrite the one for the same cause
pub async fn add_cart_item(
    State(state): State<AppState>,
    Json(payload): Json<AddItemRequest>,
) -> Result<(StatusCode, Json<CartView>), ApiError> {
    let cause = state
        .causes
        .get(&payload.cause_id)
        .await
        .map_err(|e| core_error(&e))?;
    let currency = payload.currency.unwrap_or(cause.currency);

    let mut cart = state.cart.write().await;
    cart.add_or_update(&cause, payload.amount, currency, payload.is_anonymous, payload.donor_message)
        .map_err(|e| core_error(&e))?;

    Ok((StatusCode::CREATED, Json(CartView::from(&*cart))))
}

pub async fn update_cart_item(
    State(state): State<AppState>,
    Path(cause_id): Path<String>,
    Json(update): Json<CartItemUpdate>,
) -> ApiResult<CartView> {
    let mut cart = state.cart.write().await;
    cart.update(&cause_id, update).map_err(|e| core_error(&e))?;
    Ok(Json(CartView::from(&*cart)))
}

/// Removing a cause that is not in the cart is a no-op
pub async fn remove_cart_item(State(state): State<AppState>, Path(cause_id): Path<String>) -> Json<CartView> {
    let mut cart = state.cart.write().await;
    cart.remove(&cause_id);
    Json(CartView::from(&*cart))
}

pub async fn clear_cart(State(state): State<AppState>) -> StatusCode {
    state.cart.write().await.clear();
    StatusCode::NO_CONTENT
}

pub async fn list_payment_methods(Query(query): Query<MethodQuery>) -> Json<Vec<PaymentMethod>> {
    let methods = match query.country.as_deref() {
        Some(country) => methods::for_country(country),
        None => methods::catalog(),
    };
    Json(methods)
}

/// Start a checkout for the current cart.
///
/// Redirect-style: the response carries the PayStack authorization URL and
/// a status poller starts for the reference.
pub async fn create_checkout(
    State(state): State<AppState>,
    Json(payload): Json<CheckoutRequest>,
) -> ApiResult<CheckoutOutcome> {
    let payments = payments(&state)?;
    let selection =
        PaymentSelection::from_method(&payload.payment_method, payload.phone.as_deref()).map_err(|e| payment_error(&e))?;

    let payer: Option<UserIdentity> = state.session.read().await.user().cloned();
    let outcome = payments
        .checkout
        .checkout(&state.cart, payer.as_ref(), &selection, &RedirectWidget)
        .await
        .map_err(|e| {
            tracing::warn!(error = %e, "Checkout failed");
            payment_error(&e)
        })?;

    if let CheckoutOutcome::AwaitingConfirmation { reference, .. } = &outcome {
        payments.track(&state.cart, reference).await;
    }

    Ok(Json(outcome))
}

fn unknown_reference() -> ApiError {
    api_error(
        StatusCode::NOT_FOUND,
        "UNKNOWN_REFERENCE",
        "No payment is being tracked for this reference",
    )
}

/// Whether `reference` belongs to the checkout saved before the widget opened
fn is_pending_reference(payments: &Payments, reference: &str) -> Result<bool, ApiError> {
    let pending = payments.checkout.pending_checkout().map_err(|e| payment_error(&e))?;
    Ok(pending.is_some_and(|p| p.reference == reference))
}

/// Current status of a payment.
///
/// Polling resumes on request only for the saved pending checkout, e.g.
/// when the donor returns from PayStack after a restart.
pub async fn payment_status(State(state): State<AppState>, Path(reference): Path<String>) -> ApiResult<PollSnapshot> {
    let payments = payments(&state)?;
    if let Some(snapshot) = payments.status(&reference).await {
        return Ok(Json(snapshot));
    }
    if !is_pending_reference(payments, &reference)? {
        return Err(unknown_reference());
    }
    Ok(Json(payments.track(&state.cart, &reference).await))
}

/// Stop polling a payment
pub async fn cancel_payment_poll(
    State(state): State<AppState>,
    Path(reference): Path<String>,
) -> Result<StatusCode, ApiError> {
    let payments = payments(&state)?;
    match payments.pollers.lock().await.remove(&reference) {
        Some(handle) => {
            handle.cancel();
            tracing::info!(reference = %reference, "Payment polling cancelled");
            Ok(StatusCode::NO_CONTENT)
        }
        None => Err(unknown_reference()),
    }
}

pub async fn get_pending_checkout(State(state): State<AppState>) -> ApiResult<PendingCheckout> {
    let payments = payments(&state)?;
    payments
        .checkout
        .pending_checkout()
        .map_err(|e| payment_error(&e))?
        .map(Json)
        .ok_or_else(|| api_error(StatusCode::NOT_FOUND, "NO_PENDING_CHECKOUT", "No checkout in progress"))
}

/// Consume the saved checkout for the success view
pub async fn take_pending_checkout(State(state): State<AppState>) -> ApiResult<PendingCheckout> {
    let payments = payments(&state)?;
    payments
        .checkout
        .take_pending_checkout()
        .map_err(|e| payment_error(&e))?
        .map(Json)
        .ok_or_else(|| api_error(StatusCode::NOT_FOUND, "NO_PENDING_CHECKOUT", "No checkout in progress"))
}

pub async fn login(
    State(state): State<AppState>,
    Json(credentials): Json<LoginCredentials>,
) -> ApiResult<UserIdentity> {
    let mut session = state.session.write().await;
    let user = session
        .login(state.auth.as_ref(), &credentials)
        .await
        .map_err(|e| core_error(&e))?;
    Ok(Json(user.clone()))
}

pub async fn logout(State(state): State<AppState>) -> StatusCode {
    state.session.write().await.logout(state.auth.as_ref()).await;
    StatusCode::NO_CONTENT
}

pub async fn current_user(State(state): State<AppState>) -> ApiResult<UserIdentity> {
    let session = state.session.read().await;
    let user = session.require_user().map_err(|e| core_error(&e))?;
    Ok(Json(user.clone()))
}

pub async fn get_preferences(State(state): State<AppState>) -> Json<PreferencesView> {
    let prefs = state.preferences.read().await;
    Json(PreferencesView {
        theme: prefs.theme(),
        currency: prefs.currency(),
        bookmarks: prefs.bookmarks().to_vec(),
    })
}

pub async fn update_preferences(
    State(state): State<AppState>,
    Json(update): Json<PreferencesUpdate>,
) -> ApiResult<PreferencesView> {
    let mut prefs = state.preferences.write().await;
    if let Some(theme) = update.theme {
        prefs.set_theme(theme).map_err(|e| core_error(&e))?;
    }
    if let Some(currency) = update.currency {
        prefs.set_currency(currency).map_err(|e| core_error(&e))?;
    }
    Ok(Json(PreferencesView {
        theme: prefs.theme(),
        currency: prefs.currency(),
        bookmarks: prefs.bookmarks().to_vec(),
    }))
}

pub async fn toggle_bookmark(State(state): State<AppState>, Path(cause_id): Path<String>) -> ApiResult<BookmarkResponse> {
    let bookmarked = state
        .preferences
        .write()
        .await
        .toggle_bookmark(&cause_id)
        .map_err(|e| core_error(&e))?;
    Ok(Json(BookmarkResponse { cause_id, bookmarked }))
}

/// PayStack webhook handler
pub async fn paystack_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<StatusCode, ApiError> {
    let payments = payments(&state)?;

    let signature = headers
        .get(SIGNATURE_HEADER)
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| api_error(StatusCode::BAD_REQUEST, "MISSING_SIGNATURE", "Missing PayStack signature"))?;

    let event = payments.webhooks.handle(&body, signature).map_err(|e| {
        tracing::warn!(error = %e, "Webhook rejected");
        payment_error(&e)
    })?;

    // A confirmed charge for our checkout empties the cart without waiting
    // for the next poll; the poller still resolves the status by verify
    if let WebhookEvent::ChargeSuccess { reference, .. } = &event {
        if payments.is_tracked(reference).await || is_pending_reference(payments, reference)? {
            state.cart.write().await.clear();
            tracing::info!(reference = %reference, "Cart cleared on confirmed charge");
        } else {
            tracing::info!(reference = %reference, "Charge confirmed for an unknown checkout");
        }
    }

    Ok(StatusCode::OK)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::{Body, to_bytes};
    use axum::http::{Method, Request};
    use causehive_core::auth::DemoAuthProvider;
    use causehive_core::{CartConfig, InMemoryCauseRepository, MemoryStorage};
    use causehive_payments::{CheckoutConfig, PollerConfig, ScriptedGateway, TransactionStatus};
    use serde_json::{Value, json};
    use tower::ServiceExt;

    const WEBHOOK_SECRET: &str = "sk_test_secret";

    fn demo_state(with_payments: bool) -> AppState {
        if with_payments {
            return state_with_gateway(Arc::new(ScriptedGateway::new()));
        }
        AppState::new(
            Arc::new(MemoryStorage::new()),
            Arc::new(InMemoryCauseRepository::demo()),
            Arc::new(DemoAuthProvider::new()),
            CartConfig::default(),
        )
    }

    fn state_with_gateway(gateway: Arc<ScriptedGateway>) -> AppState {
        let storage = Arc::new(MemoryStorage::new());
        AppState::new(
            storage.clone(),
            Arc::new(InMemoryCauseRepository::demo()),
            Arc::new(DemoAuthProvider::new()),
            CartConfig::default(),
        )
        .with_payments(
            storage,
            gateway,
            WEBHOOK_SECRET,
            CheckoutConfig::default(),
            PollerConfig::default(),
        )
    }

    /// Sign in, fill the cart and start a redirect checkout
    async fn checkout_reference(state: &AppState) -> String {
        sign_in(state).await;
        send(
            state,
            Method::POST,
            "/api/cart/items",
            Some(json!({ "cause_id": "3", "amount": "50" })),
        )
        .await;
        let (status, outcome) = send(state, Method::POST, "/api/checkout", Some(json!({}))).await;
        assert_eq!(status, StatusCode::OK);
        outcome["reference"].as_str().unwrap().to_string()
    }

    async fn send(state: &AppState, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        let request = Request::builder().method(method).uri(uri);
        let request = match body {
            Some(body) => request
                .header("content-type", "application/json")
                .body(Body::from(body.to_string())),
            None => request.body(Body::empty()),
        }
        .unwrap();

        let response = crate::routes::router(state.clone()).oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, value)
    }

    async fn sign_in(state: &AppState) {
        let (status, _) = send(
            state,
            Method::POST,
            "/api/auth/login",
            Some(json!({ "email": "demo@causehive.com", "password": "demo123" })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
    }

    #[tokio::test]
    async fn test_cart_add_update_remove() {
        let state = demo_state(false);

        let (status, cart) = send(
            &state,
            Method::POST,
            "/api/cart/items",
            Some(json!({ "cause_id": "1", "amount": "10.00" })),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(cart["totals"]["item_count"], 1);

        send(
            &state,
            Method::POST,
            "/api/cart/items",
            Some(json!({ "cause_id": "2", "amount": "25.00", "is_anonymous": true })),
        )
        .await;
        let (_, cart) = send(&state, Method::GET, "/api/cart", None).await;
        assert_eq!(cart["totals"]["item_count"], 2);
        assert_eq!(cart["totals"]["total_amount"], "35.00");
        assert_eq!(cart["by_currency"][0]["formatted"], "$35.00");

        let (status, cart) = send(
            &state,
            Method::PATCH,
            "/api/cart/items/1",
            Some(json!({ "amount": "15" })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(cart["totals"]["total_amount"], "40.00");

        let (_, cart) = send(&state, Method::DELETE, "/api/cart/items/1", None).await;
        assert_eq!(cart["totals"]["item_count"], 1);
        assert_eq!(cart["totals"]["total_amount"], "25.00");
    }

    #[tokio::test]
    async fn test_validation_errors_name_the_field() {
        let state = demo_state(false);

        let (status, body) = send(
            &state,
            Method::POST,
            "/api/cart/items",
            Some(json!({ "cause_id": "1", "amount": "0" })),
        )
        .await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(body["field"], "amount");

        let (status, body) = send(&state, Method::PATCH, "/api/cart/items/9", Some(json!({}))).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["code"], "NOT_IN_CART");
    }

    #[tokio::test]
    async fn test_checkout_disabled_without_gateway() {
        let state = demo_state(false);
        let (status, body) = send(&state, Method::POST, "/api/checkout", Some(json!({}))).await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(body["code"], "PAYMENTS_DISABLED");
    }

    #[tokio::test]
    async fn test_checkout_guards() {
        let state = demo_state(true);

        let (status, body) = send(&state, Method::POST, "/api/checkout", Some(json!({}))).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["code"], "UNAUTHENTICATED");

        sign_in(&state).await;
        let (status, body) = send(&state, Method::POST, "/api/checkout", Some(json!({}))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["code"], "EMPTY_CART");
    }

    #[tokio::test]
    async fn test_checkout_starts_polling() {
        let state = demo_state(true);
        sign_in(&state).await;
        send(
            &state,
            Method::POST,
            "/api/cart/items",
            Some(json!({ "cause_id": "3", "amount": "50" })),
        )
        .await;

        let (status, outcome) = send(&state, Method::POST, "/api/checkout", Some(json!({}))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(outcome["status"], "awaiting_confirmation");
        let reference = outcome["reference"].as_str().unwrap().to_string();
        assert!(reference.starts_with("CAUSEHIVE_"));

        let (status, snapshot) = send(&state, Method::GET, &format!("/api/payments/{reference}/status"), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(snapshot["reference"], reference.as_str());

        let (status, _) = send(&state, Method::DELETE, &format!("/api/payments/{reference}"), None).await;
        assert_eq!(status, StatusCode::NO_CONTENT);

        let (_, pending) = send(&state, Method::GET, "/api/checkout/pending", None).await;
        assert_eq!(pending["reference"], reference.as_str());
        assert_eq!(pending["items"][0]["cause_id"], "3");

        let (status, _) = send(&state, Method::DELETE, "/api/checkout/pending", None).await;
        assert_eq!(status, StatusCode::OK);
        let (status, _) = send(&state, Method::GET, "/api/checkout/pending", None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_mobile_money_requires_valid_phone() {
        let state = demo_state(true);
        sign_in(&state).await;
        send(
            &state,
            Method::POST,
            "/api/cart/items",
            Some(json!({ "cause_id": "1", "amount": "20", "currency": "GHS" })),
        )
        .await;

        let (status, body) = send(
            &state,
            Method::POST,
            "/api/checkout",
            Some(json!({ "payment_method": "vodafone_cash", "phone": "0241234567" })),
        )
        .await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(body["field"], "phone");
    }

    #[tokio::test]
    async fn test_webhook_requires_signature() {
        let state = demo_state(true);
        let (status, body) = send(
            &state,
            Method::POST,
            "/webhook/paystack",
            Some(json!({ "event": "charge.success" })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["code"], "MISSING_SIGNATURE");
    }

    #[tokio::test]
    async fn test_catalog_and_preferences() {
        let state = demo_state(false);

        let (_, page) = send(&state, Method::GET, "/api/causes?search=hospital&page_size=2", None).await;
        assert_eq!(page["count"], 1);
        assert_eq!(page["results"][0]["id"], "3");

        let (status, _) = send(&state, Method::GET, "/api/causes/42", None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (_, methods) = send(&state, Method::GET, "/api/payment-methods?country=NG", None).await;
        assert_eq!(methods.as_array().unwrap().len(), 2);

        let (_, bookmark) = send(&state, Method::POST, "/api/bookmarks/2", None).await;
        assert_eq!(bookmark["bookmarked"], true);

        let (_, prefs) = send(
            &state,
            Method::PATCH,
            "/api/preferences",
            Some(json!({ "theme": "dark", "currency": "GHS" })),
        )
        .await;
        assert_eq!(prefs["theme"], "dark");
        assert_eq!(prefs["currency"], "GHS");
        assert_eq!(prefs["bookmarks"][0], "2");
    }

    #[tokio::test]
    async fn test_huge_page_number_is_empty_page() {
        let state = demo_state(false);
        let (status, page) = send(&state, Method::GET, "/api/causes?page=18446744073709551615", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(page["count"], 5);
        assert!(page["results"].as_array().unwrap().is_empty());
        assert!(page["next"].is_null());
    }

    #[tokio::test]
    async fn test_finished_poll_is_evicted() {
        let gateway = Arc::new(ScriptedGateway::with_statuses([TransactionStatus::Failed]));
        let state = state_with_gateway(gateway);
        let reference = checkout_reference(&state).await;
        let payments = state.payments.clone().unwrap();
        assert_eq!(payments.tracked().await, 1);

        let uri = format!("/api/payments/{reference}/status");
        let mut last = Value::Null;
        for _ in 0..200 {
            let (status, snapshot) = send(&state, Method::GET, &uri, None).await;
            assert_eq!(status, StatusCode::OK);
            last = snapshot;
            if last["status"] == "failed" {
                break;
            }
            tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        }
        assert_eq!(last["status"], "failed");
        assert_eq!(payments.tracked().await, 0);
    }

    #[tokio::test]
    async fn test_unknown_reference_is_not_polled() {
        let gateway = Arc::new(ScriptedGateway::new());
        let state = state_with_gateway(gateway.clone());

        for i in 0..10 {
            let (status, body) = send(&state, Method::GET, &format!("/api/payments/bogus{i}/status"), None).await;
            assert_eq!(status, StatusCode::NOT_FOUND);
            assert_eq!(body["code"], "UNKNOWN_REFERENCE");
        }

        let payments = state.payments.clone().unwrap();
        assert_eq!(payments.tracked().await, 0);
        assert_eq!(gateway.verify_calls(), 0);
    }

    #[tokio::test]
    async fn test_pending_checkout_resumes_polling() {
        let state = demo_state(true);
        let reference = checkout_reference(&state).await;

        // Forget the in-process poll, as after a restart
        send(&state, Method::DELETE, &format!("/api/payments/{reference}"), None).await;
        let payments = state.payments.clone().unwrap();
        assert_eq!(payments.tracked().await, 0);

        let (status, snapshot) = send(&state, Method::GET, &format!("/api/payments/{reference}/status"), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(snapshot["reference"], reference.as_str());
        assert_eq!(payments.tracked().await, 1);
    }

    #[tokio::test]
    async fn test_signed_charge_success_clears_cart() {
        use hmac::{Hmac, Mac};
        use sha2::Sha512;

        let state = demo_state(true);
        let reference = checkout_reference(&state).await;

        let payload = json!({
            "event": "charge.success",
            "data": { "reference": reference, "amount": 5000, "currency": "USD" }
        })
        .to_string();
        let mut mac = Hmac::<Sha512>::new_from_slice(WEBHOOK_SECRET.as_bytes()).unwrap();
        mac.update(payload.as_bytes());
        let signature = hex::encode(mac.finalize().into_bytes());

        let request = Request::builder()
            .method(Method::POST)
            .uri("/webhook/paystack")
            .header("content-type", "application/json")
            .header(SIGNATURE_HEADER, signature)
            .body(Body::from(payload))
            .unwrap();
        let response = crate::routes::router(state.clone()).oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let (_, cart) = send(&state, Method::GET, "/api/cart", None).await;
        assert_eq!(cart["totals"]["item_count"], 0);
    }
}
