//! # Routes
//!
//! Axum router configuration for the checkout API.

use crate::handlers;
use crate::state::AppState;
use axum::{
    http::Method,
    routing::{get, post},
    Router,
};
use tower::ServiceBuilder;
use tower_http::{
    cors::{AllowHeaders, AllowOrigin, CorsLayer},
    trace::TraceLayer,
};

/// CORS policy: only the configured client origin, with credentials.
///
/// The origin is echoed back only when the request's `Origin` matches it;
/// other origins get no `access-control-allow-origin` header at all.
fn cors_layer(state: &AppState) -> CorsLayer {
    CorsLayer::new()
        .allow_origin(AllowOrigin::list([state.config.client_origin.clone()]))
        .allow_credentials(true)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers(AllowHeaders::mirror_request())
}

/// Create the main application router
///
/// Routes:
///   - GET  /health                  - Liveness probe
///   - POST /create-checkout-session - Create a hosted checkout session
///   - POST /webhook                 - Stripe webhook receiver (raw body)
pub fn create_router(state: AppState) -> Router {
    let cors = cors_layer(&state);

    Router::new()
        .route("/health", get(handlers::health))
        .route(
            "/create-checkout-session",
            post(handlers::create_checkout_session),
        )
        .route("/webhook", post(handlers::webhook))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(cors),
        )
        .with_state(state)
}
