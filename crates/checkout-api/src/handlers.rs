//! # Request Handlers
//!
//! Axum request handlers for the checkout API.

use crate::state::AppState;
use axum::{
    body::Bytes,
    extract::State,
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use checkout_core::{CheckoutRequest, PaymentError, PurchaseRequest};
use checkout_stripe::{dispatch_webhook_event, SIGNATURE_HEADER};
use serde::Serialize;
use tracing::{error, info, instrument, warn};

// =============================================================================
// Response Types
// =============================================================================

/// Health check response
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub message: &'static str,
}

/// Create checkout session response
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateCheckoutSessionResponse {
    /// Provider session ID
    pub session_id: String,
    /// Checkout URL (redirect user here)
    pub url: String,
}

/// Webhook acknowledgement
#[derive(Debug, Serialize)]
pub struct WebhookAck {
    pub received: bool,
}

/// Error response
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

impl ErrorResponse {
    pub fn new(error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
        }
    }
}

pub type ApiError = (StatusCode, Json<ErrorResponse>);

fn payment_error_to_response(err: &PaymentError) -> ApiError {
    let status =
        StatusCode::from_u16(err.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    (status, Json(ErrorResponse::new(err.client_message())))
}

// =============================================================================
// Handlers
// =============================================================================

/// Health check endpoint
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        message: "Stripe checkout server is running",
    })
}

/// Create a checkout session for a list of price ids
///
/// The body is read raw so that a missing, non-JSON or wrongly typed
/// `priceIds` all surface as the same 400.
#[instrument(skip(state, body), fields(bytes = body.len()))]
pub async fn create_checkout_session(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<Json<CreateCheckoutSessionResponse>, ApiError> {
    let purchase = PurchaseRequest::from_slice(&body).map_err(|e| {
        warn!("Rejected checkout request: {}", e);
        payment_error_to_response(&e)
    })?;

    let request = CheckoutRequest::for_purchase(&purchase, &state.discounts, &state.urls);

    info!(
        "Creating checkout: {} items, coupon={:?}, provider={}",
        request.item_count(),
        request.coupon_id,
        state.strategy.provider_name()
    );

    let session = state.strategy.create_checkout(&request).await.map_err(|e| {
        error!("Error creating checkout session: {}", e);
        payment_error_to_response(&e)
    })?;

    info!("Created checkout session: {}", session.session_id);

    Ok(Json(CreateCheckoutSessionResponse {
        session_id: session.session_id,
        url: session.checkout_url,
    }))
}

/// Handle a provider webhook
///
/// Any verification failure is a 400 and the payload is never dispatched.
/// Once verified, the delivery is always acknowledged so the provider stops
/// retrying, whatever the handler does with it.
#[instrument(skip(state, headers, body), fields(bytes = body.len()))]
pub async fn webhook(State(state): State<AppState>, headers: HeaderMap, body: Bytes) -> Response {
    let verified = headers
        .get(SIGNATURE_HEADER)
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| {
            PaymentError::WebhookVerificationFailed("Missing Stripe-Signature header".to_string())
        })
        .and_then(|signature| state.strategy.verify_webhook(&body, signature));

    let event = match verified {
        Ok(event) => event,
        Err(e) => {
            error!("Webhook error: {}", e);
            return (
                StatusCode::BAD_REQUEST,
                format!("Webhook Error: {}", e.client_message()),
            )
                .into_response();
        }
    };

    info!(
        "Received webhook: type={}, id={}",
        event.event_type, event.event_id
    );

    if let Err(e) = dispatch_webhook_event(state.webhook_handler.as_ref(), &event) {
        error!(
            "Webhook handler error for {} ({}): {}",
            event.event_id, event.event_type, e
        );
    }

    Json(WebhookAck { received: true }).into_response()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_response() {
        let err = ErrorResponse::new("Test error");
        assert_eq!(err.error, "Test error");
    }

    #[test]
    fn test_payment_error_conversion() {
        let (status, Json(body)) =
            payment_error_to_response(&PaymentError::InvalidRequest("priceIds array is required".into()));
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body.error, "priceIds array is required");

        let (status, Json(body)) = payment_error_to_response(&PaymentError::ProviderError {
            provider: "stripe".into(),
            message: "No such coupon: 'gX002Orj'".into(),
        });
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body.error, "No such coupon: 'gX002Orj'");
    }

    #[test]
    fn test_response_field_names() {
        let body = serde_json::to_value(CreateCheckoutSessionResponse {
            session_id: "cs_test".into(),
            url: "https://checkout.stripe.com/c/pay/cs_test".into(),
        })
        .unwrap();

        assert_eq!(body["sessionId"], "cs_test");
        assert_eq!(body["url"], "https://checkout.stripe.com/c/pay/cs_test");
    }
}
