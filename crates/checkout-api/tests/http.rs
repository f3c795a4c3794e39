//! End-to-end tests of the HTTP surface against a recording payment strategy.

use async_trait::async_trait;
use axum::body::Bytes;
use axum::http::{HeaderName, HeaderValue, Method, StatusCode};
use axum_test::{TestResponse, TestServer};
use checkout_api::{create_router, AppConfig, AppState};
use checkout_core::{
    CheckoutRequest, CheckoutSession, DiscountTable, PaymentError, PaymentResult,
    PaymentStrategy, WebhookEvent,
};
use checkout_stripe::{construct_event, generate_test_header, WebhookHandler};
use chrono::Utc;
use serde_json::{json, Value};
use std::sync::{Arc, Mutex};

const CLIENT_URL: &str = "https://shop.example";
const WEBHOOK_SECRET: &str = "whsec_test_secret";

/// Records every checkout request and verifies webhooks like Stripe does.
#[derive(Default)]
struct RecordingStrategy {
    requests: Mutex<Vec<CheckoutRequest>>,
    fail_with: Option<String>,
}

impl RecordingStrategy {
    fn failing(message: &str) -> Self {
        Self {
            requests: Mutex::new(Vec::new()),
            fail_with: Some(message.to_string()),
        }
    }

    fn requests(&self) -> Vec<CheckoutRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl PaymentStrategy for RecordingStrategy {
    async fn create_checkout(&self, request: &CheckoutRequest) -> PaymentResult<CheckoutSession> {
        self.requests.lock().unwrap().push(request.clone());

        if let Some(message) = &self.fail_with {
            return Err(PaymentError::ProviderError {
                provider: "test".to_string(),
                message: message.clone(),
            });
        }

        Ok(CheckoutSession::new(
            "cs_test_123",
            "test",
            "https://checkout.stripe.com/c/pay/cs_test_123",
        ))
    }

    fn verify_webhook(&self, payload: &[u8], signature: &str) -> PaymentResult<WebhookEvent> {
        construct_event(
            payload,
            signature,
            WEBHOOK_SECRET,
            300,
            Utc::now().timestamp(),
        )
    }

    fn provider_name(&self) -> &'static str {
        "test"
    }
}

/// Records which dispatch path each verified event took.
#[derive(Default)]
struct RecordingHandler {
    calls: Mutex<Vec<String>>,
    fail: bool,
}

impl RecordingHandler {
    fn record(&self, call: String) -> PaymentResult<()> {
        self.calls.lock().unwrap().push(call);
        if self.fail {
            return Err(PaymentError::Internal("handler exploded".to_string()));
        }
        Ok(())
    }
}

impl WebhookHandler for RecordingHandler {
    fn on_checkout_completed(&self, event: &WebhookEvent) -> PaymentResult<()> {
        self.record(format!("completed:{}", event.event_id))
    }

    fn on_subscription_created(&self, event: &WebhookEvent) -> PaymentResult<()> {
        self.record(format!("subscription:{}", event.event_id))
    }

    fn on_unhandled_event(&self, event: &WebhookEvent) -> PaymentResult<()> {
        self.record(format!("unhandled:{}", event.event_type))
    }
}

fn test_config() -> AppConfig {
    AppConfig::from_lookup(|key| match key {
        "CLIENT_URL" => Some(CLIENT_URL.to_string()),
        _ => None,
    })
    .unwrap()
}

fn server_with(strategy: Arc<RecordingStrategy>, handler: Arc<RecordingHandler>) -> TestServer {
    let state = AppState::with_strategy(test_config(), strategy, DiscountTable::default())
        .with_webhook_handler(handler);
    TestServer::new(create_router(state)).unwrap()
}

fn server(strategy: Arc<RecordingStrategy>) -> TestServer {
    server_with(strategy, Arc::new(RecordingHandler::default()))
}

fn price_ids(n: usize) -> Vec<String> {
    (0..n).map(|i| format!("price_{}", i)).collect()
}

async fn checkout(server: &TestServer, n: usize) -> TestResponse {
    server
        .post("/create-checkout-session")
        .json(&json!({ "priceIds": price_ids(n) }))
        .await
}

fn event_body(event_type: &str) -> Vec<u8> {
    serde_json::to_vec(&json!({
        "id": "evt_test_1",
        "object": "event",
        "type": event_type,
        "created": Utc::now().timestamp(),
        "data": { "object": { "id": "cs_test_123", "object": "checkout.session" } }
    }))
    .unwrap()
}

async fn post_webhook(server: &TestServer, body: Vec<u8>, signature: Option<String>) -> TestResponse {
    let mut request = server
        .post("/webhook")
        .add_header(
            HeaderName::from_static("content-type"),
            HeaderValue::from_static("application/json"),
        )
        .bytes(Bytes::from(body));

    if let Some(signature) = signature {
        request = request.add_header(
            HeaderName::from_static("stripe-signature"),
            HeaderValue::from_str(&signature).unwrap(),
        );
    }

    request.await
}

fn signed(body: &[u8], secret: &str) -> String {
    generate_test_header(body, secret, Utc::now().timestamp()).unwrap()
}

// =============================================================================
// Health
// =============================================================================

#[tokio::test]
async fn health_reports_ok() {
    let server = server(Arc::new(RecordingStrategy::default()));

    let response = server.get("/health").await;

    response.assert_status_ok();
    let body: Value = response.json();
    assert_eq!(body["status"], "ok");
    assert_eq!(body["message"], "Stripe checkout server is running");
}

#[tokio::test]
async fn health_ok_even_when_provider_is_failing() {
    let server = server(Arc::new(RecordingStrategy::failing("Stripe is down")));

    let response = server.get("/health").await;

    response.assert_status_ok();
    assert_eq!(response.json::<Value>()["status"], "ok");
}

// =============================================================================
// Create checkout session
// =============================================================================

#[tokio::test]
async fn rejects_missing_or_malformed_price_ids() {
    let strategy = Arc::new(RecordingStrategy::default());
    let server = server(strategy.clone());

    let bodies = [
        json!({}),
        json!({ "priceIds": [] }),
        json!({ "priceIds": "price_0" }),
        json!({ "priceIds": null }),
        json!({ "items": ["price_0"] }),
    ];

    for body in bodies {
        let response = server.post("/create-checkout-session").json(&body).await;

        response.assert_status(StatusCode::BAD_REQUEST);
        let error = response.json::<Value>()["error"].as_str().unwrap().to_string();
        assert!(error.contains("priceIds"), "error was {}", error);
    }

    assert!(strategy.requests().is_empty());
}

#[tokio::test]
async fn rejects_empty_and_non_json_bodies() {
    let strategy = Arc::new(RecordingStrategy::default());
    let server = server(strategy.clone());

    let response = server.post("/create-checkout-session").await;
    response.assert_status(StatusCode::BAD_REQUEST);
    assert_eq!(response.json::<Value>()["error"], "priceIds array is required");

    let response = server
        .post("/create-checkout-session")
        .text("priceIds=price_0")
        .await;
    response.assert_status(StatusCode::BAD_REQUEST);

    assert!(strategy.requests().is_empty());
}

#[tokio::test]
async fn rejects_non_string_price_ids() {
    let strategy = Arc::new(RecordingStrategy::default());
    let server = server(strategy.clone());

    let response = server
        .post("/create-checkout-session")
        .json(&json!({ "priceIds": ["price_0", 42] }))
        .await;

    response.assert_status(StatusCode::BAD_REQUEST);
    assert_eq!(
        response.json::<Value>()["error"],
        "priceIds must contain only strings"
    );
    assert!(strategy.requests().is_empty());
}

#[tokio::test]
async fn returns_session_id_and_url() {
    let strategy = Arc::new(RecordingStrategy::default());
    let server = server(strategy.clone());

    let response = checkout(&server, 1).await;

    response.assert_status_ok();
    let body: Value = response.json();
    assert_eq!(body["sessionId"], "cs_test_123");
    assert_eq!(body["url"], "https://checkout.stripe.com/c/pay/cs_test_123");
}

#[tokio::test]
async fn builds_provider_request_from_price_ids() {
    let strategy = Arc::new(RecordingStrategy::default());
    let server = server(strategy.clone());

    server
        .post("/create-checkout-session")
        .json(&json!({ "priceIds": ["price_b", "price_a"] }))
        .await
        .assert_status_ok();

    let requests = strategy.requests();
    assert_eq!(requests.len(), 1);
    let request = &requests[0];

    let ids: Vec<&str> = request.line_items.iter().map(|i| i.price_id.as_str()).collect();
    assert_eq!(ids, vec!["price_b", "price_a"]);
    assert!(request.line_items.iter().all(|i| i.quantity == 1));
    assert_eq!(request.mode.as_str(), "subscription");
    assert_eq!(request.payment_method_types, vec!["card"]);
    assert_eq!(
        request.success_url,
        "https://shop.example/success?session_id={CHECKOUT_SESSION_ID}"
    );
    assert_eq!(request.cancel_url, "https://shop.example");
    assert_eq!(request.coupon_id, None);
}

#[tokio::test]
async fn applies_discount_tier_by_item_count() {
    let strategy = Arc::new(RecordingStrategy::default());
    let server = server(strategy.clone());

    for n in [1, 2, 3, 4, 5, 7, 21, 22] {
        checkout(&server, n).await.assert_status_ok();
    }

    let coupons: Vec<Option<String>> = strategy
        .requests()
        .into_iter()
        .map(|r| r.coupon_id)
        .collect();

    assert_eq!(
        coupons,
        vec![
            None,
            None,
            Some("gX002Orj".to_string()),
            Some("gX002Orj".to_string()),
            Some("91SAvN7y".to_string()),
            Some("4kCkHlm0".to_string()),
            Some("4kCkHlm0".to_string()),
            Some("BGI8HqEn".to_string()),
        ]
    );
}

#[tokio::test]
async fn never_allows_promotion_codes() {
    let strategy = Arc::new(RecordingStrategy::default());
    let server = server(strategy.clone());

    for n in [1, 3, 5, 7, 22] {
        checkout(&server, n).await.assert_status_ok();
    }

    let requests = strategy.requests();
    assert_eq!(requests.len(), 5);
    assert!(requests.iter().all(|r| !r.allow_promotion_codes));
}

#[tokio::test]
async fn provider_failure_is_500_with_message() {
    let strategy = Arc::new(RecordingStrategy::failing("No such price: 'price_0'"));
    let server = server(strategy.clone());

    let response = checkout(&server, 3).await;

    response.assert_status(StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(response.json::<Value>()["error"], "No such price: 'price_0'");
    assert_eq!(strategy.requests().len(), 1);
}

// =============================================================================
// Webhook
// =============================================================================

#[tokio::test]
async fn webhook_rejects_invalid_signature() {
    let strategy = Arc::new(RecordingStrategy::default());
    let handler = Arc::new(RecordingHandler::default());
    let server = server_with(strategy.clone(), handler.clone());

    let body = event_body("checkout.session.completed");
    let response = post_webhook(&server, body.clone(), Some(signed(&body, "whsec_wrong"))).await;

    response.assert_status(StatusCode::BAD_REQUEST);
    assert!(response.text().starts_with("Webhook Error: "));
    assert!(handler.calls.lock().unwrap().is_empty());
    assert!(strategy.requests().is_empty());
}

#[tokio::test]
async fn webhook_rejects_missing_or_malformed_signature() {
    let strategy = Arc::new(RecordingStrategy::default());
    let handler = Arc::new(RecordingHandler::default());
    let server = server_with(strategy.clone(), handler.clone());

    let body = event_body("checkout.session.completed");

    post_webhook(&server, body.clone(), None)
        .await
        .assert_status(StatusCode::BAD_REQUEST);
    post_webhook(&server, body.clone(), Some("garbage".to_string()))
        .await
        .assert_status(StatusCode::BAD_REQUEST);

    assert!(handler.calls.lock().unwrap().is_empty());
    assert!(strategy.requests().is_empty());
}

#[tokio::test]
async fn webhook_rejects_tampered_payload() {
    let handler = Arc::new(RecordingHandler::default());
    let server = server_with(Arc::new(RecordingStrategy::default()), handler.clone());

    let original = event_body("checkout.session.completed");
    let signature = signed(&original, WEBHOOK_SECRET);
    let tampered = event_body("customer.subscription.created");

    post_webhook(&server, tampered, Some(signature))
        .await
        .assert_status(StatusCode::BAD_REQUEST);
    assert!(handler.calls.lock().unwrap().is_empty());
}

#[tokio::test]
async fn webhook_acknowledges_recognized_events() {
    let handler = Arc::new(RecordingHandler::default());
    let server = server_with(Arc::new(RecordingStrategy::default()), handler.clone());

    for tag in ["checkout.session.completed", "customer.subscription.created"] {
        let body = event_body(tag);
        let response = post_webhook(&server, body.clone(), Some(signed(&body, WEBHOOK_SECRET))).await;

        response.assert_status_ok();
        assert_eq!(response.json::<Value>(), json!({ "received": true }));
    }

    assert_eq!(
        *handler.calls.lock().unwrap(),
        vec!["completed:evt_test_1", "subscription:evt_test_1"]
    );
}

#[tokio::test]
async fn webhook_acknowledges_unhandled_event_types() {
    let strategy = Arc::new(RecordingStrategy::default());
    let handler = Arc::new(RecordingHandler::default());
    let server = server_with(strategy.clone(), handler.clone());

    let body = event_body("invoice.payment_failed");
    let response = post_webhook(&server, body.clone(), Some(signed(&body, WEBHOOK_SECRET))).await;

    response.assert_status_ok();
    assert_eq!(response.json::<Value>(), json!({ "received": true }));
    assert_eq!(
        *handler.calls.lock().unwrap(),
        vec!["unhandled:invoice.payment_failed"]
    );
    assert!(strategy.requests().is_empty());
}

#[tokio::test]
async fn webhook_acknowledges_even_when_handler_fails() {
    let handler = Arc::new(RecordingHandler {
        calls: Mutex::new(Vec::new()),
        fail: true,
    });
    let server = server_with(Arc::new(RecordingStrategy::default()), handler.clone());

    let body = event_body("checkout.session.completed");
    let response = post_webhook(&server, body.clone(), Some(signed(&body, WEBHOOK_SECRET))).await;

    response.assert_status_ok();
    assert_eq!(handler.calls.lock().unwrap().len(), 1);
}

// =============================================================================
// CORS
// =============================================================================

#[tokio::test]
async fn cors_allows_only_client_origin_with_credentials() {
    let server = server(Arc::new(RecordingStrategy::default()));

    let response = server
        .get("/health")
        .add_header(
            HeaderName::from_static("origin"),
            HeaderValue::from_static(CLIENT_URL),
        )
        .await;

    let headers = response.headers();
    assert_eq!(
        headers
            .get("access-control-allow-origin")
            .and_then(|v| v.to_str().ok()),
        Some(CLIENT_URL)
    );
    assert_eq!(
        headers
            .get("access-control-allow-credentials")
            .and_then(|v| v.to_str().ok()),
        Some("true")
    );

    let response = server
        .get("/health")
        .add_header(
            HeaderName::from_static("origin"),
            HeaderValue::from_static("https://evil.example"),
        )
        .await;

    assert!(response
        .headers()
        .get("access-control-allow-origin")
        .is_none());
}

#[tokio::test]
async fn cors_preflight_for_checkout_from_client_origin() {
    let strategy = Arc::new(RecordingStrategy::default());
    let server = server(strategy.clone());

    let response = server
        .method(Method::OPTIONS, "/create-checkout-session")
        .add_header(
            HeaderName::from_static("origin"),
            HeaderValue::from_static(CLIENT_URL),
        )
        .add_header(
            HeaderName::from_static("access-control-request-method"),
            HeaderValue::from_static("POST"),
        )
        .add_header(
            HeaderName::from_static("access-control-request-headers"),
            HeaderValue::from_static("content-type"),
        )
        .await;

    response.assert_status_ok();
    let headers = response.headers();
    assert_eq!(
        headers
            .get("access-control-allow-origin")
            .and_then(|v| v.to_str().ok()),
        Some(CLIENT_URL)
    );
    assert_eq!(
        headers
            .get("access-control-allow-credentials")
            .and_then(|v| v.to_str().ok()),
        Some("true")
    );

    let methods = headers
        .get("access-control-allow-methods")
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string();
    for method in ["GET", "POST", "OPTIONS"] {
        assert!(methods.contains(method), "{} missing from {}", method, methods);
    }
    assert_eq!(
        headers
            .get("access-control-allow-headers")
            .and_then(|v| v.to_str().ok()),
        Some("content-type")
    );
    assert!(strategy.requests().is_empty());
}

#[tokio::test]
async fn cors_preflight_from_foreign_origin_is_not_allowed() {
    let server = server(Arc::new(RecordingStrategy::default()));

    let response = server
        .method(Method::OPTIONS, "/create-checkout-session")
        .add_header(
            HeaderName::from_static("origin"),
            HeaderValue::from_static("https://evil.example"),
        )
        .add_header(
            HeaderName::from_static("access-control-request-method"),
            HeaderValue::from_static("POST"),
        )
        .await;

    let allowed = response
        .headers()
        .get("access-control-allow-origin")
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);
    assert_ne!(allowed.as_deref(), Some("https://evil.example"));
    assert!(allowed.is_none());
}
