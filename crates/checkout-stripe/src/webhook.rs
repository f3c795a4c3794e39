//! # Stripe Webhook Handling
//!
//! Signature verification and event dispatch for Stripe webhooks.
//!
//! Stripe signs each delivery with the endpoint's signing secret and sends
//! `Stripe-Signature: t=<unix>,v1=<hex hmac>[,v1=...]`. The signed message is
//! `"<t>.<raw body>"`, so verification must run on the body bytes exactly as
//! received, before any JSON parsing.

use checkout_core::{PaymentError, PaymentResult, WebhookEvent, WebhookEventType};
use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use serde::Deserialize;
use sha2::Sha256;
use tracing::{debug, info};

type HmacSha256 = Hmac<Sha256>;

/// Header carrying the webhook signature
pub const SIGNATURE_HEADER: &str = "stripe-signature";

/// Signature scheme we verify (Stripe ignores `v0` test signatures)
const SIGNATURE_SCHEME: &str = "v1";

#[derive(Debug)]
struct SignatureHeader {
    timestamp: i64,
    signatures: Vec<String>,
}

fn parse_signature_header(header: &str) -> PaymentResult<SignatureHeader> {
    let mut timestamp = None;
    let mut signatures = Vec::new();

    for part in header.split(',') {
        let Some((key, value)) = part.trim().split_once('=') else {
            continue;
        };
        match key {
            "t" => timestamp = value.parse().ok(),
            SIGNATURE_SCHEME => signatures.push(value.to_string()),
            _ => {}
        }
    }

    let timestamp = timestamp.ok_or_else(|| {
        PaymentError::WebhookVerificationFailed(
            "Unable to extract timestamp from signature header".to_string(),
        )
    })?;

    if signatures.is_empty() {
        return Err(PaymentError::WebhookVerificationFailed(
            "No v1 signatures found in signature header".to_string(),
        ));
    }

    Ok(SignatureHeader {
        timestamp,
        signatures,
    })
}

fn signed_mac(secret: &str, timestamp: i64, payload: &[u8]) -> PaymentResult<HmacSha256> {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .map_err(|e| PaymentError::Internal(format!("Invalid HMAC key: {}", e)))?;
    mac.update(timestamp.to_string().as_bytes());
    mac.update(b".");
    mac.update(payload);
    Ok(mac)
}

/// Hex-encoded `v1` signature of `payload` at `timestamp`.
pub fn compute_signature(secret: &str, timestamp: i64, payload: &[u8]) -> PaymentResult<String> {
    let mac = signed_mac(secret, timestamp, payload)?;
    Ok(hex::encode(mac.finalize().into_bytes()))
}

/// Build a valid `Stripe-Signature` header value, as Stripe's SDKs do for tests.
pub fn generate_test_header(payload: &[u8], secret: &str, timestamp: i64) -> PaymentResult<String> {
    let signature = compute_signature(secret, timestamp, payload)?;
    Ok(format!("t={},{}={}", timestamp, SIGNATURE_SCHEME, signature))
}

#[derive(Debug, Deserialize)]
struct StripeWebhookEvent {
    id: String,
    #[serde(rename = "type")]
    event_type: String,
    created: i64,
    data: StripeEventData,
}

#[derive(Debug, Deserialize)]
struct StripeEventData {
    object: serde_json::Value,
}

/// Verify a webhook delivery and parse it into a `WebhookEvent`.
///
/// Fails closed: a malformed header, a signature mismatch, a timestamp
/// outside `tolerance_secs` of `now`, or an unparseable body are all errors.
/// A non-positive tolerance disables the timestamp check.
pub fn construct_event(
    payload: &[u8],
    header: &str,
    secret: &str,
    tolerance_secs: i64,
    now: i64,
) -> PaymentResult<WebhookEvent> {
    let header = parse_signature_header(header)?;

    let valid = header.signatures.iter().any(|candidate| {
        let Ok(candidate) = hex::decode(candidate) else {
            return false;
        };
        signed_mac(secret, header.timestamp, payload)
            .map(|mac| mac.verify_slice(&candidate).is_ok())
            .unwrap_or(false)
    });

    if !valid {
        return Err(PaymentError::WebhookVerificationFailed(
            "No signatures found matching the expected signature for payload".to_string(),
        ));
    }

    if tolerance_secs > 0 && now.abs_diff(header.timestamp) > tolerance_secs.unsigned_abs() {
        return Err(PaymentError::WebhookVerificationFailed(
            "Timestamp outside the tolerance zone".to_string(),
        ));
    }

    let event: StripeWebhookEvent = serde_json::from_slice(payload)
        .map_err(|e| PaymentError::WebhookParseError(format!("Failed to parse webhook: {}", e)))?;

    debug!("Verified Stripe webhook: id={}, type={}", event.id, event.event_type);

    Ok(WebhookEvent {
        event_id: event.id,
        event_type: WebhookEventType::from_tag(&event.event_type),
        provider: "stripe".to_string(),
        object: event.data.object,
        created_at: DateTime::from_timestamp(event.created, 0).unwrap_or_else(Utc::now),
    })
}

/// Webhook event handler trait
///
/// The default methods only log. Implement this trait to attach fulfillment
/// to specific event types.
pub trait WebhookHandler: Send + Sync {
    /// Called for `checkout.session.completed`
    fn on_checkout_completed(&self, event: &WebhookEvent) -> PaymentResult<()> {
        info!(
            event_id = %event.event_id,
            session_id = ?event.object_id(),
            payment_status = ?event.object.get("payment_status").and_then(|v| v.as_str()),
            "Checkout session completed"
        );
        debug!(object = %event.object, "Checkout session payload");
        Ok(())
    }

    /// Called for `customer.subscription.created`
    fn on_subscription_created(&self, event: &WebhookEvent) -> PaymentResult<()> {
        info!(
            event_id = %event.event_id,
            subscription_id = ?event.object_id(),
            status = ?event.object.get("status").and_then(|v| v.as_str()),
            "Subscription created"
        );
        debug!(object = %event.object, "Subscription payload");
        Ok(())
    }

    /// Called for every other event type
    fn on_unhandled_event(&self, event: &WebhookEvent) -> PaymentResult<()> {
        info!(
            event_id = %event.event_id,
            event_type = %event.event_type,
            "Unhandled event type"
        );
        Ok(())
    }
}

/// Default webhook handler (just logs events)
pub struct LoggingWebhookHandler;

impl WebhookHandler for LoggingWebhookHandler {}

/// Dispatch a webhook event to the appropriate handler method
pub fn dispatch_webhook_event(handler: &dyn WebhookHandler, event: &WebhookEvent) -> PaymentResult<()> {
    match &event.event_type {
        WebhookEventType::CheckoutCompleted => handler.on_checkout_completed(event),
        WebhookEventType::SubscriptionCreated => handler.on_subscription_created(event),
        WebhookEventType::Unknown(_) => handler.on_unhandled_event(event),
    }
}

/// Events to enable on the Stripe Dashboard endpoint
pub const SUBSCRIBED_WEBHOOK_EVENTS: &[&str] = &[
    "checkout.session.completed",
    "customer.subscription.created",
];
