//! # Order Types
//!
//! Purchase requests, checkout session requests and webhook events.

use crate::discount::DiscountTable;
use crate::error::{PaymentError, PaymentResult};
use crate::strategy::CheckoutUrls;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

/// Message returned when the `priceIds` field is missing, not a list, or empty.
pub const PRICE_IDS_REQUIRED: &str = "priceIds array is required";

/// Message returned when `priceIds` holds something other than strings.
pub const PRICE_IDS_NOT_STRINGS: &str = "priceIds must contain only strings";

/// A validated list of provider price identifiers.
///
/// Never empty. Order is preserved and becomes line-item order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PurchaseRequest {
    price_ids: Vec<String>,
}

impl PurchaseRequest {
    pub fn new(price_ids: Vec<String>) -> PaymentResult<Self> {
        if price_ids.is_empty() {
            return Err(PaymentError::InvalidRequest(PRICE_IDS_REQUIRED.to_string()));
        }
        Ok(Self { price_ids })
    }

    /// Validate a decoded JSON request body.
    pub fn from_json(body: &Value) -> PaymentResult<Self> {
        let ids = match body.get("priceIds") {
            Some(Value::Array(ids)) if !ids.is_empty() => ids,
            _ => return Err(PaymentError::InvalidRequest(PRICE_IDS_REQUIRED.to_string())),
        };

        let price_ids = ids
            .iter()
            .map(|id| id.as_str().map(String::from))
            .collect::<Option<Vec<_>>>()
            .ok_or_else(|| PaymentError::InvalidRequest(PRICE_IDS_NOT_STRINGS.to_string()))?;

        Self::new(price_ids)
    }

    /// Validate a raw request body. Anything that is not JSON counts as a
    /// body without `priceIds`.
    pub fn from_slice(body: &[u8]) -> PaymentResult<Self> {
        let value: Value = serde_json::from_slice(body).unwrap_or(Value::Null);
        Self::from_json(&value)
    }

    pub fn price_ids(&self) -> &[String] {
        &self.price_ids
    }

    /// Number of distinct items being purchased
    pub fn item_count(&self) -> usize {
        self.price_ids.len()
    }
}

/// A line item in a checkout session
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineItem {
    /// Provider price identifier
    pub price_id: String,

    /// Quantity
    pub quantity: u32,
}

impl LineItem {
    /// One unit of the given price
    pub fn single(price_id: impl Into<String>) -> Self {
        Self {
            price_id: price_id.into(),
            quantity: 1,
        }
    }
}

/// Checkout mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CheckoutMode {
    /// Recurring subscription
    Subscription,
}

impl CheckoutMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            CheckoutMode::Subscription => "subscription",
        }
    }
}

/// Everything a provider needs to open a hosted checkout session
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CheckoutRequest {
    pub line_items: Vec<LineItem>,

    pub mode: CheckoutMode,

    /// Accepted payment method types
    pub payment_method_types: Vec<String>,

    /// Success redirect, may contain a provider placeholder for the session id
    pub success_url: String,

    pub cancel_url: String,

    /// Whether the customer may type in a promotion code. Always false:
    /// discounts come only from the quantity tiers.
    pub allow_promotion_codes: bool,

    /// Coupon applied automatically, if a tier matched
    #[serde(skip_serializing_if = "Option::is_none")]
    pub coupon_id: Option<String>,

    /// Idempotency key (prevents duplicate sessions on client retries)
    pub idempotency_key: String,
}

impl CheckoutRequest {
    /// Build the session request for a validated purchase.
    pub fn for_purchase(
        purchase: &PurchaseRequest,
        discounts: &DiscountTable,
        urls: &CheckoutUrls,
    ) -> Self {
        let line_items = purchase
            .price_ids()
            .iter()
            .map(LineItem::single)
            .collect();

        Self {
            line_items,
            mode: CheckoutMode::Subscription,
            payment_method_types: vec!["card".to_string()],
            success_url: urls.success_url(),
            cancel_url: urls.cancel_url(),
            allow_promotion_codes: false,
            coupon_id: discounts.resolve(purchase.item_count()).map(String::from),
            idempotency_key: Uuid::new_v4().to_string(),
        }
    }

    pub fn item_count(&self) -> usize {
        self.line_items.len()
    }
}

/// A checkout session created by a payment provider
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckoutSession {
    /// Provider's session ID
    pub session_id: String,

    /// Provider name (e.g., "stripe")
    pub provider: String,

    /// URL to redirect customer to for payment
    pub checkout_url: String,

    /// When the session expires
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<DateTime<Utc>>,
}

impl CheckoutSession {
    pub fn new(
        session_id: impl Into<String>,
        provider: impl Into<String>,
        checkout_url: impl Into<String>,
    ) -> Self {
        Self {
            session_id: session_id.into(),
            provider: provider.into(),
            checkout_url: checkout_url.into(),
            expires_at: None,
        }
    }
}

/// Webhook event types we recognize
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WebhookEventType {
    /// checkout.session.completed
    CheckoutCompleted,
    /// customer.subscription.created
    SubscriptionCreated,
    /// Anything else (passthrough)
    Unknown(String),
}

impl WebhookEventType {
    pub fn from_tag(tag: &str) -> Self {
        match tag {
            "checkout.session.completed" => WebhookEventType::CheckoutCompleted,
            "customer.subscription.created" => WebhookEventType::SubscriptionCreated,
            other => WebhookEventType::Unknown(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            WebhookEventType::CheckoutCompleted => "checkout.session.completed",
            WebhookEventType::SubscriptionCreated => "customer.subscription.created",
            WebhookEventType::Unknown(tag) => tag,
        }
    }

    pub fn is_recognized(&self) -> bool {
        !matches!(self, WebhookEventType::Unknown(_))
    }
}

impl std::fmt::Display for WebhookEventType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A verified webhook event
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebhookEvent {
    /// Event ID from provider
    pub event_id: String,

    /// Event type
    pub event_type: WebhookEventType,

    /// Provider name
    pub provider: String,

    /// The object the event is about (session, subscription, ...)
    pub object: Value,

    /// When the provider created the event
    pub created_at: DateTime<Utc>,
}

impl WebhookEvent {
    /// `id` of the event's data object, if it has one
    pub fn object_id(&self) -> Option<&str> {
        self.object.get("id").and_then(|v| v.as_str())
    }
}
