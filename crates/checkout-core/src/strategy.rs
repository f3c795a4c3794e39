//! # Payment Strategy Trait
//!
//! The seam between the HTTP layer and a payment provider.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                    PaymentStrategy (trait)                  │
//! │  ├── create_checkout()                                      │
//! │  ├── verify_webhook()                                       │
//! │  └── provider_name()                                        │
//! └─────────────────────────────────────────────────────────────┘
//!                            ▲
//!                    ┌───────┴───────┐
//!                    │StripeCheckout │
//!                    │   Strategy    │
//!                    └───────────────┘
//! ```

use crate::error::PaymentResult;
use crate::order::{CheckoutRequest, CheckoutSession, WebhookEvent};
use async_trait::async_trait;
use std::sync::Arc;

/// Core trait for payment provider implementations.
#[async_trait]
pub trait PaymentStrategy: Send + Sync {
    /// Create a hosted checkout session.
    ///
    /// # Returns
    /// A `CheckoutSession` containing the redirect URL and session id.
    async fn create_checkout(&self, request: &CheckoutRequest) -> PaymentResult<CheckoutSession>;

    /// Verify a webhook signature and parse the event.
    ///
    /// Verification is local (shared secret), so this does not suspend.
    ///
    /// # Arguments
    /// * `payload` - Raw webhook body bytes, exactly as received
    /// * `signature` - Signature header from the request
    fn verify_webhook(&self, payload: &[u8], signature: &str) -> PaymentResult<WebhookEvent>;

    /// Get the provider name (for logging).
    fn provider_name(&self) -> &'static str;
}

/// Type alias for a shared payment strategy (dynamic dispatch)
pub type BoxedPaymentStrategy = Arc<dyn PaymentStrategy>;

/// Placeholder the provider replaces with the real session id on redirect.
pub const SESSION_ID_PLACEHOLDER: &str = "{CHECKOUT_SESSION_ID}";

/// Redirect URLs handed to the provider
#[derive(Debug, Clone)]
pub struct CheckoutUrls {
    /// Base URL of the client application (e.g., "https://shop.example")
    pub base_url: String,
    /// Success page path
    pub success_path: String,
}

impl CheckoutUrls {
    pub fn new(base_url: impl Into<String>) -> Self {
        let base_url: String = base_url.into();
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            success_path: "/success".to_string(),
        }
    }

    /// Success URL carrying the session id placeholder
    pub fn success_url(&self) -> String {
        format!(
            "{}{}?session_id={}",
            self.base_url, self.success_path, SESSION_ID_PLACEHOLDER
        )
    }

    /// Cancelling sends the customer back to the client's landing page.
    pub fn cancel_url(&self) -> String {
        self.base_url.clone()
    }
}

impl Default for CheckoutUrls {
    fn default() -> Self {
        Self::new("http://localhost:3000")
    }
}
