//! # checkout-stripe
//!
//! Stripe payment strategy for tiered-checkout.
//!
//! `StripeCheckoutStrategy` creates hosted Checkout Sessions from existing
//! Price ids and verifies signed webhook deliveries locally.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use checkout_stripe::StripeCheckoutStrategy;
//! use checkout_core::PaymentStrategy;
//!
//! let strategy = StripeCheckoutStrategy::from_env()?;
//! let session = strategy.create_checkout(&request).await?;
//! // Redirect user to session.checkout_url
//! ```
//!
//! ## Webhook Handling
//!
//! ```rust,ignore
//! use checkout_stripe::{dispatch_webhook_event, LoggingWebhookHandler};
//!
//! let event = strategy.verify_webhook(&body, signature)?;
//! dispatch_webhook_event(&LoggingWebhookHandler, &event)?;
//! ```

pub mod checkout;
pub mod config;
pub mod webhook;

// Re-exports
pub use checkout::StripeCheckoutStrategy;
pub use config::StripeConfig;
pub use webhook::{
    construct_event, dispatch_webhook_event, generate_test_header, LoggingWebhookHandler,
    WebhookHandler, SIGNATURE_HEADER, SUBSCRIBED_WEBHOOK_EVENTS,
};
