//! # checkout-core
//!
//! Core types and traits for the tiered-checkout service.
//!
//! This crate provides:
//! - `DiscountTable` for quantity-based coupon tiers
//! - `PurchaseRequest`, `CheckoutRequest` and `CheckoutSession` for the checkout flow
//! - `WebhookEvent` for verified provider notifications
//! - `PaymentStrategy` trait for implementing payment providers
//! - `PaymentError` for typed error handling
//!
//! ## Example
//!
//! ```rust,ignore
//! use checkout_core::{CheckoutRequest, CheckoutUrls, DiscountTable, PurchaseRequest};
//!
//! let purchase = PurchaseRequest::from_json(&body)?;
//! let request = CheckoutRequest::for_purchase(
//!     &purchase,
//!     &DiscountTable::default(),
//!     &CheckoutUrls::new("https://shop.example"),
//! );
//!
//! let session = strategy.create_checkout(&request).await?;
//! // Redirect user to session.checkout_url
//! ```

pub mod discount;
pub mod error;
pub mod order;
pub mod strategy;

// Re-exports for convenience
pub use discount::{resolve_coupon, DiscountTable, DiscountTier, DEFAULT_TIERS};
pub use error::{PaymentError, PaymentResult};
pub use order::{
    CheckoutMode, CheckoutRequest, CheckoutSession, LineItem, PurchaseRequest, WebhookEvent,
    WebhookEventType, PRICE_IDS_NOT_STRINGS, PRICE_IDS_REQUIRED,
};
pub use strategy::{BoxedPaymentStrategy, CheckoutUrls, PaymentStrategy, SESSION_ID_PLACEHOLDER};
