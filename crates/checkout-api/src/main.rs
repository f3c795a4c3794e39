//! # tiered-checkout
//!
//! Stripe checkout sessions with automatic quantity discounts.
//!
//! ## Usage
//!
//! ```bash
//! # Set environment variables
//! export STRIPE_SECRET_KEY=sk_test_...
//! export STRIPE_WEBHOOK_SECRET=whsec_...
//! export CLIENT_URL=https://shop.example
//!
//! # Run the server
//! tiered-checkout
//! ```

use checkout_api::{routes, state::AppState};
use checkout_stripe::SUBSCRIBED_WEBHOOK_EVENTS;
use tracing::{info, Level};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(
            EnvFilter::builder()
                .with_default_directive(Level::INFO.into())
                .from_env_lossy(),
        )
        .init();

    let state = AppState::new()?;

    let addr = state.config.socket_addr();

    info!("Allowed client origin: {}", state.config.client_url);
    info!("Payment provider: {}", state.strategy.provider_name());
    info!(
        "Discounts start at {} items",
        state.discounts.min_discounted_items()
    );
    for tier in state.discounts.tiers() {
        info!("Discount tier: {}+ items -> {}", tier.min_items, tier.coupon_id);
    }
    info!("Webhook events handled: {:?}", SUBSCRIBED_WEBHOOK_EVENTS);

    let app = routes::create_router(state);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("Server running on port {}", addr.port());

    axum::serve(listener, app).await?;

    Ok(())
}
