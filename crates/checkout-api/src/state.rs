//! # Application State
//!
//! Shared, immutable state for the Axum application: the payment strategy,
//! the discount table and the client-facing configuration. Everything here is
//! built once at startup and cloned cheaply into each request.

use axum::http::HeaderValue;
use checkout_core::{BoxedPaymentStrategy, CheckoutUrls, DiscountTable, PaymentError};
use checkout_stripe::{LoggingWebhookHandler, StripeCheckoutStrategy, WebhookHandler};
use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;
use std::sync::Arc;

const DEFAULT_CLIENT_URL: &str = "https://lovable.app";
const DEFAULT_PORT: u16 = 3000;

/// Application configuration
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Address to bind to
    pub host: IpAddr,
    /// Port to listen on
    pub port: u16,
    /// Public base URL of the client application
    pub client_url: String,
    /// `client_url` as a CORS origin
    pub client_origin: HeaderValue,
    /// Explicit discount table file, if configured
    pub discounts_file: Option<PathBuf>,
}

impl AppConfig {
    /// Load from environment variables
    pub fn from_env() -> Result<Self, PaymentError> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load through an arbitrary variable lookup
    pub fn from_lookup<F>(lookup: F) -> Result<Self, PaymentError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let host = match lookup("HOST") {
            Some(h) => h
                .parse()
                .map_err(|_| PaymentError::Configuration(format!("Invalid HOST: {}", h)))?,
            None => IpAddr::from([0, 0, 0, 0]),
        };

        let port = match lookup("PORT") {
            Some(p) => p
                .parse()
                .map_err(|_| PaymentError::Configuration(format!("Invalid PORT: {}", p)))?,
            None => DEFAULT_PORT,
        };

        let client_url = lookup("CLIENT_URL")
            .filter(|u| !u.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_CLIENT_URL.to_string())
            .trim()
            .trim_end_matches('/')
            .to_string();

        let client_origin = HeaderValue::from_str(&client_url).map_err(|_| {
            PaymentError::Configuration(format!("Invalid CLIENT_URL: {}", client_url))
        })?;

        Ok(Self {
            host,
            port,
            client_url,
            client_origin,
            discounts_file: lookup("DISCOUNTS_FILE").map(PathBuf::from),
        })
    }

    /// Get the socket address to bind to
    pub fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }
}

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    /// Payment provider
    pub strategy: BoxedPaymentStrategy,
    /// Quantity discount tiers
    pub discounts: Arc<DiscountTable>,
    /// Redirect URLs handed to the provider
    pub urls: CheckoutUrls,
    /// Receives verified webhook events
    pub webhook_handler: Arc<dyn WebhookHandler>,
    /// Application config
    pub config: AppConfig,
}

impl AppState {
    /// Create a new AppState with the Stripe strategy, configured from the environment
    pub fn new() -> anyhow::Result<Self> {
        let config = AppConfig::from_env()?;
        let discounts = load_discount_table(&config)?;

        let stripe_strategy = StripeCheckoutStrategy::from_env()
            .map_err(|e| anyhow::anyhow!("Failed to initialize Stripe: {}", e))?;

        Ok(Self::with_strategy(config, Arc::new(stripe_strategy), discounts))
    }

    /// Assemble state from already-built parts
    pub fn with_strategy(
        config: AppConfig,
        strategy: BoxedPaymentStrategy,
        discounts: DiscountTable,
    ) -> Self {
        Self {
            strategy,
            discounts: Arc::new(discounts),
            urls: CheckoutUrls::new(&config.client_url),
            webhook_handler: Arc::new(LoggingWebhookHandler),
            config,
        }
    }

    /// Builder: replace the webhook handler
    pub fn with_webhook_handler(mut self, handler: Arc<dyn WebhookHandler>) -> Self {
        self.webhook_handler = handler;
        self
    }
}

/// Load the discount table: the configured file, else `config/discounts.toml`
/// if one exists, else the built-in tiers.
fn load_discount_table(config: &AppConfig) -> anyhow::Result<DiscountTable> {
    if let Some(path) = &config.discounts_file {
        let table = DiscountTable::from_file(path)?;
        tracing::info!("Loaded {} discount tiers from {}", table.tiers().len(), path.display());
        return Ok(table);
    }

    let config_paths = ["config/discounts.toml", "../config/discounts.toml"];

    for path in config_paths {
        if std::path::Path::new(path).exists() {
            let table = DiscountTable::from_file(path)?;
            tracing::info!("Loaded {} discount tiers from {}", table.tiers().len(), path);
            return Ok(table);
        }
    }

    tracing::info!("No discount table file found, using built-in tiers");
    Ok(DiscountTable::default())
}
