//! # Quantity Discounts
//!
//! Maps the number of items in a purchase to a provider-side coupon.
//!
//! Tiers are cumulative thresholds, not exclusive bands: a purchase of 8 items
//! satisfies the 3, 5 and 7 item tiers, and must receive the 7 item coupon.
//! Thresholds are therefore checked highest first.
//!
//! ```text
//!   items:   0   1   2 | 3   4 | 5   6 | 7 ... 21 | 22 ...
//!   coupon:  -   -   - | gX002Orj | 91SAvN7y | 4kCkHlm0 | BGI8HqEn
//! ```

use crate::error::{PaymentError, PaymentResult};
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::HashSet;
use std::path::Path;

/// Built-in tier table as `(min_items, coupon_id)` pairs.
pub const DEFAULT_TIERS: [(usize, &str); 4] = [
    (3, "gX002Orj"),  // 10% off
    (5, "91SAvN7y"),  // 15% off
    (7, "4kCkHlm0"),  // 20% off
    (22, "BGI8HqEn"), // 30% off, full catalog
];

/// A single discount tier
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiscountTier {
    /// Minimum number of items for this tier to apply
    pub min_items: usize,
    /// Provider coupon identifier
    pub coupon_id: String,
}

impl DiscountTier {
    pub fn new(min_items: usize, coupon_id: impl Into<String>) -> Self {
        Self {
            min_items,
            coupon_id: coupon_id.into(),
        }
    }
}

/// Resolve a coupon from tiers sorted by descending `min_items`.
///
/// Returns the coupon of the first tier whose threshold `item_count` meets.
pub fn resolve_coupon(tiers_desc: &[DiscountTier], item_count: usize) -> Option<&str> {
    tiers_desc
        .iter()
        .find(|tier| item_count >= tier.min_items)
        .map(|tier| tier.coupon_id.as_str())
}

#[derive(Debug, Deserialize)]
struct RawDiscountTable {
    tiers: Vec<DiscountTier>,
}

/// Immutable, validated discount table.
///
/// Tiers are kept sorted by descending threshold.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DiscountTable {
    tiers: Vec<DiscountTier>,
}

impl<'de> Deserialize<'de> for DiscountTable {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = RawDiscountTable::deserialize(deserializer)?;
        Self::new(raw.tiers).map_err(serde::de::Error::custom)
    }
}

impl DiscountTable {
    /// Build a table from tiers in any order.
    pub fn new(mut tiers: Vec<DiscountTier>) -> PaymentResult<Self> {
        if tiers.is_empty() {
            return Err(PaymentError::Configuration(
                "Discount table must contain at least one tier".to_string(),
            ));
        }

        let mut seen = HashSet::new();
        for tier in &tiers {
            if tier.coupon_id.trim().is_empty() {
                return Err(PaymentError::Configuration(format!(
                    "Discount tier for {} items has an empty coupon id",
                    tier.min_items
                )));
            }
            if !seen.insert(tier.min_items) {
                return Err(PaymentError::Configuration(format!(
                    "Duplicate discount threshold: {}",
                    tier.min_items
                )));
            }
        }

        tiers.sort_by(|a, b| b.min_items.cmp(&a.min_items));
        Ok(Self { tiers })
    }

    /// Parse a table from TOML:
    ///
    /// ```toml
    /// [[tiers]]
    /// min_items = 3
    /// coupon_id = "gX002Orj"
    /// ```
    pub fn from_toml_str(content: &str) -> PaymentResult<Self> {
        toml::from_str(content)
            .map_err(|e| PaymentError::Configuration(format!("Invalid discount table: {}", e)))
    }

    /// Load a table from a TOML file.
    pub fn from_file(path: impl AsRef<Path>) -> PaymentResult<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            PaymentError::Configuration(format!("Failed to read {}: {}", path.display(), e))
        })?;
        Self::from_toml_str(&content)
    }

    /// Coupon for a purchase of `item_count` items, if any tier applies.
    pub fn resolve(&self, item_count: usize) -> Option<&str> {
        resolve_coupon(&self.tiers, item_count)
    }

    /// Tiers, highest threshold first
    pub fn tiers(&self) -> &[DiscountTier] {
        &self.tiers
    }

    /// Smallest quantity that earns any discount
    pub fn min_discounted_items(&self) -> usize {
        self.tiers.last().map(|t| t.min_items).unwrap_or(0)
    }
}

impl Default for DiscountTable {
    fn default() -> Self {
        let mut tiers: Vec<DiscountTier> = DEFAULT_TIERS
            .iter()
            .map(|(min, coupon)| DiscountTier::new(*min, *coupon))
            .collect();
        tiers.sort_by(|a, b| b.min_items.cmp(&a.min_items));
        Self { tiers }
    }
}
