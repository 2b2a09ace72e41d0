use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// A USD quote for one asset
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceQuote {
    pub asset_symbol: String,
    pub price_usd: f64,
    pub captured_at: DateTime<Utc>,
}

impl PriceQuote {
    pub fn new(asset_symbol: &str, price_usd: f64, captured_at: DateTime<Utc>) -> Self {
        Self {
            asset_symbol: asset_symbol.to_uppercase(),
            price_usd,
            captured_at,
        }
    }

    /// Fresh while strictly younger than `window`
    pub fn is_fresh(&self, now: DateTime<Utc>, window: Duration) -> bool {
        now.signed_duration_since(self.captured_at) < window
    }
}
