use chrono::{DateTime, Utc};

use super::Record;
use crate::models::{BaselineAmount, PoolCandidate, PriceQuote, TokenRecord};

/// Scope for records that do not belong to a wallet
pub const GLOBAL_SCOPE: &str = "global";

impl Record for PoolCandidate {
    const KIND: &'static str = "pool_candidate";

    fn key(&self) -> String {
        self.originating_tx.clone()
    }

    fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }
}

impl Record for BaselineAmount {
    const KIND: &'static str = "baseline";

    fn key(&self) -> String {
        format!("{}:{}", self.custom_mint, self.reference_mint)
    }

    fn created_at(&self) -> DateTime<Utc> {
        self.captured_at
    }
}

impl Record for TokenRecord {
    const KIND: &'static str = "token";

    fn key(&self) -> String {
        self.mint.to_string()
    }

    fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }
}

impl Record for PriceQuote {
    const KIND: &'static str = "price_quote";

    fn key(&self) -> String {
        self.asset_symbol.clone()
    }

    fn created_at(&self) -> DateTime<Utc> {
        self.captured_at
    }
}
