use serde::Serialize;

use super::price_cache::{Freshness, PriceReading};
use crate::models::BaselineAmount;

/// Change of the reference-side reserve since the pool was seeded
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProfitLoss {
    /// In the baseline's reference asset
    pub delta: f64,
    pub percentage: f64,
    /// Present when the baseline is denominated in the priced asset
    pub usd_delta: Option<f64>,
    pub price_stale: bool,
}

/// `None` when no meaningful percentage exists (zero baseline, non-finite input)
pub fn profit_loss(
    baseline: &BaselineAmount,
    current_reserve: f64,
    price: Option<&PriceReading>,
) -> Option<ProfitLoss> {
    if baseline.amount == 0.0 || !baseline.amount.is_finite() || !current_reserve.is_finite() {
        return None;
    }

    let delta = current_reserve - baseline.amount;
    let percentage = delta / baseline.amount * 100.0;
    if !percentage.is_finite() {
        return None;
    }

    let priced = price.filter(|reading| {
        reading
            .quote
            .asset_symbol
            .eq_ignore_ascii_case(&baseline.reference_symbol)
    });

    Some(ProfitLoss {
        delta,
        percentage,
        usd_delta: priced.map(|reading| delta * reading.quote.price_usd),
        price_stale: priced.map_or(false, |reading| reading.freshness == Freshness::Stale),
    })
}
