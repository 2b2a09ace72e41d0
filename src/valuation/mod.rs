//! Reference-asset pricing and profit/loss against a pool's seeding baseline.

pub mod pnl;
pub mod price_cache;

pub use pnl::{profit_loss, ProfitLoss};
pub use price_cache::{
    Freshness, HttpQuoteProvider, PriceCache, PriceReading, PriceSource, QuoteProvider,
};
