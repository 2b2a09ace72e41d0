use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use log::{debug, info, warn};
use serde_json::Value;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::db::{Repository, GLOBAL_SCOPE};
use crate::error::{Error, Result};
use crate::models::PriceQuote;
use crate::solana::rpc_helpers::{with_retry, RetryConfig};

/// Source of USD prices, queried only by the cache
#[async_trait]
pub trait QuoteProvider: Send + Sync {
    async fn fetch_usd(&self, symbol: &str) -> Result<f64>;
}

/// Queries a CoinGecko-style `simple/price` endpoint
pub struct HttpQuoteProvider {
    client: reqwest::Client,
    /// `{id}` is replaced with the provider's asset id
    url_template: String,
    retry_config: RetryConfig,
}

impl HttpQuoteProvider {
    pub fn new(url_template: &str) -> Self {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(10))
            .build()
            .unwrap_or_default();
        Self {
            client,
            url_template: url_template.to_string(),
            retry_config: RetryConfig::default(),
        }
    }

    fn asset_id(symbol: &str) -> String {
        match symbol.to_uppercase().as_str() {
            "SOL" => "solana".to_string(),
            "USDC" => "usd-coin".to_string(),
            "USDT" => "tether".to_string(),
            other => other.to_lowercase(),
        }
    }
}

fn http_error(err: reqwest::Error) -> Error {
    Error::Rpc {
        step: "fetchPrice",
        message: err.to_string(),
        transient: err.is_timeout()
            || err.is_connect()
            || err.status().map_or(false, |status| status.is_server_error()),
    }
}

#[async_trait]
impl QuoteProvider for HttpQuoteProvider {
    async fn fetch_usd(&self, symbol: &str) -> Result<f64> {
        let id = Self::asset_id(symbol);
        let url = self.url_template.replace("{id}", &id);

        let body: Value = with_retry(&self.retry_config, "fetchPrice", || async {
            self.client
                .get(&url)
                .send()
                .await
                .and_then(|response| response.error_for_status())
                .map_err(http_error)?
                .json::<Value>()
                .await
                .map_err(http_error)
        })
        .await?;

        body.get(&id)
            .and_then(|entry| entry.get("usd"))
            .and_then(Value::as_f64)
            .ok_or_else(|| Error::Rpc {
                step: "fetchPrice",
                message: format!("no usd price for '{}' in response", id),
                transient: false,
            })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub enum Freshness {
    Fresh,
    /// The provider failed; this is the last quote we had
    Stale,
}

/// A quote together with whether it is still inside the freshness window
#[derive(Debug, Clone)]
pub struct PriceReading {
    pub quote: Arc<PriceQuote>,
    pub freshness: Freshness,
}

impl PriceReading {
    pub fn is_stale(&self) -> bool {
        self.freshness == Freshness::Stale
    }

    /// For callers that must not act on an outdated price
    pub fn require_fresh(self) -> Result<Arc<PriceQuote>> {
        match self.freshness {
            Freshness::Fresh => Ok(self.quote),
            Freshness::Stale => Err(Error::StaleQuote {
                symbol: self.quote.asset_symbol.clone(),
            }),
        }
    }
}

/// Anything that can report the current reference price
#[async_trait]
pub trait PriceSource: Send + Sync {
    async fn current_price(&self) -> Result<PriceReading>;
}

/// Time-boxed cache of one asset's USD price.
///
/// A quote younger than the window is served from memory with no I/O.
/// Otherwise the provider is asked once; if it fails, the previous quote is
/// served flagged `Stale`, and with no previous quote the call fails.
pub struct PriceCache<P: QuoteProvider, S: Repository> {
    provider: P,
    store: Arc<S>,
    symbol: String,
    window: Duration,
    current: RwLock<Option<Arc<PriceQuote>>>,
}

impl<P: QuoteProvider, S: Repository> PriceCache<P, S> {
    pub fn new(provider: P, store: Arc<S>, symbol: &str, window: Duration) -> Self {
        Self {
            provider,
            store,
            symbol: symbol.to_uppercase(),
            window,
            current: RwLock::new(None),
        }
    }

    pub async fn get_price(&self) -> Result<PriceReading> {
        self.get_price_at(Utc::now()).await
    }

    pub async fn get_price_at(&self, now: DateTime<Utc>) -> Result<PriceReading> {
        {
            let current = self.current.read().await;
            if let Some(quote) = current.as_ref().filter(|q| q.is_fresh(now, self.window)) {
                return Ok(PriceReading {
                    quote: Arc::clone(quote),
                    freshness: Freshness::Fresh,
                });
            }
        }

        let mut current = self.current.write().await;

        if current.is_none() {
            *current = self.load_persisted().await.map(Arc::new);
        }
        // Someone else may have refreshed while we waited for the lock
        if let Some(quote) = current.as_ref().filter(|q| q.is_fresh(now, self.window)) {
            return Ok(PriceReading {
                quote: Arc::clone(quote),
                freshness: Freshness::Fresh,
            });
        }

        let fetched = self
            .provider
            .fetch_usd(&self.symbol)
            .await
            .and_then(|price| {
                if price.is_finite() && price > 0.0 {
                    Ok(price)
                } else {
                    Err(Error::PriceFetchFailed {
                        symbol: self.symbol.clone(),
                        reason: format!("provider returned {}", price),
                    })
                }
            });

        match fetched {
            Ok(price) => {
                let quote = Arc::new(PriceQuote::new(&self.symbol, price, now));
                if let Err(e) = self.store.update(GLOBAL_SCOPE, &*quote).await {
                    warn!("Failed to persist {} quote: {}", self.symbol, e);
                }
                info!("{} price refreshed: ${:.4}", self.symbol, price);
                *current = Some(Arc::clone(&quote));
                Ok(PriceReading {
                    quote,
                    freshness: Freshness::Fresh,
                })
            }
            Err(e) => match current.as_ref() {
                Some(previous) => {
                    warn!(
                        "Price fetch for {} failed, serving quote from {}: {}",
                        self.symbol, previous.captured_at, e
                    );
                    Ok(PriceReading {
                        quote: Arc::clone(previous),
                        freshness: Freshness::Stale,
                    })
                }
                None => Err(Error::PriceFetchFailed {
                    symbol: self.symbol.clone(),
                    reason: e.to_string(),
                }),
            },
        }
    }

    async fn load_persisted(&self) -> Option<PriceQuote> {
        match self.store.find::<PriceQuote>(GLOBAL_SCOPE, &self.symbol).await {
            Ok(quote) => {
                if let Some(q) = &quote {
                    debug!("Loaded persisted {} quote from {}", q.asset_symbol, q.captured_at);
                }
                quote
            }
            Err(e) => {
                warn!("Failed to load persisted {} quote: {}", self.symbol, e);
                None
            }
        }
    }
}

#[async_trait]
impl<P: QuoteProvider, S: Repository> PriceSource for PriceCache<P, S> {
    async fn current_price(&self) -> Result<PriceReading> {
        self.get_price().await
    }
}

/// Replays a fixed list of provider responses
#[cfg(test)]
pub(crate) struct ScriptedQuotes {
    responses: std::sync::Mutex<std::collections::VecDeque<Result<f64>>>,
    pub calls: std::sync::atomic::AtomicUsize,
}

#[cfg(test)]
impl ScriptedQuotes {
    pub fn new(responses: Vec<Result<f64>>) -> Self {
        Self {
            responses: std::sync::Mutex::new(responses.into()),
            calls: Default::default(),
        }
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(std::sync::atomic::Ordering::SeqCst)
    }
}

#[cfg(test)]
#[async_trait]
impl QuoteProvider for ScriptedQuotes {
    async fn fetch_usd(&self, _symbol: &str) -> Result<f64> {
        self.calls.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
        self.responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(Error::Rpc {
                step: "fetchPrice",
                message: "no scripted response".to_string(),
                transient: false,
            }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{init_test_db, Database};

    fn unreachable() -> Error {
        Error::Rpc {
            step: "fetchPrice",
            message: "connection refused".to_string(),
            transient: true,
        }
    }

    async fn cache(responses: Vec<Result<f64>>) -> PriceCache<ScriptedQuotes, Database> {
        let db = Arc::new(init_test_db().await.unwrap());
        PriceCache::new(ScriptedQuotes::new(responses), db, "SOL", Duration::minutes(30))
    }

    #[tokio::test]
    async fn fresh_quote_is_reused_without_fetching() {
        let cache = cache(vec![Ok(150.0)]).await;
        let now = Utc::now();

        let first = cache.get_price_at(now).await.unwrap();
        let second = cache.get_price_at(now + Duration::minutes(29)).await.unwrap();

        assert!(Arc::ptr_eq(&first.quote, &second.quote));
        assert_eq!(cache.provider.call_count(), 1);
        assert_eq!(second.freshness, Freshness::Fresh);
    }

    #[tokio::test]
    async fn expired_quote_triggers_exactly_one_refetch() {
        let cache = cache(vec![Ok(150.0), Ok(160.0)]).await;
        let now = Utc::now();

        cache.get_price_at(now).await.unwrap();
        let later = now + Duration::minutes(31);
        let refreshed = cache.get_price_at(later).await.unwrap();
        let again = cache.get_price_at(later).await.unwrap();

        assert_eq!(refreshed.quote.price_usd, 160.0);
        assert!(Arc::ptr_eq(&refreshed.quote, &again.quote));
        assert_eq!(cache.provider.call_count(), 2);
    }

    #[tokio::test]
    async fn provider_failure_serves_previous_quote_flagged_stale() {
        let cache = cache(vec![Ok(150.0), Err(unreachable())]).await;
        let now = Utc::now();

        cache.get_price_at(now).await.unwrap();
        let reading = cache.get_price_at(now + Duration::hours(2)).await.unwrap();

        assert_eq!(reading.freshness, Freshness::Stale);
        assert_eq!(reading.quote.price_usd, 150.0);
        assert!(matches!(reading.require_fresh(), Err(Error::StaleQuote { .. })));
    }

    #[tokio::test]
    async fn failure_without_any_quote_is_an_error() {
        let cache = cache(vec![Err(unreachable())]).await;
        let err = cache.get_price().await.unwrap_err();
        assert!(matches!(err, Error::PriceFetchFailed { ref symbol, .. } if symbol == "SOL"));
    }

    #[tokio::test]
    async fn persisted_quote_survives_a_new_cache() {
        let db = Arc::new(init_test_db().await.unwrap());
        let now = Utc::now();

        let first = PriceCache::new(ScriptedQuotes::new(vec![Ok(150.0)]), db.clone(), "SOL", Duration::minutes(30));
        first.get_price_at(now).await.unwrap();

        let second = PriceCache::new(ScriptedQuotes::new(vec![]), db, "sol", Duration::minutes(30));
        let reading = second.get_price_at(now + Duration::minutes(5)).await.unwrap();

        assert_eq!(reading.quote.price_usd, 150.0);
        assert_eq!(second.provider.call_count(), 0);
    }

    #[test]
    fn sol_maps_to_provider_id() {
        assert_eq!(HttpQuoteProvider::asset_id("sol"), "solana");
        assert_eq!(HttpQuoteProvider::asset_id("BONK"), "bonk");
    }
}
