//! USD price oracle
//!
//! One CoinGecko round trip covers every external price the engine needs.
//! Prices land in an owned, shared cache keyed by symbol; chain math pulls
//! from the cache and never blocks on HTTP mid-computation.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use reqwest::Client;
use serde::Deserialize;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, warn};

use crate::error::MetricsError;

// ============================================
// CONSTANTS
// ============================================

pub const DEFAULT_PRICE_API_URL: &str = "https://api.coingecko.com/api/v3/simple/price";

const API_TIMEOUT_SECS: u64 = 10;

/// Cached prices older than this should be refreshed before display.
pub const DEFAULT_MAX_PRICE_AGE: Duration = Duration::from_secs(300);

/// Refreshes landing inside this window ride on the previous one.
const REFRESH_COALESCE_SECS: u64 = 2;

/// Feed id on the price API mapped to the symbol the engine uses.
const PRICE_FEED_IDS: &[(&str, &str)] = &[
    ("fantom", "FTM"),
    ("dai", "DAI"),
    ("ethereum", "ETH"),
    ("soul-swap", "SOUL"),
];

// ============================================
// RESPONSE TYPES
// ============================================

#[derive(Debug, Deserialize)]
struct UsdQuote {
    usd: f64,
}

// ============================================
// ORACLE
// ============================================

#[derive(Clone)]
pub struct PriceOracle {
    http_client: Client,
    api_url: String,
    cache: Arc<RwLock<HashMap<String, f64>>>,
    refresh_gate: Arc<Mutex<()>>,
    last_refresh: Arc<RwLock<Option<Instant>>>,
}

impl PriceOracle {
    pub fn new(api_url: impl Into<String>) -> Self {
        let http_client = Client::builder()
            .timeout(Duration::from_secs(API_TIMEOUT_SECS))
            .build()
            .expect("Failed to create HTTP client");

        Self {
            http_client,
            api_url: api_url.into(),
            cache: Arc::new(RwLock::new(HashMap::new())),
            refresh_gate: Arc::new(Mutex::new(())),
            last_refresh: Arc::new(RwLock::new(None)),
        }
    }

    /// Pull every tracked feed in one request and update the cache.
    /// Concurrent callers coalesce onto a single in-flight fetch.
    pub async fn refresh(&self) -> Result<(), MetricsError> {
        let _gate = self.refresh_gate.lock().await;

        // another caller may have refreshed while we waited on the gate
        if let Some(at) = *self.last_refresh.read().await {
            if at.elapsed() < Duration::from_secs(REFRESH_COALESCE_SECS) {
                return Ok(());
            }
        }

        let ids: Vec<&str> = PRICE_FEED_IDS.iter().map(|(id, _)| *id).collect();
        let url = format!("{}?ids={}&vs_currencies=usd", self.api_url, ids.join(","));

        let response: HashMap<String, UsdQuote> = self
            .http_client
            .get(&url)
            .send()
            .await
            .map_err(|e| MetricsError::Provider(format!("price fetch failed: {}", e)))?
            .json()
            .await
            .map_err(|e| MetricsError::Provider(format!("price response malformed: {}", e)))?;

        let mut cache = self.cache.write().await;
        for (id, symbol) in PRICE_FEED_IDS {
            match response.get(*id) {
                Some(quote) if quote.usd.is_finite() && quote.usd > 0.0 && quote.usd < 1e12 => {
                    cache.insert(symbol.to_string(), quote.usd);
                    debug!("price {} = ${}", symbol, quote.usd);
                }
                Some(quote) => {
                    warn!("price feed returned garbage for {}: {}", id, quote.usd);
                }
                None => {
                    warn!("price feed missing id {}", id);
                }
            }
        }
        drop(cache);

        *self.last_refresh.write().await = Some(Instant::now());
        Ok(())
    }

    pub async fn get(&self, symbol: &str) -> Option<f64> {
        self.cache.read().await.get(symbol).copied()
    }

    /// A cache miss here is a hard error for the computation that needed it.
    pub async fn usd_price(&self, symbol: &str) -> Result<f64, MetricsError> {
        self.get(symbol).await.ok_or(MetricsError::PriceUnavailable {
            symbol: symbol.to_string(),
        })
    }

    /// Seed or override a single price, e.g. a configured fallback when the
    /// feed is down.
    pub async fn set(&self, symbol: &str, price: f64) {
        self.cache.write().await.insert(symbol.to_string(), price);
    }

    /// When the last successful feed pull completed, if ever.
    pub async fn last_refreshed(&self) -> Option<Instant> {
        *self.last_refresh.read().await
    }

    /// True when no pull has succeeded within `max_age`.
    pub async fn is_stale(&self, max_age: Duration) -> bool {
        match *self.last_refresh.read().await {
            Some(at) => at.elapsed() > max_age,
            None => true,
        }
    }
}

// ============================================
// TESTS
// ============================================

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_set_and_get_round_trip() {
        let oracle = PriceOracle::new(DEFAULT_PRICE_API_URL);
        oracle.set("DAI", 0.999).await;
        assert_eq!(oracle.get("DAI").await, Some(0.999));
        assert_eq!(oracle.get("FTM").await, None);
    }

    #[tokio::test]
    async fn test_missing_price_is_a_typed_error() {
        let oracle = PriceOracle::new(DEFAULT_PRICE_API_URL);
        let err = oracle.usd_price("FTM").await.unwrap_err();
        assert_eq!(
            err,
            MetricsError::PriceUnavailable {
                symbol: "FTM".to_string()
            }
        );

        oracle.set("FTM", 0.42).await;
        assert_eq!(oracle.usd_price("FTM").await.unwrap(), 0.42);
    }

    #[tokio::test]
    async fn test_never_refreshed_is_stale() {
        let oracle = PriceOracle::new(DEFAULT_PRICE_API_URL);
        assert!(oracle.last_refreshed().await.is_none());
        assert!(oracle.is_stale(DEFAULT_MAX_PRICE_AGE).await);
        assert!(oracle.is_stale(Duration::from_secs(0)).await);
    }

    #[test]
    fn test_feed_ids_cover_engine_symbols() {
        let symbols: Vec<&str> = PRICE_FEED_IDS.iter().map(|(_, s)| *s).collect();
        for needed in ["FTM", "DAI", "ETH", "SOUL"] {
            assert!(symbols.contains(&needed), "missing feed for {}", needed);
        }
    }
}
