//! CoinGecko market-data source.
//!
//! Every read goes cache → rate limiter → HTTP. A 429 is retried exactly once
//! after `retry_backoff`; a second 429 is `RateLimitExceeded`. Payloads are
//! decoded before they are cached, so a bad response never poisons the cache.
//! A cached payload that no longer decodes is treated as a miss and refetched.

use crate::adapters::cache::{
    CURRENT_PRICES_KEY, Cache, historical_batch_key, historical_key,
};
use crate::adapters::rate_limiter::RateLimiter;
use crate::domain::coin::Universe;
use crate::domain::error::AdvisorError;
use crate::domain::price_series::{
    PriceSeries, decode_current_prices, decode_market_chart, decode_price_batch,
    encode_price_batch,
};
use crate::ports::http_port::{HttpPort, HttpResponse};
use crate::ports::market_data_port::MarketDataPort;
use std::collections::HashMap;
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use tracing::{debug, info, warn};

pub const DEFAULT_BASE_URL: &str = "https://api.coingecko.com/api/v3";

const TOO_MANY_REQUESTS: u16 = 429;

#[derive(Debug, Clone, PartialEq)]
pub struct SourceSettings {
    pub base_url: String,
    pub retry_backoff: Duration,
}

impl Default for SourceSettings {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            retry_backoff: Duration::from_secs(5),
        }
    }
}

pub struct CoinGeckoSource {
    http: Arc<dyn HttpPort>,
    limiter: Arc<RateLimiter>,
    price_cache: Cache,
    history_cache: Cache,
    settings: SourceSettings,
}

impl CoinGeckoSource {
    pub fn new(
        http: Arc<dyn HttpPort>,
        limiter: Arc<RateLimiter>,
        price_cache: Cache,
        history_cache: Cache,
        settings: SourceSettings,
    ) -> Self {
        Self {
            http,
            limiter,
            price_cache,
            history_cache,
            settings,
        }
    }

    pub fn current_prices_url(&self, universe: &Universe) -> String {
        format!(
            "{}/simple/price?ids={}&vs_currencies=usd",
            self.base_url(),
            universe.ids().join(",")
        )
    }

    pub fn market_chart_url(&self, coin_id: &str, days: u32) -> String {
        format!(
            "{}/coins/{}/market_chart?vs_currency=usd&days={}&interval=daily",
            self.base_url(),
            coin_id,
            days
        )
    }

    fn base_url(&self) -> &str {
        self.settings.base_url.trim_end_matches('/')
    }

    /// Daily prices for every coin in the universe, keyed by symbol.
    ///
    /// The combined result is cached as one payload under the long TTL, but
    /// only when every coin produced a history. Coins whose history cannot be
    /// fetched are logged and left out, and are retried on the next call.
    pub fn historical_prices(
        &self,
        universe: &Universe,
        days: u32,
    ) -> Result<HashMap<String, Vec<f64>>, AdvisorError> {
        let key = historical_batch_key(days);
        if let Some(hit) = self.history_cache.get_fresh(&key) {
            match decode_price_batch(universe, &hit.payload) {
                Ok(batch) if covers_universe(universe, &batch) => {
                    info!(days, "using cached historical prices");
                    return Ok(batch);
                }
                Ok(_) => debug!(key = %key, "cached batch does not cover universe, refetching"),
                Err(e) => {
                    warn!(error = %corruption(&key, &e), "refetching");
                    self.history_cache.forget(&key);
                }
            }
        }

        let mut by_id = HashMap::new();
        let mut by_symbol = HashMap::new();
        for coin in &universe.coins {
            match self.historical_series(&coin.id, days) {
                Ok(series) if !series.is_empty() => {
                    let prices = series.prices();
                    by_id.insert(coin.id.clone(), prices.clone());
                    by_symbol.insert(coin.symbol.clone(), prices);
                }
                Ok(_) => warn!(coin = %coin.id, "empty price history"),
                Err(e) => warn!(coin = %coin.id, error = %e, "failed to fetch price history"),
            }
        }

        let missing = universe
            .coins
            .iter()
            .filter(|coin| !by_id.contains_key(&coin.id))
            .count();
        if missing > 0 {
            warn!(missing, days, "incomplete historical batch, not caching");
            return Ok(by_symbol);
        }

        match encode_price_batch(&by_id) {
            Ok(payload) => {
                if let Err(e) = self.history_cache.put(&key, &payload) {
                    warn!(key = %key, error = %e, "failed to write cache");
                }
            }
            Err(e) => warn!(key = %key, error = %e, "failed to encode historical batch"),
        }

        Ok(by_symbol)
    }

    /// `covers` decides whether a fresh cached value answers this request; a
    /// cached value it rejects is refetched without being treated as corrupt.
    fn fetch_cached<T>(
        &self,
        cache: &Cache,
        key: &str,
        url: &str,
        decode: impl Fn(&str) -> Result<T, AdvisorError>,
        covers: impl Fn(&T) -> bool,
    ) -> Result<T, AdvisorError> {
        if let Some(hit) = cache.get_fresh(key) {
            match decode(&hit.payload) {
                Ok(value) if covers(&value) => {
                    debug!(key, age_secs = hit.age.num_seconds(), "cache hit");
                    return Ok(value);
                }
                Ok(_) => debug!(key, "cached payload does not cover request, refetching"),
                Err(e) => {
                    warn!(error = %corruption(key, &e), "refetching");
                    cache.forget(key);
                }
            }
        }

        let body = self.fetch(url)?;
        let value = decode(&body)?;
        if let Err(e) = cache.put(key, &body) {
            warn!(key, error = %e, "failed to write cache");
        }
        Ok(value)
    }

    fn fetch(&self, url: &str) -> Result<String, AdvisorError> {
        let mut response = self.request(url)?;

        if response.status == TOO_MANY_REQUESTS {
            warn!(
                url,
                backoff_ms = self.settings.retry_backoff.as_millis() as u64,
                "rate limit hit, retrying once"
            );
            thread::sleep(self.settings.retry_backoff);
            response = self.request(url)?;
            if response.status == TOO_MANY_REQUESTS {
                return Err(AdvisorError::RateLimitExceeded {
                    url: url.to_string(),
                });
            }
        }

        if !response.is_success() {
            return Err(AdvisorError::HttpStatus {
                status: response.status,
                url: url.to_string(),
            });
        }

        Ok(response.body)
    }

    fn request(&self, url: &str) -> Result<HttpResponse, AdvisorError> {
        self.limiter.acquire();
        debug!(url, "GET");
        self.http.get(url)
    }
}

/// Every coin in the universe has an entry, keyed by symbol.
fn covers_universe<V>(universe: &Universe, by_symbol: &HashMap<String, V>) -> bool {
    universe
        .coins
        .iter()
        .all(|coin| by_symbol.contains_key(&coin.symbol))
}

fn corruption(key: &str, cause: &AdvisorError) -> AdvisorError {
    AdvisorError::CacheCorruption {
        key: key.to_string(),
        reason: cause.to_string(),
    }
}

impl MarketDataPort for CoinGeckoSource {
    fn current_prices(&self, universe: &Universe) -> Result<HashMap<String, f64>, AdvisorError> {
        let url = self.current_prices_url(universe);
        self.fetch_cached(
            &self.price_cache,
            CURRENT_PRICES_KEY,
            &url,
            |payload| decode_current_prices(universe, payload),
            |prices| covers_universe(universe, prices),
        )
    }

    fn historical_series(&self, coin_id: &str, days: u32) -> Result<PriceSeries, AdvisorError> {
        let key = historical_key(coin_id, days);
        let url = self.market_chart_url(coin_id, days);
        self.fetch_cached(
            &self.history_cache,
            &key,
            &url,
            |payload| decode_market_chart(coin_id, payload),
            |_| true,
        )
    }
}
