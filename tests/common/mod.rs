#![allow(dead_code)]

use chrono::{DateTime, Duration as ChronoDuration, TimeZone, Utc};
use coinadvisor::domain::cancellation::CancellationToken;
use coinadvisor::domain::coin::{Coin, Universe};
use coinadvisor::domain::error::AdvisorError;
use coinadvisor::domain::features::FeatureTable;
use coinadvisor::domain::price_series::{PricePoint, PriceSeries};
use coinadvisor::domain::scorer::{GrowthScore, Scorer};
use coinadvisor::ports::clock_port::ClockPort;
use coinadvisor::ports::http_port::{HttpPort, HttpResponse};
use coinadvisor::ports::market_data_port::MarketDataPort;
use parking_lot::Mutex;
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread;
use std::time::Duration;

/// Replays canned HTTP responses in order and records every requested URL.
pub struct ScriptedHttp {
    responses: Mutex<VecDeque<HttpResponse>>,
    calls: Mutex<Vec<String>>,
}

impl ScriptedHttp {
    pub fn new(responses: Vec<(u16, &str)>) -> Arc<Self> {
        Arc::new(Self {
            responses: Mutex::new(
                responses
                    .into_iter()
                    .map(|(status, body)| HttpResponse {
                        status,
                        body: body.to_string(),
                    })
                    .collect(),
            ),
            calls: Mutex::new(Vec::new()),
        })
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().len()
    }
}

impl HttpPort for ScriptedHttp {
    fn get(&self, url: &str) -> Result<HttpResponse, AdvisorError> {
        self.calls.lock().push(url.to_string());
        self.responses
            .lock()
            .pop_front()
            .ok_or_else(|| AdvisorError::Network {
                reason: "no scripted response left".to_string(),
            })
    }
}

/// Clock that only moves when told to.
pub struct ManualClock(Mutex<DateTime<Utc>>);

impl ManualClock {
    pub fn new() -> Arc<Self> {
        Arc::new(Self(Mutex::new(Utc::now())))
    }

    pub fn advance(&self, by: ChronoDuration) {
        *self.0.lock() += by;
    }
}

impl ClockPort for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.0.lock()
    }
}

/// In-memory market data keyed by coin id.
pub struct MockMarketData {
    series: HashMap<String, PriceSeries>,
    errors: HashMap<String, String>,
    delay: Duration,
    cancel_on_call: Option<(usize, CancellationToken)>,
    calls: AtomicUsize,
    days: Mutex<Vec<u32>>,
}

impl MockMarketData {
    pub fn new() -> Self {
        Self {
            series: HashMap::new(),
            errors: HashMap::new(),
            delay: Duration::ZERO,
            cancel_on_call: None,
            calls: AtomicUsize::new(0),
            days: Mutex::new(Vec::new()),
        }
    }

    pub fn with_series(mut self, coin_id: &str, prices: &[f64]) -> Self {
        self.series
            .insert(coin_id.to_string(), make_series(coin_id, prices));
        self
    }

    pub fn with_error(mut self, coin_id: &str, reason: &str) -> Self {
        self.errors.insert(coin_id.to_string(), reason.to_string());
        self
    }

    /// Every history fetch sleeps this long first.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Cancels `token` from inside the `n`th history fetch (1-based).
    pub fn cancelling_on_call(mut self, n: usize, token: CancellationToken) -> Self {
        self.cancel_on_call = Some((n, token));
        self
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Lookback passed to each history fetch, in call order.
    pub fn requested_days(&self) -> Vec<u32> {
        self.days.lock().clone()
    }
}

impl MarketDataPort for MockMarketData {
    fn current_prices(&self, universe: &Universe) -> Result<HashMap<String, f64>, AdvisorError> {
        Ok(universe
            .coins
            .iter()
            .filter_map(|coin| {
                self.series
                    .get(&coin.id)
                    .and_then(|s| s.latest())
                    .map(|p| (coin.symbol.clone(), p.price))
            })
            .collect())
    }

    fn historical_series(&self, coin_id: &str, days: u32) -> Result<PriceSeries, AdvisorError> {
        let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        self.days.lock().push(days);
        if let Some((at, token)) = &self.cancel_on_call {
            if *at == n {
                token.cancel();
            }
        }
        if !self.delay.is_zero() {
            thread::sleep(self.delay);
        }
        if let Some(reason) = self.errors.get(coin_id) {
            return Err(AdvisorError::Network {
                reason: reason.clone(),
            });
        }
        Ok(self
            .series
            .get(coin_id)
            .cloned()
            .unwrap_or_else(|| PriceSeries::new(coin_id, Vec::new())))
    }
}

/// Returns a fixed growth per symbol and records which symbols were scored.
pub struct FixedScorer {
    growth: HashMap<String, f64>,
    scored: Mutex<Vec<String>>,
}

impl FixedScorer {
    pub fn new(growth: &[(&str, f64)]) -> Self {
        Self {
            growth: growth
                .iter()
                .map(|(symbol, g)| (symbol.to_string(), *g))
                .collect(),
            scored: Mutex::new(Vec::new()),
        }
    }

    pub fn scored(&self) -> Vec<String> {
        self.scored.lock().clone()
    }
}

impl Scorer for FixedScorer {
    fn score(&self, symbol: &str, table: &FeatureTable) -> Result<GrowthScore, AdvisorError> {
        self.scored.lock().push(symbol.to_string());
        let growth = *self.growth.get(symbol).ok_or_else(|| AdvisorError::Model {
            reason: format!("no fixed score for {symbol}"),
        })?;
        let current = table.last().map(|r| r.target_price).unwrap_or(1.0);
        Ok(GrowthScore {
            symbol: symbol.to_string(),
            current_price: current,
            predicted_price: current * (1.0 + growth),
            growth,
        })
    }
}

pub fn make_series(coin_id: &str, prices: &[f64]) -> PriceSeries {
    let start = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
    PriceSeries::new(
        coin_id,
        prices
            .iter()
            .enumerate()
            .map(|(i, &price)| PricePoint {
                timestamp: start + ChronoDuration::days(i as i64),
                price,
            })
            .collect(),
    )
}

/// `n` prices growing by `pct` per step from `start`.
pub fn rising_prices(n: usize, start: f64, pct: f64) -> Vec<f64> {
    (0..n).map(|i| start * (1.0 + pct).powi(i as i32)).collect()
}

pub fn universe(pairs: &[(&str, &str)]) -> Universe {
    Universe::new(pairs.iter().map(|(id, sym)| Coin::new(*id, *sym)).collect())
}

/// CoinGecko `market_chart` body for daily prices starting 2024-01-01.
pub fn market_chart_json(prices: &[f64]) -> String {
    let start = Utc
        .with_ymd_and_hms(2024, 1, 1, 0, 0, 0)
        .unwrap()
        .timestamp_millis();
    let pairs: Vec<String> = prices
        .iter()
        .enumerate()
        .map(|(i, p)| format!("[{},{}]", start + i as i64 * 86_400_000, p))
        .collect();
    format!(
        r#"{{"prices":[{}],"market_caps":[],"total_volumes":[]}}"#,
        pairs.join(",")
    )
}
