//! Price series and decoding of the remote API's JSON payloads.
//!
//! Payloads are cached verbatim, so decoding happens on every read, cached or
//! not. A payload that fails to decode here is what the market-data source
//! treats as a corrupt cache entry.

use crate::domain::coin::Universe;
use crate::domain::error::AdvisorError;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PricePoint {
    pub timestamp: DateTime<Utc>,
    pub price: f64,
}

/// Chronologically ordered prices for one coin.
#[derive(Debug, Clone, PartialEq)]
pub struct PriceSeries {
    pub coin_id: String,
    pub points: Vec<PricePoint>,
}

impl PriceSeries {
    pub fn new(coin_id: impl Into<String>, points: Vec<PricePoint>) -> Self {
        Self {
            coin_id: coin_id.into(),
            points,
        }
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn prices(&self) -> Vec<f64> {
        self.points.iter().map(|p| p.price).collect()
    }

    pub fn latest(&self) -> Option<&PricePoint> {
        self.points.last()
    }
}

#[derive(Debug, Deserialize)]
struct MarketChart {
    prices: Vec<(f64, f64)>,
}

/// Decodes a `market_chart` payload: `{"prices": [[timestamp_ms, price], ...], ...}`.
///
/// Points are sorted by timestamp; the API already returns them in order, but a
/// hand-primed cache file might not.
pub fn decode_market_chart(coin_id: &str, payload: &str) -> Result<PriceSeries, AdvisorError> {
    let chart: MarketChart = serde_json::from_str(payload)
        .map_err(|e| AdvisorError::decode(format!("market chart for {coin_id}: {e}")))?;

    let mut points = Vec::with_capacity(chart.prices.len());
    for (ts_ms, price) in chart.prices {
        if !price.is_finite() {
            return Err(AdvisorError::decode(format!(
                "market chart for {coin_id}: non-finite price"
            )));
        }
        let timestamp = DateTime::<Utc>::from_timestamp_millis(ts_ms as i64).ok_or_else(|| {
            AdvisorError::decode(format!(
                "market chart for {coin_id}: timestamp {ts_ms} out of range"
            ))
        })?;
        points.push(PricePoint { timestamp, price });
    }
    points.sort_by_key(|p| p.timestamp);

    Ok(PriceSeries::new(coin_id, points))
}

#[derive(Debug, Deserialize)]
struct UsdQuote {
    usd: f64,
}

/// Decodes a `simple/price` payload: `{"bitcoin": {"usd": 50000.0}, ...}`.
///
/// The result is keyed by ticker symbol. Coins absent from the payload are
/// skipped.
pub fn decode_current_prices(
    universe: &Universe,
    payload: &str,
) -> Result<HashMap<String, f64>, AdvisorError> {
    let quotes: HashMap<String, UsdQuote> = serde_json::from_str(payload)
        .map_err(|e| AdvisorError::decode(format!("current prices: {e}")))?;

    Ok(universe
        .coins
        .iter()
        .filter_map(|coin| {
            quotes
                .get(&coin.id)
                .map(|quote| (coin.symbol.clone(), quote.usd))
        })
        .collect())
}

/// Decodes a batch historical payload: `{"bitcoin": [p0, p1, ...], ...}`, keyed
/// by ticker symbol.
pub fn decode_price_batch(
    universe: &Universe,
    payload: &str,
) -> Result<HashMap<String, Vec<f64>>, AdvisorError> {
    let batch: HashMap<String, Vec<f64>> = serde_json::from_str(payload)
        .map_err(|e| AdvisorError::decode(format!("historical batch: {e}")))?;

    Ok(universe
        .coins
        .iter()
        .filter_map(|coin| {
            batch
                .get(&coin.id)
                .map(|prices| (coin.symbol.clone(), prices.clone()))
        })
        .collect())
}

/// Encodes a batch historical payload keyed by coin id, the inverse of
/// [`decode_price_batch`].
pub fn encode_price_batch(batch: &HashMap<String, Vec<f64>>) -> Result<String, AdvisorError> {
    serde_json::to_string(batch).map_err(|e| AdvisorError::decode(e.to_string()))
}
