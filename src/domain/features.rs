//! Sliding-window feature extraction.
//!
//! Row i (for every i >= 7) is built from the seven prices before it:
//!
//! - previous price: P[i-1]
//! - MA3: mean(P[i-3..i])
//! - MA7: mean(P[i-7..i])
//! - volatility3: population stddev of P[i-3..i] around MA3
//! - target: P[i]
//!
//! A series of length L therefore yields max(0, L - 7) rows.

use crate::domain::price_series::PriceSeries;

pub const WINDOW: usize = 7;

/// Rows required before a coin is worth scoring; equivalent to 12 prices.
pub const MIN_FEATURE_ROWS: usize = 5;

pub const N_FEATURES: usize = 4;

pub const FEATURE_NAMES: [&str; N_FEATURES] = ["prev_price", "ma3", "ma7", "volatility3"];

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FeatureRow {
    pub previous_price: f64,
    pub moving_avg_3: f64,
    pub moving_avg_7: f64,
    pub volatility_3: f64,
    pub target_price: f64,
}

impl FeatureRow {
    pub fn features(&self) -> [f64; N_FEATURES] {
        [
            self.previous_price,
            self.moving_avg_3,
            self.moving_avg_7,
            self.volatility_3,
        ]
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct FeatureTable {
    pub rows: Vec<FeatureRow>,
}

impl FeatureTable {
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn last(&self) -> Option<&FeatureRow> {
        self.rows.last()
    }

    pub fn feature_matrix(&self) -> Vec<[f64; N_FEATURES]> {
        self.rows.iter().map(FeatureRow::features).collect()
    }

    pub fn targets(&self) -> Vec<f64> {
        self.rows.iter().map(|r| r.target_price).collect()
    }
}

pub fn build_features(series: &PriceSeries) -> FeatureTable {
    build_features_from_prices(&series.prices())
}

pub fn build_features_from_prices(prices: &[f64]) -> FeatureTable {
    if prices.len() <= WINDOW {
        return FeatureTable::default();
    }

    let rows = (WINDOW..prices.len())
        .map(|i| {
            let last3 = &prices[i - 3..i];
            let last7 = &prices[i - WINDOW..i];
            let ma3 = mean(last3);

            FeatureRow {
                previous_price: prices[i - 1],
                moving_avg_3: ma3,
                moving_avg_7: mean(last7),
                volatility_3: population_stddev(last3, ma3),
                target_price: prices[i],
            }
        })
        .collect();

    FeatureTable { rows }
}

fn mean(values: &[f64]) -> f64 {
    values.iter().sum::<f64>() / values.len() as f64
}

fn population_stddev(values: &[f64], mean: f64) -> f64 {
    let variance = values
        .iter()
        .map(|v| {
            let diff = v - mean;
            diff * diff
        })
        .sum::<f64>()
        / values.len() as f64;
    variance.sqrt()
}
