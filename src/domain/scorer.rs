//! Per-coin train-and-score step.
//!
//! growth = (predicted - actual) / actual, where `predicted` is the model's
//! output for the last feature row after fitting on every row, and `actual` is
//! that row's recorded target.

use crate::domain::error::AdvisorError;
use crate::domain::features::FeatureTable;
use crate::domain::model::Regressor;
use crate::domain::model::forest::{ForestConfig, RandomForest};
use tracing::info;

#[derive(Debug, Clone, PartialEq)]
pub struct GrowthScore {
    pub symbol: String,
    pub current_price: f64,
    pub predicted_price: f64,
    pub growth: f64,
}

pub trait Scorer: Send + Sync {
    fn score(&self, symbol: &str, table: &FeatureTable) -> Result<GrowthScore, AdvisorError>;

    fn score_growth(&self, symbol: &str, table: &FeatureTable) -> Result<f64, AdvisorError> {
        self.score(symbol, table).map(|s| s.growth)
    }
}

/// Fits any [`Regressor`] and derives the growth score from it.
pub fn score_with(
    model: &mut dyn Regressor,
    symbol: &str,
    table: &FeatureTable,
) -> Result<GrowthScore, AdvisorError> {
    let last = *table.last().ok_or_else(|| AdvisorError::InsufficientData {
        symbol: symbol.to_string(),
        rows: 0,
        minimum: 1,
    })?;

    let actual = last.target_price;
    if actual == 0.0 || !actual.is_finite() {
        return Err(AdvisorError::Model {
            reason: format!("latest price for {symbol} is {actual}, growth undefined"),
        });
    }

    model.fit(&table.feature_matrix(), &table.targets())?;
    let predicted = model.predict(&last.features())?;
    let growth = (predicted - actual) / actual;

    info!(
        symbol,
        model = model.name(),
        "Current={:.2} Predicted={:.2} Growth={:.4}",
        actual,
        predicted,
        growth
    );

    Ok(GrowthScore {
        symbol: symbol.to_string(),
        current_price: actual,
        predicted_price: predicted,
        growth,
    })
}

/// Default scorer: a fresh standardized random forest per coin.
#[derive(Debug, Clone, Default)]
pub struct ForestScorer {
    config: ForestConfig,
}

impl ForestScorer {
    pub fn new(config: ForestConfig) -> Self {
        Self { config }
    }
}

impl Scorer for ForestScorer {
    fn score(&self, symbol: &str, table: &FeatureTable) -> Result<GrowthScore, AdvisorError> {
        let mut model = RandomForest::new(self.config.clone());
        score_with(&mut model, symbol, table)
    }
}
