//! Market data access port.

use crate::domain::coin::Universe;
use crate::domain::error::AdvisorError;
use crate::domain::price_series::PriceSeries;
use std::collections::HashMap;

pub trait MarketDataPort: Send + Sync {
    /// Latest USD price per ticker symbol. Coins the provider omits are absent.
    fn current_prices(&self, universe: &Universe) -> Result<HashMap<String, f64>, AdvisorError>;

    /// Daily prices for one coin over the last `days` days, oldest first.
    fn historical_series(&self, coin_id: &str, days: u32) -> Result<PriceSeries, AdvisorError>;
}
