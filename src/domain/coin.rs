//! Coin universe: the ordered set of coins evaluated per advisor run.
//!
//! Order matters. Ties between equal growth scores resolve to the coin that
//! appears first in the universe, so the universe is a list, never a map.

use std::collections::HashSet;

/// A provider id (e.g. `bitcoin`) paired with its ticker symbol (e.g. `BTC`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Coin {
    pub id: String,
    pub symbol: String,
}

impl Coin {
    pub fn new(id: impl Into<String>, symbol: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            symbol: symbol.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Universe {
    pub coins: Vec<Coin>,
}

impl Universe {
    pub fn new(coins: Vec<Coin>) -> Self {
        Self { coins }
    }

    pub fn count(&self) -> usize {
        self.coins.len()
    }

    pub fn is_empty(&self) -> bool {
        self.coins.is_empty()
    }

    pub fn ids(&self) -> Vec<&str> {
        self.coins.iter().map(|c| c.id.as_str()).collect()
    }

    pub fn find(&self, id: &str) -> Option<&Coin> {
        self.coins.iter().find(|c| c.id == id)
    }
}

const DEFAULT_COINS: [(&str, &str); 10] = [
    ("bitcoin", "BTC"),
    ("ethereum", "ETH"),
    ("tether", "USDT"),
    ("binancecoin", "BNB"),
    ("solana", "SOL"),
    ("usd-coin", "USDC"),
    ("ripple", "XRP"),
    ("cardano", "ADA"),
    ("dogecoin", "DOGE"),
    ("avalanche-2", "AVAX"),
];

pub fn default_universe() -> Universe {
    Universe::new(
        DEFAULT_COINS
            .iter()
            .map(|(id, symbol)| Coin::new(*id, *symbol))
            .collect(),
    )
}

#[derive(Debug, Clone, thiserror::Error)]
pub enum UniverseError {
    #[error("empty token in coin list")]
    EmptyToken,

    #[error("malformed coin entry '{0}' (expected id:SYMBOL)")]
    MalformedEntry(String),

    #[error("duplicate coin: {0}")]
    DuplicateCoin(String),
}

/// Parses `id:SYMBOL` pairs separated by commas, e.g. `bitcoin:BTC,ethereum:ETH`.
///
/// Ids are lowercased, symbols uppercased. A bare id without a symbol uses the
/// uppercased id as its symbol.
pub fn parse_coins(input: &str) -> Result<Universe, UniverseError> {
    let mut coins = Vec::new();
    let mut seen = HashSet::new();

    for token in input.split(',') {
        let trimmed = token.trim();
        if trimmed.is_empty() {
            return Err(UniverseError::EmptyToken);
        }

        let (id, symbol) = match trimmed.split_once(':') {
            Some((id, symbol)) => (id.trim(), symbol.trim()),
            None => (trimmed, trimmed),
        };
        if id.is_empty() || symbol.is_empty() || symbol.contains(':') {
            return Err(UniverseError::MalformedEntry(trimmed.to_string()));
        }

        let id = id.to_lowercase();
        if !seen.insert(id.clone()) {
            return Err(UniverseError::DuplicateCoin(id));
        }
        coins.push(Coin::new(id, symbol.to_uppercase()));
    }

    Ok(Universe::new(coins))
}
