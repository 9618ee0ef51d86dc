//! CLI definition and dispatch.
//!
//! Command results go to stdout; progress, per-coin scores and errors go to
//! stderr.

use clap::{Parser, Subcommand};
use std::io;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use crate::adapters::cache::Cache;
use crate::adapters::coingecko_adapter::{CoinGeckoSource, DEFAULT_BASE_URL, SourceSettings};
use crate::adapters::csv_adapter;
use crate::adapters::file_config_adapter::FileConfigAdapter;
use crate::adapters::rate_limiter::RateLimiter;
use crate::adapters::reqwest_http_adapter::ReqwestHttpAdapter;
use crate::adapters::system_clock_adapter::SystemClock;
use crate::domain::advisor::{Advisor, AdvisorConfig, ExecutionMode};
use crate::domain::cancellation::CancellationToken;
use crate::domain::coin::{Universe, default_universe, parse_coins};
use crate::domain::config_validation::{parse_int, validate_config};
use crate::domain::error::AdvisorError;
use crate::domain::features::build_features;
use crate::domain::model::forest::ForestConfig;
use crate::domain::scorer::ForestScorer;
use crate::logging::LoggingConfig;
use crate::ports::clock_port::ClockPort;
use crate::ports::config_port::ConfigPort;
use crate::ports::market_data_port::MarketDataPort;

pub const DEFAULT_USER_AGENT: &str = "coinadvisor/0.1";
pub const DEFAULT_CACHE_DIR: &str = "data/cache";

#[derive(Parser, Debug)]
#[command(name = "coinadvisor", about = "Crypto market data and growth advisor")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Score every coin and print the one with the highest predicted growth
    Recommend {
        #[arg(short, long)]
        config: Option<PathBuf>,
        /// Lookback window in days
        #[arg(long, value_parser = clap::value_parser!(u32).range(1..))]
        days: Option<u32>,
        /// Score coins one at a time instead of on a worker pool
        #[arg(long)]
        sequential: bool,
        /// Coin list as id:SYMBOL pairs, e.g. bitcoin:BTC,ethereum:ETH
        #[arg(long)]
        coins: Option<String>,
    },
    /// Print current USD prices
    Prices {
        #[arg(short, long)]
        config: Option<PathBuf>,
        #[arg(long)]
        coins: Option<String>,
    },
    /// Summarise daily price history per coin
    History {
        #[arg(short, long)]
        config: Option<PathBuf>,
        #[arg(long, value_parser = clap::value_parser!(u32).range(1..))]
        days: Option<u32>,
        #[arg(long)]
        coins: Option<String>,
    },
    /// Print one coin's feature table as CSV
    Features {
        /// CoinGecko id, e.g. bitcoin
        #[arg(long)]
        coin: String,
        #[arg(short, long)]
        config: Option<PathBuf>,
        #[arg(long, value_parser = clap::value_parser!(u32).range(1..))]
        days: Option<u32>,
    },
    /// List the configured coin universe
    Coins {
        #[arg(short, long)]
        config: Option<PathBuf>,
    },
    /// Validate a configuration file
    Validate {
        #[arg(short, long)]
        config: PathBuf,
    },
}

pub fn run(cli: Cli) -> ExitCode {
    match cli.command {
        Command::Recommend {
            config,
            days,
            sequential,
            coins,
        } => run_recommend(config.as_ref(), days, sequential, coins.as_deref()),
        Command::Prices { config, coins } => run_prices(config.as_ref(), coins.as_deref()),
        Command::History {
            config,
            days,
            coins,
        } => run_history(config.as_ref(), days, coins.as_deref()),
        Command::Features { coin, config, days } => run_features(&coin, config.as_ref(), days),
        Command::Coins { config } => run_coins(config.as_ref()),
        Command::Validate { config } => run_validate(&config),
    }
}

pub fn load_config(path: &PathBuf) -> Result<FileConfigAdapter, ExitCode> {
    FileConfigAdapter::from_file(path).map_err(|e| {
        let err = AdvisorError::ConfigParse {
            file: path.display().to_string(),
            reason: e.to_string(),
        };
        eprintln!("error: {err}");
        ExitCode::from(&err)
    })
}

/// Loads (or defaults) the configuration, validates it and installs logging.
fn prepare(config_path: Option<&PathBuf>) -> Result<FileConfigAdapter, ExitCode> {
    let adapter = match config_path {
        Some(path) => load_config(path)?,
        None => FileConfigAdapter::empty(),
    };
    if let Err(e) = validate_config(&adapter) {
        eprintln!("error: {e}");
        return Err((&e).into());
    }
    LoggingConfig::from_config(&adapter).init();
    Ok(adapter)
}

fn fail(err: AdvisorError) -> ExitCode {
    eprintln!("error: {err}");
    (&err).into()
}

fn run_recommend(
    config_path: Option<&PathBuf>,
    days: Option<u32>,
    sequential: bool,
    coins: Option<&str>,
) -> ExitCode {
    let adapter = match prepare(config_path) {
        Ok(a) => a,
        Err(code) => return code,
    };

    let universe = match resolve_universe(coins, &adapter) {
        Ok(u) => u,
        Err(e) => return fail(e),
    };
    let mut advisor_config = match build_advisor_config(&adapter) {
        Ok(c) => c,
        Err(e) => return fail(e),
    };
    if let Some(days) = days {
        advisor_config.lookback_days = days;
    }
    if sequential {
        advisor_config.mode = ExecutionMode::Sequential;
    }
    let forest_config = match build_forest_config(&adapter) {
        Ok(c) => c,
        Err(e) => return fail(e),
    };
    let source = match build_source(&adapter) {
        Ok(s) => s,
        Err(e) => return fail(e),
    };

    eprintln!(
        "Scoring {} coins over {} days ({})",
        universe.count(),
        advisor_config.lookback_days,
        advisor_config.mode
    );

    let advisor = Advisor::new(
        Arc::new(source),
        Arc::new(ForestScorer::new(forest_config)),
        advisor_config,
    );
    let report = advisor.evaluate(&universe, &CancellationToken::new());

    for score in &report.scores {
        eprintln!(
            "  {:<6} current={:.4} predicted={:.4} growth={:+.4}",
            score.symbol, score.current_price, score.predicted_price, score.growth
        );
    }

    match report.recommendation {
        Some(symbol) => println!("{symbol}"),
        None => println!("no recommendation"),
    }
    ExitCode::SUCCESS
}

fn run_prices(config_path: Option<&PathBuf>, coins: Option<&str>) -> ExitCode {
    let adapter = match prepare(config_path) {
        Ok(a) => a,
        Err(code) => return code,
    };
    let universe = match resolve_universe(coins, &adapter) {
        Ok(u) => u,
        Err(e) => return fail(e),
    };
    let source = match build_source(&adapter) {
        Ok(s) => s,
        Err(e) => return fail(e),
    };

    let prices = match source.current_prices(&universe) {
        Ok(p) => p,
        Err(e) => return fail(e),
    };

    for coin in &universe.coins {
        match prices.get(&coin.symbol) {
            Some(price) => println!("{} {}", coin.symbol, price),
            None => eprintln!("warning: no price for {}", coin.id),
        }
    }
    ExitCode::SUCCESS
}

fn run_history(config_path: Option<&PathBuf>, days: Option<u32>, coins: Option<&str>) -> ExitCode {
    let adapter = match prepare(config_path) {
        Ok(a) => a,
        Err(code) => return code,
    };
    let universe = match resolve_universe(coins, &adapter) {
        Ok(u) => u,
        Err(e) => return fail(e),
    };
    let days = match days {
        Some(d) => d,
        None => match build_advisor_config(&adapter) {
            Ok(c) => c.lookback_days,
            Err(e) => return fail(e),
        },
    };
    let source = match build_source(&adapter) {
        Ok(s) => s,
        Err(e) => return fail(e),
    };

    let history = match source.historical_prices(&universe, days) {
        Ok(h) => h,
        Err(e) => return fail(e),
    };

    for coin in &universe.coins {
        match history.get(&coin.symbol) {
            Some(prices) if !prices.is_empty() => {
                let first = prices[0];
                let last = prices[prices.len() - 1];
                let change = if first != 0.0 {
                    (last - first) / first * 100.0
                } else {
                    0.0
                };
                println!(
                    "{} points={} first={:.4} last={:.4} change={:+.2}%",
                    coin.symbol,
                    prices.len(),
                    first,
                    last,
                    change
                );
            }
            _ => eprintln!("warning: no history for {}", coin.id),
        }
    }
    ExitCode::SUCCESS
}

fn run_features(coin_id: &str, config_path: Option<&PathBuf>, days: Option<u32>) -> ExitCode {
    let adapter = match prepare(config_path) {
        Ok(a) => a,
        Err(code) => return code,
    };
    let days = match days {
        Some(d) => d,
        None => match build_advisor_config(&adapter) {
            Ok(c) => c.lookback_days,
            Err(e) => return fail(e),
        },
    };
    let source = match build_source(&adapter) {
        Ok(s) => s,
        Err(e) => return fail(e),
    };

    let series = match source.historical_series(&coin_id.trim().to_lowercase(), days) {
        Ok(s) => s,
        Err(e) => return fail(e),
    };
    let table = build_features(&series);
    eprintln!(
        "{}: {} prices, {} feature rows",
        series.coin_id,
        series.len(),
        table.len()
    );

    match csv_adapter::write_features(&series, &table, io::stdout().lock()) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => fail(e),
    }
}

fn run_coins(config_path: Option<&PathBuf>) -> ExitCode {
    let adapter = match prepare(config_path) {
        Ok(a) => a,
        Err(code) => return code,
    };
    let universe = match resolve_universe(None, &adapter) {
        Ok(u) => u,
        Err(e) => return fail(e),
    };
    for coin in &universe.coins {
        println!("{} {}", coin.id, coin.symbol);
    }
    eprintln!("{} coins", universe.count());
    ExitCode::SUCCESS
}

fn run_validate(config_path: &PathBuf) -> ExitCode {
    eprintln!("Validating config: {}", config_path.display());
    let adapter = match load_config(config_path) {
        Ok(a) => a,
        Err(code) => return code,
    };
    if let Err(e) = validate_config(&adapter) {
        return fail(e);
    }
    match resolve_universe(None, &adapter) {
        Ok(universe) => eprintln!("  coins: {}", universe.ids().join(", ")),
        Err(e) => return fail(e),
    }
    eprintln!("Configuration is valid.");
    ExitCode::SUCCESS
}

/// `--coins` wins over `[advisor] coins`, which wins over the default universe.
pub fn resolve_universe(
    coins_override: Option<&str>,
    config: &dyn ConfigPort,
) -> Result<Universe, AdvisorError> {
    let configured = config
        .get_string("advisor", "coins")
        .filter(|s| !s.trim().is_empty());

    match coins_override.or(configured.as_deref()) {
        Some(list) => {
            parse_coins(list).map_err(|e| AdvisorError::invalid("advisor", "coins", e.to_string()))
        }
        None => Ok(default_universe()),
    }
}

pub fn build_advisor_config(config: &dyn ConfigPort) -> Result<AdvisorConfig, AdvisorError> {
    let defaults = AdvisorConfig::default();

    let mode = match config
        .get_string("advisor", "mode")
        .filter(|s| !s.trim().is_empty())
    {
        Some(m) => m
            .parse::<ExecutionMode>()
            .map_err(|reason| AdvisorError::invalid("advisor", "mode", reason))?,
        None => defaults.mode,
    };
    let lookback_days = u32::try_from(uint_or(
        config,
        "advisor",
        "lookback_days",
        u64::from(defaults.lookback_days),
    )?)
    .map_err(|_| AdvisorError::invalid("advisor", "lookback_days", "lookback_days is too large"))?;

    Ok(AdvisorConfig {
        lookback_days,
        mode,
        max_workers: uint_or(config, "advisor", "max_workers", defaults.max_workers as u64)?
            as usize,
        poll_interval: Duration::from_millis(uint_or(
            config,
            "advisor",
            "poll_interval_ms",
            defaults.poll_interval.as_millis() as u64,
        )?),
        wait_timeout: Duration::from_secs(uint_or(
            config,
            "advisor",
            "wait_timeout_secs",
            defaults.wait_timeout.as_secs(),
        )?),
    })
}

pub fn build_forest_config(config: &dyn ConfigPort) -> Result<ForestConfig, AdvisorError> {
    let defaults = ForestConfig::default();
    Ok(ForestConfig {
        trees: uint_or(config, "model", "trees", defaults.trees as u64)? as usize,
        max_depth: uint_or(config, "model", "max_depth", defaults.max_depth as u64)? as usize,
        min_samples_split: uint_or(
            config,
            "model",
            "min_samples_split",
            defaults.min_samples_split as u64,
        )? as usize,
        min_samples_leaf: uint_or(
            config,
            "model",
            "min_samples_leaf",
            defaults.min_samples_leaf as u64,
        )? as usize,
        max_features: defaults.max_features,
        bootstrap: config.get_bool("model", "bootstrap", defaults.bootstrap),
        seed: uint_or(config, "model", "seed", defaults.seed)?,
    })
}

/// Wires the CoinGecko source: reqwest client, one shared rate limiter, a
/// disk-only price cache and a historical cache with an optional memory tier.
pub fn build_source(config: &dyn ConfigPort) -> Result<CoinGeckoSource, AdvisorError> {
    let timeout = Duration::from_secs(uint_or(config, "api", "timeout_secs", 30)?);
    let user_agent = config
        .get_string("api", "user_agent")
        .unwrap_or_else(|| DEFAULT_USER_AGENT.to_string());
    let http = ReqwestHttpAdapter::new(timeout, &user_agent)?;
    let limiter = RateLimiter::from_millis(uint_or(config, "api", "rate_limit_interval_ms", 1200)?);

    let settings = SourceSettings {
        base_url: config
            .get_string("api", "base_url")
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_string()),
        retry_backoff: Duration::from_millis(uint_or(config, "api", "retry_backoff_ms", 5000)?),
    };

    let clock: Arc<dyn ClockPort> = Arc::new(SystemClock);
    let (price_cache, history_cache) = build_caches(config, clock)?;

    Ok(CoinGeckoSource::new(
        Arc::new(http),
        Arc::new(limiter),
        price_cache,
        history_cache,
        settings,
    ))
}

pub fn build_caches(
    config: &dyn ConfigPort,
    clock: Arc<dyn ClockPort>,
) -> Result<(Cache, Cache), AdvisorError> {
    let dir = PathBuf::from(
        config
            .get_string("cache", "dir")
            .unwrap_or_else(|| DEFAULT_CACHE_DIR.to_string()),
    );
    let price_ttl = ttl_minutes(config, "price_ttl_minutes", 15)?;
    let history_ttl = ttl_minutes(config, "history_ttl_minutes", 60)?;

    let price_cache = Cache::new(&dir, price_ttl, Arc::clone(&clock));
    let history_cache = Cache::new(&dir, history_ttl, clock);
    let history_cache = if config.get_bool("cache", "memory", true) {
        history_cache.with_memory_tier()
    } else {
        history_cache
    };
    Ok((price_cache, history_cache))
}

fn ttl_minutes(
    config: &dyn ConfigPort,
    key: &str,
    default: u64,
) -> Result<chrono::Duration, AdvisorError> {
    let minutes = uint_or(config, "cache", key, default)?;
    i64::try_from(minutes)
        .ok()
        .and_then(chrono::Duration::try_minutes)
        .ok_or_else(|| AdvisorError::invalid("cache", key, format!("{key} is too large")))
}

fn uint_or(
    config: &dyn ConfigPort,
    section: &str,
    key: &str,
    default: u64,
) -> Result<u64, AdvisorError> {
    match parse_int(config, section, key)? {
        None => Ok(default),
        Some(value) => u64::try_from(value)
            .map_err(|_| AdvisorError::invalid(section, key, format!("{key} must not be negative"))),
    }
}
