//! Configuration validation.
//!
//! Every key is optional, so only values that are present are checked. A value
//! that is present but unparseable is an error rather than a silent fallback
//! to the default.

use crate::domain::advisor::ExecutionMode;
use crate::domain::coin::parse_coins;
use crate::domain::error::AdvisorError;
use crate::ports::config_port::ConfigPort;

pub const LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];
pub const LOG_FORMATS: [&str; 2] = ["pretty", "json"];

/// One hour between API calls.
pub const MAX_RATE_LIMIT_INTERVAL_MS: i64 = 3_600_000;
/// One day.
pub const MAX_WAIT_TIMEOUT_SECS: i64 = 86_400;

pub fn validate_config(config: &dyn ConfigPort) -> Result<(), AdvisorError> {
    validate_api(config)?;
    validate_cache(config)?;
    validate_advisor(config)?;
    validate_model(config)?;
    validate_logging(config)?;
    Ok(())
}

fn validate_api(config: &dyn ConfigPort) -> Result<(), AdvisorError> {
    if let Some(url) = present(config, "api", "base_url") {
        if !(url.starts_with("http://") || url.starts_with("https://")) {
            return Err(AdvisorError::invalid(
                "api",
                "base_url",
                "base_url must start with http:// or https://",
            ));
        }
    }
    check_min(config, "api", "timeout_secs", 1)?;
    check_range(
        config,
        "api",
        "rate_limit_interval_ms",
        1,
        MAX_RATE_LIMIT_INTERVAL_MS,
    )?;
    check_min(config, "api", "retry_backoff_ms", 0)?;
    Ok(())
}

fn validate_cache(config: &dyn ConfigPort) -> Result<(), AdvisorError> {
    if let Some(dir) = config.get_string("cache", "dir") {
        if dir.trim().is_empty() {
            return Err(AdvisorError::invalid("cache", "dir", "dir must not be empty"));
        }
    }
    check_min(config, "cache", "price_ttl_minutes", 1)?;
    check_min(config, "cache", "history_ttl_minutes", 1)?;
    check_bool(config, "cache", "memory")?;
    Ok(())
}

fn validate_advisor(config: &dyn ConfigPort) -> Result<(), AdvisorError> {
    if let Some(coins) = present(config, "advisor", "coins") {
        parse_coins(&coins).map_err(|e| AdvisorError::invalid("advisor", "coins", e.to_string()))?;
    }
    if let Some(days) = parse_int(config, "advisor", "lookback_days")? {
        if !(1..=i64::from(u32::MAX)).contains(&days) {
            return Err(AdvisorError::invalid(
                "advisor",
                "lookback_days",
                "lookback_days must be at least 1",
            ));
        }
    }
    if let Some(mode) = present(config, "advisor", "mode") {
        mode.parse::<ExecutionMode>()
            .map_err(|reason| AdvisorError::invalid("advisor", "mode", reason))?;
    }
    check_min(config, "advisor", "max_workers", 1)?;
    check_min(config, "advisor", "poll_interval_ms", 1)?;
    check_range(config, "advisor", "wait_timeout_secs", 1, MAX_WAIT_TIMEOUT_SECS)?;
    Ok(())
}

fn validate_model(config: &dyn ConfigPort) -> Result<(), AdvisorError> {
    check_min(config, "model", "trees", 1)?;
    check_min(config, "model", "max_depth", 1)?;
    check_min(config, "model", "min_samples_split", 2)?;
    check_min(config, "model", "min_samples_leaf", 1)?;
    check_min(config, "model", "seed", 0)?;
    check_bool(config, "model", "bootstrap")?;
    Ok(())
}

fn validate_logging(config: &dyn ConfigPort) -> Result<(), AdvisorError> {
    if let Some(level) = present(config, "logging", "level") {
        if !LOG_LEVELS.contains(&level.to_ascii_lowercase().as_str()) {
            return Err(AdvisorError::invalid(
                "logging",
                "level",
                format!("level must be one of {}", LOG_LEVELS.join(", ")),
            ));
        }
    }
    if let Some(format) = present(config, "logging", "format") {
        if !LOG_FORMATS.contains(&format.to_ascii_lowercase().as_str()) {
            return Err(AdvisorError::invalid(
                "logging",
                "format",
                "format must be 'pretty' or 'json'",
            ));
        }
    }
    Ok(())
}

fn present(config: &dyn ConfigPort, section: &str, key: &str) -> Option<String> {
    config
        .get_string(section, key)
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// The integer at `[section] key`, `None` when absent.
pub fn parse_int(
    config: &dyn ConfigPort,
    section: &str,
    key: &str,
) -> Result<Option<i64>, AdvisorError> {
    match present(config, section, key) {
        None => Ok(None),
        Some(raw) => raw
            .parse::<i64>()
            .map(Some)
            .map_err(|_| AdvisorError::invalid(section, key, format!("'{raw}' is not an integer"))),
    }
}

fn check_min(
    config: &dyn ConfigPort,
    section: &str,
    key: &str,
    minimum: i64,
) -> Result<(), AdvisorError> {
    match parse_int(config, section, key)? {
        Some(value) if value < minimum => Err(AdvisorError::invalid(
            section,
            key,
            format!("{key} must be at least {minimum}"),
        )),
        _ => Ok(()),
    }
}

fn check_range(
    config: &dyn ConfigPort,
    section: &str,
    key: &str,
    minimum: i64,
    maximum: i64,
) -> Result<(), AdvisorError> {
    match parse_int(config, section, key)? {
        Some(value) if !(minimum..=maximum).contains(&value) => Err(AdvisorError::invalid(
            section,
            key,
            format!("{key} must be between {minimum} and {maximum}"),
        )),
        _ => Ok(()),
    }
}

fn check_bool(config: &dyn ConfigPort, section: &str, key: &str) -> Result<(), AdvisorError> {
    match present(config, section, key) {
        Some(raw)
            if !matches!(
                raw.to_ascii_lowercase().as_str(),
                "true" | "yes" | "1" | "false" | "no" | "0"
            ) =>
        {
            Err(AdvisorError::invalid(
                section,
                key,
                format!("'{raw}' is not a boolean"),
            ))
        }
        _ => Ok(()),
    }
}
