//! Logging configuration and initialization.

use crate::ports::config_port::ConfigPort;
use tracing_subscriber::{EnvFilter, fmt};

/// Logging configuration, read from the `[logging]` section.
#[derive(Debug, Clone, PartialEq)]
pub struct LoggingConfig {
    pub level: String,
    pub format: String,
}

impl LoggingConfig {
    pub fn from_config(config: &dyn ConfigPort) -> Self {
        let defaults = Self::default();
        Self {
            level: config
                .get_string("logging", "level")
                .map(|l| l.trim().to_ascii_lowercase())
                .unwrap_or(defaults.level),
            format: config
                .get_string("logging", "format")
                .map(|f| f.trim().to_ascii_lowercase())
                .unwrap_or(defaults.format),
        }
    }

    /// Installs the global tracing subscriber. `RUST_LOG` takes precedence over
    /// `level`. Output goes to stderr so stdout carries only command results.
    /// A second call is a no-op.
    pub fn init(&self) {
        let filter =
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&self.level));

        let installed = match self.format.as_str() {
            "json" => fmt()
                .json()
                .with_env_filter(filter)
                .with_writer(std::io::stderr)
                .try_init(),
            _ => fmt()
                .with_env_filter(filter)
                .with_writer(std::io::stderr)
                .try_init(),
        };
        if installed.is_err() {
            tracing::debug!("tracing subscriber already installed");
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".into(),
            format: "pretty".into(),
        }
    }
}
