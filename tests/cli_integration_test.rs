//! CLI integration tests.
//!
//! Tests cover:
//! - Loading and validating INI files on disk
//! - Building advisor, model and cache settings from config
//! - Universe resolution and command dispatch for offline commands
//! - Wiring the CoinGecko source from config (no network)

mod common;

use coinadvisor::adapters::file_config_adapter::FileConfigAdapter;
use coinadvisor::cli::{self, Cli, Command};
use coinadvisor::domain::advisor::ExecutionMode;
use coinadvisor::domain::config_validation::validate_config;
use coinadvisor::domain::error::AdvisorError;
use std::io::Write;
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

fn write_temp_ini(content: &str) -> tempfile::NamedTempFile {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(content.as_bytes()).unwrap();
    file.flush().unwrap();
    file
}

// ExitCode has no PartialEq; compare the debug form.
fn same_code(a: ExitCode, b: ExitCode) -> bool {
    format!("{a:?}") == format!("{b:?}")
}

const VALID_INI: &str = r#"
[api]
base_url = https://api.coingecko.com/api/v3
timeout_secs = 20
rate_limit_interval_ms = 1500
retry_backoff_ms = 4000
user_agent = coinadvisor-test/0.1

[cache]
dir = data/test-cache
price_ttl_minutes = 10
history_ttl_minutes = 120
memory = false

[advisor]
coins = bitcoin:BTC,ethereum:ETH,solana:SOL
lookback_days = 21
mode = sequential
max_workers = 2
poll_interval_ms = 100
wait_timeout_secs = 60

[model]
trees = 25
max_depth = 6
min_samples_split = 4
min_samples_leaf = 2
seed = 7
bootstrap = true

[logging]
level = warn
format = json
"#;

mod config_loading {
    use super::*;

    #[test]
    fn valid_file_passes_validation() {
        let file = write_temp_ini(VALID_INI);
        let adapter = cli::load_config(&file.path().to_path_buf()).unwrap();
        assert!(validate_config(&adapter).is_ok());
    }

    #[test]
    fn missing_file_is_config_error() {
        let result = cli::load_config(&PathBuf::from("/nonexistent/coinadvisor.ini"));
        let code = result.err().unwrap();
        assert!(same_code(code, ExitCode::from(2)));
    }

    #[test]
    fn advisor_settings_come_from_file() {
        let adapter = FileConfigAdapter::from_string(VALID_INI).unwrap();
        let config = cli::build_advisor_config(&adapter).unwrap();

        assert_eq!(config.lookback_days, 21);
        assert_eq!(config.mode, ExecutionMode::Sequential);
        assert_eq!(config.max_workers, 2);
        assert_eq!(config.poll_interval, Duration::from_millis(100));
        assert_eq!(config.wait_timeout, Duration::from_secs(60));
    }

    #[test]
    fn model_settings_come_from_file() {
        let adapter = FileConfigAdapter::from_string(VALID_INI).unwrap();
        let config = cli::build_forest_config(&adapter).unwrap();

        assert_eq!(config.trees, 25);
        assert_eq!(config.max_depth, 6);
        assert_eq!(config.min_samples_split, 4);
        assert_eq!(config.min_samples_leaf, 2);
        assert_eq!(config.seed, 7);
        assert!(config.bootstrap);
    }

    #[test]
    fn universe_comes_from_file_in_order() {
        let adapter = FileConfigAdapter::from_string(VALID_INI).unwrap();
        let universe = cli::resolve_universe(None, &adapter).unwrap();
        assert_eq!(universe.ids(), vec!["bitcoin", "ethereum", "solana"]);
        assert_eq!(universe.coins[2].symbol, "SOL");
    }

    #[test]
    fn coins_flag_overrides_file() {
        let adapter = FileConfigAdapter::from_string(VALID_INI).unwrap();
        let universe = cli::resolve_universe(Some("ripple:xrp,cardano"), &adapter).unwrap();
        assert_eq!(universe.ids(), vec!["ripple", "cardano"]);
        assert_eq!(universe.coins[0].symbol, "XRP");
        assert_eq!(universe.coins[1].symbol, "CARDANO");
    }

    #[test]
    fn bad_coins_flag_is_config_invalid() {
        let err = cli::resolve_universe(Some("bitcoin,,ethereum"), &FileConfigAdapter::empty())
            .unwrap_err();
        assert!(matches!(err, AdvisorError::ConfigInvalid { key, .. } if key == "coins"));
    }

    #[test]
    fn source_builds_without_network() {
        let adapter = FileConfigAdapter::from_string(VALID_INI).unwrap();
        assert!(cli::build_source(&adapter).is_ok());
    }
}

mod commands {
    use super::*;

    #[test]
    fn validate_accepts_good_file() {
        let file = write_temp_ini(VALID_INI);
        let code = cli::run(Cli {
            command: Command::Validate {
                config: file.path().to_path_buf(),
            },
        });
        assert!(same_code(code, ExitCode::SUCCESS));
    }

    #[test]
    fn validate_rejects_bad_mode() {
        let file = write_temp_ini("[advisor]\nmode = turbo\n");
        let code = cli::run(Cli {
            command: Command::Validate {
                config: file.path().to_path_buf(),
            },
        });
        assert!(same_code(code, ExitCode::from(2)));
    }

    #[test]
    fn validate_rejects_bad_coin_list() {
        let file = write_temp_ini("[advisor]\ncoins = bitcoin:BTC:X\n");
        let code = cli::run(Cli {
            command: Command::Validate {
                config: file.path().to_path_buf(),
            },
        });
        assert!(same_code(code, ExitCode::from(2)));
    }

    #[test]
    fn validate_rejects_unbounded_wait_timeout() {
        let file = write_temp_ini("[advisor]\nwait_timeout_secs = 9223372036854775807\n");
        let code = cli::run(Cli {
            command: Command::Validate {
                config: file.path().to_path_buf(),
            },
        });
        assert!(same_code(code, ExitCode::from(2)));
    }

    #[test]
    fn coins_command_succeeds_without_config() {
        let code = cli::run(Cli {
            command: Command::Coins { config: None },
        });
        assert!(same_code(code, ExitCode::SUCCESS));
    }

    #[test]
    fn recommend_with_invalid_config_fails_before_any_fetch() {
        let file = write_temp_ini("[api]\nrate_limit_interval_ms = 0\n");
        let code = cli::run(Cli {
            command: Command::Recommend {
                config: Some(file.path().to_path_buf()),
                days: None,
                sequential: true,
                coins: None,
            },
        });
        assert!(same_code(code, ExitCode::from(2)));
    }
}
