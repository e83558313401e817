use crate::config::EngineConfig;
use crate::strategy::BatchConfig;
use crate::telemetry::LogFormat;
use clap::{Parser, ValueEnum};
use rust_decimal::Decimal;
use std::path::PathBuf;
use std::time::Duration;

/// Replay ledger commands and print the resulting account balances
#[derive(Parser, Debug)]
#[command(name = "ledger-engine")]
#[command(about = "Replay ledger commands and print the resulting account balances", long_about = None)]
pub struct CliArgs {
    /// Input CSV file path containing command records
    #[arg(value_name = "INPUT", help = "Path to the input CSV file")]
    pub input_file: PathBuf,

    /// Replay strategy to use
    #[arg(
        long = "strategy",
        value_name = "STRATEGY",
        default_value = "concurrent",
        help = "Replay strategy: 'sequential' for one thread or 'concurrent' for batched parallel groups"
    )]
    pub strategy: StrategyType,

    /// Number of commands per batch (concurrent mode only)
    #[arg(
        long = "batch-size",
        value_name = "SIZE",
        help = "Number of commands per batch (default: 1000)"
    )]
    pub batch_size: Option<usize>,

    /// Number of worker threads (concurrent mode only)
    #[arg(
        long = "workers",
        value_name = "COUNT",
        help = "Number of worker threads (default: CPU cores)"
    )]
    pub workers: Option<usize>,

    /// Maximum wait for account row locks
    #[arg(
        long = "lock-timeout-ms",
        value_name = "MILLIS",
        help = "Maximum wait for account row locks in milliseconds (default: 5000)"
    )]
    pub lock_timeout_ms: Option<u64>,

    /// Ceiling for a single amount
    #[arg(
        long = "max-amount",
        value_name = "AMOUNT",
        help = "Largest accepted single amount (default: 1000000000)"
    )]
    pub max_amount: Option<Decimal>,

    /// Currency for accounts opened without one
    #[arg(
        long = "default-currency",
        value_name = "CODE",
        help = "Three-letter currency code for new accounts (default: USD)"
    )]
    pub default_currency: Option<String>,

    /// Log output format (logs go to stderr)
    #[arg(long = "log-format", value_name = "FORMAT", default_value = "text")]
    pub log_format: LogFormat,
}

/// Available replay strategies
#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum StrategyType {
    Sequential,
    Concurrent,
}

impl CliArgs {
    /// Create a BatchConfig from CLI arguments
    ///
    /// Unset values use the defaults. Invalid values fall back to the
    /// defaults with a warning (see [`BatchConfig::new`]).
    pub fn to_batch_config(&self) -> BatchConfig {
        if self.batch_size.is_some() || self.workers.is_some() {
            let default = BatchConfig::default();
            BatchConfig::new(
                self.batch_size.unwrap_or(default.batch_size),
                self.workers.unwrap_or(default.workers),
            )
        } else {
            BatchConfig::default()
        }
    }

    /// Create an EngineConfig from CLI arguments
    pub fn to_engine_config(&self) -> EngineConfig {
        EngineConfig::new(
            self.max_amount,
            self.lock_timeout_ms.map(Duration::from_millis),
            self.default_currency.as_deref(),
        )
    }
}
