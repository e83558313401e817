//! Ledger Engine CLI
//!
//! Command-line interface for replaying ledger commands from CSV files.
//!
//! # Usage
//!
//! ```bash
//! cargo run -- commands.csv > accounts.csv
//! cargo run -- --strategy sequential commands.csv > accounts.csv
//! cargo run -- --strategy concurrent --batch-size 2000 --workers 8 commands.csv > accounts.csv
//! RUST_LOG=debug cargo run -- --log-format json commands.csv > accounts.csv
//! ```
//!
//! The program reads command records from the input CSV file, applies them to
//! an in-memory ledger using the selected replay strategy, and writes the
//! final account summaries to stdout. Logs go to stderr.
//!
//! # Replay Strategies
//!
//! - **sequential**: One thread, file order
//! - **concurrent**: Batched, with independent command groups in parallel (default)
//!
//! # Exit Codes
//!
//! - 0: Success
//! - 1: Error (file not found, file not readable, etc.)

use ledger_engine::cli;
use ledger_engine::strategy;
use ledger_engine::telemetry;
use std::process;
use tracing::error;

fn main() {
    let args = cli::parse_args();
    telemetry::init(args.log_format);

    let strategy = {
        let batch_config = if matches!(args.strategy, cli::StrategyType::Concurrent) {
            Some(args.to_batch_config())
        } else {
            None
        };
        strategy::create_strategy(args.strategy, args.to_engine_config(), batch_config)
    };

    let mut output = std::io::stdout();
    if let Err(e) = strategy.process(&args.input_file, &mut output) {
        error!(error = %e, "replay failed");
        eprintln!("Error: {}", e);
        process::exit(1);
    }
}
