//! Replay strategy module
//!
//! This module defines the Strategy pattern for complete command replay
//! pipelines, covering CSV parsing, command execution against a ledger engine
//! and the account summary output. The implementation (sequential or
//! concurrent batch) is selected at runtime.

use std::io::Write;
use std::path::Path;
use tracing::{debug, warn};

use crate::cli::StrategyType;
use crate::config::EngineConfig;
use crate::core::{execute, AccountStore, LedgerEngine, LedgerStore};
use crate::types::LedgerCommand;

pub mod concurrent;
pub mod sequential;

pub use concurrent::{partition_commands, BatchConfig, ConcurrentReplay};
pub use sequential::SequentialReplay;

/// Replay strategy trait for complete command processing pipelines
///
/// Each strategy reads commands from a CSV file, applies them to a fresh
/// in-memory ledger engine, and writes the final account summaries to output.
pub trait ReplayStrategy: Send + Sync {
    /// Replay commands from input file and write account summaries to output
    ///
    /// # Arguments
    ///
    /// * `input_path` - Path to the input CSV file containing commands
    /// * `output` - Mutable reference to a writer for the account summaries
    ///
    /// # Returns
    ///
    /// * `Ok(())` if the whole file was consumed (rejected commands included)
    /// * `Err(String)` if a fatal error occurred (file not found, I/O error, etc.)
    ///
    /// Rejected commands and malformed rows are logged and skipped; they never
    /// cause this method to return an error.
    fn process(&self, input_path: &Path, output: &mut dyn Write) -> Result<(), String>;
}

/// Create a replay strategy based on the specified strategy type
///
/// # Arguments
///
/// * `strategy_type` - Sequential or Concurrent
/// * `engine_config` - Configuration of the engine each replay builds
/// * `batch_config` - Batch configuration (ignored for sequential)
pub fn create_strategy(
    strategy_type: StrategyType,
    engine_config: EngineConfig,
    batch_config: Option<BatchConfig>,
) -> Box<dyn ReplayStrategy> {
    match strategy_type {
        StrategyType::Sequential => Box::new(SequentialReplay::new(engine_config)),
        StrategyType::Concurrent => Box::new(ConcurrentReplay::new(
            engine_config,
            batch_config.unwrap_or_default(),
        )),
    }
}

/// Apply one command, logging the outcome
///
/// Returns whether the command was applied.
pub(crate) fn apply_logged<A: AccountStore, L: LedgerStore>(
    engine: &LedgerEngine<A, L>,
    line: usize,
    command: &LedgerCommand,
) -> bool {
    match execute(engine, command) {
        Ok(_) => {
            debug!(line, command = command.name(), "command applied");
            true
        }
        Err(e) => {
            warn!(line, command = command.name(), kind = ?e.kind(), error = %e, "command rejected");
            false
        }
    }
}
