//! Sequential replay strategy
//!
//! Single-threaded implementation of the ReplayStrategy trait. It streams
//! commands through the CommandReader and applies each one, in file order, to
//! an in-memory ledger engine.
//!
//! # Design
//!
//! The SequentialReplay focuses on orchestration, delegating:
//! - CSV parsing to `CommandReader` (iterator interface)
//! - Command execution to `core::execute` (business logic)
//! - CSV output to `csv_format::write_accounts_csv` (format handling)
//!
//! Memory usage is O(accounts + entries); the input is never loaded whole.

use std::io::Write;
use std::path::Path;
use tracing::{info, warn};

use crate::config::EngineConfig;
use crate::core::{AccountStore, LedgerEngine};
use crate::io::csv_format::write_accounts_csv;
use crate::io::CommandReader;
use crate::strategy::{apply_logged, ReplayStrategy};

/// Sequential replay strategy
///
/// # Examples
///
/// ```no_run
/// use ledger_engine::config::EngineConfig;
/// use ledger_engine::strategy::{ReplayStrategy, SequentialReplay};
/// use std::path::Path;
///
/// let strategy = SequentialReplay::new(EngineConfig::default());
/// let mut output = std::io::stdout();
///
/// strategy.process(Path::new("commands.csv"), &mut output)
///     .expect("Replay failed");
/// ```
#[derive(Debug, Clone, Default)]
pub struct SequentialReplay {
    config: EngineConfig,
}

impl SequentialReplay {
    pub fn new(config: EngineConfig) -> Self {
        Self { config }
    }
}

impl ReplayStrategy for SequentialReplay {
    /// Replay commands one at a time in file order
    ///
    /// Fatal errors (file not found, I/O errors) are returned immediately.
    /// Rejected commands are logged and replay continues.
    fn process(&self, input_path: &Path, output: &mut dyn Write) -> Result<(), String> {
        let engine = LedgerEngine::in_memory(self.config.clone());
        let mut reader = CommandReader::new(input_path)?;

        let mut applied = 0usize;
        let mut rejected = 0usize;
        while let Some(next) = reader.next_numbered() {
            match next {
                Ok((line, command)) => {
                    if apply_logged(&engine, line, &command) {
                        applied += 1;
                    } else {
                        rejected += 1;
                    }
                }
                Err(e) => {
                    warn!(error = %e, "skipping malformed row");
                    rejected += 1;
                }
            }
        }

        info!(applied, rejected, "sequential replay finished");
        write_accounts_csv(&engine.snapshot(|accounts, _| accounts.all()), output)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    const HEADER: &str = "op,owner,target,amount,currency,reference,remarks\n";
    const ALICE: &str = "00000000-0000-0000-0000-00000000000a";
    const BOB: &str = "00000000-0000-0000-0000-00000000000b";

    /// Helper function to create a temporary CSV file for testing
    fn create_temp_csv(content: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().expect("Failed to create temp file");
        file.write_all(content.as_bytes())
            .expect("Failed to write to temp file");
        file.flush().expect("Failed to flush temp file");
        file
    }

    fn replay(content: &str) -> String {
        let file = create_temp_csv(content);
        let mut output = Vec::new();
        SequentialReplay::default()
            .process(file.path(), &mut output)
            .unwrap();
        String::from_utf8(output).unwrap()
    }

    #[test]
    fn test_replays_deposit_and_transfer() {
        let output = replay(&format!(
            "{HEADER}open,{ALICE},,,,,\nopen,{BOB},,,,,\ndeposit,{ALICE},,100,,,\ntransfer,{ALICE},{BOB},40.5,,,\n"
        ));

        assert_eq!(
            output,
            format!("owner,currency,balance,status\n{ALICE},USD,59.5000,ACTIVE\n{BOB},USD,40.5000,ACTIVE\n")
        );
    }

    #[test]
    fn test_rejected_commands_are_skipped() {
        let output = replay(&format!(
            "{HEADER}open,{ALICE},,,,,\nwithdraw,{ALICE},,1,,,\ndeposit,{BOB},,1,,,\ndeposit,{ALICE},,oops,,,\ndeposit,{ALICE},,2,,,\n"
        ));

        assert_eq!(
            output,
            format!("owner,currency,balance,status\n{ALICE},USD,2.0000,ACTIVE\n")
        );
    }

    #[test]
    fn test_missing_file_is_fatal() {
        let mut output = Vec::new();
        let result = SequentialReplay::default().process(Path::new("nonexistent.csv"), &mut output);
        assert!(result.unwrap_err().contains("Failed to open file"));
    }
}
