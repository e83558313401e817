//! CSV command reader with iterator interface
//!
//! Provides a streaming iterator over ledger commands from a CSV file.
//! Delegates CSV format concerns to the csv_format module.
//!
//! # Design
//!
//! The CommandReader uses csv::Reader to read and deserialize CSV records
//! sequentially, delegating conversion to the csv_format module. Records are
//! processed one at a time without loading the entire file into memory; the
//! concurrent replay strategy pulls fixed-size batches through
//! [`CommandReader::next_batch`].
//!
//! # Error Handling
//!
//! - Fatal errors (file not found, I/O errors) are returned from `new()`
//! - Individual record parsing errors are yielded as Err variants in the iterator
//! - Line numbers are included in error messages for debugging

use csv::{ReaderBuilder, Trim};
use std::fs::File;
use std::io::Read;
use std::path::Path;

use crate::io::csv_format::{convert_command_record, CommandRecord};
use crate::types::LedgerCommand;

/// A command together with the file line it came from
pub type NumberedCommand = (usize, LedgerCommand);

/// Streaming CSV command reader
#[derive(Debug)]
pub struct CommandReader<R: Read = File> {
    reader: csv::Reader<R>,
    line_num: usize,
}

impl CommandReader<File> {
    /// Create a new CommandReader from a file path
    ///
    /// The CSV reader is configured to:
    /// - Trim whitespace from all fields
    /// - Allow flexible field counts (trailing optional columns may be omitted)
    /// - Use an 8KB buffer for efficient I/O
    ///
    /// # Returns
    ///
    /// * `Ok(CommandReader)` if file opened successfully
    /// * `Err(String)` if file could not be opened
    pub fn new(path: &Path) -> Result<Self, String> {
        let file = File::open(path)
            .map_err(|e| format!("Failed to open file '{}': {}", path.display(), e))?;
        Ok(Self::from_reader(file))
    }
}

impl<R: Read> CommandReader<R> {
    pub fn from_reader(input: R) -> Self {
        let reader = ReaderBuilder::new()
            .trim(Trim::All)
            .flexible(true)
            .buffer_capacity(8 * 1024)
            .from_reader(input);

        Self {
            reader,
            line_num: 1,
        }
    }

    /// Read up to `size` commands, skipping (and returning) malformed rows
    ///
    /// # Returns
    ///
    /// A tuple of the parsed commands with their line numbers and the error
    /// messages of rejected rows. Both are empty once the input is exhausted.
    pub fn next_batch(&mut self, size: usize) -> (Vec<NumberedCommand>, Vec<String>) {
        let mut commands = Vec::with_capacity(size);
        let mut errors = Vec::new();

        while commands.len() < size {
            match self.next_numbered() {
                Some(Ok(command)) => commands.push(command),
                Some(Err(e)) => errors.push(e),
                None => break,
            }
        }

        (commands, errors)
    }

    /// Next command tagged with its line number in the file
    pub fn next_numbered(&mut self) -> Option<Result<NumberedCommand, String>> {
        let mut deserializer = self.reader.deserialize::<CommandRecord>();
        let next = deserializer.next()?;
        self.line_num += 1;
        let line = self.line_num;

        Some(match next {
            Ok(record) => convert_command_record(record)
                .map(|command| (line, command))
                .map_err(|e| format!("Line {}: {}", line, e)),
            Err(e) => Err(format!("Line {}: CSV parse error: {}", line, e)),
        })
    }
}

impl<R: Read> Iterator for CommandReader<R> {
    type Item = Result<LedgerCommand, String>;

    fn next(&mut self) -> Option<Self::Item> {
        self.next_numbered()
            .map(|result| result.map(|(_, command)| command))
    }
}
