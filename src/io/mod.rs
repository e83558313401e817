//! I/O module
//!
//! Handles CSV parsing and output.
//!
//! # Components
//!
//! - `csv_format` - CSV format handling (record conversion, output serialization)
//! - `command_reader` - Streaming CSV command reader with iterator and batch interfaces

pub mod command_reader;
pub mod csv_format;

pub use command_reader::{CommandReader, NumberedCommand};
pub use csv_format::{convert_command_record, write_accounts_csv, CommandRecord};
