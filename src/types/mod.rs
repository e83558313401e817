//! Types module
//!
//! Contains core data structures used throughout the application.
//! This module organizes types into logical submodules:
//! - `ids`: Strongly-typed account, owner and entry identifiers
//! - `account`: Account rows, status and currency code
//! - `entry`: Ledger entries and their public views
//! - `command`: Replayable ledger commands
//! - `error`: Error types for the ledger engine

pub mod account;
pub mod command;
pub mod entry;
pub mod error;
pub mod ids;

pub use account::{Account, AccountStatus, AccountView, CurrencyCode};
pub use command::LedgerCommand;
pub use entry::{EntryType, EntryView, LedgerEntry, NewEntry, TransferReceipt};
pub use error::{ErrorKind, LedgerError};
pub use ids::{AccountId, EntryId, OwnerId};
