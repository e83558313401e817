//! Ledger Engine Library
//! # Overview
//!
//! This library provides a concurrency-safe account ledger: accounts with a
//! running balance, an append-only ledger of entries, and the operations that
//! move money between them (deposit, withdraw, transfer, reversal) together
//! with freezing, history queries and monitoring. A CSV command replay front
//! end drives the engine with a sequential or a concurrent strategy.
//!
//! # Architecture
//!
//! The system is organized into several key components:
//!
//! - [`types`] - Core data types (Account, LedgerEntry, LedgerError, etc.)
//! - [`config`] - Engine bounds and defaults
//! - [`core`] - Business logic components:
//!   - [`core::engine`] - Money movements and account lifecycle
//!   - [`core::account_store`] / [`core::ledger_store`] - In-memory stores
//!   - [`core::locks`] - Deterministic lock ordering and row locks
//!   - [`core::idempotency`] - Duplicate request detection
//!   - [`core::query`] / [`core::monitor`] - Read-side operations
//! - [`io`] - CSV command input and account summary output
//! - [`strategy`] - Sequential and concurrent replay pipelines
//! - [`cli`] - CLI arguments parsing
//! - [`telemetry`] - Tracing subscriber setup
//!
//! # Entry Types
//!
//! - **DEPOSIT**: Credit funds to an account
//! - **WITHDRAWAL**: Debit funds from an account (requires sufficient balance)
//! - **TRANSFER_OUT** / **TRANSFER_IN**: The two linked legs of a transfer
//!
//! A reversal appends the inverse entry type, linked to the original entry.
//!
//! # Invariants
//!
//! - Balances never go negative
//! - An account's balance equals the signed sum of its entries
//! - A transfer conserves the sum of the two balances
//! - An idempotency key is used by at most one entry

// Module declarations
pub mod cli;
pub mod config;
pub mod core;
pub mod io;
pub mod strategy;
pub mod telemetry;
pub mod types;

pub use config::EngineConfig;
pub use core::{
    CreateAccount, HistoryRequest, LedgerEngine, LedgerMonitor, MovementRequest, Page,
    TransferRequest,
};
pub use io::write_accounts_csv;
pub use types::{
    Account, AccountId, AccountStatus, AccountView, CurrencyCode, EntryId, EntryType, EntryView,
    LedgerCommand, LedgerEntry, LedgerError, OwnerId, TransferReceipt,
};
