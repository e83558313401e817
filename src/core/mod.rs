//! Core business logic module
//!
//! This module contains the ledger engine and its collaborators:
//! - `traits` - Account Store and Ledger Store contracts
//! - `locks` - Global lock order and row locks
//! - `account_store` - In-memory Account Store
//! - `ledger_store` - In-memory append-only Ledger Store
//! - `unit_of_work` - Lock-then-read-then-write scope of one mutation
//! - `idempotency` - Committed-key pre-check
//! - `validation` - Input bounds and balance invariants
//! - `engine` - Mutating operations
//! - `query` - Read-only queries
//! - `monitor` - Aggregates and reconciliation
//! - `command` - Replayable command execution

pub mod account_store;
pub mod command;
pub mod engine;
pub mod idempotency;
pub mod ledger_store;
pub mod locks;
pub mod monitor;
pub mod query;
pub mod traits;
pub mod unit_of_work;
pub mod validation;

pub use account_store::InMemoryAccountStore;
pub use command::{execute, CommandOutcome};
pub use engine::{CreateAccount, LedgerEngine, MovementRequest, TransferRequest};
pub use idempotency::IdempotencyGuard;
pub use ledger_store::InMemoryLedgerStore;
pub use locks::{lock_order, AccountLocks, LockOrder};
pub use monitor::{LedgerMonitor, Reconciliation};
pub use query::{HistoryRequest, Page};
pub use traits::{AccountStore, EntryFilter, LedgerStore};
pub use unit_of_work::UnitOfWork;
