//! Store contracts used by the ledger engine
//!
//! The engine only talks to its storage through these traits. The in-memory
//! implementations in [`account_store`](super::account_store) and
//! [`ledger_store`](super::ledger_store) are the ones this crate ships; a
//! relational backend with `SELECT ... FOR UPDATE` row locks fits the same
//! contracts.

use chrono::{DateTime, Utc};
use std::time::Duration;

use super::locks::{AccountLocks, LockOrder};
use crate::types::{
    Account, AccountId, AccountStatus, EntryId, EntryType, LedgerEntry, LedgerError, NewEntry,
    OwnerId,
};

/// Persistent table of accounts with row-level exclusive locking
///
/// Reads through `get`/`find_*`/`all` never wait on row locks and observe the
/// last committed state. Mutations go through `lock_for_update` followed by
/// `read_locked`/`write_locked`.
pub trait AccountStore: Send + Sync {
    /// Insert a new account
    ///
    /// Fails with `AccountAlreadyExists` if the owner already has an account.
    fn insert(&self, account: Account) -> Result<(), LedgerError>;

    /// Committed state of an account
    fn get(&self, id: &AccountId) -> Option<Account>;

    /// Committed state of the account registered for an owner
    fn find_by_owner(&self, owner: &OwnerId) -> Option<Account>;

    /// Every account currently in `status`
    fn find_by_status(&self, status: AccountStatus) -> Vec<Account>;

    /// Every account in the store
    fn all(&self) -> Vec<Account>;

    /// Take exclusive locks on the rows named by `order`
    ///
    /// Ids with no row in the store are absent from the returned set.
    fn lock_for_update(
        &self,
        order: &LockOrder,
        timeout: Duration,
    ) -> Result<AccountLocks, LedgerError>;

    /// Read the rows covered by a held lock set
    fn read_locked(&self, locks: &AccountLocks) -> Vec<Account>;

    /// Write rows back under a held lock set
    ///
    /// Fails with `InvalidOperation` if any row is not covered by `locks`.
    fn write_locked(&self, locks: &AccountLocks, rows: Vec<Account>) -> Result<(), LedgerError>;
}

/// Optional restrictions applied to an account's entry history
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EntryFilter {
    /// Only entries of this type
    pub entry_type: Option<EntryType>,
    /// Only entries created at or after this instant
    pub from: Option<DateTime<Utc>>,
    /// Only entries created at or before this instant
    pub to: Option<DateTime<Utc>>,
}

impl EntryFilter {
    pub fn matches(&self, entry: &LedgerEntry) -> bool {
        self.entry_type.map_or(true, |t| entry.entry_type == t)
            && self.from.map_or(true, |from| entry.created_at >= from)
            && self.to.map_or(true, |to| entry.created_at <= to)
    }
}

/// Persistent append-only table of ledger entries
pub trait LedgerStore: Send + Sync {
    /// Append a batch of entries atomically
    ///
    /// Either every entry is inserted or none is. Fails with
    /// `DuplicateTransaction` if any idempotency key is already taken (in the
    /// store or twice within the batch). The store assigns `created_at` and
    /// `sequence`, both monotonic in insertion order.
    fn insert_all(&self, entries: Vec<NewEntry>) -> Result<Vec<LedgerEntry>, LedgerError>;

    /// Entry by id
    fn get(&self, id: &EntryId) -> Option<LedgerEntry>;

    /// Entry carrying an idempotency key
    fn find_by_idempotency_key(&self, key: &str) -> Option<LedgerEntry>;

    /// Whether some committed entry carries an idempotency key
    fn exists_by_idempotency_key(&self, key: &str) -> bool;

    /// Entries whose related-entry reference points at `id`
    fn find_by_related(&self, id: &EntryId) -> Vec<LedgerEntry>;

    /// One page of an account's entries, newest first, plus the filtered total
    fn page_by_account(
        &self,
        account: &AccountId,
        filter: &EntryFilter,
        page: u32,
        size: u32,
    ) -> (Vec<LedgerEntry>, u64);

    /// Number of entries recorded against an account
    fn count_by_account(&self, account: &AccountId) -> u64;

    /// Every entry of an account in insertion order
    fn list_by_account(&self, account: &AccountId) -> Vec<LedgerEntry>;

    /// Total number of entries in the store
    fn len(&self) -> u64;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
