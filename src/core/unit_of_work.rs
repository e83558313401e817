//! Atomic unit of work over the two stores
//!
//! A `UnitOfWork` is the scoped lock-then-read-then-write block every
//! mutating operation runs in:
//!
//! 1. [`UnitOfWork::begin`] takes the row locks and reads the locked rows.
//! 2. The operation inspects and changes its private copies of the rows and
//!    stages the entries that record the change.
//! 3. [`UnitOfWork::commit`] appends the staged entries (all or nothing), then
//!    writes the changed rows back, then releases the locks. Entries and rows
//!    are published together under the [`CommitGate`], so a snapshot reader
//!    never sees the entries without the rows or one leg of a transfer alone.
//!
//! Returning early with an error drops the unit of work, which discards the
//! private copies and the staged entries and releases every lock. Nothing is
//! visible to other callers until commit.

use std::collections::HashSet;
use std::time::Duration;

use super::locks::{AccountLocks, CommitGate, LockOrder};
use super::traits::{AccountStore, LedgerStore};
use crate::types::{Account, AccountId, LedgerEntry, LedgerError, NewEntry};

/// Locked rows and staged entries of one mutating operation
pub struct UnitOfWork<'a, A: AccountStore + ?Sized, L: LedgerStore + ?Sized> {
    accounts: &'a A,
    ledger: &'a L,
    gate: &'a CommitGate,
    locks: AccountLocks,
    rows: Vec<Account>,
    changed: HashSet<AccountId>,
    staged: Vec<NewEntry>,
}

impl<'a, A: AccountStore + ?Sized, L: LedgerStore + ?Sized> UnitOfWork<'a, A, L> {
    /// Lock the rows named by `order` and read their committed state
    ///
    /// # Returns
    ///
    /// * `Ok(UnitOfWork)` - Locks held; rows that do not exist are simply absent
    /// * `Err(LedgerError::LockTimeout)` - The locks were not granted in time
    pub fn begin(
        accounts: &'a A,
        ledger: &'a L,
        gate: &'a CommitGate,
        order: LockOrder,
        timeout: Duration,
    ) -> Result<Self, LedgerError> {
        let locks = accounts.lock_for_update(&order, timeout)?;
        let rows = accounts.read_locked(&locks);
        Ok(Self {
            accounts,
            ledger,
            gate,
            locks,
            rows,
            changed: HashSet::new(),
            staged: Vec::new(),
        })
    }

    /// A locked row, as seen by this unit of work
    pub fn account(&self, id: &AccountId) -> Result<&Account, LedgerError> {
        self.rows
            .iter()
            .find(|row| row.id == *id)
            .ok_or_else(|| LedgerError::account_not_found(*id))
    }

    /// A locked row, for modification; the change is written back at commit
    pub fn account_mut(&mut self, id: &AccountId) -> Result<&mut Account, LedgerError> {
        let row = self
            .rows
            .iter_mut()
            .find(|row| row.id == *id)
            .ok_or_else(|| LedgerError::account_not_found(*id))?;
        self.changed.insert(*id);
        Ok(row)
    }

    /// Queue an entry to be appended at commit
    pub fn stage(&mut self, entry: NewEntry) {
        self.staged.push(entry);
    }

    /// Append staged entries, write changed rows back and release the locks
    ///
    /// A rejected entry batch (for example a duplicate idempotency key that
    /// slipped past the pre-check) aborts the commit before any row is written.
    pub fn commit(self) -> Result<Vec<LedgerEntry>, LedgerError> {
        let UnitOfWork {
            accounts,
            ledger,
            gate,
            locks,
            rows,
            changed,
            staged,
        } = self;

        let changed_rows: Vec<Account> = rows
            .into_iter()
            .filter(|row| changed.contains(&row.id))
            .collect();

        let committed = gate.publish(|| {
            let committed = if staged.is_empty() {
                Vec::new()
            } else {
                ledger.insert_all(staged)?
            };
            if !changed_rows.is_empty() {
                accounts.write_locked(&locks, changed_rows)?;
            }
            Ok::<_, LedgerError>(committed)
        })?;

        drop(locks);
        Ok(committed)
    }
}
