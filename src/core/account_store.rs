//! In-memory Account Store
//!
//! This module provides `InMemoryAccountStore`, a thread-safe table of account
//! rows with row-level exclusive locks.
//!
//! # Design
//!
//! Committed rows live in a `DashMap` keyed by account id, so readers of
//! different accounts never contend and reads never wait on a row lock. Each
//! row has its own [`RowLock`] that mutating operations take through
//! [`AccountStore::lock_for_update`]; the row data itself is only replaced by
//! [`AccountStore::write_locked`], which checks that the caller holds the lock.
//!
//! A second `DashMap` indexes accounts by owner and enforces the
//! one-account-per-owner rule at insertion.
//!
//! # Thread Safety
//!
//! All operations are safe to call from multiple threads concurrently. Lock
//! acquisition clones the row lock out of the map before waiting, so no map
//! shard stays locked while a caller blocks.

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::sync::Arc;
use std::time::Duration;

use super::locks::{AccountLocks, LockOrder, RowLock};
use super::traits::AccountStore;
use crate::types::{Account, AccountId, AccountStatus, LedgerError, OwnerId};

/// Thread-safe account table backed by `DashMap`
#[derive(Debug, Default)]
pub struct InMemoryAccountStore {
    /// Committed account rows by id
    accounts: DashMap<AccountId, Account>,

    /// One exclusive lock per account row
    row_locks: DashMap<AccountId, Arc<RowLock>>,

    /// Unique owner index
    owners: DashMap<OwnerId, AccountId>,
}

impl InMemoryAccountStore {
    /// Create a new empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of accounts in the store
    pub fn len(&self) -> usize {
        self.accounts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.accounts.is_empty()
    }
}

impl AccountStore for InMemoryAccountStore {
    /// Insert a new account row
    ///
    /// # Thread Safety
    ///
    /// The owner index entry is held while the row is inserted, so two
    /// concurrent inserts for the same owner cannot both succeed.
    fn insert(&self, account: Account) -> Result<(), LedgerError> {
        match self.owners.entry(account.owner_id) {
            Entry::Occupied(_) => Err(LedgerError::AccountAlreadyExists {
                owner: account.owner_id,
            }),
            Entry::Vacant(slot) => {
                self.row_locks
                    .insert(account.id, Arc::new(RowLock::new()));
                slot.insert(account.id);
                self.accounts.insert(account.id, account);
                Ok(())
            }
        }
    }

    fn get(&self, id: &AccountId) -> Option<Account> {
        self.accounts.get(id).map(|row| row.value().clone())
    }

    fn find_by_owner(&self, owner: &OwnerId) -> Option<Account> {
        let id = *self.owners.get(owner)?.value();
        self.get(&id)
    }

    fn find_by_status(&self, status: AccountStatus) -> Vec<Account> {
        self.accounts
            .iter()
            .filter(|row| row.status == status)
            .map(|row| row.value().clone())
            .collect()
    }

    fn all(&self) -> Vec<Account> {
        self.accounts
            .iter()
            .map(|row| row.value().clone())
            .collect()
    }

    /// Take exclusive row locks in `order`
    ///
    /// # Thread Safety
    ///
    /// Blocks up to `timeout` in total. Rows that do not exist are skipped, the
    /// way `SELECT ... FOR UPDATE` returns no row for a missing key.
    fn lock_for_update(
        &self,
        order: &LockOrder,
        timeout: Duration,
    ) -> Result<AccountLocks, LedgerError> {
        AccountLocks::acquire(order, timeout, |id| {
            self.row_locks.get(id).map(|row| Arc::clone(row.value()))
        })
    }

    fn read_locked(&self, locks: &AccountLocks) -> Vec<Account> {
        locks.ids().filter_map(|id| self.get(id)).collect()
    }

    /// Replace locked rows with their new state
    ///
    /// Every row is checked against the lock set before any is written, and
    /// each written row gets its `version` bumped.
    fn write_locked(&self, locks: &AccountLocks, rows: Vec<Account>) -> Result<(), LedgerError> {
        if let Some(row) = rows.iter().find(|row| !locks.covers(&row.id)) {
            return Err(LedgerError::invalid_operation(format!(
                "Account {} written without holding its lock",
                row.id
            )));
        }

        for mut row in rows {
            row.version += 1;
            self.accounts.insert(row.id, row);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use rust_decimal::Decimal;
    use std::thread;

    use crate::types::CurrencyCode;

    fn open(owner: OwnerId) -> Account {
        Account::open(owner, CurrencyCode::default(), Utc::now())
    }

    const WAIT: Duration = Duration::from_secs(5);

    #[test]
    fn test_insert_and_lookup() {
        let store = InMemoryAccountStore::new();
        let owner = OwnerId::new();
        let account = open(owner);

        store.insert(account.clone()).unwrap();

        assert_eq!(store.get(&account.id), Some(account.clone()));
        assert_eq!(store.find_by_owner(&owner), Some(account));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_insert_rejects_second_account_for_owner() {
        let store = InMemoryAccountStore::new();
        let owner = OwnerId::new();

        store.insert(open(owner)).unwrap();
        let err = store.insert(open(owner)).unwrap_err();

        assert_eq!(err, LedgerError::AccountAlreadyExists { owner });
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_find_by_status() {
        let store = InMemoryAccountStore::new();
        let mut frozen = open(OwnerId::new());
        frozen.status = AccountStatus::Frozen;
        store.insert(open(OwnerId::new())).unwrap();
        store.insert(frozen.clone()).unwrap();

        let found = store.find_by_status(AccountStatus::Frozen);
        assert_eq!(found, vec![frozen]);
        assert_eq!(store.find_by_status(AccountStatus::Active).len(), 1);
        assert_eq!(store.all().len(), 2);
    }

    #[test]
    fn test_lock_skips_missing_rows() {
        let store = InMemoryAccountStore::new();
        let account = open(OwnerId::new());
        store.insert(account.clone()).unwrap();

        let order = LockOrder::pair(account.id, AccountId::new()).unwrap();
        let locks = store.lock_for_update(&order, WAIT).unwrap();

        assert_eq!(store.read_locked(&locks), vec![account]);
    }

    #[test]
    fn test_write_locked_bumps_version() {
        let store = InMemoryAccountStore::new();
        let account = open(OwnerId::new());
        store.insert(account.clone()).unwrap();

        let locks = store
            .lock_for_update(&LockOrder::single(account.id), WAIT)
            .unwrap();
        let mut row = store.read_locked(&locks).remove(0);
        row.balance = Decimal::new(150000, 4);
        store.write_locked(&locks, vec![row]).unwrap();
        drop(locks);

        let stored = store.get(&account.id).unwrap();
        assert_eq!(stored.balance, Decimal::new(150000, 4));
        assert_eq!(stored.version, 1);
    }

    #[test]
    fn test_write_locked_rejects_uncovered_rows() {
        let store = InMemoryAccountStore::new();
        let locked = open(OwnerId::new());
        let other = open(OwnerId::new());
        store.insert(locked.clone()).unwrap();
        store.insert(other.clone()).unwrap();

        let locks = store
            .lock_for_update(&LockOrder::single(locked.id), WAIT)
            .unwrap();
        let mut changed = other.clone();
        changed.balance = Decimal::ONE;

        let err = store.write_locked(&locks, vec![locked, changed]).unwrap_err();
        assert!(matches!(err, LedgerError::InvalidOperation { .. }));
        // Nothing was written
        assert_eq!(store.get(&other.id).unwrap().version, 0);
    }

    #[test]
    fn test_reads_do_not_wait_on_row_locks() {
        let store = InMemoryAccountStore::new();
        let account = open(OwnerId::new());
        store.insert(account.clone()).unwrap();

        let _locks = store
            .lock_for_update(&LockOrder::single(account.id), WAIT)
            .unwrap();

        assert!(store.get(&account.id).is_some());
        assert_eq!(store.all().len(), 1);
    }

    #[test]
    fn test_lock_times_out_while_held() {
        let store = InMemoryAccountStore::new();
        let account = open(OwnerId::new());
        store.insert(account.clone()).unwrap();

        let _held = store
            .lock_for_update(&LockOrder::single(account.id), WAIT)
            .unwrap();
        let err = store
            .lock_for_update(&LockOrder::single(account.id), Duration::from_millis(20))
            .unwrap_err();

        assert!(matches!(err, LedgerError::LockTimeout { .. }));
    }

    // Concurrent access tests
    #[test]
    fn test_concurrent_insert_same_owner() {
        let store = Arc::new(InMemoryAccountStore::new());
        let owner = OwnerId::new();
        let mut handles = vec![];

        for _ in 0..10 {
            let store = Arc::clone(&store);
            handles.push(thread::spawn(move || store.insert(open(owner)).is_ok()));
        }

        let created = handles
            .into_iter()
            .map(|h| h.join().unwrap())
            .filter(|ok| *ok)
            .count();

        assert_eq!(created, 1);
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_concurrent_locked_increments_same_account() {
        let store = Arc::new(InMemoryAccountStore::new());
        let account = open(OwnerId::new());
        store.insert(account.clone()).unwrap();
        let mut handles = vec![];

        // 50 threads each add 1.0000 under the row lock
        for _ in 0..50 {
            let store = Arc::clone(&store);
            let id = account.id;
            handles.push(thread::spawn(move || {
                let locks = store.lock_for_update(&LockOrder::single(id), WAIT).unwrap();
                let mut row = store.read_locked(&locks).remove(0);
                row.balance += Decimal::new(10000, 4);
                store.write_locked(&locks, vec![row]).unwrap();
            }));
        }

        for handle in handles {
            handle.join().unwrap();
        }

        let stored = store.get(&account.id).unwrap();
        assert_eq!(stored.balance, Decimal::new(500000, 4));
        assert_eq!(stored.version, 50);
    }
}
