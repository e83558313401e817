//! Row locks and the global lock order
//!
//! Every mutating operation holds an exclusive lock on each account row it
//! reads or writes, from before the first read until commit or abort.
//!
//! # Lock ordering
//!
//! Operations that touch two accounts acquire both locks in one call, in the
//! order given by [`lock_order`]. Because the order depends only on the pair
//! of ids (never on which one is the source of a transfer), two transfers
//! between the same accounts in opposite directions request the locks in the
//! same sequence and cannot wait on each other in a cycle.
//!
//! [`LockOrder`] is the only input the Account Store accepts for locking, and
//! it can only be built through [`lock_order`], so no caller can lock a pair
//! in any other sequence.
//!
//! # Publication
//!
//! Row locks only order writers. Readers take no row locks, so a commit that
//! touches several rows and entries is published under the write side of a
//! [`CommitGate`], and readers that need a consistent view take its read side.

use parking_lot::{Condvar, Mutex, RwLock};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::debug;

use crate::types::{AccountId, LedgerError};

/// Order an unordered pair of account ids for lock acquisition
///
/// The order is lexicographic on the canonical (hyphenated, lowercase) string
/// form of the ids, which coincides with UUID byte order. The result is the
/// same for `(a, b)` and `(b, a)`.
pub fn lock_order(a: AccountId, b: AccountId) -> (AccountId, AccountId) {
    if a <= b {
        (a, b)
    } else {
        (b, a)
    }
}

/// Account ids in the sequence their locks must be taken
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LockOrder(Vec<AccountId>);

impl LockOrder {
    /// Lock a single account
    pub fn single(account: AccountId) -> Self {
        LockOrder(vec![account])
    }

    /// Lock two distinct accounts in global order
    ///
    /// Fails with `InvalidOperation` when both ids are the same account.
    pub fn pair(a: AccountId, b: AccountId) -> Result<Self, LedgerError> {
        if a == b {
            return Err(LedgerError::invalid_operation(
                "Cannot lock the same account twice",
            ));
        }
        let (first, second) = lock_order(a, b);
        Ok(LockOrder(vec![first, second]))
    }

    pub fn ids(&self) -> &[AccountId] {
        &self.0
    }
}

/// Exclusive lock guarding one account row
///
/// Waiters block on a condition variable until the holder releases or their
/// deadline passes. The lock is not reentrant.
#[derive(Debug, Default)]
pub struct RowLock {
    held: Mutex<bool>,
    released: Condvar,
}

impl RowLock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Take the lock, waiting at most until `deadline`
    ///
    /// Returns `None` if the deadline passes while another holder keeps the lock.
    pub fn acquire_until(self: &Arc<Self>, deadline: Instant) -> Option<RowGuard> {
        let mut held = self.held.lock();
        while *held {
            if self.released.wait_until(&mut held, deadline).timed_out() && *held {
                return None;
            }
        }
        *held = true;
        Some(RowGuard {
            row: Arc::clone(self),
        })
    }

    /// Whether some guard currently holds this lock
    pub fn is_held(&self) -> bool {
        *self.held.lock()
    }
}

/// Proof of holding a [`RowLock`]; releases it on drop
#[derive(Debug)]
pub struct RowGuard {
    row: Arc<RowLock>,
}

impl Drop for RowGuard {
    fn drop(&mut self) {
        let mut held = self.row.held.lock();
        *held = false;
        drop(held);
        self.row.released.notify_one();
    }
}

/// The set of row locks held by one unit of work
///
/// Holds the guards in acquisition order; dropping the set releases every
/// lock on every exit path.
#[derive(Debug)]
pub struct AccountLocks {
    held: Vec<(AccountId, RowGuard)>,
}

impl AccountLocks {
    /// Acquire the locks named by `order`, in order, under one shared deadline
    ///
    /// `resolve` maps an account id to its row lock; ids it does not know are
    /// skipped (they are simply absent from the locked set). On timeout every
    /// lock taken so far is released and `LockTimeout` is returned.
    pub fn acquire<F>(order: &LockOrder, timeout: Duration, resolve: F) -> Result<Self, LedgerError>
    where
        F: Fn(&AccountId) -> Option<Arc<RowLock>>,
    {
        let started = Instant::now();
        let deadline = started + timeout;
        let mut held = Vec::with_capacity(order.ids().len());

        for id in order.ids() {
            let Some(row) = resolve(id) else {
                continue;
            };
            match row.acquire_until(deadline) {
                Some(guard) => {
                    debug!(account = %id, "row lock acquired");
                    held.push((*id, guard));
                }
                None => {
                    // `held` drops here, releasing earlier locks
                    return Err(LedgerError::LockTimeout {
                        account: *id,
                        waited_ms: started.elapsed().as_millis() as u64,
                    });
                }
            }
        }

        Ok(Self { held })
    }

    /// Whether `account` is covered by this lock set
    pub fn covers(&self, account: &AccountId) -> bool {
        self.held.iter().any(|(id, _)| id == account)
    }

    /// Locked account ids, in acquisition order
    pub fn ids(&self) -> impl Iterator<Item = &AccountId> {
        self.held.iter().map(|(id, _)| id)
    }

    pub fn len(&self) -> usize {
        self.held.len()
    }

    pub fn is_empty(&self) -> bool {
        self.held.is_empty()
    }
}

/// Publication barrier between committing writers and lock-free readers
///
/// A commit appends its entries and writes its rows inside [`publish`]; a
/// reader that looks at more than one row or entry does so inside
/// [`snapshot`]. Readers therefore see every commit either whole or not at
/// all. Row locks are always taken before the gate, never while holding it.
///
/// The read side is not reentrant: a snapshot closure must not open another
/// snapshot on the same gate.
///
/// [`publish`]: CommitGate::publish
/// [`snapshot`]: CommitGate::snapshot
#[derive(Debug, Default)]
pub struct CommitGate {
    published: RwLock<()>,
}

impl CommitGate {
    pub fn new() -> Self {
        Self::default()
    }

    /// Run `commit` exclusively of every snapshot
    pub fn publish<T>(&self, commit: impl FnOnce() -> T) -> T {
        let _exclusive = self.published.write();
        commit()
    }

    /// Run `read` against committed state with no commit half-applied
    pub fn snapshot<T>(&self, read: impl FnOnce() -> T) -> T {
        let _shared = self.published.read();
        read()
    }
}
