//! Idempotency Guard
//!
//! Checks a caller-supplied idempotency key against the committed contents of
//! the Ledger Store. The check runs on its own, outside the caller's unit of
//! work: it never sees entries the caller has staged, it takes no row locks,
//! and its verdict is final whatever the caller does afterwards.
//!
//! The guard is a pre-check. Two callers racing with the same fresh key can
//! both pass it; the unique key index of [`LedgerStore::insert_all`] then
//! rejects the loser at commit with the same `DuplicateTransaction` error.

use std::sync::Arc;
use tracing::{debug, warn};

use super::traits::LedgerStore;
use crate::types::LedgerError;

/// Rejects idempotency keys that a committed entry already carries
#[derive(Debug)]
pub struct IdempotencyGuard<L> {
    ledger: Arc<L>,
}

impl<L> Clone for IdempotencyGuard<L> {
    fn clone(&self) -> Self {
        Self {
            ledger: Arc::clone(&self.ledger),
        }
    }
}

impl<L: LedgerStore> IdempotencyGuard<L> {
    pub fn new(ledger: Arc<L>) -> Self {
        Self { ledger }
    }

    /// Check an optional caller key
    ///
    /// # Returns
    ///
    /// * `Ok(None)` - No key was supplied (blank keys count as none)
    /// * `Ok(Some(key))` - The trimmed key, not used by any committed entry
    /// * `Err(LedgerError::DuplicateTransaction)` - The key is already taken
    pub fn check(&self, key: Option<&str>) -> Result<Option<String>, LedgerError> {
        let Some(key) = key.map(str::trim).filter(|k| !k.is_empty()) else {
            return Ok(None);
        };
        self.check_key(key)?;
        Ok(Some(key.to_string()))
    }

    /// Check a key that must be present, such as one derived for a reversal
    pub fn check_key(&self, key: &str) -> Result<(), LedgerError> {
        if self.ledger.exists_by_idempotency_key(key) {
            warn!(key = %key, "duplicate idempotency key rejected");
            return Err(LedgerError::duplicate_transaction(key));
        }
        debug!(key = %key, "idempotency key accepted");
        Ok(())
    }
}
