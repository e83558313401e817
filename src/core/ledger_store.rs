//! In-memory Ledger Store
//!
//! This module provides `InMemoryLedgerStore`, the append-only table of ledger
//! entries together with the indexes the engine queries:
//!
//! - by entry id
//! - by idempotency key (unique)
//! - by owning account, in insertion order, for paginated history
//! - by related-entry reference
//!
//! # Design
//!
//! The table and all of its indexes sit behind one `parking_lot::RwLock`, so a
//! batch inserted by [`LedgerStore::insert_all`] becomes visible to readers all
//! at once and the unique key check and the insert happen under the same
//! write lock. Entries are never updated or removed.

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use std::collections::{HashMap, HashSet};

use super::traits::{EntryFilter, LedgerStore};
use crate::types::{AccountId, EntryId, LedgerEntry, LedgerError, NewEntry};

#[derive(Debug, Default)]
struct LedgerTables {
    entries: HashMap<EntryId, LedgerEntry>,
    by_key: HashMap<String, EntryId>,
    by_account: HashMap<AccountId, Vec<EntryId>>,
    by_related: HashMap<EntryId, Vec<EntryId>>,
    sequence: u64,
    last_created_at: Option<DateTime<Utc>>,
}

impl LedgerTables {
    /// Timestamp for the next row, never earlier than the previous one
    fn next_timestamp(&mut self) -> DateTime<Utc> {
        let now = Utc::now();
        let stamped = match self.last_created_at {
            Some(last) if last > now => last,
            _ => now,
        };
        self.last_created_at = Some(stamped);
        stamped
    }

    fn resolve(&self, ids: &[EntryId]) -> Vec<LedgerEntry> {
        ids.iter()
            .filter_map(|id| self.entries.get(id).cloned())
            .collect()
    }
}

/// Thread-safe append-only entry table
#[derive(Debug, Default)]
pub struct InMemoryLedgerStore {
    tables: RwLock<LedgerTables>,
}

impl InMemoryLedgerStore {
    /// Create a new empty store
    pub fn new() -> Self {
        Self::default()
    }
}

impl LedgerStore for InMemoryLedgerStore {
    /// Append a batch of entries atomically
    ///
    /// # Arguments
    ///
    /// * `entries` - Staged entries, inserted in the given order
    ///
    /// # Returns
    ///
    /// * `Ok(Vec<LedgerEntry>)` - The stamped entries, in insertion order
    /// * `Err(LedgerError::DuplicateTransaction)` - A key is already taken; nothing was inserted
    fn insert_all(&self, entries: Vec<NewEntry>) -> Result<Vec<LedgerEntry>, LedgerError> {
        let mut tables = self.tables.write();

        let mut batch_keys = HashSet::new();
        for entry in &entries {
            if tables.entries.contains_key(&entry.id) {
                return Err(LedgerError::invalid_operation(format!(
                    "Transaction {} already recorded",
                    entry.id
                )));
            }
            if let Some(key) = entry.idempotency_key.as_deref() {
                if tables.by_key.contains_key(key) || !batch_keys.insert(key) {
                    return Err(LedgerError::duplicate_transaction(key));
                }
            }
        }

        let mut stamped = Vec::with_capacity(entries.len());
        for entry in entries {
            tables.sequence += 1;
            let sequence = tables.sequence;
            let created_at = tables.next_timestamp();
            let entry = LedgerEntry::stamp(entry, created_at, sequence);

            if let Some(key) = &entry.idempotency_key {
                tables.by_key.insert(key.clone(), entry.id);
            }
            tables
                .by_account
                .entry(entry.account_id)
                .or_default()
                .push(entry.id);
            if let Some(related) = entry.related_entry_id {
                tables.by_related.entry(related).or_default().push(entry.id);
            }
            tables.entries.insert(entry.id, entry.clone());
            stamped.push(entry);
        }

        Ok(stamped)
    }

    fn get(&self, id: &EntryId) -> Option<LedgerEntry> {
        self.tables.read().entries.get(id).cloned()
    }

    fn find_by_idempotency_key(&self, key: &str) -> Option<LedgerEntry> {
        let tables = self.tables.read();
        let id = tables.by_key.get(key)?;
        tables.entries.get(id).cloned()
    }

    fn exists_by_idempotency_key(&self, key: &str) -> bool {
        self.tables.read().by_key.contains_key(key)
    }

    fn find_by_related(&self, id: &EntryId) -> Vec<LedgerEntry> {
        let tables = self.tables.read();
        tables
            .by_related
            .get(id)
            .map(|ids| tables.resolve(ids))
            .unwrap_or_default()
    }

    /// One page of an account's entries, newest first
    ///
    /// Returns the page and the number of entries matching `filter` across all
    /// pages. A page past the end is empty.
    fn page_by_account(
        &self,
        account: &AccountId,
        filter: &EntryFilter,
        page: u32,
        size: u32,
    ) -> (Vec<LedgerEntry>, u64) {
        let tables = self.tables.read();
        let Some(ids) = tables.by_account.get(account) else {
            return (Vec::new(), 0);
        };

        // Insertion order is creation order, so walking backwards is newest first
        let matching: Vec<&LedgerEntry> = ids
            .iter()
            .rev()
            .filter_map(|id| tables.entries.get(id))
            .filter(|entry| filter.matches(entry))
            .collect();

        let total = matching.len() as u64;
        let skip = (page as usize).saturating_mul(size as usize);
        let items = matching
            .into_iter()
            .skip(skip)
            .take(size as usize)
            .cloned()
            .collect();

        (items, total)
    }

    fn count_by_account(&self, account: &AccountId) -> u64 {
        self.tables
            .read()
            .by_account
            .get(account)
            .map_or(0, |ids| ids.len() as u64)
    }

    fn list_by_account(&self, account: &AccountId) -> Vec<LedgerEntry> {
        let tables = self.tables.read();
        tables
            .by_account
            .get(account)
            .map(|ids| tables.resolve(ids))
            .unwrap_or_default()
    }

    fn len(&self) -> u64 {
        self.tables.read().entries.len() as u64
    }
}
