//! Read-only queries
//!
//! Queries take no row locks. Each one reads inside a single
//! [`LedgerEngine::snapshot`], so it observes committed state with no commit
//! half-applied (never one leg of a transfer without the other). Account
//! lookups only see ACTIVE accounts: a frozen or closed account is reported as
//! `AccountNotFound`, exactly as mutations treat it.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;

use super::engine::LedgerEngine;
use super::traits::{AccountStore, EntryFilter, LedgerStore};
use super::validation::validate_page_size;
use crate::types::{Account, AccountId, AccountView, EntryId, EntryType, EntryView, LedgerError};

/// Paginated, optionally filtered history request
#[derive(Debug, Clone, Default, PartialEq)]
pub struct HistoryRequest {
    /// Zero-based page index
    pub page: u32,
    /// Page size; the configured default when unset
    pub size: Option<u32>,
    pub entry_type: Option<EntryType>,
    /// Inclusive lower bound on creation time
    pub from: Option<DateTime<Utc>>,
    /// Inclusive upper bound on creation time
    pub to: Option<DateTime<Utc>>,
}

impl HistoryRequest {
    pub fn page(page: u32, size: u32) -> Self {
        Self {
            page,
            size: Some(size),
            ..Default::default()
        }
    }

    /// Restrict to one entry type given by name (`DEPOSIT`, `withdrawal`, ...)
    pub fn with_type_name(mut self, name: &str) -> Result<Self, LedgerError> {
        self.entry_type = Some(name.parse()?);
        Ok(self)
    }
}

/// One page of results
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub page: u32,
    pub size: u32,
    pub total_items: u64,
    pub total_pages: u64,
}

fn active_account<A: AccountStore>(accounts: &A, id: &AccountId) -> Result<Account, LedgerError> {
    accounts
        .get(id)
        .filter(Account::is_active)
        .ok_or_else(|| LedgerError::account_not_found(*id))
}

impl<A: AccountStore, L: LedgerStore> LedgerEngine<A, L> {
    /// Entry by id
    pub fn get_entry(&self, id: EntryId) -> Result<EntryView, LedgerError> {
        self.snapshot(|_, ledger| ledger.get(&id))
            .map(EntryView::from)
            .ok_or(LedgerError::EntryNotFound { entry: id })
    }

    /// Public view of an ACTIVE account
    pub fn get_account(&self, id: AccountId) -> Result<AccountView, LedgerError> {
        self.snapshot(|accounts, _| active_account(accounts, &id))
            .map(AccountView::from)
    }

    /// Current balance of an ACTIVE account
    pub fn get_balance(&self, id: AccountId) -> Result<Decimal, LedgerError> {
        self.snapshot(|accounts, _| active_account(accounts, &id))
            .map(|account| account.balance)
    }

    /// Entry history of an ACTIVE account, newest first
    ///
    /// # Returns
    ///
    /// * `Ok(Page<EntryView>)` - The requested page; empty past the last page
    /// * `Err(LedgerError::Validation)` - Page size out of range or `from` after `to`
    /// * `Err(LedgerError::AccountNotFound)` - Account missing or not ACTIVE
    pub fn history(
        &self,
        id: AccountId,
        request: HistoryRequest,
    ) -> Result<Page<EntryView>, LedgerError> {
        let size = request.size.unwrap_or(self.config().default_page_size);
        validate_page_size(size, self.config())?;
        if let (Some(from), Some(to)) = (request.from, request.to) {
            if from > to {
                return Err(LedgerError::validation(
                    "Start date must not be after end date",
                ));
            }
        }

        let filter = EntryFilter {
            entry_type: request.entry_type,
            from: request.from,
            to: request.to,
        };
        let (items, total_items) = self.snapshot(|accounts, ledger| {
            active_account(accounts, &id)?;
            Ok::<_, LedgerError>(ledger.page_by_account(&id, &filter, request.page, size))
        })?;

        Ok(Page {
            items: items.into_iter().map(EntryView::from).collect(),
            page: request.page,
            size,
            total_items,
            total_pages: total_items.div_ceil(u64::from(size)),
        })
    }

    /// Entries linked to `id`: the other leg of a transfer, or the reversal
    /// of a deposit/withdrawal
    pub fn related_entries(&self, id: EntryId) -> Result<Vec<EntryView>, LedgerError> {
        let related = self.snapshot(|_, ledger| {
            ledger
                .get(&id)
                .map(|_| ledger.find_by_related(&id))
                .ok_or(LedgerError::EntryNotFound { entry: id })
        })?;
        Ok(related.into_iter().map(EntryView::from).collect())
    }
}
