//! Monitoring and audit queries
//!
//! System-wide views over the committed state: accounts by owner or status,
//! the total balance held, entry counts, and a per-account reconciliation of
//! the stored balance against the ledger. Every view reads inside one
//! [`LedgerEngine::snapshot`], so totals and reconciliations never observe a
//! commit half-applied.

use rust_decimal::Decimal;
use serde::Serialize;

use super::engine::LedgerEngine;
use super::traits::{AccountStore, LedgerStore};
use crate::types::{AccountId, AccountStatus, AccountView, LedgerError, OwnerId};

/// Result of reconciling one account against its entries
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Reconciliation {
    pub account: AccountId,
    /// Balance held on the account row
    pub stored_balance: Decimal,
    /// Sum of the signed amounts of every entry on the account
    pub ledger_balance: Decimal,
    /// `balance_after` of the newest entry, if any
    pub last_balance_after: Option<Decimal>,
    pub entry_count: u64,
}

impl Reconciliation {
    /// Stored balance, ledger sum and newest snapshot all agree, and none is negative
    pub fn is_consistent(&self) -> bool {
        let snapshot = self.last_balance_after.unwrap_or(Decimal::ZERO);
        self.stored_balance == self.ledger_balance
            && self.stored_balance == snapshot
            && self.stored_balance >= Decimal::ZERO
    }
}

/// Read-only aggregate views over an engine's stores
#[derive(Debug)]
pub struct LedgerMonitor<A, L> {
    engine: LedgerEngine<A, L>,
}

impl<A: AccountStore, L: LedgerStore> LedgerMonitor<A, L> {
    pub fn new(engine: LedgerEngine<A, L>) -> Self {
        Self { engine }
    }

    /// Accounts registered for an owner (at most one)
    pub fn accounts_by_owner(&self, owner: OwnerId) -> Vec<AccountView> {
        self.engine
            .snapshot(|accounts, _| accounts.find_by_owner(&owner))
            .map(AccountView::from)
            .into_iter()
            .collect()
    }

    /// Accounts currently in `status`, ordered by creation time
    pub fn accounts_by_status(&self, status: AccountStatus) -> Vec<AccountView> {
        let mut accounts = self
            .engine
            .snapshot(|accounts, _| accounts.find_by_status(status));
        accounts.sort_by_key(|account| (account.created_at, account.id));
        accounts.into_iter().map(AccountView::from).collect()
    }

    /// Sum of the balances of every account, whatever its status
    pub fn total_balance(&self) -> Decimal {
        self.engine.snapshot(|accounts, _| {
            accounts
                .all()
                .iter()
                .map(|account| account.balance)
                .sum()
        })
    }

    pub fn active_account_count(&self) -> usize {
        self.engine
            .snapshot(|accounts, _| accounts.find_by_status(AccountStatus::Active))
            .len()
    }

    /// Number of entries recorded against an account
    pub fn entry_count(&self, account: AccountId) -> u64 {
        self.engine
            .snapshot(|_, ledger| ledger.count_by_account(&account))
    }

    /// Recompute an account's balance from its entries
    ///
    /// Unlike the query operations this sees accounts in any status. The row
    /// and the entries are read in the same snapshot.
    pub fn reconcile(&self, account: AccountId) -> Result<Reconciliation, LedgerError> {
        let (row, entries) = self.engine.snapshot(|accounts, ledger| {
            (accounts.get(&account), ledger.list_by_account(&account))
        });
        let row = row.ok_or_else(|| LedgerError::account_not_found(account))?;

        Ok(Reconciliation {
            account,
            stored_balance: row.balance,
            ledger_balance: entries.iter().map(|entry| entry.signed_amount()).sum(),
            last_balance_after: entries.last().map(|entry| entry.balance_after),
            entry_count: entries.len() as u64,
        })
    }
}
