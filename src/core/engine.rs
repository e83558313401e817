//! Ledger Engine
//!
//! This module provides `LedgerEngine`, which orchestrates every balance
//! mutation: account creation, deposits, withdrawals, transfers, reversals
//! and the freeze/unfreeze status gate.
//!
//! # Architecture
//!
//! ```text
//! LedgerEngine
//!     ├── Arc<A: AccountStore>     (account rows + row locks)
//!     ├── Arc<L: LedgerStore>      (append-only entries)
//!     ├── IdempotencyGuard<L>      (committed-key pre-check)
//!     ├── Arc<CommitGate>          (atomic publication of commits)
//!     └── Arc<EngineConfig>
//! ```
//!
//! Every mutating operation follows the same shape:
//!
//! 1. Validate the plain inputs.
//! 2. Run the idempotency pre-check on its own, before any lock is taken.
//! 3. Open a [`UnitOfWork`] over the rows it touches; the locks are held from
//!    before the first balance/status read until commit or abort.
//! 4. Check status, currency and funds against the locked rows.
//! 5. Change the rows, stage the entries, commit.
//!
//! Any error after step 3 drops the unit of work, so no partial mutation is
//! ever committed.
//!
//! # Thread Safety
//!
//! The engine is `Clone` and cheap to share. Operations on different accounts
//! run in parallel; operations on the same account serialize on its row lock.
//! Commits are published through one [`CommitGate`]; reads that combine
//! several rows or entries go through [`LedgerEngine::snapshot`].

use chrono::Utc;
use rust_decimal::Decimal;
use std::sync::Arc;
use tracing::{info, instrument};
use uuid::Uuid;

use super::account_store::InMemoryAccountStore;
use super::idempotency::IdempotencyGuard;
use super::ledger_store::InMemoryLedgerStore;
use super::locks::{CommitGate, LockOrder};
use super::traits::{AccountStore, LedgerStore};
use super::unit_of_work::UnitOfWork;
use super::validation::{
    credited, debited, ensure_active, resolve_currency, validate_amount, validate_key,
    validate_remarks,
};
use crate::config::EngineConfig;
use crate::types::{
    Account, AccountId, AccountStatus, AccountView, EntryId, EntryType, EntryView, LedgerEntry,
    LedgerError, NewEntry, OwnerId, TransferReceipt,
};

/// Request to open an account
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CreateAccount {
    /// Owner of the new account (required)
    pub owner_id: Option<OwnerId>,
    /// Currency code; the configured default when absent
    pub currency: Option<String>,
}

/// Request to deposit into or withdraw from one account
#[derive(Debug, Clone, PartialEq)]
pub struct MovementRequest {
    pub amount: Decimal,
    /// Caller-supplied key making the request safe to retry
    pub idempotency_key: Option<String>,
    pub remarks: Option<String>,
}

impl MovementRequest {
    pub fn new(amount: Decimal) -> Self {
        Self {
            amount,
            idempotency_key: None,
            remarks: None,
        }
    }

    pub fn with_key(mut self, key: impl Into<String>) -> Self {
        self.idempotency_key = Some(key.into());
        self
    }

    pub fn with_remarks(mut self, remarks: impl Into<String>) -> Self {
        self.remarks = Some(remarks.into());
        self
    }
}

/// Request to move funds between two accounts
///
/// Transfers take no caller idempotency key; each leg gets a generated one.
#[derive(Debug, Clone, PartialEq)]
pub struct TransferRequest {
    pub from: AccountId,
    pub to: AccountId,
    pub amount: Decimal,
    pub remarks: Option<String>,
}

/// Balance-mutation orchestrator
#[derive(Debug)]
pub struct LedgerEngine<A = InMemoryAccountStore, L = InMemoryLedgerStore> {
    accounts: Arc<A>,
    ledger: Arc<L>,
    guard: IdempotencyGuard<L>,
    commits: Arc<CommitGate>,
    config: Arc<EngineConfig>,
}

impl<A, L> Clone for LedgerEngine<A, L> {
    fn clone(&self) -> Self {
        Self {
            accounts: Arc::clone(&self.accounts),
            ledger: Arc::clone(&self.ledger),
            guard: self.guard.clone(),
            commits: Arc::clone(&self.commits),
            config: Arc::clone(&self.config),
        }
    }
}

impl LedgerEngine {
    /// Engine over fresh in-memory stores
    pub fn in_memory(config: EngineConfig) -> Self {
        Self::new(
            Arc::new(InMemoryAccountStore::new()),
            Arc::new(InMemoryLedgerStore::new()),
            config,
        )
    }
}

impl<A: AccountStore, L: LedgerStore> LedgerEngine<A, L> {
    /// Create a new LedgerEngine over the given stores
    ///
    /// # Arguments
    ///
    /// * `accounts` - Account Store shared with other engines/readers
    /// * `ledger` - Ledger Store shared with other engines/readers
    /// * `config` - Amount bounds, defaults and lock timeout
    pub fn new(accounts: Arc<A>, ledger: Arc<L>, config: EngineConfig) -> Self {
        Self {
            guard: IdempotencyGuard::new(Arc::clone(&ledger)),
            accounts,
            ledger,
            commits: Arc::new(CommitGate::new()),
            config: Arc::new(config),
        }
    }

    pub fn accounts(&self) -> &A {
        &self.accounts
    }

    pub fn ledger(&self) -> &L {
        &self.ledger
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Run `read` against the stores with no commit half-applied
    ///
    /// Every query and monitoring view reads through here. `read` must not
    /// call back into another snapshot of the same engine.
    pub fn snapshot<T>(&self, read: impl FnOnce(&A, &L) -> T) -> T {
        self.commits.snapshot(|| read(&self.accounts, &self.ledger))
    }

    fn begin(&self, order: LockOrder) -> Result<UnitOfWork<'_, A, L>, LedgerError> {
        UnitOfWork::begin(
            &*self.accounts,
            &*self.ledger,
            &self.commits,
            order,
            self.config.lock_timeout,
        )
    }

    /// Open a new ACTIVE account with a zero balance
    ///
    /// # Returns
    ///
    /// * `Ok(AccountView)` - The new account
    /// * `Err(LedgerError::Validation)` - Missing owner or malformed currency
    /// * `Err(LedgerError::AccountAlreadyExists)` - The owner already has an account
    pub fn create_account(&self, request: CreateAccount) -> Result<AccountView, LedgerError> {
        let owner = request
            .owner_id
            .ok_or_else(|| LedgerError::validation("User ID is required"))?;
        let currency = resolve_currency(request.currency.as_deref(), &self.config)?;

        if self.accounts.find_by_owner(&owner).is_some() {
            return Err(LedgerError::AccountAlreadyExists { owner });
        }

        let account = Account::open(owner, currency, Utc::now());
        let view = AccountView::from(&account);
        self.commits.publish(|| self.accounts.insert(account))?;

        info!(account = %view.id, owner = %owner, currency = %view.currency, "account created");
        Ok(view)
    }

    /// Credit funds to an account
    ///
    /// # Returns
    ///
    /// * `Ok(EntryView)` - The DEPOSIT entry, with the new balance as `balance_after`
    /// * `Err(LedgerError::InvalidAmount)` - Amount out of bounds
    /// * `Err(LedgerError::DuplicateTransaction)` - Idempotency key already used
    /// * `Err(LedgerError::AccountNotFound)` / `Err(LedgerError::AccountFrozen)`
    #[instrument(skip(self, request), fields(account = %account_id, amount = %request.amount))]
    pub fn deposit(
        &self,
        account_id: AccountId,
        request: MovementRequest,
    ) -> Result<EntryView, LedgerError> {
        self.apply_movement(account_id, EntryType::Deposit, request)
    }

    /// Debit funds from an account
    ///
    /// Same contract as [`deposit`](Self::deposit), plus
    /// `Err(LedgerError::InsufficientFunds)` when the balance is below the amount.
    #[instrument(skip(self, request), fields(account = %account_id, amount = %request.amount))]
    pub fn withdraw(
        &self,
        account_id: AccountId,
        request: MovementRequest,
    ) -> Result<EntryView, LedgerError> {
        self.apply_movement(account_id, EntryType::Withdrawal, request)
    }

    fn apply_movement(
        &self,
        account_id: AccountId,
        entry_type: EntryType,
        request: MovementRequest,
    ) -> Result<EntryView, LedgerError> {
        let amount = validate_amount(request.amount, &self.config)?;
        validate_key(request.idempotency_key.as_deref(), &self.config)?;
        let remarks = validate_remarks(request.remarks.as_deref(), &self.config)?;

        // Runs against committed state only, before any row lock is taken
        let key = self.guard.check(request.idempotency_key.as_deref())?;

        let mut uow = self.begin(LockOrder::single(account_id))?;
        let account = uow.account(&account_id)?;
        ensure_active(account)?;

        let operation = operation_name(entry_type);
        let balance = if entry_type.is_credit() {
            credited(account, amount, operation)?
        } else {
            debited(account, amount, operation)?
        };

        let row = uow.account_mut(&account_id)?;
        row.balance = balance;
        row.updated_at = Utc::now();

        uow.stage(NewEntry {
            id: EntryId::new(),
            account_id,
            entry_type,
            amount,
            balance_after: balance,
            idempotency_key: key,
            remarks,
            related_entry_id: None,
        });
        let entry = single_entry(uow.commit()?)?;

        info!(
            entry = %entry.id,
            account = %account_id,
            entry_type = %entry_type,
            amount = %amount,
            balance = %balance,
            "{} completed",
            operation
        );
        Ok(EntryView::from(entry))
    }

    /// Move funds from one account to another
    ///
    /// Both rows are locked in global order (see [`LockOrder::pair`]) before
    /// either balance is read. The TRANSFER_OUT and TRANSFER_IN entries
    /// reference each other and are appended in one batch.
    ///
    /// # Returns
    ///
    /// * `Ok(TransferReceipt)` - Both legs
    /// * `Err(LedgerError::InvalidOperation)` - Source and destination are the same account
    /// * `Err(LedgerError::AccountNotFound)` / `Err(LedgerError::AccountFrozen)` - Either side
    /// * `Err(LedgerError::CurrencyMismatch)` - Accounts hold different currencies
    /// * `Err(LedgerError::InsufficientFunds)` - Source balance below the amount
    #[instrument(
        skip(self, request),
        fields(from = %request.from, to = %request.to, amount = %request.amount)
    )]
    pub fn transfer(&self, request: TransferRequest) -> Result<TransferReceipt, LedgerError> {
        let TransferRequest {
            from,
            to,
            amount,
            remarks,
        } = request;

        let amount = validate_amount(amount, &self.config)?;
        let remarks = validate_remarks(remarks.as_deref(), &self.config)?;
        if from == to {
            return Err(LedgerError::invalid_operation(
                "Cannot transfer to the same account",
            ));
        }

        let mut uow = self.begin(LockOrder::pair(from, to)?)?;
        let source = uow.account(&from)?;
        let destination = uow.account(&to)?;
        ensure_active(source)?;
        ensure_active(destination)?;

        if source.currency != destination.currency {
            return Err(LedgerError::CurrencyMismatch {
                from_currency: source.currency.clone(),
                to_currency: destination.currency.clone(),
            });
        }

        let source_balance = debited(source, amount, "transfer")?;
        let destination_balance = credited(destination, amount, "transfer")?;

        let now = Utc::now();
        let row = uow.account_mut(&from)?;
        row.balance = source_balance;
        row.updated_at = now;
        let row = uow.account_mut(&to)?;
        row.balance = destination_balance;
        row.updated_at = now;

        let debit_id = EntryId::new();
        let credit_id = EntryId::new();
        uow.stage(NewEntry {
            id: debit_id,
            account_id: from,
            entry_type: EntryType::TransferOut,
            amount,
            balance_after: source_balance,
            idempotency_key: Some(Uuid::new_v4().to_string()),
            remarks: Some(annotate(remarks.as_deref(), "To", to)),
            related_entry_id: Some(credit_id),
        });
        uow.stage(NewEntry {
            id: credit_id,
            account_id: to,
            entry_type: EntryType::TransferIn,
            amount,
            balance_after: destination_balance,
            idempotency_key: Some(Uuid::new_v4().to_string()),
            remarks: Some(annotate(remarks.as_deref(), "From", from)),
            related_entry_id: Some(debit_id),
        });

        let mut committed = uow.commit()?.into_iter();
        let (Some(debit), Some(credit)) = (committed.next(), committed.next()) else {
            return Err(LedgerError::store_unavailable(
                "ledger store returned fewer entries than inserted",
            ));
        };

        info!(
            debit = %debit.id,
            credit = %credit.id,
            from = %from,
            to = %to,
            amount = %amount,
            "transfer completed"
        );
        Ok(TransferReceipt {
            debit: EntryView::from(debit),
            credit: EntryView::from(credit),
        })
    }

    /// Reverse a prior deposit or withdrawal
    ///
    /// The reversal entry has the inverse type, the original amount, the
    /// idempotency key derived from the original id and a related-entry
    /// reference to the original. An entry can be reversed at most once.
    ///
    /// # Returns
    ///
    /// * `Ok(EntryView)` - The reversal entry
    /// * `Err(LedgerError::EntryNotFound)` - No entry with that id
    /// * `Err(LedgerError::InvalidOperation)` - The entry is a transfer leg
    /// * `Err(LedgerError::DuplicateTransaction)` - Already reversed
    /// * `Err(LedgerError::InsufficientFunds)` - Reversing a deposit whose funds are gone
    #[instrument(skip(self), fields(entry = %entry_id))]
    pub fn reverse(&self, entry_id: EntryId) -> Result<EntryView, LedgerError> {
        let original = self
            .ledger
            .get(&entry_id)
            .ok_or(LedgerError::EntryNotFound { entry: entry_id })?;
        let entry_type = original.entry_type.inverse().ok_or_else(|| {
            LedgerError::invalid_operation(format!(
                "Only DEPOSIT and WITHDRAWAL transactions can be reversed, got {}",
                original.entry_type
            ))
        })?;

        let key = self.config.reversal_key(entry_id);
        self.guard.check_key(&key)?;

        let account_id = original.account_id;
        let mut uow = self.begin(LockOrder::single(account_id))?;
        let account = uow.account(&account_id)?;
        ensure_active(account)?;

        let balance = if entry_type.is_credit() {
            credited(account, original.amount, "reversal")?
        } else {
            debited(account, original.amount, "reversal")?
        };

        let row = uow.account_mut(&account_id)?;
        row.balance = balance;
        row.updated_at = Utc::now();

        uow.stage(NewEntry {
            id: EntryId::new(),
            account_id,
            entry_type,
            amount: original.amount,
            balance_after: balance,
            idempotency_key: Some(key),
            remarks: Some(format!("Reversal of: {}", entry_id)),
            related_entry_id: Some(entry_id),
        });
        let entry = single_entry(uow.commit()?)?;

        info!(
            entry = %entry.id,
            original = %entry_id,
            account = %account_id,
            entry_type = %entry_type,
            amount = %entry.amount,
            "reversal completed"
        );
        Ok(EntryView::from(entry))
    }

    /// Block all mutations on an ACTIVE account
    ///
    /// A missing or non-ACTIVE account is reported as `AccountNotFound`.
    #[instrument(skip(self), fields(account = %account_id))]
    pub fn freeze(&self, account_id: AccountId) -> Result<AccountView, LedgerError> {
        let mut uow = self.begin(LockOrder::single(account_id))?;
        if !uow.account(&account_id)?.is_active() {
            return Err(LedgerError::account_not_found(account_id));
        }

        let view = set_status(&mut uow, account_id, AccountStatus::Frozen)?;
        uow.commit()?;

        info!(account = %account_id, "account frozen");
        Ok(view)
    }

    /// Return a FROZEN account to ACTIVE
    #[instrument(skip(self), fields(account = %account_id))]
    pub fn unfreeze(&self, account_id: AccountId) -> Result<AccountView, LedgerError> {
        let mut uow = self.begin(LockOrder::single(account_id))?;
        let status = uow.account(&account_id)?.status;
        if status != AccountStatus::Frozen {
            return Err(LedgerError::invalid_operation(format!(
                "Account {} is not frozen",
                account_id
            )));
        }

        let view = set_status(&mut uow, account_id, AccountStatus::Active)?;
        uow.commit()?;

        info!(account = %account_id, "account unfrozen");
        Ok(view)
    }
}

fn set_status<A: AccountStore, L: LedgerStore>(
    uow: &mut UnitOfWork<'_, A, L>,
    account_id: AccountId,
    status: AccountStatus,
) -> Result<AccountView, LedgerError> {
    let row = uow.account_mut(&account_id)?;
    row.status = status;
    row.updated_at = Utc::now();
    Ok(AccountView::from(&*row))
}

fn operation_name(entry_type: EntryType) -> &'static str {
    match entry_type {
        EntryType::Deposit => "deposit",
        EntryType::Withdrawal => "withdrawal",
        EntryType::TransferOut | EntryType::TransferIn => "transfer",
    }
}

/// Transfer leg remarks: caller remarks followed by the counterpart account
fn annotate(remarks: Option<&str>, direction: &str, counterpart: AccountId) -> String {
    match remarks {
        Some(remarks) => format!("{} [{}: {}]", remarks, direction, counterpart),
        None => format!("[{}: {}]", direction, counterpart),
    }
}

fn single_entry(committed: Vec<LedgerEntry>) -> Result<LedgerEntry, LedgerError> {
    committed
        .into_iter()
        .next()
        .ok_or_else(|| LedgerError::store_unavailable("ledger store returned no entry"))
}
