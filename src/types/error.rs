//! Error types for the ledger engine
//!
//! Every engine failure is a [`LedgerError`]. Variants carry enough context to
//! produce a useful message; [`LedgerError::kind`] collapses them onto the
//! discriminant the boundary layer maps to a transport status.
//!
//! # Error Categories
//!
//! - **Input errors**: malformed ids, amounts, currency codes, page bounds
//! - **State errors**: missing/frozen accounts, insufficient funds, currency mismatch
//! - **Idempotency errors**: duplicate keys, repeated reversals
//! - **Infrastructure errors**: lock-wait timeouts, store unavailability (retryable)

use rust_decimal::Decimal;
use thiserror::Error;

use super::account::{AccountStatus, CurrencyCode};
use super::ids::{AccountId, EntryId, OwnerId};

/// Main error type for the ledger engine
#[derive(Debug, Clone, PartialEq, Error)]
pub enum LedgerError {
    /// Malformed or out-of-range input (missing id, bad currency, bad page bounds)
    #[error("Validation failed: {message}")]
    Validation {
        /// Description of the rejected input
        message: String,
    },

    /// Amount is zero, negative, above the configured ceiling or too precise
    #[error("Invalid amount {amount}: {reason}")]
    InvalidAmount {
        /// The rejected amount
        amount: Decimal,
        /// Why it was rejected
        reason: String,
    },

    /// Account does not exist or is not visible to the query policy
    #[error("Account {account} not found")]
    AccountNotFound {
        /// The account that could not be resolved
        account: AccountId,
    },

    /// No account is registered for an owner
    #[error("No account found for owner {owner}")]
    OwnerNotFound {
        /// The owner that could not be resolved
        owner: OwnerId,
    },

    /// Account creation for an owner that already has one
    #[error("Account already exists for owner {owner}")]
    AccountAlreadyExists {
        /// The owner with an existing account
        owner: OwnerId,
    },

    /// Mutation attempted on an account that is not ACTIVE
    #[error("Account {account} is {status}")]
    AccountFrozen {
        /// The account that rejected the mutation
        account: AccountId,
        /// Its current status
        status: AccountStatus,
    },

    /// Withdrawal, transfer or reversal would drive the balance below zero
    #[error("Insufficient funds in account {account}: balance {balance}, requested {requested}")]
    InsufficientFunds {
        /// The account being debited
        account: AccountId,
        /// Balance at the time of the check
        balance: Decimal,
        /// Amount requested
        requested: Decimal,
    },

    /// Transfer between accounts with different currencies
    #[error("Currency mismatch between accounts: {from_currency} -> {to_currency}")]
    CurrencyMismatch {
        /// Currency of the source account
        from_currency: CurrencyCode,
        /// Currency of the destination account
        to_currency: CurrencyCode,
    },

    /// Idempotency key already used, or entry already reversed
    #[error("Duplicate transaction detected with reference {key}")]
    DuplicateTransaction {
        /// The colliding idempotency key
        key: String,
    },

    /// Structurally disallowed request (self-transfer, reversing a transfer leg, ...)
    #[error("Invalid operation: {message}")]
    InvalidOperation {
        /// Description of the disallowed request
        message: String,
    },

    /// Ledger entry id does not resolve
    #[error("Transaction {entry} not found")]
    EntryNotFound {
        /// The entry that could not be resolved
        entry: EntryId,
    },

    /// No ledger entry carries the given idempotency key
    #[error("No transaction found with reference {key}")]
    ReferenceNotFound {
        /// The key that could not be resolved
        key: String,
    },

    /// Balance arithmetic left the representable range
    #[error("Arithmetic overflow in {operation} for account {account}")]
    ArithmeticOverflow {
        /// Operation that would overflow
        operation: String,
        /// Account being mutated
        account: AccountId,
    },

    /// Row lock could not be acquired within the configured wait
    #[error("Timed out after {waited_ms}ms waiting for lock on account {account}")]
    LockTimeout {
        /// The account whose lock was contended
        account: AccountId,
        /// How long the caller waited
        waited_ms: u64,
    },

    /// Transient storage failure
    #[error("Store unavailable: {message}")]
    StoreUnavailable {
        /// Description of the failure
        message: String,
    },
}

/// Discriminated failure kind exposed to the boundary layer
///
/// The boundary maps each kind to exactly one transport status and must not
/// merge or reinterpret kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    Validation,
    AccountNotFound,
    AccountAlreadyExists,
    AccountFrozen,
    InsufficientFunds,
    CurrencyMismatch,
    DuplicateTransaction,
    InvalidOperation,
    EntryNotFound,
    StoreUnavailable,
}

impl LedgerError {
    /// The failure kind this error belongs to
    pub fn kind(&self) -> ErrorKind {
        match self {
            LedgerError::Validation { .. } | LedgerError::InvalidAmount { .. } => {
                ErrorKind::Validation
            }
            LedgerError::AccountNotFound { .. } | LedgerError::OwnerNotFound { .. } => {
                ErrorKind::AccountNotFound
            }
            LedgerError::AccountAlreadyExists { .. } => ErrorKind::AccountAlreadyExists,
            LedgerError::AccountFrozen { .. } => ErrorKind::AccountFrozen,
            LedgerError::InsufficientFunds { .. } => ErrorKind::InsufficientFunds,
            LedgerError::CurrencyMismatch { .. } => ErrorKind::CurrencyMismatch,
            LedgerError::DuplicateTransaction { .. } => ErrorKind::DuplicateTransaction,
            LedgerError::InvalidOperation { .. } | LedgerError::ArithmeticOverflow { .. } => {
                ErrorKind::InvalidOperation
            }
            LedgerError::EntryNotFound { .. } | LedgerError::ReferenceNotFound { .. } => {
                ErrorKind::EntryNotFound
            }
            LedgerError::LockTimeout { .. } | LedgerError::StoreUnavailable { .. } => {
                ErrorKind::StoreUnavailable
            }
        }
    }

    /// Whether the whole operation may be retried from scratch
    ///
    /// Only infrastructure failures qualify. The engine never retries on its
    /// own; retrying is a caller decision.
    pub fn is_retryable(&self) -> bool {
        self.kind() == ErrorKind::StoreUnavailable
    }
}

// Helper functions for creating common errors

impl LedgerError {
    /// Create a Validation error
    pub fn validation(message: impl Into<String>) -> Self {
        LedgerError::Validation {
            message: message.into(),
        }
    }

    /// Create an InvalidAmount error
    pub fn invalid_amount(amount: Decimal, reason: impl Into<String>) -> Self {
        LedgerError::InvalidAmount {
            amount,
            reason: reason.into(),
        }
    }

    /// Create an AccountNotFound error
    pub fn account_not_found(account: AccountId) -> Self {
        LedgerError::AccountNotFound { account }
    }

    /// Create an AccountFrozen error
    pub fn account_frozen(account: AccountId, status: AccountStatus) -> Self {
        LedgerError::AccountFrozen { account, status }
    }

    /// Create an InsufficientFunds error
    pub fn insufficient_funds(account: AccountId, balance: Decimal, requested: Decimal) -> Self {
        LedgerError::InsufficientFunds {
            account,
            balance,
            requested,
        }
    }

    /// Create a DuplicateTransaction error
    pub fn duplicate_transaction(key: impl Into<String>) -> Self {
        LedgerError::DuplicateTransaction { key: key.into() }
    }

    /// Create an InvalidOperation error
    pub fn invalid_operation(message: impl Into<String>) -> Self {
        LedgerError::InvalidOperation {
            message: message.into(),
        }
    }

    /// Create an ArithmeticOverflow error
    pub fn arithmetic_overflow(operation: &str, account: AccountId) -> Self {
        LedgerError::ArithmeticOverflow {
            operation: operation.to_string(),
            account,
        }
    }

    /// Create a StoreUnavailable error
    pub fn store_unavailable(message: impl Into<String>) -> Self {
        LedgerError::StoreUnavailable {
            message: message.into(),
        }
    }
}
