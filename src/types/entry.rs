//! Ledger entry types
//!
//! A ledger entry is the immutable record of one balance-affecting event.
//! Entries are appended exactly once, in the same unit of work as the balance
//! mutation they record, and are never updated or deleted.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::error::LedgerError;
use super::ids::{AccountId, EntryId};

/// Kind of balance movement recorded by an entry
///
/// Deposits and incoming transfer legs credit the account; withdrawals and
/// outgoing transfer legs debit it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EntryType {
    /// Credit funds to an account
    Deposit,

    /// Debit funds from an account (requires sufficient balance)
    Withdrawal,

    /// Debit leg of a transfer, paired with a `TransferIn` on the destination
    TransferOut,

    /// Credit leg of a transfer, paired with a `TransferOut` on the source
    TransferIn,
}

impl EntryType {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntryType::Deposit => "DEPOSIT",
            EntryType::Withdrawal => "WITHDRAWAL",
            EntryType::TransferOut => "TRANSFER_OUT",
            EntryType::TransferIn => "TRANSFER_IN",
        }
    }

    /// Whether this movement increases the account balance
    pub fn is_credit(&self) -> bool {
        matches!(self, EntryType::Deposit | EntryType::TransferIn)
    }

    /// Only deposits and withdrawals can be reversed
    pub fn is_reversible(&self) -> bool {
        matches!(self, EntryType::Deposit | EntryType::Withdrawal)
    }

    /// The compensating movement for a reversible entry type
    pub fn inverse(&self) -> Option<EntryType> {
        match self {
            EntryType::Deposit => Some(EntryType::Withdrawal),
            EntryType::Withdrawal => Some(EntryType::Deposit),
            EntryType::TransferOut | EntryType::TransferIn => None,
        }
    }
}

impl fmt::Display for EntryType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EntryType {
    type Err = LedgerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "DEPOSIT" => Ok(EntryType::Deposit),
            "WITHDRAWAL" => Ok(EntryType::Withdrawal),
            "TRANSFER_OUT" => Ok(EntryType::TransferOut),
            "TRANSFER_IN" => Ok(EntryType::TransferIn),
            _ => Err(LedgerError::validation(format!(
                "Invalid transaction type: '{}'",
                s
            ))),
        }
    }
}

/// An entry staged by the engine, not yet stamped by the Ledger Store
///
/// The engine assigns the id up front so that paired entries can reference
/// each other before either row is written.
#[derive(Debug, Clone, PartialEq)]
pub struct NewEntry {
    pub id: EntryId,
    pub account_id: AccountId,
    pub entry_type: EntryType,
    pub amount: Decimal,
    pub balance_after: Decimal,
    pub idempotency_key: Option<String>,
    pub remarks: Option<String>,
    pub related_entry_id: Option<EntryId>,
}

/// A committed ledger entry
///
/// `created_at` and `sequence` are assigned by the store at insertion and are
/// monotonic in insertion order.
#[derive(Debug, Clone, PartialEq)]
pub struct LedgerEntry {
    pub id: EntryId,
    pub account_id: AccountId,
    pub entry_type: EntryType,
    pub amount: Decimal,
    pub balance_after: Decimal,
    pub idempotency_key: Option<String>,
    pub remarks: Option<String>,
    pub related_entry_id: Option<EntryId>,
    pub created_at: DateTime<Utc>,
    pub sequence: u64,
}

impl LedgerEntry {
    /// Stamp a staged entry with its creation time and store sequence
    pub fn stamp(entry: NewEntry, created_at: DateTime<Utc>, sequence: u64) -> Self {
        LedgerEntry {
            id: entry.id,
            account_id: entry.account_id,
            entry_type: entry.entry_type,
            amount: entry.amount,
            balance_after: entry.balance_after,
            idempotency_key: entry.idempotency_key,
            remarks: entry.remarks,
            related_entry_id: entry.related_entry_id,
            created_at,
            sequence,
        }
    }

    /// Amount with the sign of its effect on the account balance
    pub fn signed_amount(&self) -> Decimal {
        if self.entry_type.is_credit() {
            self.amount
        } else {
            -self.amount
        }
    }
}

/// Public view of a ledger entry
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EntryView {
    pub id: EntryId,
    pub account_id: AccountId,
    pub entry_type: EntryType,
    pub amount: Decimal,
    pub balance_after: Decimal,
    pub idempotency_key: Option<String>,
    pub remarks: Option<String>,
    pub related_entry_id: Option<EntryId>,
    pub created_at: DateTime<Utc>,
}

impl From<&LedgerEntry> for EntryView {
    fn from(entry: &LedgerEntry) -> Self {
        EntryView {
            id: entry.id,
            account_id: entry.account_id,
            entry_type: entry.entry_type,
            amount: entry.amount,
            balance_after: entry.balance_after,
            idempotency_key: entry.idempotency_key.clone(),
            remarks: entry.remarks.clone(),
            related_entry_id: entry.related_entry_id,
            created_at: entry.created_at,
        }
    }
}

impl From<LedgerEntry> for EntryView {
    fn from(entry: LedgerEntry) -> Self {
        EntryView::from(&entry)
    }
}

/// Both legs of a completed transfer
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TransferReceipt {
    /// The TRANSFER_OUT entry on the source account
    pub debit: EntryView,
    /// The TRANSFER_IN entry on the destination account
    pub credit: EntryView,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn entry(entry_type: EntryType, amount: Decimal) -> LedgerEntry {
        LedgerEntry::stamp(
            NewEntry {
                id: EntryId::new(),
                account_id: AccountId::new(),
                entry_type,
                amount,
                balance_after: amount,
                idempotency_key: None,
                remarks: None,
                related_entry_id: None,
            },
            Utc::now(),
            1,
        )
    }

    #[rstest]
    #[case("DEPOSIT", EntryType::Deposit)]
    #[case("withdrawal", EntryType::Withdrawal)]
    #[case("Transfer_Out", EntryType::TransferOut)]
    #[case("TRANSFER_IN", EntryType::TransferIn)]
    fn test_entry_type_parsing(#[case] input: &str, #[case] expected: EntryType) {
        assert_eq!(input.parse::<EntryType>().unwrap(), expected);
        assert_eq!(expected.to_string(), expected.as_str());
    }

    #[test]
    fn test_entry_type_parsing_rejects_unknown_names() {
        let err = "CHARGEBACK".parse::<EntryType>().unwrap_err();
        assert_eq!(err.to_string(), "Validation failed: Invalid transaction type: 'CHARGEBACK'");
    }

    #[rstest]
    #[case(EntryType::Deposit, Some(EntryType::Withdrawal))]
    #[case(EntryType::Withdrawal, Some(EntryType::Deposit))]
    #[case(EntryType::TransferOut, None)]
    #[case(EntryType::TransferIn, None)]
    fn test_inverse(#[case] entry_type: EntryType, #[case] expected: Option<EntryType>) {
        assert_eq!(entry_type.inverse(), expected);
        assert_eq!(entry_type.is_reversible(), expected.is_some());
    }

    #[rstest]
    #[case(EntryType::Deposit, "10.5", "10.5")]
    #[case(EntryType::TransferIn, "10.5", "10.5")]
    #[case(EntryType::Withdrawal, "10.5", "-10.5")]
    #[case(EntryType::TransferOut, "10.5", "-10.5")]
    fn test_signed_amount(
        #[case] entry_type: EntryType,
        #[case] amount: &str,
        #[case] signed: &str,
    ) {
        let e = entry(entry_type, amount.parse().unwrap());
        assert_eq!(e.signed_amount(), signed.parse::<Decimal>().unwrap());
    }

    #[test]
    fn test_view_drops_store_sequence() {
        let e = entry(EntryType::Deposit, Decimal::new(100, 0));
        let view = EntryView::from(&e);
        assert_eq!(view.id, e.id);
        assert_eq!(view.amount, e.amount);
        assert_eq!(view.created_at, e.created_at);
    }
}
