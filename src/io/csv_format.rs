//! CSV format handling for ledger commands and account output
//!
//! This module centralizes all CSV format concerns, providing:
//! - CommandRecord structure for deserialization
//! - Conversion from CSV records to ledger commands
//! - Account summary serialization
//!
//! All functions are pure (no I/O) for easy testing.

use rust_decimal::Decimal;
use serde::Deserialize;
use std::io::Write;
use std::str::FromStr;

use crate::types::{Account, LedgerCommand, OwnerId};

/// CSV record structure for deserialization
///
/// Matches the input CSV format with columns:
/// `op, owner, target, amount, currency, reference, remarks`.
/// Every column but `op` and `owner` is optional; which ones a row needs
/// depends on the operation.
#[derive(Debug, Deserialize, Clone, PartialEq, Default)]
pub struct CommandRecord {
    pub op: String,
    pub owner: String,
    pub target: Option<String>,
    pub amount: Option<String>,
    pub currency: Option<String>,
    pub reference: Option<String>,
    pub remarks: Option<String>,
}

fn non_blank(value: &Option<String>) -> Option<String> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

fn parse_owner(value: &str, column: &str) -> Result<OwnerId, String> {
    OwnerId::from_str(value.trim())
        .map_err(|_| format!("Invalid {} '{}': expected a UUID", column, value))
}

/// Convert a CommandRecord to a LedgerCommand
///
/// # Arguments
///
/// * `record` - The deserialized CSV record
///
/// # Returns
///
/// Result containing either:
/// - Ok(LedgerCommand) - Successfully converted command
/// - Err(String) - Error message describing the conversion failure
pub fn convert_command_record(record: CommandRecord) -> Result<LedgerCommand, String> {
    let owner = parse_owner(&record.owner, "owner")?;
    let op = record.op.trim().to_lowercase();

    let amount = || -> Result<Decimal, String> {
        let raw = non_blank(&record.amount)
            .ok_or_else(|| format!("{} for owner {} requires an amount", op, owner))?;
        Decimal::from_str(&raw).map_err(|_| format!("Invalid amount '{}' for owner {}", raw, owner))
    };

    let command = match op.as_str() {
        "open" => LedgerCommand::Open {
            owner,
            currency: non_blank(&record.currency),
        },
        "deposit" => LedgerCommand::Deposit {
            owner,
            amount: amount()?,
            reference: non_blank(&record.reference),
            remarks: non_blank(&record.remarks),
        },
        "withdraw" | "withdrawal" => LedgerCommand::Withdraw {
            owner,
            amount: amount()?,
            reference: non_blank(&record.reference),
            remarks: non_blank(&record.remarks),
        },
        "transfer" => {
            let target = non_blank(&record.target)
                .ok_or_else(|| format!("transfer for owner {} requires a target", owner))?;
            LedgerCommand::Transfer {
                owner,
                target: parse_owner(&target, "target")?,
                amount: amount()?,
                remarks: non_blank(&record.remarks),
            }
        }
        "reverse" => LedgerCommand::Reverse {
            owner,
            reference: non_blank(&record.reference)
                .ok_or_else(|| format!("reverse for owner {} requires a reference", owner))?,
        },
        "freeze" => LedgerCommand::Freeze { owner },
        "unfreeze" => LedgerCommand::Unfreeze { owner },
        _ => {
            return Err(format!(
                "Invalid operation: '{}' for owner {}",
                record.op, owner
            ))
        }
    };

    Ok(command)
}

/// Write account summaries to CSV format
///
/// Writes accounts with columns: owner, currency, balance, status.
/// Accounts are sorted by owner id for deterministic output.
///
/// # Arguments
///
/// * `accounts` - Slice of accounts to write
/// * `output` - Mutable reference to a writer for outputting CSV
///
/// # Returns
///
/// * `Ok(())` if writing succeeded
/// * `Err(String)` if a write error occurred
pub fn write_accounts_csv(accounts: &[Account], output: &mut dyn Write) -> Result<(), String> {
    use csv::Writer;

    let mut writer = Writer::from_writer(output);

    writer
        .write_record(["owner", "currency", "balance", "status"])
        .map_err(|e| format!("Failed to write CSV header: {}", e))?;

    let mut sorted: Vec<&Account> = accounts.iter().collect();
    sorted.sort_by_key(|account| account.owner_id);

    for account in sorted {
        writer
            .write_record(&[
                account.owner_id.to_string(),
                account.currency.to_string(),
                format!("{:.4}", account.balance),
                account.status.to_string(),
            ])
            .map_err(|e| format!("Failed to write account record: {}", e))?;
    }

    writer
        .flush()
        .map_err(|e| format!("Failed to flush output: {}", e))?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{AccountStatus, CurrencyCode};
    use chrono::Utc;
    use rstest::rstest;
    use uuid::Uuid;

    const ALICE: &str = "00000000-0000-0000-0000-00000000000a";
    const BOB: &str = "00000000-0000-0000-0000-00000000000b";

    fn record(op: &str, owner: &str) -> CommandRecord {
        CommandRecord {
            op: op.to_string(),
            owner: owner.to_string(),
            ..Default::default()
        }
    }

    fn owner(s: &str) -> OwnerId {
        s.parse().unwrap()
    }

    #[rstest]
    #[case("deposit")]
    #[case("DEPOSIT")]
    #[case(" Deposit ")]
    fn test_convert_deposit(#[case] op: &str) {
        let mut r = record(op, ALICE);
        r.amount = Some(" 100.25 ".into());
        r.reference = Some("REF-1".into());
        r.remarks = Some("".into());

        assert_eq!(
            convert_command_record(r).unwrap(),
            LedgerCommand::Deposit {
                owner: owner(ALICE),
                amount: Decimal::new(10025, 2),
                reference: Some("REF-1".into()),
                remarks: None,
            }
        );
    }

    #[test]
    fn test_convert_transfer() {
        let mut r = record("transfer", ALICE);
        r.target = Some(BOB.into());
        r.amount = Some("5".into());

        assert_eq!(
            convert_command_record(r).unwrap(),
            LedgerCommand::Transfer {
                owner: owner(ALICE),
                target: owner(BOB),
                amount: Decimal::new(5, 0),
                remarks: None,
            }
        );
    }

    #[rstest]
    #[case::open("open", LedgerCommand::Open { owner: owner(ALICE), currency: None })]
    #[case::freeze("freeze", LedgerCommand::Freeze { owner: owner(ALICE) })]
    #[case::unfreeze("unfreeze", LedgerCommand::Unfreeze { owner: owner(ALICE) })]
    fn test_convert_owner_only_commands(#[case] op: &str, #[case] expected: LedgerCommand) {
        assert_eq!(convert_command_record(record(op, ALICE)).unwrap(), expected);
    }

    #[rstest]
    #[case::invalid_op(record("refund", ALICE), "Invalid operation")]
    #[case::bad_owner(record("open", "alice"), "Invalid owner")]
    #[case::missing_amount(record("deposit", ALICE), "requires an amount")]
    #[case::bad_amount(CommandRecord { amount: Some("ten".into()), ..record("withdraw", ALICE) }, "Invalid amount")]
    #[case::missing_target(CommandRecord { amount: Some("1".into()), ..record("transfer", ALICE) }, "requires a target")]
    #[case::bad_target(CommandRecord { target: Some("bob".into()), ..record("transfer", ALICE) }, "Invalid target")]
    #[case::missing_reference(record("reverse", ALICE), "requires a reference")]
    fn test_convert_errors(#[case] input: CommandRecord, #[case] expected_error: &str) {
        let err = convert_command_record(input).unwrap_err();
        assert!(err.contains(expected_error), "{}", err);
    }

    fn account(owner_id: &str, balance: Decimal, status: AccountStatus) -> Account {
        let mut account = Account::open(owner(owner_id), CurrencyCode::default(), Utc::now());
        account.balance = balance;
        account.status = status;
        account
    }

    #[rstest]
    #[case::empty(vec![], "owner,currency,balance,status\n")]
    #[case::sorted_by_owner(
        vec![
            account(BOB, Decimal::new(5, 1), AccountStatus::Frozen),
            account(ALICE, Decimal::new(1001234, 4), AccountStatus::Active),
        ],
        "owner,currency,balance,status\n\
         00000000-0000-0000-0000-00000000000a,USD,100.1234,ACTIVE\n\
         00000000-0000-0000-0000-00000000000b,USD,0.5000,FROZEN\n"
    )]
    fn test_write_accounts_csv(#[case] accounts: Vec<Account>, #[case] expected_output: &str) {
        let mut output = Vec::new();
        write_accounts_csv(&accounts, &mut output).unwrap();

        assert_eq!(String::from_utf8(output).unwrap(), expected_output);
    }

    #[test]
    fn test_owner_ids_are_canonical_uuids() {
        assert_eq!(owner(ALICE).as_uuid(), &Uuid::from_u128(0xa));
    }
}
