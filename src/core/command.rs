//! Command execution
//!
//! Applies one replayable [`LedgerCommand`] to an engine. Commands address
//! accounts by owner and reversals by the idempotency key of the original
//! entry, so this layer resolves both before calling the engine.

use super::engine::{CreateAccount, LedgerEngine, MovementRequest, TransferRequest};
use super::traits::{AccountStore, LedgerStore};
use crate::types::{
    AccountId, AccountView, EntryView, LedgerCommand, LedgerError, OwnerId, TransferReceipt,
};

/// What a successfully applied command produced
#[derive(Debug, Clone, PartialEq)]
pub enum CommandOutcome {
    Opened(AccountView),
    Entry(EntryView),
    Transfer(TransferReceipt),
    StatusChanged(AccountView),
}

fn resolve_owner<A: AccountStore, L: LedgerStore>(
    engine: &LedgerEngine<A, L>,
    owner: &OwnerId,
) -> Result<AccountId, LedgerError> {
    engine
        .accounts()
        .find_by_owner(owner)
        .map(|account| account.id)
        .ok_or(LedgerError::OwnerNotFound { owner: *owner })
}

/// Apply a single command
///
/// # Returns
///
/// * `Ok(CommandOutcome)` - The command was applied
/// * `Err(LedgerError::OwnerNotFound)` - No account is registered for an owner
/// * `Err(LedgerError::ReferenceNotFound)` - A reversal names an unknown key
/// * `Err(LedgerError)` - Any error of the underlying engine operation
pub fn execute<A: AccountStore, L: LedgerStore>(
    engine: &LedgerEngine<A, L>,
    command: &LedgerCommand,
) -> Result<CommandOutcome, LedgerError> {
    match command {
        LedgerCommand::Open { owner, currency } => engine
            .create_account(CreateAccount {
                owner_id: Some(*owner),
                currency: currency.clone(),
            })
            .map(CommandOutcome::Opened),

        LedgerCommand::Deposit {
            owner,
            amount,
            reference,
            remarks,
        } => {
            let account = resolve_owner(engine, owner)?;
            engine
                .deposit(
                    account,
                    MovementRequest {
                        amount: *amount,
                        idempotency_key: reference.clone(),
                        remarks: remarks.clone(),
                    },
                )
                .map(CommandOutcome::Entry)
        }

        LedgerCommand::Withdraw {
            owner,
            amount,
            reference,
            remarks,
        } => {
            let account = resolve_owner(engine, owner)?;
            engine
                .withdraw(
                    account,
                    MovementRequest {
                        amount: *amount,
                        idempotency_key: reference.clone(),
                        remarks: remarks.clone(),
                    },
                )
                .map(CommandOutcome::Entry)
        }

        LedgerCommand::Transfer {
            owner,
            target,
            amount,
            remarks,
        } => {
            let from = resolve_owner(engine, owner)?;
            let to = resolve_owner(engine, target)?;
            engine
                .transfer(TransferRequest {
                    from,
                    to,
                    amount: *amount,
                    remarks: remarks.clone(),
                })
                .map(CommandOutcome::Transfer)
        }

        LedgerCommand::Reverse { owner, reference } => {
            let account = resolve_owner(engine, owner)?;
            let original = engine
                .ledger()
                .find_by_idempotency_key(reference)
                .filter(|entry| entry.account_id == account)
                .ok_or_else(|| LedgerError::ReferenceNotFound {
                    key: reference.clone(),
                })?;
            engine.reverse(original.id).map(CommandOutcome::Entry)
        }

        LedgerCommand::Freeze { owner } => {
            let account = resolve_owner(engine, owner)?;
            engine.freeze(account).map(CommandOutcome::StatusChanged)
        }

        LedgerCommand::Unfreeze { owner } => {
            let account = resolve_owner(engine, owner)?;
            engine.unfreeze(account).map(CommandOutcome::StatusChanged)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EngineConfig;
    use rust_decimal::Decimal;

    fn dec(s: &str) -> Decimal {
        s.parse().unwrap()
    }

    fn deposit(owner: OwnerId, amount: &str, reference: Option<&str>) -> LedgerCommand {
        LedgerCommand::Deposit {
            owner,
            amount: dec(amount),
            reference: reference.map(str::to_string),
            remarks: None,
        }
    }

    #[test]
    fn test_commands_address_accounts_by_owner() {
        let engine = LedgerEngine::in_memory(EngineConfig::default());
        let alice = OwnerId::new();
        let bob = OwnerId::new();

        for owner in [alice, bob] {
            execute(&engine, &LedgerCommand::Open { owner, currency: None }).unwrap();
        }
        execute(&engine, &deposit(alice, "100", Some("D-1"))).unwrap();
        let outcome = execute(
            &engine,
            &LedgerCommand::Transfer {
                owner: alice,
                target: bob,
                amount: dec("40"),
                remarks: None,
            },
        )
        .unwrap();
        assert!(matches!(outcome, CommandOutcome::Transfer(_)));

        let alice_account = engine.accounts().find_by_owner(&alice).unwrap();
        let bob_account = engine.accounts().find_by_owner(&bob).unwrap();
        assert_eq!(alice_account.balance, dec("60"));
        assert_eq!(bob_account.balance, dec("40"));
    }

    #[test]
    fn test_unknown_owner() {
        let engine = LedgerEngine::in_memory(EngineConfig::default());
        let owner = OwnerId::new();

        let err = execute(&engine, &deposit(owner, "1", None)).unwrap_err();

        assert_eq!(err, LedgerError::OwnerNotFound { owner });
    }

    #[test]
    fn test_reverse_by_reference() {
        let engine = LedgerEngine::in_memory(EngineConfig::default());
        let owner = OwnerId::new();
        let other = OwnerId::new();
        execute(&engine, &LedgerCommand::Open { owner, currency: None }).unwrap();
        execute(&engine, &LedgerCommand::Open { owner: other, currency: None }).unwrap();
        execute(&engine, &deposit(owner, "25", Some("D-1"))).unwrap();

        // The reference must belong to the named owner
        let err = execute(
            &engine,
            &LedgerCommand::Reverse {
                owner: other,
                reference: "D-1".into(),
            },
        )
        .unwrap_err();
        assert!(matches!(err, LedgerError::ReferenceNotFound { .. }));

        let reverse = LedgerCommand::Reverse {
            owner,
            reference: "D-1".into(),
        };
        execute(&engine, &reverse).unwrap();
        assert_eq!(
            engine.accounts().find_by_owner(&owner).unwrap().balance,
            Decimal::ZERO
        );
        assert!(matches!(
            execute(&engine, &reverse).unwrap_err(),
            LedgerError::DuplicateTransaction { .. }
        ));
    }
}
