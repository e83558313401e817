//! Replayable ledger commands
//!
//! A command is one row of a replay file, already parsed into typed values.
//! Accounts are addressed by owner because account ids are generated by the
//! engine at creation time.

use rust_decimal::Decimal;

use super::ids::OwnerId;

/// A single ledger command read from a replay file
#[derive(Debug, Clone, PartialEq)]
pub enum LedgerCommand {
    /// Create the account for an owner (currency defaults when absent)
    Open {
        owner: OwnerId,
        currency: Option<String>,
    },

    /// Credit funds to the owner's account
    Deposit {
        owner: OwnerId,
        amount: Decimal,
        reference: Option<String>,
        remarks: Option<String>,
    },

    /// Debit funds from the owner's account
    Withdraw {
        owner: OwnerId,
        amount: Decimal,
        reference: Option<String>,
        remarks: Option<String>,
    },

    /// Move funds from the owner's account to the target owner's account
    Transfer {
        owner: OwnerId,
        target: OwnerId,
        amount: Decimal,
        remarks: Option<String>,
    },

    /// Reverse the deposit/withdrawal carrying `reference` as idempotency key
    Reverse { owner: OwnerId, reference: String },

    /// Freeze the owner's account
    Freeze { owner: OwnerId },

    /// Unfreeze the owner's account
    Unfreeze { owner: OwnerId },
}

impl LedgerCommand {
    /// Short lowercase name of the command, as written in replay files
    pub fn name(&self) -> &'static str {
        match self {
            LedgerCommand::Open { .. } => "open",
            LedgerCommand::Deposit { .. } => "deposit",
            LedgerCommand::Withdraw { .. } => "withdraw",
            LedgerCommand::Transfer { .. } => "transfer",
            LedgerCommand::Reverse { .. } => "reverse",
            LedgerCommand::Freeze { .. } => "freeze",
            LedgerCommand::Unfreeze { .. } => "unfreeze",
        }
    }

    /// Every owner whose account the command touches
    pub fn owners(&self) -> Vec<OwnerId> {
        match self {
            LedgerCommand::Transfer { owner, target, .. } => vec![*owner, *target],
            LedgerCommand::Open { owner, .. }
            | LedgerCommand::Deposit { owner, .. }
            | LedgerCommand::Withdraw { owner, .. }
            | LedgerCommand::Reverse { owner, .. }
            | LedgerCommand::Freeze { owner }
            | LedgerCommand::Unfreeze { owner } => vec![*owner],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transfer_touches_both_owners() {
        let a = OwnerId::new();
        let b = OwnerId::new();
        let command = LedgerCommand::Transfer {
            owner: a,
            target: b,
            amount: Decimal::ONE,
            remarks: None,
        };
        assert_eq!(command.owners(), vec![a, b]);
        assert_eq!(command.name(), "transfer");
    }

    #[test]
    fn test_single_account_commands_touch_one_owner() {
        let a = OwnerId::new();
        let command = LedgerCommand::Reverse {
            owner: a,
            reference: "REF".into(),
        };
        assert_eq!(command.owners(), vec![a]);
    }
}
