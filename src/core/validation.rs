//! Input validation and balance invariants
//!
//! Pure helpers shared by every engine operation. None of them touch a store;
//! they either accept a value (possibly normalised) or return the error the
//! operation must fail with.

use rust_decimal::Decimal;

use crate::config::EngineConfig;
use crate::types::{Account, CurrencyCode, LedgerError};

/// Validate a movement amount and bring it to the ledger scale
///
/// # Returns
///
/// * `Ok(Decimal)` - The amount rescaled to `config.amount_scale` digits
/// * `Err(LedgerError::InvalidAmount)` - Zero, negative, above the ceiling or too precise
pub fn validate_amount(amount: Decimal, config: &EngineConfig) -> Result<Decimal, LedgerError> {
    if amount <= Decimal::ZERO {
        return Err(LedgerError::invalid_amount(
            amount,
            "amount must be greater than zero",
        ));
    }
    if amount > config.max_amount {
        return Err(LedgerError::invalid_amount(
            amount,
            format!("amount exceeds maximum of {}", config.max_amount),
        ));
    }
    if amount.normalize().scale() > config.amount_scale {
        return Err(LedgerError::invalid_amount(
            amount,
            format!(
                "amount has more than {} fractional digits",
                config.amount_scale
            ),
        ));
    }

    let mut scaled = amount;
    scaled.rescale(config.amount_scale);
    Ok(scaled)
}

/// Reject caller keys longer than the configured limit
pub fn validate_key(key: Option<&str>, config: &EngineConfig) -> Result<(), LedgerError> {
    match key {
        Some(key) if key.trim().chars().count() > config.max_idempotency_key_len => {
            Err(LedgerError::validation(format!(
                "Reference ID cannot exceed {} characters",
                config.max_idempotency_key_len
            )))
        }
        _ => Ok(()),
    }
}

/// Normalise optional remarks: trimmed, blank dropped, bounded in length
pub fn validate_remarks(
    remarks: Option<&str>,
    config: &EngineConfig,
) -> Result<Option<String>, LedgerError> {
    let Some(remarks) = remarks.map(str::trim).filter(|r| !r.is_empty()) else {
        return Ok(None);
    };
    if remarks.chars().count() > config.max_remarks_len {
        return Err(LedgerError::validation(format!(
            "Remarks cannot exceed {} characters",
            config.max_remarks_len
        )));
    }
    Ok(Some(remarks.to_string()))
}

/// Parse an optional currency code, falling back to the configured default
pub fn resolve_currency(
    currency: Option<&str>,
    config: &EngineConfig,
) -> Result<CurrencyCode, LedgerError> {
    match currency.map(str::trim).filter(|c| !c.is_empty()) {
        Some(code) => CurrencyCode::parse(code),
        None => Ok(config.default_currency.clone()),
    }
}

/// Check the page size of a history request
pub fn validate_page_size(size: u32, config: &EngineConfig) -> Result<(), LedgerError> {
    if size == 0 || size > config.max_page_size {
        return Err(LedgerError::validation(format!(
            "Page size must be between 1 and {}",
            config.max_page_size
        )));
    }
    Ok(())
}

/// Mutations are only accepted on ACTIVE accounts
pub fn ensure_active(account: &Account) -> Result<(), LedgerError> {
    if account.is_active() {
        Ok(())
    } else {
        Err(LedgerError::account_frozen(account.id, account.status))
    }
}

/// Balance after crediting `amount`
pub fn credited(
    account: &Account,
    amount: Decimal,
    operation: &str,
) -> Result<Decimal, LedgerError> {
    account
        .balance
        .checked_add(amount)
        .ok_or_else(|| LedgerError::arithmetic_overflow(operation, account.id))
}

/// Balance after debiting `amount`
///
/// Fails with `InsufficientFunds` if the balance would drop below zero.
pub fn debited(
    account: &Account,
    amount: Decimal,
    operation: &str,
) -> Result<Decimal, LedgerError> {
    if account.balance < amount {
        return Err(LedgerError::insufficient_funds(
            account.id,
            account.balance,
            amount,
        ));
    }
    account
        .balance
        .checked_sub(amount)
        .ok_or_else(|| LedgerError::arithmetic_overflow(operation, account.id))
}
