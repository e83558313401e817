//! Engine configuration
//!
//! Bounds and defaults applied by the ledger engine. Invalid values passed to
//! [`EngineConfig::new`] fall back to the defaults with a warning, the same
//! way the replay `BatchConfig` treats its inputs.

use rust_decimal::Decimal;
use std::time::Duration;
use tracing::warn;

use crate::types::CurrencyCode;

/// Configuration for the ledger engine
#[derive(Debug, Clone, PartialEq)]
pub struct EngineConfig {
    /// Upper bound (inclusive) for a single amount
    pub max_amount: Decimal,

    /// Maximum number of fractional digits an amount may carry
    pub amount_scale: u32,

    /// Currency assigned to new accounts when the caller gives none
    pub default_currency: CurrencyCode,

    /// Maximum time a mutating operation waits for its row locks
    pub lock_timeout: Duration,

    /// Prefix of the idempotency key derived for a reversal entry
    pub reversal_key_prefix: String,

    /// Page size used when a history request leaves it unset
    pub default_page_size: u32,

    /// Largest page size a history request may ask for
    pub max_page_size: u32,

    /// Longest accepted caller-supplied idempotency key
    pub max_idempotency_key_len: usize,

    /// Longest accepted remarks text
    pub max_remarks_len: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_amount: Decimal::new(1_000_000_000, 0),
            amount_scale: 4,
            default_currency: CurrencyCode::default(),
            lock_timeout: Duration::from_secs(5),
            reversal_key_prefix: "REV_".to_string(),
            default_page_size: 20,
            max_page_size: 100,
            max_idempotency_key_len: 100,
            max_remarks_len: 500,
        }
    }
}

impl EngineConfig {
    /// Create an EngineConfig from externally supplied values
    ///
    /// Unset values keep their defaults. Values that cannot be honoured (a
    /// non-positive ceiling, a zero lock timeout, a malformed currency) are
    /// replaced by the default and reported with `warn!`.
    pub fn new(
        max_amount: Option<Decimal>,
        lock_timeout: Option<Duration>,
        default_currency: Option<&str>,
    ) -> Self {
        let default = Self::default();

        let max_amount = match max_amount {
            Some(value) if value > Decimal::ZERO => value,
            Some(value) => {
                warn!(
                    invalid = %value,
                    fallback = %default.max_amount,
                    "invalid max_amount, using default"
                );
                default.max_amount
            }
            None => default.max_amount,
        };

        let lock_timeout = match lock_timeout {
            Some(value) if !value.is_zero() => value,
            Some(_) => {
                warn!(
                    fallback_ms = default.lock_timeout.as_millis() as u64,
                    "invalid lock_timeout (0), using default"
                );
                default.lock_timeout
            }
            None => default.lock_timeout,
        };

        let default_currency = match default_currency.map(CurrencyCode::parse) {
            Some(Ok(code)) => code,
            Some(Err(e)) => {
                warn!(
                    error = %e,
                    fallback = %default.default_currency,
                    "invalid default currency, using default"
                );
                default.default_currency.clone()
            }
            None => default.default_currency.clone(),
        };

        Self {
            max_amount,
            lock_timeout,
            default_currency,
            ..default
        }
    }

    /// Same configuration with a different lock timeout
    pub fn with_lock_timeout(mut self, lock_timeout: Duration) -> Self {
        self.lock_timeout = lock_timeout;
        self
    }

    /// Same configuration with a different amount ceiling
    pub fn with_max_amount(mut self, max_amount: Decimal) -> Self {
        self.max_amount = max_amount;
        self
    }

    /// Idempotency key of the entry that reverses `entry`
    pub fn reversal_key(&self, entry: impl std::fmt::Display) -> String {
        format!("{}{}", self.reversal_key_prefix, entry)
    }
}
