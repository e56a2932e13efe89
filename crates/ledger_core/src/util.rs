//! Internal helpers for model validation and conversion.
//!
//! These utilities are **not** part of the public API. They centralize
//! validation and mapping logic so the core enforces consistent invariants.

use crate::{Currency, LedgerError, ResultLedger};

/// Parse a currency code stored in the DB into a strongly typed `Currency`.
pub(crate) fn model_currency(value: &str) -> ResultLedger<Currency> {
    Currency::try_from(value)
        .map_err(|_| LedgerError::InvalidId(format!("invalid stored currency: {value}")))
}

/// Ensure a transaction currency matches the account currency.
pub(crate) fn ensure_account_currency(
    account_currency: Currency,
    actual: Currency,
) -> ResultLedger<()> {
    if account_currency != actual {
        return Err(LedgerError::CurrencyMismatch(format!(
            "account currency is {}, got {}",
            account_currency.code(),
            actual.code()
        )));
    }
    Ok(())
}
