//! Ledger consistency core.
//!
//! Maintains an account's materialized balance as a function of its
//! transaction history, under concurrent mutation, soft deletion and
//! transaction splitting. The database is the single source of truth: every
//! mutation (permission check, row write, balance delta, audit entry) runs
//! inside one database transaction.

pub use accounts::Account;
pub use audit::{AuditAction, AuditEntry, AuditOutcome};
pub use commands::{
    CreateAccountCmd, CreateTransactionCmd, SplitPart, SplitTransactionCmd, UpdateTransactionCmd,
};
pub use currency::Currency;
pub use error::LedgerError;
pub use money::Money;
pub use ops::{AuditListFilter, Ledger, LedgerBuilder, PermissionLevel, TransactionListFilter};
pub use transactions::Transaction;

pub(crate) mod accounts;
pub(crate) mod audit;
mod commands;
mod currency;
mod error;
mod money;
mod ops;
pub(crate) mod shares;
pub(crate) mod transactions;
pub(crate) mod users;
mod util;

type ResultLedger<T> = Result<T, LedgerError>;
