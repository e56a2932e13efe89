//! The module contains the errors the ledger core can return.
//!
//! Validation and authorization errors are raised before any write, so a
//! failed operation leaves no partial state. `Database` wraps the underlying
//! driver error and rolls back the enclosing transaction.
use sea_orm::DbErr;
use thiserror::Error;

/// Ledger custom errors.
#[derive(Error, Debug)]
pub enum LedgerError {
    #[error("Invalid amount: {0}")]
    InvalidAmount(String),
    #[error("Currency mismatch: {0}")]
    CurrencyMismatch(String),
    #[error("Split sum mismatch: {0}")]
    SplitSumMismatch(String),
    #[error("Immutable field: {0}")]
    ImmutableField(String),
    #[error("Insufficient permission: {0}")]
    InsufficientPermission(String),
    #[error("Account inactive: {0}")]
    AccountInactive(String),
    #[error("Split parent not deletable: {0}")]
    SplitParentNotDeletable(String),
    #[error("Not a split parent: {0}")]
    NotASplitParent(String),
    #[error("Already split: {0}")]
    AlreadySplit(String),
    #[error("\"{0}\" key not found!")]
    KeyNotFound(String),
    #[error("\"{0}\" already present!")]
    ExistingKey(String),
    #[error("Invalid role: {0}")]
    InvalidRole(String),
    #[error("Invalid id: {0}")]
    InvalidId(String),
    #[error("Invalid cursor: {0}")]
    InvalidCursor(String),
    #[error(transparent)]
    Database(#[from] DbErr),
}

impl PartialEq for LedgerError {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::InvalidAmount(a), Self::InvalidAmount(b)) => a == b,
            (Self::CurrencyMismatch(a), Self::CurrencyMismatch(b)) => a == b,
            (Self::SplitSumMismatch(a), Self::SplitSumMismatch(b)) => a == b,
            (Self::ImmutableField(a), Self::ImmutableField(b)) => a == b,
            (Self::InsufficientPermission(a), Self::InsufficientPermission(b)) => a == b,
            (Self::AccountInactive(a), Self::AccountInactive(b)) => a == b,
            (Self::SplitParentNotDeletable(a), Self::SplitParentNotDeletable(b)) => a == b,
            (Self::NotASplitParent(a), Self::NotASplitParent(b)) => a == b,
            (Self::AlreadySplit(a), Self::AlreadySplit(b)) => a == b,
            (Self::KeyNotFound(a), Self::KeyNotFound(b)) => a == b,
            (Self::ExistingKey(a), Self::ExistingKey(b)) => a == b,
            (Self::InvalidRole(a), Self::InvalidRole(b)) => a == b,
            (Self::InvalidId(a), Self::InvalidId(b)) => a == b,
            (Self::InvalidCursor(a), Self::InvalidCursor(b)) => a == b,
            (Self::Database(a), Self::Database(b)) => a.to_string() == b.to_string(),
            _ => false,
        }
    }
}
