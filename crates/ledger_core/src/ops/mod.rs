use sea_orm::DatabaseConnection;

use crate::{LedgerError, ResultLedger};

mod access;
mod accounts;
mod audit;
mod balances;
mod shares;
mod transactions;

pub use access::PermissionLevel;
pub use audit::AuditListFilter;
pub use transactions::TransactionListFilter;

/// Run a block inside a DB transaction, committing on success and rolling
/// back on error.
///
/// The body runs inside its own async block so that `?` and early `return`s
/// resolve to the block, not the enclosing function; the caller always gets
/// the `Err` back and can react to it (e.g. record a denial).
macro_rules! with_tx {
    ($self:expr, |$tx:ident| $body:expr) => {{
        let $tx = $self.database.begin().await?;
        let result = async { $body }.await;
        match result {
            Ok(value) => {
                $tx.commit().await?;
                Ok(value)
            }
            Err(err) => Err(err),
        }
    }};
}

pub(crate) use with_tx;

/// Entry point for every ledger operation.
///
/// Holds no mutable state of its own; the database is the single source of
/// truth and the point of serialization for concurrent mutations.
#[derive(Debug)]
pub struct Ledger {
    database: DatabaseConnection,
}

impl Ledger {
    /// Return a builder for `Ledger`.
    pub fn builder() -> LedgerBuilder {
        LedgerBuilder::default()
    }
}

fn normalize_required_name(value: &str, label: &str) -> ResultLedger<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(LedgerError::InvalidId(format!(
            "{label} name must not be empty"
        )));
    }
    Ok(trimmed.to_string())
}

fn normalize_optional_text(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(ToString::to_string)
}

/// The builder for `Ledger`.
#[derive(Default)]
pub struct LedgerBuilder {
    database: DatabaseConnection,
}

impl LedgerBuilder {
    /// Pass the required database.
    pub fn database(mut self, db: DatabaseConnection) -> LedgerBuilder {
        self.database = db;
        self
    }

    /// Construct `Ledger`.
    pub fn build(self) -> ResultLedger<Ledger> {
        Ok(Ledger {
            database: self.database,
        })
    }
}
