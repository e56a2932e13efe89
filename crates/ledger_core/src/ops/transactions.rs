//! Transaction read paths.

use base64::Engine as _;
use chrono::{DateTime, Utc};
use sea_orm::{
    Condition, DatabaseTransaction, QueryFilter, QueryOrder, QuerySelect, TransactionTrait,
    prelude::*,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{LedgerError, ResultLedger, Transaction, transactions};

use super::{Ledger, with_tx};

mod split;
mod write;

/// Filters for listing transactions on an account.
///
/// `from` is inclusive and `to` is exclusive (`[from, to)`), both against
/// `occurred_at`. Deleted rows and split parents are hidden by default.
#[derive(Clone, Debug, Default)]
pub struct TransactionListFilter {
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
    pub include_deleted: bool,
    pub include_split_parents: bool,
}

fn validate_list_filter(filter: &TransactionListFilter) -> ResultLedger<()> {
    if let (Some(from), Some(to)) = (filter.from, filter.to)
        && from >= to
    {
        return Err(LedgerError::InvalidId(
            "invalid range: from must be < to".to_string(),
        ));
    }
    Ok(())
}

#[derive(Clone, Debug, Serialize, Deserialize)]
struct TransactionsCursor {
    occurred_at: DateTime<Utc>,
    transaction_id: String,
}

impl TransactionsCursor {
    fn encode(&self) -> ResultLedger<String> {
        let bytes = serde_json::to_vec(self)
            .map_err(|_| LedgerError::InvalidCursor("invalid transaction cursor".to_string()))?;
        Ok(base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(bytes))
    }

    fn decode(input: &str) -> ResultLedger<Self> {
        let bytes = base64::engine::general_purpose::URL_SAFE_NO_PAD
            .decode(input.as_bytes())
            .map_err(|_| LedgerError::InvalidCursor("invalid transaction cursor".to_string()))?;
        serde_json::from_slice::<Self>(&bytes)
            .map_err(|_| LedgerError::InvalidCursor("invalid transaction cursor".to_string()))
    }
}

impl Ledger {
    pub(super) async fn find_transaction(
        &self,
        db: &DatabaseTransaction,
        account_id: &str,
        transaction_id: Uuid,
    ) -> ResultLedger<transactions::Model> {
        transactions::Entity::find_by_id(transaction_id.to_string())
            .filter(transactions::Column::AccountId.eq(account_id.to_string()))
            .one(db)
            .await?
            .ok_or_else(|| LedgerError::KeyNotFound("transaction not exists".to_string()))
    }

    /// Returns one transaction, including deleted rows and split parents
    /// (read-gated).
    pub async fn transaction(
        &self,
        account_id: Uuid,
        transaction_id: Uuid,
        user_id: &str,
    ) -> ResultLedger<Transaction> {
        with_tx!(self, |db_tx| {
            let account = self
                .require_account_read(&db_tx, account_id, user_id)
                .await?;
            let model = self
                .find_transaction(&db_tx, &account.id, transaction_id)
                .await?;
            Transaction::try_from(model)
        })
    }

    /// Returns the active children of a split parent, oldest first
    /// (read-gated).
    pub async fn split_children(
        &self,
        account_id: Uuid,
        parent_id: Uuid,
        user_id: &str,
    ) -> ResultLedger<Vec<Transaction>> {
        with_tx!(self, |db_tx| {
            let account = self
                .require_account_read(&db_tx, account_id, user_id)
                .await?;
            let parent = self.find_transaction(&db_tx, &account.id, parent_id).await?;
            if !parent.is_split_parent {
                return Err(LedgerError::NotASplitParent(parent.id.clone()));
            }

            let rows: Vec<transactions::Model> = transactions::Entity::find()
                .filter(transactions::Column::ParentTransactionId.eq(parent.id.clone()))
                .filter(transactions::Column::DeletedAt.is_null())
                .order_by_asc(transactions::Column::CreatedAt)
                .order_by_asc(transactions::Column::Id)
                .all(&db_tx)
                .await?;
            rows.into_iter().map(Transaction::try_from).collect()
        })
    }

    /// Lists transactions on an account, newest first, with cursor-based
    /// pagination by `(occurred_at DESC, id DESC)`.
    pub async fn list_transactions(
        &self,
        account_id: Uuid,
        filter: &TransactionListFilter,
        user_id: &str,
        limit: u64,
        cursor: Option<&str>,
    ) -> ResultLedger<(Vec<Transaction>, Option<String>)> {
        with_tx!(self, |db_tx| {
            let account = self
                .require_account_read(&db_tx, account_id, user_id)
                .await?;
            validate_list_filter(filter)?;

            let limit_plus_one = limit.saturating_add(1);
            let mut query = transactions::Entity::find()
                .filter(transactions::Column::AccountId.eq(account.id.clone()))
                .order_by_desc(transactions::Column::OccurredAt)
                .order_by_desc(transactions::Column::Id)
                .limit(limit_plus_one);

            if !filter.include_deleted {
                query = query.filter(transactions::Column::DeletedAt.is_null());
            }
            if !filter.include_split_parents {
                query = query.filter(transactions::Column::IsSplitParent.eq(false));
            }
            if let Some(from) = filter.from {
                query = query.filter(transactions::Column::OccurredAt.gte(from));
            }
            if let Some(to) = filter.to {
                query = query.filter(transactions::Column::OccurredAt.lt(to));
            }

            if let Some(cursor) = cursor {
                let cursor = TransactionsCursor::decode(cursor)?;
                query = query.filter(
                    Condition::any()
                        .add(transactions::Column::OccurredAt.lt(cursor.occurred_at))
                        .add(
                            Condition::all()
                                .add(transactions::Column::OccurredAt.eq(cursor.occurred_at))
                                .add(transactions::Column::Id.lt(cursor.transaction_id)),
                        ),
                );
            }

            let rows: Vec<transactions::Model> = query.all(&db_tx).await?;
            let has_more = rows.len() > limit as usize;

            let mut out = Vec::with_capacity(rows.len().min(limit as usize));
            for model in rows.into_iter().take(limit as usize) {
                out.push(Transaction::try_from(model)?);
            }

            let next_cursor = if has_more {
                out.last()
                    .map(|tx| {
                        TransactionsCursor {
                            occurred_at: tx.occurred_at,
                            transaction_id: tx.id.to_string(),
                        }
                        .encode()
                    })
                    .transpose()?
            } else {
                None
            };

            Ok((out, next_cursor))
        })
    }
}
