//! Balance ledger.
//!
//! The materialized `current_balance` is maintained incrementally by
//! `apply_balance_delta` inside every mutation, and can always be
//! reconstructed from the transaction log: `rebuild_balance` is the repair
//! path for drift (a bug, a failed partial mutation, bulk data changes) and
//! the recomputed value always wins over the incremental one.

use chrono::{DateTime, Utc};
use sea_orm::{ActiveValue, DatabaseTransaction, Statement, TransactionTrait, prelude::*};
use uuid::Uuid;

use crate::{AuditAction, LedgerError, Money, ResultLedger, accounts};

use super::{Ledger, with_tx};

impl Ledger {
    /// Adds `delta` to the account's materialized balance inside the
    /// caller's transaction.
    ///
    /// `account` must be the row returned by [`Ledger::lock_account`] in the
    /// same transaction, so concurrent deltas on one account serialize.
    /// Returns the row with the new balance, so sequential deltas within one
    /// operation compose.
    pub(super) async fn apply_balance_delta(
        &self,
        db_tx: &DatabaseTransaction,
        account: &accounts::Model,
        delta: Money,
    ) -> ResultLedger<accounts::Model> {
        let new_balance = account
            .current_balance_minor
            .checked_add(delta.minor())
            .ok_or_else(|| LedgerError::InvalidAmount("balance overflow".to_string()))?;
        let account_model = accounts::ActiveModel {
            id: ActiveValue::Set(account.id.clone()),
            current_balance_minor: ActiveValue::Set(new_balance),
            ..Default::default()
        };
        account_model.update(db_tx).await?;

        let mut updated = account.clone();
        updated.current_balance_minor = new_balance;
        Ok(updated)
    }

    /// Sums active, non-split-parent transaction amounts for an account,
    /// optionally bounded by `occurred_at <= as_of`.
    async fn sum_active_amounts(
        &self,
        db_tx: &DatabaseTransaction,
        account_id: Uuid,
        as_of: Option<DateTime<Utc>>,
    ) -> ResultLedger<i64> {
        let backend = self.database.get_database_backend();
        let (date_cond, mut values) = match as_of {
            Some(as_of) => (" AND occurred_at <= ?", vec![Value::from(as_of)]),
            None => ("", Vec::new()),
        };
        values.insert(0, account_id.to_string().into());

        let stmt = Statement::from_sql_and_values(
            backend,
            format!(
                "SELECT COALESCE(SUM(amount_minor), 0) AS sum \
                 FROM transactions \
                 WHERE account_id = ? AND deleted_at IS NULL \
                 AND is_split_parent = FALSE{date_cond}"
            ),
            values,
        );
        let row = db_tx.query_one(stmt).await?;
        Ok(row.and_then(|r| r.try_get("", "sum").ok()).unwrap_or(0))
    }

    /// Returns the stored materialized balance.
    pub async fn current_balance(&self, account_id: Uuid, user_id: &str) -> ResultLedger<Money> {
        with_tx!(self, |db_tx| {
            let account = self
                .require_account_read(&db_tx, account_id, user_id)
                .await?;
            Ok(Money::from_minor(account.current_balance_minor))
        })
    }

    /// Reconstructs the balance at a point in time:
    /// `opening_balance + Σ(active, non-parent amounts with occurred_at <=
    /// as_of)`.
    ///
    /// Soft deletion is fully retroactive: a deleted transaction is absent
    /// from the balance of every date, including dates before the deletion.
    pub async fn balance_as_of(
        &self,
        account_id: Uuid,
        as_of: DateTime<Utc>,
        user_id: &str,
    ) -> ResultLedger<Money> {
        with_tx!(self, |db_tx| {
            let account = self
                .require_account_read(&db_tx, account_id, user_id)
                .await?;
            let sum = self
                .sum_active_amounts(&db_tx, account_id, Some(as_of))
                .await?;
            let balance = account
                .opening_balance_minor
                .checked_add(sum)
                .ok_or_else(|| LedgerError::InvalidAmount("balance overflow".to_string()))?;
            Ok(Money::from_minor(balance))
        })
    }

    /// Recomputes the materialized balance from scratch and overwrites the
    /// stored value (owner or administrator).
    ///
    /// Takes the exclusive account lock for the whole recomputation, so it
    /// never races an in-flight delta; it fully overwrites rather than
    /// increments, which makes it idempotent and safe to retry after a crash
    /// mid-recompute. Observed drift is logged; the recomputed value is
    /// authoritative.
    pub async fn rebuild_balance(&self, account_id: Uuid, user_id: &str) -> ResultLedger<Money> {
        let result = with_tx!(self, |db_tx| {
            self.require_account_owner_or_admin(&db_tx, account_id, user_id)
                .await?;
            let locked = self.lock_account(&db_tx, account_id).await?;

            let sum = self.sum_active_amounts(&db_tx, account_id, None).await?;
            let new_balance = locked
                .opening_balance_minor
                .checked_add(sum)
                .ok_or_else(|| LedgerError::InvalidAmount("balance overflow".to_string()))?;
            let old_balance = locked.current_balance_minor;

            if new_balance != old_balance {
                tracing::warn!(
                    account_id = %locked.id,
                    old_balance,
                    new_balance,
                    "balance drift repaired by rebuild"
                );
            }

            let account_model = accounts::ActiveModel {
                id: ActiveValue::Set(locked.id.clone()),
                current_balance_minor: ActiveValue::Set(new_balance),
                ..Default::default()
            };
            account_model.update(&db_tx).await?;

            self.record_audit(
                &db_tx,
                user_id,
                AuditAction::Rebuild,
                "account",
                &locked.id,
                Some(serde_json::json!({ "current_balance_minor": old_balance })),
                Some(serde_json::json!({ "current_balance_minor": new_balance })),
            )
            .await?;

            Ok(Money::from_minor(new_balance))
        });
        self.note_denial(
            &result,
            user_id,
            AuditAction::Rebuild,
            "account",
            &account_id.to_string(),
        )
        .await;
        result
    }
}
