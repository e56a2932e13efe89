//! Transaction mutations.
//!
//! Every mutation runs in a single DB transaction: guard, row write,
//! materialized balance delta and audit entry commit together or not at all.
//! The account row is locked before the delta is computed, so concurrent
//! mutations on one account serialize.

use chrono::Utc;
use sea_orm::{ActiveValue, TransactionTrait, prelude::*};
use uuid::Uuid;

use crate::{
    AuditAction, CreateTransactionCmd, LedgerError, Money, ResultLedger, Transaction,
    UpdateTransactionCmd, transactions,
    util::{ensure_account_currency, model_currency},
};

use super::super::{Ledger, normalize_optional_text, with_tx};

impl Ledger {
    /// Records a new transaction and applies its amount to the account
    /// balance (owner or editor).
    ///
    /// The amount must be non-zero and in the account currency. `value_date`
    /// defaults to the calendar date of `occurred_at`.
    pub async fn create_transaction(&self, cmd: CreateTransactionCmd) -> ResultLedger<Uuid> {
        let result = with_tx!(self, |db_tx| {
            let (account, _) = self
                .require_account_write(&db_tx, cmd.account_id, &cmd.user_id)
                .await?;
            Self::require_account_active(&account)?;
            ensure_account_currency(model_currency(&account.currency)?, cmd.currency)?;

            let value_date = cmd
                .value_date
                .unwrap_or_else(|| cmd.occurred_at.date_naive());
            let tx = Transaction::new(
                cmd.account_id,
                cmd.amount,
                cmd.currency,
                cmd.occurred_at,
                value_date,
                normalize_optional_text(cmd.description.as_deref()),
                normalize_optional_text(cmd.category.as_deref()),
                cmd.user_id.clone(),
            )?;

            let locked = self.lock_account(&db_tx, cmd.account_id).await?;
            transactions::ActiveModel::from(&tx).insert(&db_tx).await?;
            self.apply_balance_delta(&db_tx, &locked, tx.amount).await?;

            self.record_audit(
                &db_tx,
                &cmd.user_id,
                AuditAction::Create,
                "transaction",
                &tx.id.to_string(),
                None,
                Some(serde_json::json!({
                    "account_id": account.id,
                    "amount_minor": tx.amount.minor(),
                    "occurred_at": tx.occurred_at,
                    "value_date": tx.value_date,
                    "description": tx.description,
                    "category": tx.category,
                })),
            )
            .await?;

            Ok(tx.id)
        });
        self.note_denial(
            &result,
            &cmd.user_id,
            AuditAction::Create,
            "transaction",
            &cmd.account_id.to_string(),
        )
        .await;
        result
    }

    /// Patches a transaction in place; `None` fields are untouched.
    ///
    /// Currency and account are immutable and any patch on them is rejected.
    /// The amounts of split parents and split children are frozen; everything
    /// else on them stays editable. An amount change moves the balance by the
    /// difference.
    pub async fn update_transaction(&self, cmd: UpdateTransactionCmd) -> ResultLedger<()> {
        if cmd.currency.is_some() {
            return Err(LedgerError::ImmutableField(
                "currency cannot be changed".to_string(),
            ));
        }
        if cmd.move_to_account_id.is_some() {
            return Err(LedgerError::ImmutableField(
                "transactions cannot move between accounts".to_string(),
            ));
        }

        let result = with_tx!(self, |db_tx| {
            let (account, level) = self
                .require_account_write(&db_tx, cmd.account_id, &cmd.user_id)
                .await?;
            Self::require_account_active(&account)?;

            let existing = self
                .find_transaction(&db_tx, &account.id, cmd.transaction_id)
                .await?;
            if existing.deleted_at.is_some() {
                return Err(LedgerError::KeyNotFound(
                    "transaction not exists".to_string(),
                ));
            }
            Self::require_transaction_mutation(level, &existing.created_by, &cmd.user_id)?;

            if let Some(amount) = cmd.amount {
                if existing.is_split_parent {
                    return Err(LedgerError::ImmutableField(
                        "amount of a split parent is frozen".to_string(),
                    ));
                }
                if existing.parent_transaction_id.is_some() {
                    return Err(LedgerError::ImmutableField(
                        "amount of a split child is frozen".to_string(),
                    ));
                }
                if amount.is_zero() {
                    return Err(LedgerError::InvalidAmount(
                        "amount must not be 0".to_string(),
                    ));
                }
            }

            let mut old_values = serde_json::Map::new();
            let mut new_values = serde_json::Map::new();
            let mut active = transactions::ActiveModel {
                id: ActiveValue::Set(existing.id.clone()),
                ..Default::default()
            };

            if let Some(amount) = cmd.amount
                && amount.minor() != existing.amount_minor
            {
                old_values.insert("amount_minor".to_string(), existing.amount_minor.into());
                new_values.insert("amount_minor".to_string(), amount.minor().into());
                active.amount_minor = ActiveValue::Set(amount.minor());
            }
            if let Some(occurred_at) = cmd.occurred_at
                && occurred_at != existing.occurred_at
            {
                old_values.insert(
                    "occurred_at".to_string(),
                    serde_json::json!(existing.occurred_at),
                );
                new_values.insert("occurred_at".to_string(), serde_json::json!(occurred_at));
                active.occurred_at = ActiveValue::Set(occurred_at);
            }
            if let Some(value_date) = cmd.value_date
                && value_date != existing.value_date
            {
                old_values.insert(
                    "value_date".to_string(),
                    serde_json::json!(existing.value_date),
                );
                new_values.insert("value_date".to_string(), serde_json::json!(value_date));
                active.value_date = ActiveValue::Set(value_date);
            }
            if let Some(description) = cmd.description.as_deref() {
                let description = normalize_optional_text(Some(description));
                if description != existing.description {
                    old_values.insert(
                        "description".to_string(),
                        serde_json::json!(existing.description),
                    );
                    new_values.insert("description".to_string(), serde_json::json!(description));
                    active.description = ActiveValue::Set(description);
                }
            }
            if let Some(category) = cmd.category.as_deref() {
                let category = normalize_optional_text(Some(category));
                if category != existing.category {
                    old_values
                        .insert("category".to_string(), serde_json::json!(existing.category));
                    new_values.insert("category".to_string(), serde_json::json!(category));
                    active.category = ActiveValue::Set(category);
                }
            }

            if new_values.is_empty() {
                return Ok(());
            }

            if let Some(amount) = cmd.amount
                && amount.minor() != existing.amount_minor
            {
                let locked = self.lock_account(&db_tx, cmd.account_id).await?;
                let delta = amount - Money::from_minor(existing.amount_minor);
                self.apply_balance_delta(&db_tx, &locked, delta).await?;
            }
            active.update(&db_tx).await?;

            self.record_audit(
                &db_tx,
                &cmd.user_id,
                AuditAction::Update,
                "transaction",
                &existing.id,
                Some(old_values.into()),
                Some(new_values.into()),
            )
            .await?;

            Ok(())
        });
        self.note_denial(
            &result,
            &cmd.user_id,
            AuditAction::Update,
            "transaction",
            &cmd.transaction_id.to_string(),
        )
        .await;
        result
    }

    /// Soft-deletes a transaction and removes its amount from the balance
    /// (owner or editor).
    ///
    /// A split parent must be joined back first; deleting it directly would
    /// leave orphaned children.
    pub async fn soft_delete_transaction(
        &self,
        account_id: Uuid,
        transaction_id: Uuid,
        user_id: &str,
    ) -> ResultLedger<()> {
        let result = with_tx!(self, |db_tx| {
            let (account, level) = self
                .require_account_write(&db_tx, account_id, user_id)
                .await?;
            Self::require_account_active(&account)?;

            let existing = self
                .find_transaction(&db_tx, &account.id, transaction_id)
                .await?;
            if existing.deleted_at.is_some() {
                return Err(LedgerError::KeyNotFound(
                    "transaction not exists".to_string(),
                ));
            }
            if existing.is_split_parent {
                return Err(LedgerError::SplitParentNotDeletable(existing.id.clone()));
            }
            Self::require_transaction_mutation(level, &existing.created_by, user_id)?;

            let locked = self.lock_account(&db_tx, account_id).await?;
            self.apply_balance_delta(&db_tx, &locked, -Money::from_minor(existing.amount_minor))
                .await?;

            let deleted_at = Utc::now();
            let active = transactions::ActiveModel {
                id: ActiveValue::Set(existing.id.clone()),
                deleted_at: ActiveValue::Set(Some(deleted_at)),
                deleted_by: ActiveValue::Set(Some(user_id.to_string())),
                ..Default::default()
            };
            active.update(&db_tx).await?;

            self.record_audit(
                &db_tx,
                user_id,
                AuditAction::Delete,
                "transaction",
                &existing.id,
                Some(serde_json::json!({ "deleted_at": null })),
                Some(serde_json::json!({
                    "deleted_at": deleted_at,
                    "deleted_by": user_id,
                })),
            )
            .await?;

            Ok(())
        });
        self.note_denial(
            &result,
            user_id,
            AuditAction::Delete,
            "transaction",
            &transaction_id.to_string(),
        )
        .await;
        result
    }
}
