//! Split and join.
//!
//! A split replaces one transaction's balance contribution with that of its
//! children; the parent row survives, flagged `is_split_parent`, so the
//! original amount stays on record. Because the parts must sum exactly to
//! the parent amount, the account balance is unchanged by both operations.
//! The hierarchy is strictly two levels: neither a parent nor a child can be
//! split again.

use chrono::Utc;
use sea_orm::{ActiveValue, QueryFilter, QueryOrder, TransactionTrait, prelude::*};
use uuid::Uuid;

use crate::{
    AuditAction, LedgerError, Money, ResultLedger, SplitTransactionCmd, Transaction, transactions,
    util::model_currency,
};

use super::super::{Ledger, normalize_optional_text, with_tx};

impl Ledger {
    /// Splits a transaction into at least two children whose amounts sum
    /// exactly to the parent amount (owner, or editor on own rows).
    ///
    /// Returns the child ids in part order.
    pub async fn split_transaction(&self, cmd: SplitTransactionCmd) -> ResultLedger<Vec<Uuid>> {
        let result = with_tx!(self, |db_tx| {
            let (account, level) = self
                .require_account_write(&db_tx, cmd.account_id, &cmd.user_id)
                .await?;
            Self::require_account_active(&account)?;

            let parent = self
                .find_transaction(&db_tx, &account.id, cmd.transaction_id)
                .await?;
            if parent.deleted_at.is_some() {
                return Err(LedgerError::KeyNotFound(
                    "transaction not exists".to_string(),
                ));
            }
            if parent.is_split_parent {
                return Err(LedgerError::AlreadySplit(parent.id.clone()));
            }
            if parent.parent_transaction_id.is_some() {
                return Err(LedgerError::AlreadySplit(parent.id.clone()));
            }
            Self::require_transaction_mutation(level, &parent.created_by, &cmd.user_id)?;

            if cmd.parts.len() < 2 {
                return Err(LedgerError::InvalidAmount(
                    "a split requires at least 2 parts".to_string(),
                ));
            }
            let mut sum = Money::ZERO;
            for part in &cmd.parts {
                if part.amount.is_zero() {
                    return Err(LedgerError::InvalidAmount(
                        "amount must not be 0".to_string(),
                    ));
                }
                sum = sum.checked_add(part.amount).ok_or_else(|| {
                    LedgerError::InvalidAmount("split parts overflow".to_string())
                })?;
            }
            if sum.minor() != parent.amount_minor {
                return Err(LedgerError::SplitSumMismatch(format!(
                    "parts sum to {}, parent amount is {}",
                    sum,
                    Money::from_minor(parent.amount_minor)
                )));
            }

            // The parent's contribution leaves the balance and the parts'
            // contribution enters it. The two deltas cancel, but each is
            // applied explicitly rather than assumed away.
            let locked = self.lock_account(&db_tx, cmd.account_id).await?;
            let locked = self
                .apply_balance_delta(&db_tx, &locked, -Money::from_minor(parent.amount_minor))
                .await?;

            let currency = model_currency(&account.currency)?;
            let mut child_ids = Vec::with_capacity(cmd.parts.len());
            for part in &cmd.parts {
                let mut child = Transaction::new(
                    cmd.account_id,
                    part.amount,
                    currency,
                    parent.occurred_at,
                    parent.value_date,
                    normalize_optional_text(part.description.as_deref())
                        .or_else(|| parent.description.clone()),
                    normalize_optional_text(part.category.as_deref())
                        .or_else(|| parent.category.clone()),
                    cmd.user_id.clone(),
                )?;
                child.parent_transaction_id = Some(cmd.transaction_id);
                transactions::ActiveModel::from(&child)
                    .insert(&db_tx)
                    .await?;
                child_ids.push(child.id);
            }
            self.apply_balance_delta(&db_tx, &locked, sum).await?;

            let parent_model = transactions::ActiveModel {
                id: ActiveValue::Set(parent.id.clone()),
                is_split_parent: ActiveValue::Set(true),
                ..Default::default()
            };
            parent_model.update(&db_tx).await?;

            self.record_audit(
                &db_tx,
                &cmd.user_id,
                AuditAction::Split,
                "transaction",
                &parent.id,
                Some(serde_json::json!({ "is_split_parent": false })),
                Some(serde_json::json!({
                    "is_split_parent": true,
                    "children": child_ids,
                    "part_amounts_minor":
                        cmd.parts.iter().map(|p| p.amount.minor()).collect::<Vec<_>>(),
                })),
            )
            .await?;

            Ok(child_ids)
        });
        self.note_denial(
            &result,
            &cmd.user_id,
            AuditAction::Split,
            "transaction",
            &cmd.transaction_id.to_string(),
        )
        .await;
        result
    }

    /// Undoes a split: soft-deletes the active children and restores the
    /// parent as an ordinary transaction (owner, or editor on own rows).
    ///
    /// The parent amount replaces whatever the surviving children summed to,
    /// so the balance ends exactly where a never-split transaction would put
    /// it.
    pub async fn join_transaction(
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

            let parent = self
                .find_transaction(&db_tx, &account.id, transaction_id)
                .await?;
            if !parent.is_split_parent {
                return Err(LedgerError::NotASplitParent(parent.id.clone()));
            }
            Self::require_transaction_mutation(level, &parent.created_by, user_id)?;

            let children: Vec<transactions::Model> = transactions::Entity::find()
                .filter(transactions::Column::ParentTransactionId.eq(parent.id.clone()))
                .filter(transactions::Column::DeletedAt.is_null())
                .order_by_asc(transactions::Column::Id)
                .all(&db_tx)
                .await?;

            let locked = self.lock_account(&db_tx, account_id).await?;
            let deleted_at = Utc::now();
            let mut children_sum = Money::ZERO;
            let mut child_ids = Vec::with_capacity(children.len());
            for child in &children {
                children_sum = children_sum
                    .checked_add(Money::from_minor(child.amount_minor))
                    .ok_or_else(|| {
                        LedgerError::InvalidAmount("children amounts overflow".to_string())
                    })?;
                child_ids.push(child.id.clone());
                let child_model = transactions::ActiveModel {
                    id: ActiveValue::Set(child.id.clone()),
                    deleted_at: ActiveValue::Set(Some(deleted_at)),
                    deleted_by: ActiveValue::Set(Some(user_id.to_string())),
                    ..Default::default()
                };
                child_model.update(&db_tx).await?;
            }
            // Children leave the balance, the parent re-enters it. The net
            // change differs from zero only when children were deleted
            // individually after the split.
            let locked = self
                .apply_balance_delta(&db_tx, &locked, -children_sum)
                .await?;
            self.apply_balance_delta(&db_tx, &locked, Money::from_minor(parent.amount_minor))
                .await?;

            let parent_model = transactions::ActiveModel {
                id: ActiveValue::Set(parent.id.clone()),
                is_split_parent: ActiveValue::Set(false),
                ..Default::default()
            };
            parent_model.update(&db_tx).await?;

            self.record_audit(
                &db_tx,
                user_id,
                AuditAction::Join,
                "transaction",
                &parent.id,
                Some(serde_json::json!({
                    "is_split_parent": true,
                    "children": child_ids,
                })),
                Some(serde_json::json!({ "is_split_parent": false })),
            )
            .await?;

            Ok(())
        });
        self.note_denial(
            &result,
            user_id,
            AuditAction::Join,
            "transaction",
            &transaction_id.to_string(),
        )
        .await;
        result
    }
}
