//! Share (permission grant) management, owner-only.
//!
//! The `owner` level never moves through this path: it exists implicitly via
//! `accounts.user_id`, so there is always exactly one owner and the generic
//! grant/revoke flow cannot downgrade it. Ownership transfer would be a
//! separate explicit operation outside this core.

use chrono::Utc;
use sea_orm::{ActiveValue, QueryFilter, TransactionTrait, prelude::*};
use uuid::Uuid;

use crate::{AuditAction, LedgerError, ResultLedger, shares};

use super::{Ledger, PermissionLevel, with_tx};

impl Ledger {
    /// Grants `editor` or `viewer` on an account, or updates an existing
    /// grant (owner only). A previously revoked grant is revived.
    pub async fn upsert_share(
        &self,
        account_id: Uuid,
        grantee: &str,
        level: PermissionLevel,
        user_id: &str,
    ) -> ResultLedger<()> {
        let result = with_tx!(self, |db_tx| {
            let account = self
                .require_account_owner(&db_tx, account_id, user_id)
                .await?;
            self.require_user_exists(&db_tx, grantee).await?;

            if level == PermissionLevel::Owner {
                return Err(LedgerError::InvalidRole(
                    "ownership is not granted through shares".to_string(),
                ));
            }
            if grantee == account.user_id {
                return Err(LedgerError::InvalidRole(
                    "the owner's grant is implicit and cannot be changed".to_string(),
                ));
            }

            let existing = shares::Entity::find_by_id((account.id.clone(), grantee.to_string()))
                .one(&db_tx)
                .await?;
            let old_level = existing
                .as_ref()
                .filter(|s| s.deleted_at.is_none())
                .map(|s| s.level.clone());

            let active = shares::ActiveModel {
                account_id: ActiveValue::Set(account.id.clone()),
                user_id: ActiveValue::Set(grantee.to_string()),
                level: ActiveValue::Set(level.as_str().to_string()),
                granted_by: ActiveValue::Set(user_id.to_string()),
                deleted_at: ActiveValue::Set(None),
            };
            match existing {
                Some(_) => {
                    active.update(&db_tx).await?;
                }
                None => {
                    active.insert(&db_tx).await?;
                }
            }

            self.record_audit(
                &db_tx,
                user_id,
                AuditAction::PermissionChange,
                "share",
                &format!("{}/{grantee}", account.id),
                Some(serde_json::json!({ "level": old_level })),
                Some(serde_json::json!({ "level": level.as_str() })),
            )
            .await?;

            Ok(())
        });
        self.note_denial(
            &result,
            user_id,
            AuditAction::PermissionChange,
            "share",
            &format!("{account_id}/{grantee}"),
        )
        .await;
        result
    }

    /// Revokes a grant via soft delete (owner only).
    pub async fn revoke_share(
        &self,
        account_id: Uuid,
        grantee: &str,
        user_id: &str,
    ) -> ResultLedger<()> {
        let result = with_tx!(self, |db_tx| {
            let account = self
                .require_account_owner(&db_tx, account_id, user_id)
                .await?;
            if grantee == account.user_id {
                return Err(LedgerError::InvalidRole(
                    "the owner's grant cannot be revoked".to_string(),
                ));
            }

            let existing = shares::Entity::find_by_id((account.id.clone(), grantee.to_string()))
                .filter(shares::Column::DeletedAt.is_null())
                .one(&db_tx)
                .await?
                .ok_or_else(|| LedgerError::KeyNotFound("share not exists".to_string()))?;

            let active = shares::ActiveModel {
                account_id: ActiveValue::Set(existing.account_id.clone()),
                user_id: ActiveValue::Set(existing.user_id.clone()),
                deleted_at: ActiveValue::Set(Some(Utc::now())),
                ..Default::default()
            };
            active.update(&db_tx).await?;

            self.record_audit(
                &db_tx,
                user_id,
                AuditAction::PermissionChange,
                "share",
                &format!("{}/{grantee}", account.id),
                Some(serde_json::json!({ "level": existing.level })),
                Some(serde_json::json!({ "level": null })),
            )
            .await?;

            Ok(())
        });
        self.note_denial(
            &result,
            user_id,
            AuditAction::PermissionChange,
            "share",
            &format!("{account_id}/{grantee}"),
        )
        .await;
        result
    }

    /// Lists active grants on an account (owner only). The implicit owner
    /// grant is not a row and is not listed.
    pub async fn list_shares(
        &self,
        account_id: Uuid,
        user_id: &str,
    ) -> ResultLedger<Vec<(String, PermissionLevel)>> {
        with_tx!(self, |db_tx| {
            let account = self
                .require_account_owner(&db_tx, account_id, user_id)
                .await?;

            let rows = shares::Entity::find()
                .filter(shares::Column::AccountId.eq(account.id.clone()))
                .filter(shares::Column::DeletedAt.is_null())
                .all(&db_tx)
                .await?;
            rows.into_iter()
                .map(|s| {
                    PermissionLevel::try_from(s.level.as_str()).map(|level| (s.user_id, level))
                })
                .collect()
        })
    }
}
