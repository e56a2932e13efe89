//! Permission guard.
//!
//! Permission level is data (a share row), not a type hierarchy: the
//! effective level for `(actor, account)` is `Owner` when the actor created
//! the account, otherwise whatever the active share grants, otherwise none.
//! Administrators bypass the guard for reads and for explicit maintenance
//! operations (`rebuild_balance`) only.

use sea_orm::{DatabaseTransaction, QueryFilter, QuerySelect, prelude::*};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{LedgerError, ResultLedger, accounts, shares, users};

use super::Ledger;

/// Effective access level an actor holds on an account.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PermissionLevel {
    Owner,
    Editor,
    Viewer,
}

impl PermissionLevel {
    pub(crate) fn can_write(self) -> bool {
        matches!(self, Self::Owner | Self::Editor)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Owner => "owner",
            Self::Editor => "editor",
            Self::Viewer => "viewer",
        }
    }
}

impl TryFrom<&str> for PermissionLevel {
    type Error = LedgerError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value {
            "owner" => Ok(Self::Owner),
            "editor" => Ok(Self::Editor),
            "viewer" => Ok(Self::Viewer),
            other => Err(LedgerError::InvalidRole(format!(
                "invalid permission level: {other}"
            ))),
        }
    }
}

impl Ledger {
    pub(super) async fn find_account_by_id(
        &self,
        db: &DatabaseTransaction,
        account_id: Uuid,
    ) -> ResultLedger<Option<accounts::Model>> {
        accounts::Entity::find_by_id(account_id.to_string())
            .one(db)
            .await
            .map_err(Into::into)
    }

    /// Re-selects the account row with an exclusive row lock (`FOR UPDATE`).
    ///
    /// Every balance-delta computation starts from the locked row so two
    /// concurrent mutations on the same account serialize on it. SQLite has a
    /// single writer and ignores the lock clause; the transaction itself is
    /// the serialization point there.
    pub(super) async fn lock_account(
        &self,
        db: &DatabaseTransaction,
        account_id: Uuid,
    ) -> ResultLedger<accounts::Model> {
        accounts::Entity::find_by_id(account_id.to_string())
            .lock_exclusive()
            .one(db)
            .await?
            .ok_or_else(|| LedgerError::KeyNotFound("account not exists".to_string()))
    }

    pub(super) async fn is_admin(
        &self,
        db: &DatabaseTransaction,
        user_id: &str,
    ) -> ResultLedger<bool> {
        let row = users::Entity::find_by_id(user_id.to_string()).one(db).await?;
        Ok(row.is_some_and(|u| u.is_admin))
    }

    pub(super) async fn require_user_exists(
        &self,
        db: &DatabaseTransaction,
        username: &str,
    ) -> ResultLedger<()> {
        let exists = users::Entity::find_by_id(username.to_string())
            .one(db)
            .await?
            .is_some();
        if !exists {
            return Err(LedgerError::KeyNotFound("user not exists".to_string()));
        }
        Ok(())
    }

    /// Resolves the actor's effective permission level on an account.
    ///
    /// Owner is implicit via `accounts.user_id`; everyone else goes through
    /// an active (non-revoked) share row.
    pub(super) async fn effective_permission(
        &self,
        db: &DatabaseTransaction,
        account: &accounts::Model,
        user_id: &str,
    ) -> ResultLedger<Option<PermissionLevel>> {
        if account.user_id == user_id {
            return Ok(Some(PermissionLevel::Owner));
        }
        let row = shares::Entity::find_by_id((account.id.clone(), user_id.to_string()))
            .filter(shares::Column::DeletedAt.is_null())
            .one(db)
            .await?;
        row.as_ref()
            .map(|s| PermissionLevel::try_from(s.level.as_str()))
            .transpose()
    }

    /// Requires read access (any permission level, or administrator).
    pub(super) async fn require_account_read(
        &self,
        db: &DatabaseTransaction,
        account_id: Uuid,
        user_id: &str,
    ) -> ResultLedger<accounts::Model> {
        let account = self
            .find_account_by_id(db, account_id)
            .await?
            .ok_or_else(|| LedgerError::KeyNotFound("account not exists".to_string()))?;
        if self.is_admin(db, user_id).await? {
            return Ok(account);
        }
        if self
            .effective_permission(db, &account, user_id)
            .await?
            .is_none()
        {
            return Err(LedgerError::InsufficientPermission(
                "read access denied".to_string(),
            ));
        }
        Ok(account)
    }

    /// Requires write access (editor or owner). Administrators do **not**
    /// bypass writes.
    pub(super) async fn require_account_write(
        &self,
        db: &DatabaseTransaction,
        account_id: Uuid,
        user_id: &str,
    ) -> ResultLedger<(accounts::Model, PermissionLevel)> {
        let account = self
            .find_account_by_id(db, account_id)
            .await?
            .ok_or_else(|| LedgerError::KeyNotFound("account not exists".to_string()))?;
        let level = self
            .effective_permission(db, &account, user_id)
            .await?
            .filter(|level| level.can_write())
            .ok_or_else(|| {
                LedgerError::InsufficientPermission("write access denied".to_string())
            })?;
        Ok((account, level))
    }

    pub(super) async fn require_account_owner(
        &self,
        db: &DatabaseTransaction,
        account_id: Uuid,
        user_id: &str,
    ) -> ResultLedger<accounts::Model> {
        let account = self
            .find_account_by_id(db, account_id)
            .await?
            .ok_or_else(|| LedgerError::KeyNotFound("account not exists".to_string()))?;
        if account.user_id != user_id {
            return Err(LedgerError::InsufficientPermission(
                "owner access required".to_string(),
            ));
        }
        Ok(account)
    }

    /// Owner or administrator: the gate for maintenance operations.
    pub(super) async fn require_account_owner_or_admin(
        &self,
        db: &DatabaseTransaction,
        account_id: Uuid,
        user_id: &str,
    ) -> ResultLedger<accounts::Model> {
        if self.is_admin(db, user_id).await? {
            return self
                .find_account_by_id(db, account_id)
                .await?
                .ok_or_else(|| LedgerError::KeyNotFound("account not exists".to_string()));
        }
        self.require_account_owner(db, account_id, user_id).await
    }

    /// Editors may mutate only transactions they created; owners may mutate
    /// any transaction on the account.
    pub(super) fn require_transaction_mutation(
        level: PermissionLevel,
        created_by: &str,
        user_id: &str,
    ) -> ResultLedger<()> {
        match level {
            PermissionLevel::Owner => Ok(()),
            PermissionLevel::Editor if created_by == user_id => Ok(()),
            _ => Err(LedgerError::InsufficientPermission(
                "cannot mutate another user's transaction".to_string(),
            )),
        }
    }

    /// Rejects mutations on disabled or soft-deleted accounts.
    pub(super) fn require_account_active(account: &accounts::Model) -> ResultLedger<()> {
        if account.deleted_at.is_some() || !account.is_active {
            return Err(LedgerError::AccountInactive(account.id.clone()));
        }
        Ok(())
    }
}
