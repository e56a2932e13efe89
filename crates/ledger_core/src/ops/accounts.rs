//! Account lifecycle operations.

use chrono::Utc;
use sea_orm::{ActiveValue, QueryFilter, TransactionTrait, prelude::*};
use uuid::Uuid;

use crate::{Account, AuditAction, CreateAccountCmd, LedgerError, ResultLedger, accounts};

use super::{Ledger, normalize_required_name, with_tx};

impl Ledger {
    /// Creates a new account owned by `cmd.user_id`.
    ///
    /// The opening balance is fixed at creation and never mutated; the
    /// materialized balance starts equal to it.
    pub async fn create_account(&self, cmd: CreateAccountCmd) -> ResultLedger<Uuid> {
        let name = normalize_required_name(&cmd.name, "account")?;
        with_tx!(self, |db_tx| {
            self.require_user_exists(&db_tx, &cmd.user_id).await?;

            let duplicate = accounts::Entity::find()
                .filter(accounts::Column::UserId.eq(cmd.user_id.clone()))
                .filter(accounts::Column::Name.eq(name.clone()))
                .filter(accounts::Column::DeletedAt.is_null())
                .one(&db_tx)
                .await?;
            if duplicate.is_some() {
                return Err(LedgerError::ExistingKey(name));
            }

            let account = Account::new(
                name.clone(),
                cmd.user_id.clone(),
                cmd.currency,
                cmd.opening_balance,
                Utc::now(),
            );
            accounts::ActiveModel::from(&account).insert(&db_tx).await?;

            self.record_audit(
                &db_tx,
                &cmd.user_id,
                AuditAction::Create,
                "account",
                &account.id.to_string(),
                None,
                Some(serde_json::json!({
                    "name": account.name,
                    "currency": account.currency.code(),
                    "opening_balance_minor": account.opening_balance.minor(),
                })),
            )
            .await?;

            Ok(account.id)
        })
    }

    /// Updates account name and/or active flag (owner only).
    pub async fn update_account(
        &self,
        account_id: Uuid,
        user_id: &str,
        name: Option<&str>,
        is_active: Option<bool>,
    ) -> ResultLedger<()> {
        let result = with_tx!(self, |db_tx| {
            let account = self
                .require_account_owner(&db_tx, account_id, user_id)
                .await?;
            if account.deleted_at.is_some() {
                return Err(LedgerError::AccountInactive(account.id.clone()));
            }

            let new_name = match name {
                Some(name) => Some(normalize_required_name(name, "account")?),
                None => None,
            };

            let mut old_values = serde_json::Map::new();
            let mut new_values = serde_json::Map::new();
            let mut active = accounts::ActiveModel {
                id: ActiveValue::Set(account.id.clone()),
                ..Default::default()
            };

            if let Some(new_name) = new_name
                && new_name != account.name
            {
                old_values.insert("name".to_string(), account.name.clone().into());
                new_values.insert("name".to_string(), new_name.clone().into());
                active.name = ActiveValue::Set(new_name);
            }
            if let Some(is_active) = is_active
                && is_active != account.is_active
            {
                old_values.insert("is_active".to_string(), account.is_active.into());
                new_values.insert("is_active".to_string(), is_active.into());
                active.is_active = ActiveValue::Set(is_active);
            }

            if new_values.is_empty() {
                return Ok(());
            }
            active.update(&db_tx).await?;

            self.record_audit(
                &db_tx,
                user_id,
                AuditAction::Update,
                "account",
                &account.id,
                Some(old_values.into()),
                Some(new_values.into()),
            )
            .await?;

            Ok(())
        });
        self.note_denial(
            &result,
            user_id,
            AuditAction::Update,
            "account",
            &account_id.to_string(),
        )
        .await;
        result
    }

    /// Soft-deletes an account (owner only).
    ///
    /// The balance is frozen as it stands and the transaction history is
    /// retained; accounts are never hard-deleted.
    pub async fn soft_delete_account(&self, account_id: Uuid, user_id: &str) -> ResultLedger<()> {
        let result = with_tx!(self, |db_tx| {
            let account = self
                .require_account_owner(&db_tx, account_id, user_id)
                .await?;
            if account.deleted_at.is_some() {
                return Err(LedgerError::KeyNotFound("account not exists".to_string()));
            }

            let deleted_at = Utc::now();
            let active = accounts::ActiveModel {
                id: ActiveValue::Set(account.id.clone()),
                is_active: ActiveValue::Set(false),
                deleted_at: ActiveValue::Set(Some(deleted_at)),
                ..Default::default()
            };
            active.update(&db_tx).await?;

            self.record_audit(
                &db_tx,
                user_id,
                AuditAction::Delete,
                "account",
                &account.id,
                Some(serde_json::json!({ "is_active": account.is_active, "deleted_at": null })),
                Some(serde_json::json!({ "is_active": false, "deleted_at": deleted_at })),
            )
            .await?;

            Ok(())
        });
        self.note_denial(
            &result,
            user_id,
            AuditAction::Delete,
            "account",
            &account_id.to_string(),
        )
        .await;
        result
    }

    /// Returns an account snapshot (read-gated).
    pub async fn account(&self, account_id: Uuid, user_id: &str) -> ResultLedger<Account> {
        with_tx!(self, |db_tx| {
            let model = self
                .require_account_read(&db_tx, account_id, user_id)
                .await?;
            Account::try_from(model)
        })
    }
}
