//! Account primitives.
//!
//! An `Account` carries an immutable opening balance and a materialized
//! `current_balance`: at every durable state the stored value equals
//! `opening_balance + Σ(active, non-split-parent transaction amounts)`. The
//! materialized column is a read cache with an explicit repair path
//! (`Ledger::rebuild_balance`), not a source of truth of its own.

use chrono::{DateTime, Utc};
use sea_orm::{ActiveValue, entity::prelude::*};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{Currency, LedgerError, Money};

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    pub id: Uuid,
    pub name: String,
    /// Owner of the account (implicit `owner` permission grant).
    pub user_id: String,
    pub currency: Currency,
    pub opening_balance: Money,
    pub current_balance: Money,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub deleted_at: Option<DateTime<Utc>>,
}

impl Account {
    pub fn new(
        name: String,
        user_id: String,
        currency: Currency,
        opening_balance: Money,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            name,
            user_id,
            currency,
            opening_balance,
            current_balance: opening_balance,
            is_active: true,
            created_at,
            deleted_at: None,
        }
    }
}

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "accounts")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,
    pub name: String,
    pub user_id: String,
    pub currency: String,
    pub opening_balance_minor: i64,
    pub current_balance_minor: i64,
    pub is_active: bool,
    pub created_at: DateTimeUtc,
    pub deleted_at: Option<DateTimeUtc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::transactions::Entity")]
    Transactions,
    #[sea_orm(has_many = "super::shares::Entity")]
    Shares,
}

impl Related<super::transactions::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Transactions.def()
    }
}

impl Related<super::shares::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Shares.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl From<&Account> for ActiveModel {
    fn from(account: &Account) -> Self {
        Self {
            id: ActiveValue::Set(account.id.to_string()),
            name: ActiveValue::Set(account.name.clone()),
            user_id: ActiveValue::Set(account.user_id.clone()),
            currency: ActiveValue::Set(account.currency.code().to_string()),
            opening_balance_minor: ActiveValue::Set(account.opening_balance.minor()),
            current_balance_minor: ActiveValue::Set(account.current_balance.minor()),
            is_active: ActiveValue::Set(account.is_active),
            created_at: ActiveValue::Set(account.created_at),
            deleted_at: ActiveValue::Set(account.deleted_at),
        }
    }
}

impl TryFrom<Model> for Account {
    type Error = LedgerError;

    fn try_from(model: Model) -> Result<Self, Self::Error> {
        Ok(Self {
            id: Uuid::parse_str(&model.id)
                .map_err(|_| LedgerError::InvalidId("invalid account id".to_string()))?,
            name: model.name,
            user_id: model.user_id,
            currency: Currency::try_from(model.currency.as_str())?,
            opening_balance: Money::from_minor(model.opening_balance_minor),
            current_balance: Money::from_minor(model.current_balance_minor),
            is_active: model.is_active,
            created_at: model.created_at,
            deleted_at: model.deleted_at,
        })
    }
}
