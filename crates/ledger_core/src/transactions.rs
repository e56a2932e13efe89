//! Transaction primitives.
//!
//! A `Transaction` is a single signed monetary movement against an account.
//! Rows are never hard-deleted: `deleted_at` marks a soft delete, which
//! retroactively excludes the row from every balance computation while
//! keeping the audit history intact.
//!
//! Split hierarchy is strictly two levels: a parent with children (linked via
//! `parent_transaction_id`) is flagged `is_split_parent` and stops
//! contributing to the balance directly; its children carry its economic
//! effect instead. A child can never be split again.

use chrono::{DateTime, NaiveDate, Utc};
use sea_orm::{ActiveValue, entity::prelude::*};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{Currency, LedgerError, Money, ResultLedger};

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    pub id: Uuid,
    pub account_id: Uuid,
    pub amount: Money,
    pub currency: Currency,
    pub occurred_at: DateTime<Utc>,
    pub value_date: NaiveDate,
    pub description: Option<String>,
    pub category: Option<String>,
    pub created_by: String,
    pub created_at: DateTime<Utc>,
    pub deleted_at: Option<DateTime<Utc>>,
    pub deleted_by: Option<String>,
    pub parent_transaction_id: Option<Uuid>,
    pub is_split_parent: bool,
}

impl Transaction {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        account_id: Uuid,
        amount: Money,
        currency: Currency,
        occurred_at: DateTime<Utc>,
        value_date: NaiveDate,
        description: Option<String>,
        category: Option<String>,
        created_by: String,
    ) -> ResultLedger<Self> {
        if amount.is_zero() {
            return Err(LedgerError::InvalidAmount(
                "amount must not be 0".to_string(),
            ));
        }
        Ok(Self {
            id: Uuid::new_v4(),
            account_id,
            amount,
            currency,
            occurred_at,
            value_date,
            description,
            category,
            created_by,
            created_at: Utc::now(),
            deleted_at: None,
            deleted_by: None,
            parent_transaction_id: None,
            is_split_parent: false,
        })
    }
}

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "transactions")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,
    pub account_id: String,
    pub amount_minor: i64,
    pub currency: String,
    pub occurred_at: DateTimeUtc,
    pub value_date: Date,
    pub description: Option<String>,
    pub category: Option<String>,
    pub created_by: String,
    pub created_at: DateTimeUtc,
    pub deleted_at: Option<DateTimeUtc>,
    pub deleted_by: Option<String>,
    pub parent_transaction_id: Option<String>,
    pub is_split_parent: bool,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::accounts::Entity",
        from = "Column::AccountId",
        to = "super::accounts::Column::Id",
        on_update = "NoAction",
        on_delete = "NoAction"
    )]
    Accounts,
}

impl Related<super::accounts::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Accounts.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl From<&Transaction> for ActiveModel {
    fn from(tx: &Transaction) -> Self {
        Self {
            id: ActiveValue::Set(tx.id.to_string()),
            account_id: ActiveValue::Set(tx.account_id.to_string()),
            amount_minor: ActiveValue::Set(tx.amount.minor()),
            currency: ActiveValue::Set(tx.currency.code().to_string()),
            occurred_at: ActiveValue::Set(tx.occurred_at),
            value_date: ActiveValue::Set(tx.value_date),
            description: ActiveValue::Set(tx.description.clone()),
            category: ActiveValue::Set(tx.category.clone()),
            created_by: ActiveValue::Set(tx.created_by.clone()),
            created_at: ActiveValue::Set(tx.created_at),
            deleted_at: ActiveValue::Set(tx.deleted_at),
            deleted_by: ActiveValue::Set(tx.deleted_by.clone()),
            parent_transaction_id: ActiveValue::Set(
                tx.parent_transaction_id.map(|id| id.to_string()),
            ),
            is_split_parent: ActiveValue::Set(tx.is_split_parent),
        }
    }
}

impl TryFrom<Model> for Transaction {
    type Error = LedgerError;

    fn try_from(model: Model) -> Result<Self, Self::Error> {
        Ok(Self {
            id: Uuid::parse_str(&model.id)
                .map_err(|_| LedgerError::InvalidId("invalid transaction id".to_string()))?,
            account_id: Uuid::parse_str(&model.account_id)
                .map_err(|_| LedgerError::InvalidId("invalid account id".to_string()))?,
            amount: Money::from_minor(model.amount_minor),
            currency: Currency::try_from(model.currency.as_str())?,
            occurred_at: model.occurred_at,
            value_date: model.value_date,
            description: model.description,
            category: model.category,
            created_by: model.created_by,
            created_at: model.created_at,
            deleted_at: model.deleted_at,
            deleted_by: model.deleted_by,
            parent_transaction_id: model
                .parent_transaction_id
                .as_deref()
                .map(|s| {
                    Uuid::parse_str(s).map_err(|_| {
                        LedgerError::InvalidId("invalid parent transaction id".to_string())
                    })
                })
                .transpose()?,
            is_split_parent: model.is_split_parent,
        })
    }
}
