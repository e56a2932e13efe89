//! Command structs for ledger write operations.
//!
//! These types group parameters for mutations (create/update/split), keeping
//! call sites readable and avoiding long argument lists.

use chrono::{DateTime, NaiveDate, Utc};
use uuid::Uuid;

use crate::{Currency, Money};

/// Create a new account.
#[derive(Clone, Debug)]
pub struct CreateAccountCmd {
    pub name: String,
    pub currency: Currency,
    pub opening_balance: Money,
    pub user_id: String,
}

impl CreateAccountCmd {
    #[must_use]
    pub fn new(name: impl Into<String>, user_id: impl Into<String>, currency: Currency) -> Self {
        Self {
            name: name.into(),
            currency,
            opening_balance: Money::ZERO,
            user_id: user_id.into(),
        }
    }

    #[must_use]
    pub fn opening_balance(mut self, opening_balance: Money) -> Self {
        self.opening_balance = opening_balance;
        self
    }
}

/// Create a transaction on an account.
#[derive(Clone, Debug)]
pub struct CreateTransactionCmd {
    pub account_id: Uuid,
    pub amount: Money,
    pub currency: Currency,
    pub occurred_at: DateTime<Utc>,
    pub value_date: Option<NaiveDate>,
    pub description: Option<String>,
    pub category: Option<String>,
    pub user_id: String,
}

impl CreateTransactionCmd {
    #[must_use]
    pub fn new(
        account_id: Uuid,
        user_id: impl Into<String>,
        amount: Money,
        currency: Currency,
        occurred_at: DateTime<Utc>,
    ) -> Self {
        Self {
            account_id,
            amount,
            currency,
            occurred_at,
            value_date: None,
            description: None,
            category: None,
            user_id: user_id.into(),
        }
    }

    #[must_use]
    pub fn value_date(mut self, value_date: NaiveDate) -> Self {
        self.value_date = Some(value_date);
        self
    }

    #[must_use]
    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    #[must_use]
    pub fn category(mut self, category: impl Into<String>) -> Self {
        self.category = Some(category.into());
        self
    }
}

/// Update an existing transaction.
///
/// `None` fields are left untouched. Only amount, dates and descriptive
/// fields are mutable; `currency` and `account_id` patches exist so callers
/// forwarding raw requests get a typed `ImmutableField` rejection instead of
/// a silent no-op.
#[derive(Clone, Debug, Default)]
pub struct UpdateTransactionCmd {
    pub account_id: Uuid,
    pub transaction_id: Uuid,
    pub amount: Option<Money>,
    pub occurred_at: Option<DateTime<Utc>>,
    pub value_date: Option<NaiveDate>,
    pub description: Option<String>,
    pub category: Option<String>,
    /// Immutable; any `Some` value is rejected.
    pub currency: Option<Currency>,
    /// Immutable; any `Some` value is rejected.
    pub move_to_account_id: Option<Uuid>,
    pub user_id: String,
}

impl UpdateTransactionCmd {
    #[must_use]
    pub fn new(account_id: Uuid, transaction_id: Uuid, user_id: impl Into<String>) -> Self {
        Self {
            account_id,
            transaction_id,
            user_id: user_id.into(),
            ..Default::default()
        }
    }

    #[must_use]
    pub fn amount(mut self, amount: Money) -> Self {
        self.amount = Some(amount);
        self
    }

    #[must_use]
    pub fn occurred_at(mut self, occurred_at: DateTime<Utc>) -> Self {
        self.occurred_at = Some(occurred_at);
        self
    }

    #[must_use]
    pub fn value_date(mut self, value_date: NaiveDate) -> Self {
        self.value_date = Some(value_date);
        self
    }

    #[must_use]
    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    #[must_use]
    pub fn category(mut self, category: impl Into<String>) -> Self {
        self.category = Some(category.into());
        self
    }
}

/// One part of a split.
#[derive(Clone, Debug)]
pub struct SplitPart {
    pub amount: Money,
    pub description: Option<String>,
    pub category: Option<String>,
}

impl SplitPart {
    #[must_use]
    pub fn new(amount: Money) -> Self {
        Self {
            amount,
            description: None,
            category: None,
        }
    }

    #[must_use]
    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    #[must_use]
    pub fn category(mut self, category: impl Into<String>) -> Self {
        self.category = Some(category.into());
        self
    }
}

/// Split a transaction into child transactions whose amounts sum exactly to
/// the parent amount.
#[derive(Clone, Debug)]
pub struct SplitTransactionCmd {
    pub account_id: Uuid,
    pub transaction_id: Uuid,
    pub parts: Vec<SplitPart>,
    pub user_id: String,
}

impl SplitTransactionCmd {
    #[must_use]
    pub fn new(
        account_id: Uuid,
        transaction_id: Uuid,
        user_id: impl Into<String>,
        parts: Vec<SplitPart>,
    ) -> Self {
        Self {
            account_id,
            transaction_id,
            parts,
            user_id: user_id.into(),
        }
    }
}
