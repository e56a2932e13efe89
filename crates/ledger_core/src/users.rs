//! Users table (minimal entity).
//!
//! Authentication lives outside the core; this table only mirrors the
//! usernames the identity collaborator hands us, plus the administrator flag
//! that bypasses the permission guard for reads and maintenance operations.

use sea_orm::entity::prelude::*;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "users")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub username: String,
    pub is_admin: bool,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
