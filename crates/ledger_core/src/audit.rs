//! Audit log primitives.
//!
//! The audit log is append-only: entries are inserted in the same database
//! transaction as the mutation they describe and are never updated or
//! deleted. If the append fails, the whole mutation rolls back.

use chrono::{DateTime, Utc};
use sea_orm::{ActiveValue, entity::prelude::*};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::LedgerError;

/// Kind of mutation an audit entry describes.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditAction {
    Create,
    Update,
    Delete,
    Split,
    Join,
    PermissionChange,
    Rebuild,
}

impl AuditAction {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Create => "create",
            Self::Update => "update",
            Self::Delete => "delete",
            Self::Split => "split",
            Self::Join => "join",
            Self::PermissionChange => "permission_change",
            Self::Rebuild => "rebuild",
        }
    }
}

impl TryFrom<&str> for AuditAction {
    type Error = LedgerError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value {
            "create" => Ok(Self::Create),
            "update" => Ok(Self::Update),
            "delete" => Ok(Self::Delete),
            "split" => Ok(Self::Split),
            "join" => Ok(Self::Join),
            "permission_change" => Ok(Self::PermissionChange),
            "rebuild" => Ok(Self::Rebuild),
            other => Err(LedgerError::InvalidId(format!(
                "invalid audit action: {other}"
            ))),
        }
    }
}

/// Whether the recorded attempt went through or was rejected by the
/// permission guard.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditOutcome {
    Ok,
    Denied,
}

impl AuditOutcome {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Ok => "ok",
            Self::Denied => "denied",
        }
    }
}

impl TryFrom<&str> for AuditOutcome {
    type Error = LedgerError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value {
            "ok" => Ok(Self::Ok),
            "denied" => Ok(Self::Denied),
            other => Err(LedgerError::InvalidId(format!(
                "invalid audit outcome: {other}"
            ))),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditEntry {
    pub id: Uuid,
    pub actor: String,
    pub action: AuditAction,
    pub entity_type: String,
    pub entity_id: String,
    /// JSON document with the fields as they were before the mutation.
    pub old_values: Option<serde_json::Value>,
    /// JSON document with the fields as they are after the mutation.
    pub new_values: Option<serde_json::Value>,
    pub outcome: AuditOutcome,
    pub recorded_at: DateTime<Utc>,
}

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "audit_log")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,
    pub actor: String,
    pub action: String,
    pub entity_type: String,
    pub entity_id: String,
    pub old_values: Option<String>,
    pub new_values: Option<String>,
    pub outcome: String,
    pub recorded_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

impl From<&AuditEntry> for ActiveModel {
    fn from(entry: &AuditEntry) -> Self {
        Self {
            id: ActiveValue::Set(entry.id.to_string()),
            actor: ActiveValue::Set(entry.actor.clone()),
            action: ActiveValue::Set(entry.action.as_str().to_string()),
            entity_type: ActiveValue::Set(entry.entity_type.clone()),
            entity_id: ActiveValue::Set(entry.entity_id.clone()),
            old_values: ActiveValue::Set(entry.old_values.as_ref().map(|v| v.to_string())),
            new_values: ActiveValue::Set(entry.new_values.as_ref().map(|v| v.to_string())),
            outcome: ActiveValue::Set(entry.outcome.as_str().to_string()),
            recorded_at: ActiveValue::Set(entry.recorded_at),
        }
    }
}

impl TryFrom<Model> for AuditEntry {
    type Error = LedgerError;

    fn try_from(model: Model) -> Result<Self, Self::Error> {
        let parse_values = |raw: Option<String>| {
            raw.map(|s| {
                serde_json::from_str(&s)
                    .map_err(|_| LedgerError::InvalidId("invalid audit payload".to_string()))
            })
            .transpose()
        };
        Ok(Self {
            id: Uuid::parse_str(&model.id)
                .map_err(|_| LedgerError::InvalidId("invalid audit entry id".to_string()))?,
            actor: model.actor,
            action: AuditAction::try_from(model.action.as_str())?,
            entity_type: model.entity_type,
            entity_id: model.entity_id,
            old_values: parse_values(model.old_values)?,
            new_values: parse_values(model.new_values)?,
            outcome: AuditOutcome::try_from(model.outcome.as_str())?,
            recorded_at: model.recorded_at,
        })
    }
}
