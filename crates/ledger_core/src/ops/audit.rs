//! Audit recorder.
//!
//! `record_audit` appends inside the caller's DB transaction, so a failed
//! append rolls the whole mutation back: audit completeness is part of the
//! correctness invariant, not best-effort logging. Denials are the one
//! exception: they carry no mutation to roll back and are recorded in their
//! own short transaction after the guard rejects.

use base64::Engine as _;
use chrono::{DateTime, Utc};
use sea_orm::{
    Condition, DatabaseTransaction, QueryFilter, QueryOrder, QuerySelect, TransactionTrait,
    prelude::*,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    AuditAction, AuditEntry, AuditOutcome, LedgerError, ResultLedger, audit,
};

use super::{Ledger, with_tx};

/// Filters for listing audit entries.
///
/// `from` is inclusive and `to` is exclusive (`[from, to)`), both in UTC.
#[derive(Clone, Debug, Default)]
pub struct AuditListFilter {
    pub actor: Option<String>,
    pub entity_type: Option<String>,
    pub entity_id: Option<String>,
    pub action: Option<AuditAction>,
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
}

fn validate_list_filter(filter: &AuditListFilter) -> ResultLedger<()> {
    if let (Some(from), Some(to)) = (filter.from, filter.to)
        && from >= to
    {
        return Err(LedgerError::InvalidId(
            "invalid range: from must be < to".to_string(),
        ));
    }
    Ok(())
}

#[derive(Clone, Debug, Serialize, Deserialize)]
struct AuditCursor {
    recorded_at: DateTime<Utc>,
    entry_id: String,
}

impl AuditCursor {
    fn encode(&self) -> ResultLedger<String> {
        let bytes = serde_json::to_vec(self)
            .map_err(|_| LedgerError::InvalidCursor("invalid audit cursor".to_string()))?;
        Ok(base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(bytes))
    }

    fn decode(input: &str) -> ResultLedger<Self> {
        let bytes = base64::engine::general_purpose::URL_SAFE_NO_PAD
            .decode(input.as_bytes())
            .map_err(|_| LedgerError::InvalidCursor("invalid audit cursor".to_string()))?;
        serde_json::from_slice::<Self>(&bytes)
            .map_err(|_| LedgerError::InvalidCursor("invalid audit cursor".to_string()))
    }
}

impl Ledger {
    /// Appends one audit entry in the caller's transaction.
    #[allow(clippy::too_many_arguments)]
    pub(super) async fn record_audit(
        &self,
        db_tx: &DatabaseTransaction,
        actor: &str,
        action: AuditAction,
        entity_type: &str,
        entity_id: &str,
        old_values: Option<serde_json::Value>,
        new_values: Option<serde_json::Value>,
    ) -> ResultLedger<()> {
        let entry = AuditEntry {
            id: Uuid::new_v4(),
            actor: actor.to_string(),
            action,
            entity_type: entity_type.to_string(),
            entity_id: entity_id.to_string(),
            old_values,
            new_values,
            outcome: AuditOutcome::Ok,
            recorded_at: Utc::now(),
        };
        audit::ActiveModel::from(&entry).insert(db_tx).await?;
        Ok(())
    }

    /// Records a denied attempt when `result` failed on the permission
    /// guard.
    ///
    /// Runs in its own transaction after the rejected operation rolled back.
    /// Best effort: a failure to persist the denial is logged and never masks
    /// the denial itself.
    pub(super) async fn note_denial<T>(
        &self,
        result: &ResultLedger<T>,
        actor: &str,
        action: AuditAction,
        entity_type: &str,
        entity_id: &str,
    ) {
        let Err(LedgerError::InsufficientPermission(reason)) = result else {
            return;
        };

        let entry = AuditEntry {
            id: Uuid::new_v4(),
            actor: actor.to_string(),
            action,
            entity_type: entity_type.to_string(),
            entity_id: entity_id.to_string(),
            old_values: None,
            new_values: Some(serde_json::json!({ "reason": reason })),
            outcome: AuditOutcome::Denied,
            recorded_at: Utc::now(),
        };
        if let Err(err) = audit::ActiveModel::from(&entry).insert(&self.database).await {
            tracing::warn!(actor, entity_id, "failed to record denial: {err}");
        }
    }

    /// Lists audit entries, newest first, with cursor-based pagination.
    ///
    /// Administrator-only read path; pagination is by
    /// `(recorded_at DESC, id DESC)`.
    pub async fn list_audit_entries(
        &self,
        filter: &AuditListFilter,
        user_id: &str,
        limit: u64,
        cursor: Option<&str>,
    ) -> ResultLedger<(Vec<AuditEntry>, Option<String>)> {
        with_tx!(self, |db_tx| {
            if !self.is_admin(&db_tx, user_id).await? {
                return Err(LedgerError::InsufficientPermission(
                    "audit log is administrator-only".to_string(),
                ));
            }
            validate_list_filter(filter)?;

            let limit_plus_one = limit.saturating_add(1);
            let mut query = audit::Entity::find()
                .order_by_desc(audit::Column::RecordedAt)
                .order_by_desc(audit::Column::Id)
                .limit(limit_plus_one);

            if let Some(actor) = &filter.actor {
                query = query.filter(audit::Column::Actor.eq(actor.clone()));
            }
            if let Some(entity_type) = &filter.entity_type {
                query = query.filter(audit::Column::EntityType.eq(entity_type.clone()));
            }
            if let Some(entity_id) = &filter.entity_id {
                query = query.filter(audit::Column::EntityId.eq(entity_id.clone()));
            }
            if let Some(action) = filter.action {
                query = query.filter(audit::Column::Action.eq(action.as_str()));
            }
            if let Some(from) = filter.from {
                query = query.filter(audit::Column::RecordedAt.gte(from));
            }
            if let Some(to) = filter.to {
                query = query.filter(audit::Column::RecordedAt.lt(to));
            }

            if let Some(cursor) = cursor {
                let cursor = AuditCursor::decode(cursor)?;
                query = query.filter(
                    Condition::any()
                        .add(audit::Column::RecordedAt.lt(cursor.recorded_at))
                        .add(
                            Condition::all()
                                .add(audit::Column::RecordedAt.eq(cursor.recorded_at))
                                .add(audit::Column::Id.lt(cursor.entry_id)),
                        ),
                );
            }

            let rows: Vec<audit::Model> = query.all(&db_tx).await?;
            let has_more = rows.len() > limit as usize;

            let mut out = Vec::with_capacity(rows.len().min(limit as usize));
            for model in rows.into_iter().take(limit as usize) {
                out.push(AuditEntry::try_from(model)?);
            }

            let next_cursor = if has_more {
                out.last()
                    .map(|entry| {
                        AuditCursor {
                            recorded_at: entry.recorded_at,
                            entry_id: entry.id.to_string(),
                        }
                        .encode()
                    })
                    .transpose()?
            } else {
                None
            };

            Ok((out, next_cursor))
        })
    }
}
