//! Append-only audit trail for security-relevant events (spec §2, §3
//! AuditEvent). Every call both emits a `tracing` event — so it shows
//! up in ordinary log output immediately — and persists a row, so it
//! survives the process and can be queried later.

use crate::db::entities::audit_event;
use crate::error::Result;
use crate::principal::Principal;
use chrono::Utc;
use sea_orm::{ActiveModelTrait, ActiveValue::Set, DatabaseConnection};
use serde_json::Value;
use tracing::info;
use uuid::Uuid;

/// Event kinds recorded today. Kept as `&'static str` rather than an
/// enum so new kinds can be added at call sites without a central
/// registry growing in lockstep — the audit table is meant to be an
/// open vocabulary, not a closed one.
pub mod kind {
    pub const PRINCIPAL_DENIED: &str = "principal_denied";
    pub const HIERARCHY_MUTATED: &str = "hierarchy_mutated";
    pub const TRASH_RESTORED: &str = "trash_restored";
    pub const TRASH_PURGED: &str = "trash_purged";
    pub const OPERATION_CANCELLED: &str = "operation_cancelled";
    pub const SYNC_PROMOTED: &str = "sync_promoted";
    pub const OFFLINE_STORAGE_EMPTIED: &str = "offline_storage_emptied";
}

#[derive(Clone)]
pub struct AuditSink {
    db: DatabaseConnection,
}

impl AuditSink {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    /// Records one event. Failure to persist is logged but never
    /// propagated — a dropped audit row must not block the mutation it
    /// describes from completing.
    pub async fn record(&self, kind: &str, principal: Option<&Principal>, ip: Option<&str>, detail: Value) {
        let principal_id = principal.map(|p| p.principal_id);
        info!(event = kind, principal = ?principal_id, %detail, "audit event");

        let result = audit_event::ActiveModel {
            id: Set(Uuid::new_v4()),
            ts: Set(Utc::now()),
            kind: Set(kind.to_string()),
            principal: Set(principal_id),
            ip: Set(ip.map(str::to_string)),
            detail: Set(detail),
        }
        .insert(&self.db)
        .await;

        if let Err(e) = result {
            tracing::error!(error = %e, event = kind, "failed to persist audit event");
        }
    }

    /// Convenience wrapper for the common case of recording an event
    /// tied to one principal and no request IP.
    pub async fn record_for(&self, kind: &str, principal: &Principal, detail: Value) {
        self.record(kind, Some(principal), None, detail).await;
    }

    #[cfg(test)]
    pub async fn recent(&self, limit: u64) -> Result<Vec<audit_event::Model>> {
        use sea_orm::{EntityTrait, QueryOrder, QuerySelect};
        Ok(audit_event::Entity::find()
            .order_by_desc(audit_event::Column::Ts)
            .limit(limit)
            .all(&self.db)
            .await?)
    }
}
