//! Fixed-size worker pool with per-class concurrency caps (spec §4.3
//! "Scheduling model"). Fast requests never reach this module — only
//! callers that want a tracked, resumable `Operation` submit a `Job`
//! here.

use crate::audit::{kind as audit_kind, AuditSink};
use crate::config::PerClassMax;
use crate::db::entities::operation::{self, OperationState};
use crate::domain::operation::OperationClass;
use crate::error::{Error, Result};
use crate::jobs::bus::ProgressBus;
use crate::jobs::handle::OperationHandle;
use crate::jobs::traits::Job;
use crate::principal::Principal;
use backoff::{future::retry, ExponentialBackoff};
use chrono::Utc;
use sea_orm::{ActiveModelTrait, ActiveValue::Set, DatabaseConnection, EntityTrait};
use serde_json::json;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::Semaphore;
use tracing::{error, info, warn};
use uuid::Uuid;

/// Number of attempts for a `Transient`-classified failure before the
/// scheduler gives up and fails the operation (spec §4.3 "Failure
/// classes": "retried up to N attempts with backoff").
const MAX_TRANSIENT_RETRIES: u32 = 3;

struct LiveOp {
    cancelled: Arc<AtomicBool>,
}

pub struct Scheduler {
    db: DatabaseConnection,
    bus: Arc<ProgressBus>,
    audit: AuditSink,
    pool: Arc<Semaphore>,
    class_caps: HashMap<OperationClass, Arc<Semaphore>>,
    live: Mutex<HashMap<Uuid, LiveOp>>,
}

impl Scheduler {
    pub fn new(db: DatabaseConnection, bus: Arc<ProgressBus>, audit: AuditSink, pool_size: usize, per_class_max: PerClassMax) -> Self {
        let mut class_caps = HashMap::new();
        class_caps.insert(OperationClass::Indexing, Arc::new(Semaphore::new(per_class_max.indexing)));
        class_caps.insert(OperationClass::Pretranslation, Arc::new(Semaphore::new(per_class_max.pretranslation)));
        class_caps.insert(OperationClass::Upload, Arc::new(Semaphore::new(per_class_max.upload)));
        class_caps.insert(OperationClass::BulkEdit, Arc::new(Semaphore::new(per_class_max.pretranslation)));
        Self {
            db,
            bus,
            audit,
            pool: Arc::new(Semaphore::new(pool_size)),
            class_caps,
            live: Mutex::new(HashMap::new()),
        }
    }

    pub fn bus(&self) -> Arc<ProgressBus> {
        self.bus.clone()
    }

    /// Registers a new Operation row in `pending` and spawns the
    /// worker task. Returns immediately with `op_id`; the caller
    /// subscribes to the bus (or polls `get`) to observe progress.
    pub async fn submit(&self, principal: &Principal, job: Arc<dyn Job>) -> Result<Uuid> {
        let op_id = Uuid::new_v4();
        let class = job.class();
        let now = Utc::now();

        operation::ActiveModel {
            op_id: Set(op_id),
            user_id: Set(principal.principal_id),
            tool: Set("ldm_core".to_string()),
            function: Set(format!("{class:?}")),
            display_name: Set(job.display_name()),
            state: Set(OperationState::Pending),
            progress: Set(0),
            step_text: Set(None),
            started_at: Set(now),
            completed_at: Set(None),
            file_info: Set(None),
            error: Set(None),
            result: Set(None),
            last_seq: Set(0),
        }
        .insert(&self.db)
        .await?;

        let cancelled = Arc::new(AtomicBool::new(false));
        self.live.lock().unwrap().insert(op_id, LiveOp { cancelled: cancelled.clone() });

        let db = self.db.clone();
        let bus = self.bus.clone();
        let audit = self.audit.clone();
        let pool = self.pool.clone();
        let class_cap = self
            .class_caps
            .get(&class)
            .cloned()
            .unwrap_or_else(|| Arc::new(Semaphore::new(1)));
        let user_id = principal.principal_id;
        let timeout = class.default_timeout();

        tokio::spawn(async move {
            let _pool_permit = pool.acquire_owned().await;
            let _class_permit = class_cap.acquire_owned().await;

            let handle = Arc::new(OperationHandle::new(op_id, user_id, db.clone(), bus.clone(), cancelled.clone()));
            if let Err(e) = handle.update(0, Some("starting".to_string()), None).await {
                warn!(%op_id, error = %e, "failed to publish initial progress update");
            }

            let run_result = tokio::time::timeout(timeout, run_with_retry(job, handle.clone())).await;

            match run_result {
                Ok(Ok(value)) => {
                    let _ = handle.complete(value).await;
                    info!(%op_id, "operation completed");
                }
                Ok(Err(e)) if matches!(e, Error::Cancelled) => {
                    let _ = handle.mark_cancelled().await;
                    audit.record(audit_kind::OPERATION_CANCELLED, None, None, json!({ "op_id": op_id })).await;
                }
                Ok(Err(e)) => {
                    error!(%op_id, error = %e, "operation failed");
                    let _ = handle.fail(json!({ "kind": e.kind(), "message": e.to_string() })).await;
                    if matches!(e, Error::Internal(_)) {
                        audit.record("operation_failed_internal", None, None, json!({ "op_id": op_id, "message": e.to_string() })).await;
                    }
                }
                Err(_elapsed) => {
                    warn!(%op_id, "operation timed out");
                    let _ = handle.fail(json!({ "kind": "timeout", "message": "operation exceeded its class timeout" })).await;
                }
            }
        });

        Ok(op_id)
    }

    pub async fn cancel(&self, op_id: Uuid) -> Result<()> {
        let found = {
            let live = self.live.lock().unwrap();
            live.get(&op_id).map(|op| op.cancelled.clone())
        };
        match found {
            Some(flag) => {
                flag.store(true, Ordering::SeqCst);
                Ok(())
            }
            None => Err(Error::not_found(format!("operation {op_id}"))),
        }
    }

    pub async fn get(&self, op_id: Uuid) -> Result<operation::Model> {
        operation::Entity::find_by_id(op_id)
            .one(&self.db)
            .await?
            .ok_or_else(|| Error::not_found(format!("operation {op_id}")))
    }

    pub async fn list_for_user(&self, user_id: Uuid) -> Result<Vec<operation::Model>> {
        crate::repository::engine::list_operations_for_user(&self.db, user_id).await
    }

    /// Sweeps completed ops past retention (spec §4.3 "Retention for
    /// completed ops is 7 days"), dropping both the DB row and any
    /// in-memory bus history.
    pub async fn sweep_expired(&self, retention_days: i64) -> Result<usize> {
        use sea_orm::{ColumnTrait, QueryFilter};
        let cutoff = Utc::now() - chrono::Duration::days(retention_days);
        let expired = operation::Entity::find()
            .filter(operation::Column::CompletedAt.lt(cutoff))
            .all(&self.db)
            .await?;
        let count = expired.len();
        for op in expired {
            self.bus.forget(op.op_id);
            self.live.lock().unwrap().remove(&op.op_id);
            operation::Entity::delete_by_id(op.op_id).exec(&self.db).await?;
        }
        Ok(count)
    }
}

/// Retries a `Transient`-failing job with exponential backoff (spec
/// §4.3 "Failure classes"); deterministic and fatal errors propagate
/// immediately without retry.
async fn run_with_retry(job: Arc<dyn Job>, handle: Arc<OperationHandle>) -> Result<serde_json::Value> {
    let mut attempt = 0u32;
    let backoff_config = ExponentialBackoff::default();
    retry(backoff_config, || {
        let job = job.clone();
        let handle = handle.clone();
        attempt += 1;
        let this_attempt = attempt;
        async move {
            if handle.is_cancelled() {
                return Err(backoff::Error::permanent(Error::Cancelled));
            }
            match job.run(handle).await {
                Ok(v) => Ok(v),
                Err(e) if e.is_retryable() && this_attempt < MAX_TRANSIENT_RETRIES => Err(backoff::Error::transient(e)),
                Err(e) => Err(backoff::Error::permanent(e)),
            }
        }
    })
    .await
}
