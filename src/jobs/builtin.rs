//! Concrete `Job` implementations for each `OperationClass` (spec
//! §4.3 "indexing, pre-translation, upload, bulk edit"). Each one is a
//! thin adapter from the scheduler's `Job` contract onto the engine
//! call that does the actual work; the engines themselves know nothing
//! about being scheduled.

use crate::domain::operation::OperationClass;
use crate::domain::NewRow;
use crate::error::Result;
use crate::jobs::handle::OperationHandle;
use crate::jobs::traits::Job;
use crate::repository::Repository;
use crate::tm::engine::TmEngine;
use crate::tm::pretranslate::{self, PretranslateConfig, PretranslateSummary};
use async_trait::async_trait;
use sea_orm::DatabaseConnection;
use serde_json::{json, Value};
use std::sync::Arc;
use uuid::Uuid;

pub struct PretranslationJob {
    pub db: DatabaseConnection,
    pub tm: Arc<TmEngine>,
    pub tm_id: Uuid,
    pub file_id: Uuid,
    pub config: PretranslateConfig,
}

#[async_trait]
impl Job for PretranslationJob {
    fn class(&self) -> OperationClass {
        OperationClass::Pretranslation
    }

    fn display_name(&self) -> String {
        format!("pretranslate file {}", self.file_id)
    }

    async fn run(&self, handle: Arc<OperationHandle>) -> Result<Value> {
        let summary: PretranslateSummary =
            pretranslate::run(&self.db, &self.tm, self.tm_id, self.file_id, &self.config, handle.as_ref()).await?;
        Ok(json!(summary))
    }
}

pub struct IndexRebuildJob {
    pub tm: Arc<TmEngine>,
    pub tm_id: Uuid,
    pub which: crate::tm::IndexTier,
}

#[async_trait]
impl Job for IndexRebuildJob {
    fn class(&self) -> OperationClass {
        OperationClass::Indexing
    }

    fn display_name(&self) -> String {
        format!("rebuild TM index {}", self.tm_id)
    }

    async fn run(&self, handle: Arc<OperationHandle>) -> Result<Value> {
        handle.update(0, Some("rebuilding index".to_string()), None).await?;
        self.tm.rebuild_index(self.tm_id, self.which).await?;
        Ok(json!({ "tm_id": self.tm_id }))
    }
}

/// Wraps `bulk_upsert_rows` so large imports get a tracked Operation
/// instead of blocking the request path (spec §4.3 "upload" /
/// "bulk edit" classes; the size threshold that routes a call here
/// instead of running synchronously is a request-surface decision,
/// see `request::file::upload`).
pub struct BulkEditJob {
    pub repository: Arc<dyn Repository>,
    pub principal: crate::principal::Principal,
    pub file_id: Uuid,
    pub rows: Vec<NewRow>,
}

#[async_trait]
impl Job for BulkEditJob {
    fn class(&self) -> OperationClass {
        OperationClass::BulkEdit
    }

    fn display_name(&self) -> String {
        format!("bulk edit file {} ({} rows)", self.file_id, self.rows.len())
    }

    async fn run(&self, handle: Arc<OperationHandle>) -> Result<Value> {
        let total = self.rows.len();
        handle.update(0, Some(format!("writing {total} rows")), None).await?;
        let written = self.repository.bulk_upsert_rows(&self.principal, self.file_id, self.rows.clone()).await?;
        handle.update(100, Some(format!("wrote {written} rows")), None).await?;
        Ok(json!({ "rows_written": written }))
    }
}
