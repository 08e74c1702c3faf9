//! The unit of work the scheduler runs (spec §4.3). Each concrete job
//! (pre-translation, indexing, upload, bulk edit) implements this and
//! is handed an `OperationHandle` to report through.

use crate::domain::operation::OperationClass;
use crate::error::Result;
use crate::jobs::handle::OperationHandle;
use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;

#[async_trait]
pub trait Job: Send + Sync {
    fn class(&self) -> OperationClass;

    fn display_name(&self) -> String;

    /// Runs to completion or returns an error; the scheduler maps the
    /// error's kind to a terminal state and publishes it. Must honor
    /// `handle.is_cancelled()` at its own suspension points (spec §5:
    /// "never suspend inside a repository transaction").
    async fn run(&self, handle: Arc<OperationHandle>) -> Result<Value>;
}
