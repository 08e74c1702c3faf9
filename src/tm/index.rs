//! Persistent vector index for the semantic tiers of the cascade
//! (spec §3 TMIndex, §4.2 "Index lifecycle", §5 "read-copy-update").
//!
//! The embedding model itself is an external collaborator (spec §1
//! Non-goals); this module only owns storage, the read-copy-update
//! pointer, and atomic write-then-rename persistence. Callers inject
//! an `Embedder` implementation.

use crate::error::{Error, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

/// Produces embeddings for TM source text. Two tiers of the cascade
/// each hold one: a small low-dimension "fast" model and an optional
/// larger "deep" one (spec §4.2 tier 4/5).
#[async_trait]
pub trait Embedder: Send + Sync {
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;
    fn model_id(&self) -> &str;
    fn dim(&self) -> usize;
}

fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        0.0
    } else {
        (dot / (norm_a * norm_b)).clamp(-1.0, 1.0)
    }
}

/// On-disk and in-memory representation of one TM's vector index for
/// one embedding model. `tm_id == 0`-length vectors/ids is a valid
/// empty index (e.g. right after `create_tm`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VectorIndex {
    pub tm_id: Uuid,
    pub model_id: String,
    pub dim: usize,
    pub vectors: Vec<Vec<f32>>,
    pub ids: Vec<Uuid>,
}

impl VectorIndex {
    pub fn empty(tm_id: Uuid, model_id: &str, dim: usize) -> Self {
        Self {
            tm_id,
            model_id: model_id.to_string(),
            dim,
            vectors: Vec::new(),
            ids: Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    /// Nearest neighbor by cosine similarity. `None` on an empty index.
    pub fn nearest(&self, query: &[f32]) -> Option<(Uuid, f32)> {
        self.vectors
            .iter()
            .zip(&self.ids)
            .map(|(v, id)| (*id, cosine_similarity(v, query)))
            .max_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(std::cmp::Ordering::Equal))
    }

    fn path(dir: &Path, tm_id: Uuid, model_id: &str) -> PathBuf {
        dir.join(format!("{tm_id}.{model_id}.idx"))
    }

    /// Atomic write-then-rename: writes to a `.tmp` sibling and renames
    /// over the final path, so a crash mid-write never corrupts the
    /// previous index (spec §4.2, §5).
    pub fn save(&self, dir: &Path) -> Result<()> {
        std::fs::create_dir_all(dir)?;
        let final_path = Self::path(dir, self.tm_id, &self.model_id);
        let tmp_path = final_path.with_extension("idx.tmp");
        let bytes = bincode::serialize(self).map_err(|e| Error::internal(format!("index serialize error: {e}")))?;
        std::fs::write(&tmp_path, bytes)?;
        std::fs::rename(&tmp_path, &final_path)?;
        Ok(())
    }

    pub fn load(dir: &Path, tm_id: Uuid, model_id: &str) -> Result<Option<Self>> {
        let path = Self::path(dir, tm_id, model_id);
        if !path.exists() {
            return Ok(None);
        }
        let bytes = std::fs::read(path)?;
        let index = bincode::deserialize(&bytes).map_err(|e| Error::internal(format!("index deserialize error: {e}")))?;
        Ok(Some(index))
    }
}

/// Holds the currently-installed index behind a pointer readers can
/// clone out from under a rebuild in progress (spec §5 read-copy-update:
/// "a rebuild writes a new file and flips a pointer").
#[derive(Clone)]
pub struct IndexHandle {
    current: Arc<RwLock<Arc<VectorIndex>>>,
}

impl IndexHandle {
    pub fn new(index: VectorIndex) -> Self {
        Self {
            current: Arc::new(RwLock::new(Arc::new(index))),
        }
    }

    pub async fn current(&self) -> Arc<VectorIndex> {
        self.current.read().await.clone()
    }

    /// Installs a freshly-rebuilt index, persists it, then flips the
    /// pointer. Readers already holding the old `Arc` keep using it
    /// until they next call `current()`.
    pub async fn install(&self, dir: &Path, new_index: VectorIndex) -> Result<()> {
        new_index.save(dir)?;
        let mut guard = self.current.write().await;
        *guard = Arc::new(new_index);
        Ok(())
    }
}
