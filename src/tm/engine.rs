//! TM lifecycle: creation, streaming idempotent import, activation and
//! search (spec §4.2). Index rebuilds and the cascade itself live in
//! sibling modules; this one owns the entity-level CRUD and the
//! per-session active-TM registry (spec §9 Open Questions: "active TM
//! is per-session").

use crate::config::CascadeConfig;
use crate::db::entities::{tm, tm_entry};
use crate::domain::tm::TmMatch;
use crate::error::{Error, Result};
use crate::tm::cascade::{self, CascadeContext, FuzzyScorer};
use crate::tm::index::{Embedder, IndexHandle, VectorIndex};
use crate::tm::normalize::{normalize, source_hash};
use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ActiveValue::Set, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, TransactionTrait,
};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

/// One (source, target) pair submitted to `import_entries`.
#[derive(Debug, Clone)]
pub struct EntryPair {
    pub source: String,
    pub target: String,
}

/// Per-session active-TM pointer. A plain `RwLock<HashMap>` is enough:
/// contention is one write per `set_active` call against many
/// infrequent reads, and sessions are numbered in the low thousands at
/// most, never enough to justify a sharded map.
#[derive(Default)]
pub struct ActiveTmRegistry {
    active: RwLock<HashMap<Uuid, Uuid>>,
}

impl ActiveTmRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn set(&self, session_id: Uuid, tm_id: Uuid) {
        self.active.write().await.insert(session_id, tm_id);
    }

    pub async fn clear(&self, session_id: Uuid) {
        self.active.write().await.remove(&session_id);
    }

    pub async fn get(&self, session_id: Uuid) -> Option<Uuid> {
        self.active.read().await.get(&session_id).copied()
    }
}

pub struct TmEngine {
    db: DatabaseConnection,
    index_dir: PathBuf,
    active: ActiveTmRegistry,
    fuzzy_scorer: Arc<dyn FuzzyScorer>,
    fast_embedder: Option<Arc<dyn Embedder>>,
    deep_embedder: Option<Arc<dyn Embedder>>,
    fast_indexes: RwLock<HashMap<Uuid, IndexHandle>>,
    deep_indexes: RwLock<HashMap<Uuid, IndexHandle>>,
}

impl TmEngine {
    pub fn new(
        db: DatabaseConnection,
        index_dir: PathBuf,
        fuzzy_scorer: Arc<dyn FuzzyScorer>,
        fast_embedder: Option<Arc<dyn Embedder>>,
        deep_embedder: Option<Arc<dyn Embedder>>,
    ) -> Self {
        Self {
            db,
            index_dir,
            active: ActiveTmRegistry::new(),
            fuzzy_scorer,
            fast_embedder,
            deep_embedder,
            fast_indexes: RwLock::new(HashMap::new()),
            deep_indexes: RwLock::new(HashMap::new()),
        }
    }

    pub fn active_registry(&self) -> &ActiveTmRegistry {
        &self.active
    }

    pub async fn create_tm(
        &self,
        name: &str,
        source_lang: &str,
        target_lang: &str,
        project_id: Option<Uuid>,
        description: Option<&str>,
    ) -> Result<Uuid> {
        if name.trim().is_empty() {
            return Err(Error::invalid("TM name must not be empty"));
        }
        let mut q = tm::Entity::find().filter(tm::Column::Name.eq(name));
        q = match project_id {
            Some(pid) => q.filter(tm::Column::ProjectId.eq(pid)),
            None => q.filter(tm::Column::ProjectId.is_null()),
        };
        if q.one(&self.db).await?.is_some() {
            return Err(Error::conflict(format!("TM '{name}' already exists in this scope")));
        }
        let id = Uuid::new_v4();
        tm::ActiveModel {
            id: Set(id),
            name: Set(name.to_string()),
            project_id: Set(project_id),
            source_lang: Set(source_lang.to_string()),
            target_lang: Set(target_lang.to_string()),
            description: Set(description.map(str::to_string)),
            entry_count: Set(0),
            is_active: Set(false),
            created_at: Set(Utc::now()),
        }
        .insert(&self.db)
        .await?;
        Ok(id)
    }

    pub async fn delete_tm(&self, tm_id: Uuid) -> Result<()> {
        tm_entry::Entity::delete_many()
            .filter(tm_entry::Column::TmId.eq(tm_id))
            .exec(&self.db)
            .await?;
        let res = tm::Entity::delete_by_id(tm_id).exec(&self.db).await?;
        if res.rows_affected == 0 {
            return Err(Error::not_found(format!("TM {tm_id}")));
        }
        self.fast_indexes.write().await.remove(&tm_id);
        self.deep_indexes.write().await.remove(&tm_id);
        Ok(())
    }

    /// Streaming, idempotent import (spec §4.2): each pair is
    /// normalized, hashed, upserted by `(tm_id, source_hash)`, then the
    /// index is rebuilt from the live entry set. On any failure after
    /// entries are committed the previous index file remains usable —
    /// `rebuild_index` only replaces it once the new one is durably
    /// written (write-then-rename in `VectorIndex::save`).
    pub async fn import_entries(&self, tm_id: Uuid, pairs: Vec<EntryPair>) -> Result<usize> {
        tm::Entity::find_by_id(tm_id)
            .one(&self.db)
            .await?
            .ok_or_else(|| Error::not_found(format!("TM {tm_id}")))?;

        let written = self
            .db
            .transaction::<_, usize, Error>(|txn| {
                Box::pin(async move {
                    let mut written = 0usize;
                    for pair in pairs {
                        let normalized_source = normalize(&pair.source);
                        let hash = source_hash(&normalized_source);
                        let existing = tm_entry::Entity::find()
                            .filter(tm_entry::Column::TmId.eq(tm_id))
                            .filter(tm_entry::Column::SourceHash.eq(&hash))
                            .one(txn)
                            .await?;
                        match existing {
                            Some(existing) => {
                                let mut am: tm_entry::ActiveModel = existing.into();
                                am.target = Set(pair.target);
                                am.update(txn).await?;
                            }
                            None => {
                                tm_entry::ActiveModel {
                                    entry_id: Set(Uuid::new_v4()),
                                    tm_id: Set(tm_id),
                                    source: Set(pair.source),
                                    target: Set(pair.target),
                                    normalized_source: Set(normalized_source),
                                    source_hash: Set(hash),
                                }
                                .insert(txn)
                                .await?;
                            }
                        }
                        written += 1;
                    }
                    let distinct = tm_entry::Entity::find()
                        .filter(tm_entry::Column::TmId.eq(tm_id))
                        .all(txn)
                        .await?
                        .len() as i32;
                    let mut tm_am: tm::ActiveModel = tm::Entity::find_by_id(tm_id)
                        .one(txn)
                        .await?
                        .ok_or_else(|| Error::not_found(format!("TM {tm_id}")))?
                        .into();
                    tm_am.entry_count = Set(distinct);
                    tm_am.update(txn).await?;
                    Ok(written)
                })
            })
            .await
            .map_err(|e| match e {
                sea_orm::TransactionError::Connection(db_err) => Error::from(db_err),
                sea_orm::TransactionError::Transaction(err) => err,
            })?;

        if self.fast_embedder.is_some() {
            self.rebuild_index(tm_id, IndexTier::Fast).await?;
        }
        if self.deep_embedder.is_some() {
            self.rebuild_index(tm_id, IndexTier::Deep).await?;
        }
        Ok(written)
    }

    /// Rebuilds and atomically installs the vector index for one tier
    /// (spec §4.2 "Index rebuilding is idempotent and restart-safe").
    pub async fn rebuild_index(&self, tm_id: Uuid, which: IndexTier) -> Result<()> {
        let embedder = match which {
            IndexTier::Fast => self.fast_embedder.clone(),
            IndexTier::Deep => self.deep_embedder.clone(),
        }
        .ok_or_else(|| Error::precondition("no embedder configured for this tier"))?;

        let entries = tm_entry::Entity::find()
            .filter(tm_entry::Column::TmId.eq(tm_id))
            .all(&self.db)
            .await?;

        let mut vectors = Vec::with_capacity(entries.len());
        let mut ids = Vec::with_capacity(entries.len());
        for entry in &entries {
            let vector = embedder.embed(&entry.normalized_source).await?;
            vectors.push(vector);
            ids.push(entry.entry_id);
        }
        let new_index = VectorIndex {
            tm_id,
            model_id: embedder.model_id().to_string(),
            dim: embedder.dim(),
            vectors,
            ids,
        };

        let handles = match which {
            IndexTier::Fast => &self.fast_indexes,
            IndexTier::Deep => &self.deep_indexes,
        };
        let mut guard = handles.write().await;
        match guard.get(&tm_id) {
            Some(handle) => handle.install(&self.index_dir, new_index).await?,
            None => {
                new_index.save(&self.index_dir)?;
                guard.insert(tm_id, IndexHandle::new(new_index));
            }
        }
        Ok(())
    }

    async fn index_handle(&self, tm_id: Uuid, which: IndexTier) -> Option<IndexHandle> {
        let handles = match which {
            IndexTier::Fast => &self.fast_indexes,
            IndexTier::Deep => &self.deep_indexes,
        };
        if let Some(h) = handles.read().await.get(&tm_id) {
            return Some(h.clone());
        }
        let embedder = match which {
            IndexTier::Fast => self.fast_embedder.as_ref(),
            IndexTier::Deep => self.deep_embedder.as_ref(),
        }?;
        let loaded = VectorIndex::load(&self.index_dir, tm_id, embedder.model_id()).ok()??;
        let handle = IndexHandle::new(loaded);
        handles.write().await.insert(tm_id, handle.clone());
        Some(handle)
    }

    /// `set_active(tm_id)` is atomic per spec §4.2: the registry write
    /// is a single map insert, so a concurrent reader never observes a
    /// torn value — either the old TM or the new one, never neither.
    pub async fn set_active(&self, session_id: Uuid, tm_id: Uuid) -> Result<()> {
        tm::Entity::find_by_id(tm_id)
            .one(&self.db)
            .await?
            .ok_or_else(|| Error::not_found(format!("TM {tm_id}")))?;
        self.active.set(session_id, tm_id).await;
        Ok(())
    }

    pub async fn deactivate(&self, session_id: Uuid) {
        self.active.clear(session_id).await;
    }

    /// `search(text, k, min_score)` (spec §4.2): returns up to `k`
    /// candidates above `min_score`, ranked descending, ties broken by
    /// earlier insertion. Unlike the cascade (which stops at the first
    /// matching tier), search gathers candidates across the exact and
    /// fuzzy tiers and ranks them together since the caller wants a
    /// ranked list, not a single pretranslation decision.
    pub async fn search(&self, tm_id: Uuid, text: &str, k: usize, min_score: f32, config: &CascadeConfig) -> Result<Vec<TmMatch>> {
        let normalized_query = normalize(text);
        let mut candidates = Vec::new();

        let exact_hash = source_hash(&normalized_query);
        let exact_matches = tm_entry::Entity::find()
            .filter(tm_entry::Column::TmId.eq(tm_id))
            .filter(tm_entry::Column::SourceHash.eq(&exact_hash))
            .all(&self.db)
            .await?;
        for e in exact_matches {
            candidates.push(TmMatch {
                entry_id: e.entry_id,
                source: e.source,
                target: e.target,
                score: 1.0,
                tier: crate::domain::tm::Tier::Exact,
            });
        }

        if candidates.len() < k {
            if let Ok(Some((entry_id, score))) = self
                .fuzzy_scorer
                .best_match(&self.db, tm_id, &normalized_query, config.threshold_fuzzy)
                .await
            {
                if score >= min_score && !candidates.iter().any(|c| c.entry_id == entry_id) {
                    if let Some(entry) = tm_entry::Entity::find_by_id(entry_id).one(&self.db).await? {
                        candidates.push(TmMatch {
                            entry_id: entry.entry_id,
                            source: entry.source,
                            target: entry.target,
                            score,
                            tier: crate::domain::tm::Tier::FuzzyChar,
                        });
                    }
                }
            }
        }

        candidates.retain(|c| c.score >= min_score);
        candidates.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
        candidates.truncate(k);
        Ok(candidates)
    }

    /// Runs the full 5-tier cascade for pre-translation (spec §4.2).
    pub async fn cascade_lookup(&self, tm_id: Uuid, text: &str, config: &CascadeConfig) -> Option<TmMatch> {
        let fast_index = self.index_handle(tm_id, IndexTier::Fast).await;
        let deep_index = if config.enable_deep {
            self.index_handle(tm_id, IndexTier::Deep).await
        } else {
            None
        };
        let ctx = CascadeContext {
            db: &self.db,
            tm_id,
            config,
            fuzzy_scorer: self.fuzzy_scorer.as_ref(),
            fast_embedder: self.fast_embedder.as_ref(),
            fast_index: fast_index.as_ref(),
            deep_embedder: self.deep_embedder.as_ref(),
            deep_index: deep_index.as_ref(),
        };
        cascade::lookup(&ctx, text).await
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexTier {
    Fast,
    Deep,
}
