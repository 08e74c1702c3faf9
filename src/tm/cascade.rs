//! The 5-tier cascade lookup (spec §4.2). Each tier is tried in order;
//! the first non-empty answer wins. Tier 3 (fuzzy-character) dispatches
//! to whichever backend-specific similarity facility is wired in —
//! `pg_trgm` on the authoritative backend, an in-process scorer on the
//! local one — both satisfying the same `FuzzyScorer` contract so the
//! cascade itself never branches on backend.

use crate::config::CascadeConfig;
use crate::db::entities::tm_entry;
use crate::domain::tm::{Tier, TmMatch};
use crate::error::Result;
use crate::tm::index::{Embedder, IndexHandle};
use crate::tm::normalize::{fold_case, normalize, source_hash};
use async_trait::async_trait;
use sea_orm::{ColumnTrait, ConnectionTrait, DatabaseConnection, EntityTrait, QueryFilter, Statement};
use std::sync::Arc;
use uuid::Uuid;

/// Backend-specific text-similarity facility used for cascade tier 3
/// (spec §4.2: "similarity... using the backend's text-similarity
/// facility"). Score is in `[0,1]`.
#[async_trait]
pub trait FuzzyScorer: Send + Sync {
    async fn best_match(&self, db: &DatabaseConnection, tm_id: Uuid, normalized_query: &str, threshold: f32) -> Result<Option<(Uuid, f32)>>;
}

/// Uses Postgres's `pg_trgm` `similarity()` function server-side —
/// the authoritative backend's accelerated path.
pub struct PgTrgmScorer;

#[async_trait]
impl FuzzyScorer for PgTrgmScorer {
    async fn best_match(&self, db: &DatabaseConnection, tm_id: Uuid, normalized_query: &str, threshold: f32) -> Result<Option<(Uuid, f32)>> {
        let stmt = Statement::from_sql_and_values(
            sea_orm::DatabaseBackend::Postgres,
            r#"SELECT entry_id, similarity(normalized_source, $1) AS score
               FROM tm_entries
               WHERE tm_id = $2 AND similarity(normalized_source, $1) >= $3
               ORDER BY score DESC
               LIMIT 1"#,
            [normalized_query.into(), tm_id.into(), threshold.into()],
        );
        let row = db.query_one(stmt).await?;
        match row {
            Some(row) => {
                let entry_id: Uuid = row.try_get("", "entry_id").map_err(crate::error::Error::from)?;
                let score: f32 = row.try_get("", "score").map_err(crate::error::Error::from)?;
                Ok(Some((entry_id, score)))
            }
            None => Ok(None),
        }
    }
}

/// In-process Jaro-Winkler scoring over every entry in the TM — the
/// local backend's fallback when no server-side similarity extension
/// is available. O(n) in entry count; acceptable for the embedded,
/// single-user store this backend serves.
pub struct StrsimScorer;

#[async_trait]
impl FuzzyScorer for StrsimScorer {
    async fn best_match(&self, db: &DatabaseConnection, tm_id: Uuid, normalized_query: &str, threshold: f32) -> Result<Option<(Uuid, f32)>> {
        let entries = tm_entry::Entity::find()
            .filter(tm_entry::Column::TmId.eq(tm_id))
            .all(db)
            .await?;
        let best = entries
            .iter()
            .map(|e| (e.entry_id, strsim::jaro_winkler(normalized_query, &e.normalized_source) as f32))
            .filter(|(_, score)| *score >= threshold)
            .max_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(std::cmp::Ordering::Equal));
        Ok(best)
    }
}

/// Everything the cascade needs to run one lookup, bundled so
/// `tm::engine` doesn't have to thread five separate arguments through.
pub struct CascadeContext<'a> {
    pub db: &'a DatabaseConnection,
    pub tm_id: Uuid,
    pub config: &'a CascadeConfig,
    pub fuzzy_scorer: &'a dyn FuzzyScorer,
    pub fast_embedder: Option<&'a Arc<dyn Embedder>>,
    pub fast_index: Option<&'a IndexHandle>,
    pub deep_embedder: Option<&'a Arc<dyn Embedder>>,
    pub deep_index: Option<&'a IndexHandle>,
}

/// Runs the 5-tier cascade against `text`, short-circuiting on the
/// first tier that produces a match (spec §4.2). Returns `None` if no
/// tier matches — lookup failures never surface embedding errors to
/// callers, they just fall through to the next tier or to `None`
/// (spec §4.2 "Failure semantics").
pub async fn lookup(ctx: &CascadeContext<'_>, text: &str) -> Option<TmMatch> {
    let normalized_query = normalize(text);
    let query_hash = source_hash(&normalized_query);

    if let Some(m) = exact(ctx, &query_hash).await {
        return Some(m);
    }
    if let Some(m) = case_insensitive(ctx, &normalized_query).await {
        return Some(m);
    }
    if let Some(m) = fuzzy_char(ctx, &normalized_query).await {
        return Some(m);
    }
    if let Some(m) = semantic_fast(ctx, &normalized_query).await {
        return Some(m);
    }
    if ctx.config.enable_deep {
        if let Some(m) = semantic_deep(ctx, &normalized_query).await {
            return Some(m);
        }
    }
    None
}

async fn exact(ctx: &CascadeContext<'_>, query_hash: &str) -> Option<TmMatch> {
    let entry = tm_entry::Entity::find()
        .filter(tm_entry::Column::TmId.eq(ctx.tm_id))
        .filter(tm_entry::Column::SourceHash.eq(query_hash))
        .one(ctx.db)
        .await
        .ok()??;
    Some(TmMatch {
        entry_id: entry.entry_id,
        source: entry.source,
        target: entry.target,
        score: 1.0,
        tier: Tier::Exact,
    })
}

async fn case_insensitive(ctx: &CascadeContext<'_>, normalized_query: &str) -> Option<TmMatch> {
    let folded_query = fold_case(normalized_query);
    let entries = tm_entry::Entity::find()
        .filter(tm_entry::Column::TmId.eq(ctx.tm_id))
        .all(ctx.db)
        .await
        .ok()?;
    let hit = entries.into_iter().find(|e| fold_case(&e.normalized_source) == folded_query)?;
    Some(TmMatch {
        entry_id: hit.entry_id,
        source: hit.source,
        target: hit.target,
        score: 1.0,
        tier: Tier::CaseInsensitive,
    })
}

async fn fuzzy_char(ctx: &CascadeContext<'_>, normalized_query: &str) -> Option<TmMatch> {
    let (entry_id, score) = ctx
        .fuzzy_scorer
        .best_match(ctx.db, ctx.tm_id, normalized_query, ctx.config.threshold_fuzzy)
        .await
        .ok()??;
    let entry = tm_entry::Entity::find_by_id(entry_id).one(ctx.db).await.ok()??;
    Some(TmMatch {
        entry_id: entry.entry_id,
        source: entry.source,
        target: entry.target,
        score,
        tier: Tier::FuzzyChar,
    })
}

async fn semantic_fast(ctx: &CascadeContext<'_>, normalized_query: &str) -> Option<TmMatch> {
    semantic(ctx, normalized_query, ctx.fast_embedder, ctx.fast_index, ctx.config.threshold_semantic, Tier::SemanticFast).await
}

async fn semantic_deep(ctx: &CascadeContext<'_>, normalized_query: &str) -> Option<TmMatch> {
    semantic(ctx, normalized_query, ctx.deep_embedder, ctx.deep_index, ctx.config.threshold_semantic, Tier::SemanticDeep).await
}

async fn semantic(
    ctx: &CascadeContext<'_>,
    normalized_query: &str,
    embedder: Option<&Arc<dyn Embedder>>,
    index: Option<&IndexHandle>,
    threshold: f32,
    tier: Tier,
) -> Option<TmMatch> {
    let embedder = embedder?;
    let index = index?;
    let query_vec = embedder.embed(normalized_query).await.ok()?;
    let current = index.current().await;
    let (entry_id, score) = current.nearest(&query_vec)?;
    if score < threshold {
        return None;
    }
    let entry = tm_entry::Entity::find_by_id(entry_id).one(ctx.db).await.ok()??;
    Some(TmMatch {
        entry_id: entry.entry_id,
        source: entry.source,
        target: entry.target,
        score,
        tier,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::Database;
    use sea_orm::ActiveValue::Set;
    use sea_orm::ActiveModelTrait;

    async fn seeded_db_with_entry(source: &str, target: &str) -> (Database, tempfile::TempDir, Uuid, Uuid) {
        let dir = tempfile::tempdir().unwrap();
        let db = Database::open_sqlite(&dir.path().join("tm.db")).await.unwrap();
        db.migrate().await.unwrap();

        let tm_id = Uuid::new_v4();
        crate::db::entities::tm::ActiveModel {
            id: Set(tm_id),
            name: Set("test-tm".to_string()),
            project_id: Set(None),
            source_lang: Set("ko".to_string()),
            target_lang: Set("en".to_string()),
            description: Set(None),
            entry_count: Set(1),
            is_active: Set(false),
            created_at: Set(chrono::Utc::now()),
        }
        .insert(db.conn())
        .await
        .unwrap();

        let normalized = normalize(source);
        let entry_id = Uuid::new_v4();
        tm_entry::ActiveModel {
            entry_id: Set(entry_id),
            tm_id: Set(tm_id),
            source: Set(source.to_string()),
            target: Set(target.to_string()),
            normalized_source: Set(normalized.clone()),
            source_hash: Set(source_hash(&normalized)),
        }
        .insert(db.conn())
        .await
        .unwrap();

        (db, dir, tm_id, entry_id)
    }

    fn default_config() -> CascadeConfig {
        CascadeConfig { threshold_fuzzy: 0.85, threshold_semantic: 0.75, enable_deep: false }
    }

    /// Spec §8 scenario 3: an exact-normalized match hits tier `Exact`
    /// with score 1.0.
    #[tokio::test]
    async fn exact_tier_matches_identical_source() {
        let (db, _dir, tm_id, entry_id) = seeded_db_with_entry("기습", "Ambush").await;
        let config = default_config();
        let scorer = StrsimScorer;
        let ctx = CascadeContext {
            db: db.conn(),
            tm_id,
            config: &config,
            fuzzy_scorer: &scorer,
            fast_embedder: None,
            fast_index: None,
            deep_embedder: None,
            deep_index: None,
        };

        let m = lookup(&ctx, "기습").await.expect("exact match expected");
        assert_eq!(m.tier, Tier::Exact);
        assert_eq!(m.entry_id, entry_id);
        assert_eq!(m.target, "Ambush");
        assert_eq!(m.score, 1.0);
    }

    /// A near-miss falls through to the fuzzy-character tier via
    /// `StrsimScorer` rather than failing outright.
    #[tokio::test]
    async fn fuzzy_tier_matches_near_miss_via_strsim() {
        let (db, _dir, tm_id, entry_id) = seeded_db_with_entry("기습", "Ambush").await;
        let config = default_config();
        let scorer = StrsimScorer;
        let ctx = CascadeContext {
            db: db.conn(),
            tm_id,
            config: &config,
            fuzzy_scorer: &scorer,
            fast_embedder: None,
            fast_index: None,
            deep_embedder: None,
            deep_index: None,
        };

        let m = lookup(&ctx, "기습!").await.expect("fuzzy match expected");
        assert!(matches!(m.tier, Tier::CaseInsensitive | Tier::FuzzyChar));
        assert_eq!(m.entry_id, entry_id);
    }

    /// Spec §8 scenario 3: unrelated text with deep semantic search
    /// disabled produces no match at all.
    #[tokio::test]
    async fn unrelated_text_with_deep_disabled_yields_no_match() {
        let (db, _dir, tm_id, _entry_id) = seeded_db_with_entry("기습", "Ambush").await;
        let config = default_config();
        let scorer = StrsimScorer;
        let ctx = CascadeContext {
            db: db.conn(),
            tm_id,
            config: &config,
            fuzzy_scorer: &scorer,
            fast_embedder: None,
            fast_index: None,
            deep_embedder: None,
            deep_index: None,
        };

        assert!(lookup(&ctx, "surprise attack in Korean").await.is_none());
    }
}
