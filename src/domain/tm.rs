//! TM lookup result types (spec §4.2).

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// One step of the cascade, in the order it is tried.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Tier {
    Exact,
    CaseInsensitive,
    FuzzyChar,
    SemanticFast,
    SemanticDeep,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TmMatch {
    pub entry_id: Uuid,
    pub source: String,
    pub target: String,
    pub score: f32,
    pub tier: Tier,
}
