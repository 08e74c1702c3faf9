//! TMEntry entity (spec §3). `(tm_id, source_hash)` is unique;
//! duplicate imports upsert the target instead of inserting a row.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "tm_entries")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub entry_id: Uuid,
    pub tm_id: Uuid,
    pub source: String,
    pub target: String,
    pub normalized_source: String,
    /// blake3 hex digest of `normalized_source`.
    pub source_hash: String,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::tm::Entity",
        from = "Column::TmId",
        to = "super::tm::Column::Id"
    )]
    Tm,
}

impl Related<super::tm::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Tm.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
