//! SyncSubscription entity — content a user wants mirrored locally
//! (spec §3, §4.4).

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(16))")]
#[serde(rename_all = "snake_case")]
pub enum SubscriptionItemType {
    #[sea_orm(string_value = "platform")]
    Platform,
    #[sea_orm(string_value = "project")]
    Project,
    #[sea_orm(string_value = "file")]
    File,
    #[sea_orm(string_value = "tm")]
    Tm,
}

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "sync_subscriptions")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub user_id: Uuid,
    pub item_type: SubscriptionItemType,
    pub item_id: Uuid,
    pub subscribed_at: DateTimeUtc,
    pub last_synced_at: Option<DateTimeUtc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
