//! Subscription bookkeeping (spec §4.4 "Subscriptions"). Subscriptions
//! are user-local state — they record what the *local* store should
//! stay mirrored to, so they live in the local database regardless of
//! which entity they point at in the authoritative store.

use crate::db::entities::sync_subscription::{self, SubscriptionItemType};
use crate::error::{Error, Result};
use chrono::Utc;
use sea_orm::{ActiveModelTrait, ActiveValue::Set, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder};
use uuid::Uuid;

pub async fn subscribe(local_db: &DatabaseConnection, user_id: Uuid, item_type: SubscriptionItemType, item_id: Uuid) -> Result<Uuid> {
    if sync_subscription::Entity::find()
        .filter(sync_subscription::Column::UserId.eq(user_id))
        .filter(sync_subscription::Column::ItemType.eq(item_type))
        .filter(sync_subscription::Column::ItemId.eq(item_id))
        .one(local_db)
        .await?
        .is_some()
    {
        return Err(Error::conflict("already subscribed to this item"));
    }
    let id = Uuid::new_v4();
    sync_subscription::ActiveModel {
        id: Set(id),
        user_id: Set(user_id),
        item_type: Set(item_type),
        item_id: Set(item_id),
        subscribed_at: Set(Utc::now()),
        last_synced_at: Set(None),
    }
    .insert(local_db)
    .await?;
    Ok(id)
}

pub async fn unsubscribe(local_db: &DatabaseConnection, subscription_id: Uuid) -> Result<()> {
    let res = sync_subscription::Entity::delete_by_id(subscription_id).exec(local_db).await?;
    if res.rows_affected == 0 {
        return Err(Error::not_found(format!("subscription {subscription_id}")));
    }
    Ok(())
}

pub async fn list_subscriptions(local_db: &DatabaseConnection, user_id: Uuid) -> Result<Vec<sync_subscription::Model>> {
    Ok(sync_subscription::Entity::find()
        .filter(sync_subscription::Column::UserId.eq(user_id))
        .order_by_desc(sync_subscription::Column::SubscribedAt)
        .all(local_db)
        .await?)
}

pub async fn mark_synced(local_db: &DatabaseConnection, subscription_id: Uuid) -> Result<()> {
    let existing = sync_subscription::Entity::find_by_id(subscription_id)
        .one(local_db)
        .await?
        .ok_or_else(|| Error::not_found(format!("subscription {subscription_id}")))?;
    let mut am: sync_subscription::ActiveModel = existing.into();
    am.last_synced_at = Set(Some(Utc::now()));
    am.update(local_db).await?;
    Ok(())
}
