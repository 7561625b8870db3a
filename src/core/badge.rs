//! Badge awarding - achievements granted when verified hours cross a threshold.

use crate::{
    config::BadgeRule,
    entities::{Badge, badge},
    errors::{Error, Result},
};
use rust_decimal::Decimal;
use sea_orm::{QueryOrder, Set, prelude::*, sea_query::OnConflict};
use std::collections::HashSet;
use tracing::info;

/// Grants every rule whose threshold `total_hours` has reached and that the
/// user does not hold yet. Returns only the newly granted badges.
///
/// Each badge name is granted at most once per user, even if several rules
/// share a name.
pub async fn award_threshold_badges<C>(
    db: &C,
    tenant_id: i64,
    user_id: i64,
    total_hours: Decimal,
    rules: &[BadgeRule],
) -> Result<Vec<badge::Model>>
where
    C: ConnectionTrait,
{
    let mut held: HashSet<String> = Badge::find()
        .filter(badge::Column::TenantId.eq(tenant_id))
        .filter(badge::Column::UserId.eq(user_id))
        .all(db)
        .await?
        .into_iter()
        .map(|b| b.name)
        .collect();

    let mut granted = Vec::new();
    for rule in rules {
        if total_hours < rule.hours || held.contains(&rule.name) {
            continue;
        }

        // A name already granted, by this loop or a concurrent approval, is skipped
        let inserted = Badge::insert(badge::ActiveModel {
            tenant_id: Set(tenant_id),
            user_id: Set(user_id),
            name: Set(rule.name.clone()),
            icon: Set(rule.icon.clone()),
            awarded_at: Set(chrono::Utc::now()),
            ..Default::default()
        })
        .on_conflict(
            OnConflict::columns([
                badge::Column::TenantId,
                badge::Column::UserId,
                badge::Column::Name,
            ])
            .do_nothing()
            .to_owned(),
        )
        .exec_without_returning(db)
        .await?;
        held.insert(rule.name.clone());
        if inserted == 0 {
            continue;
        }

        let awarded = Badge::find()
            .filter(badge::Column::TenantId.eq(tenant_id))
            .filter(badge::Column::UserId.eq(user_id))
            .filter(badge::Column::Name.eq(rule.name.as_str()))
            .one(db)
            .await?
            .ok_or_else(|| Error::Database(DbErr::RecordNotFound(rule.name.clone())))?;

        info!(user_id, badge = %awarded.name, "Badge awarded");
        granted.push(awarded);
    }

    Ok(granted)
}

/// Badges held by a user, oldest first.
pub async fn badges_for_user(
    db: &DatabaseConnection,
    tenant_id: i64,
    user_id: i64,
) -> Result<Vec<badge::Model>> {
    Badge::find()
        .filter(badge::Column::TenantId.eq(tenant_id))
        .filter(badge::Column::UserId.eq(user_id))
        .order_by_asc(badge::Column::AwardedAt)
        .order_by_asc(badge::Column::Id)
        .all(db)
        .await
        .map_err(Into::into)
}
