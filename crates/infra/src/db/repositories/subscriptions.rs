use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use diesel::{Connection, PgConnection, RunQueryDsl, insert_into, prelude::*, update};
use std::sync::Arc;
use uuid::Uuid;

use crate::db::postgres::postgres_connection::PgPoolSquad;
use domain::{
    entities::subscriptions::{InsertSubscriptionEntity, SubscriptionEntity},
    repositories::subscriptions::SubscriptionRepository,
    schema::subscriptions,
    value_objects::{
        enums::subscription_statuses::SubscriptionStatus,
        subscriptions::CheckoutUpsert,
    },
};

pub struct SubscriptionPostgres {
    db_pool: Arc<PgPoolSquad>,
}

impl SubscriptionPostgres {
    pub fn new(db_pool: Arc<PgPoolSquad>) -> Self {
        Self { db_pool }
    }

    /// Every clear-then-set of the `is_current` flag goes through here so
    /// the two writes always share one transaction.
    fn clear_current_flags(conn: &mut PgConnection, user_id: Uuid) -> QueryResult<usize> {
        update(subscriptions::table)
            .filter(subscriptions::user_id.eq(user_id))
            .filter(subscriptions::is_current.eq(true))
            .set(subscriptions::is_current.eq(false))
            .execute(conn)
    }

    fn set_current_flag(conn: &mut PgConnection, subscription_id: Uuid) -> QueryResult<usize> {
        update(subscriptions::table)
            .filter(subscriptions::id.eq(subscription_id))
            .set(subscriptions::is_current.eq(true))
            .execute(conn)
    }
}

#[async_trait]
impl SubscriptionRepository for SubscriptionPostgres {
    async fn find_current(&self, user_id: Uuid) -> Result<Option<SubscriptionEntity>> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        let result = subscriptions::table
            .filter(subscriptions::user_id.eq(user_id))
            .filter(subscriptions::is_current.eq(true))
            .order(subscriptions::created_at.desc())
            .select(SubscriptionEntity::as_select())
            .first::<SubscriptionEntity>(&mut conn)
            .optional()?;

        Ok(result)
    }

    async fn find_latest(&self, user_id: Uuid) -> Result<Option<SubscriptionEntity>> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        let result = subscriptions::table
            .filter(subscriptions::user_id.eq(user_id))
            .order(subscriptions::created_at.desc())
            .select(SubscriptionEntity::as_select())
            .first::<SubscriptionEntity>(&mut conn)
            .optional()?;

        Ok(result)
    }

    async fn mark_current(&self, user_id: Uuid, subscription_id: Uuid) -> Result<()> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        conn.transaction::<_, anyhow::Error, _>(|conn| {
            Self::clear_current_flags(conn, user_id)?;
            Self::set_current_flag(conn, subscription_id)?;
            Ok(())
        })?;

        Ok(())
    }

    async fn expire(&self, subscription_id: Uuid, ended_at: DateTime<Utc>) -> Result<()> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        update(subscriptions::table)
            .filter(subscriptions::id.eq(subscription_id))
            .set((
                subscriptions::is_active.eq(false),
                subscriptions::is_current.eq(false),
                subscriptions::ended_at.eq(Some(ended_at)),
            ))
            .execute(&mut conn)?;

        Ok(())
    }

    async fn make_current_free(
        &self,
        user_id: Uuid,
        free_plan_id: Uuid,
    ) -> Result<SubscriptionEntity> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        let result = conn.transaction::<SubscriptionEntity, anyhow::Error, _>(|conn| {
            Self::clear_current_flags(conn, user_id)?;

            let existing_free = subscriptions::table
                .filter(subscriptions::user_id.eq(user_id))
                .filter(subscriptions::is_active.eq(true))
                .filter(subscriptions::status.eq(SubscriptionStatus::Free.to_string()))
                .order(subscriptions::created_at.desc())
                .select(SubscriptionEntity::as_select())
                .first::<SubscriptionEntity>(conn)
                .optional()?;

            if let Some(free) = existing_free {
                let reused = update(subscriptions::table)
                    .filter(subscriptions::id.eq(free.id))
                    .set(subscriptions::is_current.eq(true))
                    .returning(SubscriptionEntity::as_returning())
                    .get_result::<SubscriptionEntity>(conn)?;
                return Ok(reused);
            }

            let inserted = insert_into(subscriptions::table)
                .values(&InsertSubscriptionEntity {
                    user_id,
                    plan_id: free_plan_id,
                    status: SubscriptionStatus::Free.to_string(),
                    current_period_start: Utc::now(),
                    current_period_end: None,
                    is_current: true,
                    is_active: true,
                    stripe_customer_ref: None,
                    stripe_subscription_ref: None,
                })
                .returning(SubscriptionEntity::as_returning())
                .get_result::<SubscriptionEntity>(conn)?;

            Ok(inserted)
        })?;

        Ok(result)
    }

    async fn insert_current(
        &self,
        subscription: InsertSubscriptionEntity,
    ) -> Result<SubscriptionEntity> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        let result = conn.transaction::<SubscriptionEntity, anyhow::Error, _>(|conn| {
            Self::clear_current_flags(conn, subscription.user_id)?;

            let inserted = insert_into(subscriptions::table)
                .values(&subscription)
                .returning(SubscriptionEntity::as_returning())
                .get_result::<SubscriptionEntity>(conn)?;

            Ok(inserted)
        })?;

        Ok(result)
    }

    async fn assign_override_plan(
        &self,
        user_id: Uuid,
        plan_id: Uuid,
    ) -> Result<SubscriptionEntity> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        let result = conn.transaction::<SubscriptionEntity, anyhow::Error, _>(|conn| {
            let current = subscriptions::table
                .filter(subscriptions::user_id.eq(user_id))
                .filter(subscriptions::is_current.eq(true))
                .select(SubscriptionEntity::as_select())
                .first::<SubscriptionEntity>(conn)
                .optional()?;

            if let Some(current) = current {
                if current.plan_id == plan_id && current.is_active {
                    return Ok(current);
                }
            }

            Self::clear_current_flags(conn, user_id)?;

            // Prior rows are kept for history; reuse a matching one if present.
            let existing = subscriptions::table
                .filter(subscriptions::user_id.eq(user_id))
                .filter(subscriptions::plan_id.eq(plan_id))
                .filter(subscriptions::is_active.eq(true))
                .order(subscriptions::created_at.desc())
                .select(SubscriptionEntity::as_select())
                .first::<SubscriptionEntity>(conn)
                .optional()?;

            if let Some(existing) = existing {
                let reused = update(subscriptions::table)
                    .filter(subscriptions::id.eq(existing.id))
                    .set(subscriptions::is_current.eq(true))
                    .returning(SubscriptionEntity::as_returning())
                    .get_result::<SubscriptionEntity>(conn)?;
                return Ok(reused);
            }

            let inserted = insert_into(subscriptions::table)
                .values(&InsertSubscriptionEntity {
                    user_id,
                    plan_id,
                    status: SubscriptionStatus::Active.to_string(),
                    current_period_start: Utc::now(),
                    current_period_end: None,
                    is_current: true,
                    is_active: true,
                    stripe_customer_ref: None,
                    stripe_subscription_ref: None,
                })
                .returning(SubscriptionEntity::as_returning())
                .get_result::<SubscriptionEntity>(conn)?;

            Ok(inserted)
        })?;

        Ok(result)
    }

    async fn upsert_from_checkout(&self, upsert: CheckoutUpsert) -> Result<SubscriptionEntity> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        let result = conn.transaction::<SubscriptionEntity, anyhow::Error, _>(|conn| {
            Self::clear_current_flags(conn, upsert.user_id)?;

            let existing = subscriptions::table
                .filter(subscriptions::user_id.eq(upsert.user_id))
                .filter(
                    subscriptions::stripe_subscription_ref
                        .eq(upsert.stripe_subscription_ref.as_str()),
                )
                .select(SubscriptionEntity::as_select())
                .first::<SubscriptionEntity>(conn)
                .optional()?;

            if let Some(existing) = existing {
                let updated = update(subscriptions::table)
                    .filter(subscriptions::id.eq(existing.id))
                    .set((
                        subscriptions::status.eq(SubscriptionStatus::Active.to_string()),
                        subscriptions::plan_id.eq(upsert.plan_id),
                        subscriptions::current_period_start.eq(upsert.period_start),
                        subscriptions::current_period_end.eq(Some(upsert.period_end)),
                        subscriptions::is_current.eq(true),
                        subscriptions::is_active.eq(true),
                        subscriptions::ended_at.eq(None::<DateTime<Utc>>),
                        subscriptions::stripe_customer_ref.eq(upsert.stripe_customer_ref.clone()),
                    ))
                    .returning(SubscriptionEntity::as_returning())
                    .get_result::<SubscriptionEntity>(conn)?;
                return Ok(updated);
            }

            let inserted = insert_into(subscriptions::table)
                .values(&InsertSubscriptionEntity {
                    user_id: upsert.user_id,
                    plan_id: upsert.plan_id,
                    status: SubscriptionStatus::Active.to_string(),
                    current_period_start: upsert.period_start,
                    current_period_end: Some(upsert.period_end),
                    is_current: true,
                    is_active: true,
                    stripe_customer_ref: upsert.stripe_customer_ref.clone(),
                    stripe_subscription_ref: Some(upsert.stripe_subscription_ref.clone()),
                })
                .returning(SubscriptionEntity::as_returning())
                .get_result::<SubscriptionEntity>(conn)?;

            Ok(inserted)
        })?;

        Ok(result)
    }

    async fn list_due(
        &self,
        now: DateTime<Utc>,
        limit: Option<i64>,
    ) -> Result<Vec<SubscriptionEntity>> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        let mut query = subscriptions::table
            .filter(subscriptions::is_active.eq(true))
            .filter(subscriptions::current_period_end.is_not_null())
            .filter(subscriptions::current_period_end.le(now))
            .filter(subscriptions::status.eq_any(vec![
                SubscriptionStatus::Trial.to_string(),
                SubscriptionStatus::Active.to_string(),
            ]))
            .order(subscriptions::current_period_end.asc())
            .select(SubscriptionEntity::as_select())
            .into_boxed();

        if let Some(limit) = limit.filter(|l| *l > 0) {
            query = query.limit(limit);
        }

        let results = query.load::<SubscriptionEntity>(&mut conn)?;

        Ok(results)
    }
}
