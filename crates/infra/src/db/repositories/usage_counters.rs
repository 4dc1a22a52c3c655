use anyhow::Result;
use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use diesel::{RunQueryDsl, insert_into, prelude::*, update};
use std::sync::Arc;
use uuid::Uuid;

use crate::db::postgres::postgres_connection::PgPoolSquad;
use domain::{
    entities::usage_counters::{InsertUsageCounterEntity, UsageCounterEntity},
    repositories::usage_counters::UsageCounterRepository,
    schema::usage_counters,
};

pub struct UsageCounterPostgres {
    db_pool: Arc<PgPoolSquad>,
}

impl UsageCounterPostgres {
    pub fn new(db_pool: Arc<PgPoolSquad>) -> Self {
        Self { db_pool }
    }
}

#[async_trait]
impl UsageCounterRepository for UsageCounterPostgres {
    async fn find_for_day(
        &self,
        user_id: Uuid,
        date_key: NaiveDate,
    ) -> Result<Option<UsageCounterEntity>> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        let result = usage_counters::table
            .filter(usage_counters::user_id.eq(user_id))
            .filter(usage_counters::date_key.eq(date_key))
            .select(UsageCounterEntity::as_select())
            .first::<UsageCounterEntity>(&mut conn)
            .optional()?;

        Ok(result)
    }

    async fn try_increment(
        &self,
        user_id: Uuid,
        date_key: NaiveDate,
        limit: i32,
    ) -> Result<Option<UsageCounterEntity>> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        // Single conditional UPDATE; the `used < limit` guard makes the
        // increment and the quota check one atomic statement.
        let result = update(usage_counters::table)
            .filter(usage_counters::user_id.eq(user_id))
            .filter(usage_counters::date_key.eq(date_key))
            .filter(usage_counters::used.lt(limit))
            .set((
                usage_counters::used.eq(usage_counters::used + 1),
                usage_counters::updated_at.eq(Utc::now()),
            ))
            .returning(UsageCounterEntity::as_returning())
            .get_result::<UsageCounterEntity>(&mut conn)
            .optional()?;

        Ok(result)
    }

    async fn insert_first(
        &self,
        user_id: Uuid,
        date_key: NaiveDate,
        plan_code: &str,
    ) -> Result<Option<UsageCounterEntity>> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        // ON CONFLICT DO NOTHING on the (user_id, date_key) unique index;
        // the loser of a first-scan race gets None and retries the
        // increment path instead of creating a second row.
        let result = insert_into(usage_counters::table)
            .values(&InsertUsageCounterEntity {
                user_id,
                date_key,
                used: 1,
                plan_code_snapshot: plan_code.to_string(),
            })
            .on_conflict((usage_counters::user_id, usage_counters::date_key))
            .do_nothing()
            .returning(UsageCounterEntity::as_returning())
            .get_result::<UsageCounterEntity>(&mut conn)
            .optional()?;

        Ok(result)
    }
}
