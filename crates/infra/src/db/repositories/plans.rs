use anyhow::Result;
use async_trait::async_trait;
use chrono::Utc;
use diesel::{RunQueryDsl, insert_into, prelude::*};
use std::sync::Arc;
use uuid::Uuid;

use crate::db::postgres::postgres_connection::PgPoolSquad;
use domain::{
    entities::plans::{PlanEntity, UpsertPlanEntity},
    repositories::plans::PlanRepository,
    schema::plans,
};

pub struct PlanPostgres {
    db_pool: Arc<PgPoolSquad>,
}

impl PlanPostgres {
    pub fn new(db_pool: Arc<PgPoolSquad>) -> Self {
        Self { db_pool }
    }
}

#[async_trait]
impl PlanRepository for PlanPostgres {
    async fn find_by_id(&self, plan_id: Uuid) -> Result<PlanEntity> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        let result = plans::table
            .find(plan_id)
            .select(PlanEntity::as_select())
            .first::<PlanEntity>(&mut conn)?;

        Ok(result)
    }

    async fn find_by_code(&self, code: &str) -> Result<Option<PlanEntity>> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        let result = plans::table
            .filter(plans::code.eq(code))
            .select(PlanEntity::as_select())
            .first::<PlanEntity>(&mut conn)
            .optional()?;

        Ok(result)
    }

    async fn find_by_stripe_price_id(&self, price_id: &str) -> Result<Option<PlanEntity>> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        let result = plans::table
            .filter(plans::stripe_price_id.eq(price_id))
            .select(PlanEntity::as_select())
            .first::<PlanEntity>(&mut conn)
            .optional()?;

        Ok(result)
    }

    async fn list_active_plans(&self) -> Result<Vec<PlanEntity>> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        let results = plans::table
            .filter(plans::is_active.eq(true))
            .order(plans::price_minor.asc())
            .select(PlanEntity::as_select())
            .load::<PlanEntity>(&mut conn)?;

        Ok(results)
    }

    async fn upsert_by_code(&self, plan: UpsertPlanEntity) -> Result<Uuid> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        let result = insert_into(plans::table)
            .values(&plan)
            .on_conflict(plans::code)
            .do_update()
            .set((&plan, plans::updated_at.eq(Utc::now())))
            .returning(plans::id)
            .get_result::<Uuid>(&mut conn)?;

        Ok(result)
    }
}
