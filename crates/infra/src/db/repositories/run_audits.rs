use anyhow::Result;
use async_trait::async_trait;
use chrono::Utc;
use diesel::{RunQueryDsl, insert_into, prelude::*, update};
use std::sync::Arc;
use uuid::Uuid;

use crate::db::postgres::postgres_connection::PgPoolSquad;
use domain::{
    entities::run_audits::InsertRunAuditEntity,
    repositories::run_audits::RunAuditRepository,
    schema::run_audits,
};

pub struct RunAuditPostgres {
    db_pool: Arc<PgPoolSquad>,
}

impl RunAuditPostgres {
    pub fn new(db_pool: Arc<PgPoolSquad>) -> Self {
        Self { db_pool }
    }
}

#[async_trait]
impl RunAuditRepository for RunAuditPostgres {
    async fn start(&self, job: &str) -> Result<Uuid> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        let result = insert_into(run_audits::table)
            .values(&InsertRunAuditEntity {
                job: job.to_string(),
                started_at: Utc::now(),
            })
            .returning(run_audits::id)
            .get_result::<Uuid>(&mut conn)?;

        Ok(result)
    }

    async fn finish(
        &self,
        audit_id: Uuid,
        ok: bool,
        summary: serde_json::Value,
        error: Option<String>,
    ) -> Result<()> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        update(run_audits::table)
            .filter(run_audits::id.eq(audit_id))
            .set((
                run_audits::ended_at.eq(Some(Utc::now())),
                run_audits::ok.eq(Some(ok)),
                run_audits::summary.eq(Some(summary)),
                run_audits::error.eq(error),
            ))
            .execute(&mut conn)?;

        Ok(())
    }
}
