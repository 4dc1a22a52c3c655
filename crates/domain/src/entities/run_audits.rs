use chrono::{DateTime, Utc};
use diesel::prelude::*;
use uuid::Uuid;

use crate::schema::run_audits;

/// Append-only bookkeeping for background jobs; observability only,
/// never consulted for correctness.
#[derive(Debug, Clone, Identifiable, Selectable, Queryable)]
#[diesel(table_name = run_audits)]
pub struct RunAuditEntity {
    pub id: Uuid,
    pub job: String,
    pub started_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
    pub ok: Option<bool>,
    pub summary: Option<serde_json::Value>,
    pub error: Option<String>,
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = run_audits)]
pub struct InsertRunAuditEntity {
    pub job: String,
    pub started_at: DateTime<Utc>,
}
