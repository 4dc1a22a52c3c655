use chrono::{DateTime, NaiveDate, Utc};
use diesel::prelude::*;
use uuid::Uuid;

use crate::schema::usage_counters;

/// One row per (`user_id`, `date_key`); `date_key` is a UTC calendar day.
#[derive(Debug, Clone, Identifiable, Selectable, Queryable)]
#[diesel(table_name = usage_counters)]
pub struct UsageCounterEntity {
    pub id: Uuid,
    pub user_id: Uuid,
    pub date_key: NaiveDate,
    pub used: i32,
    pub plan_code_snapshot: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = usage_counters)]
pub struct InsertUsageCounterEntity {
    pub user_id: Uuid,
    pub date_key: NaiveDate,
    pub used: i32,
    pub plan_code_snapshot: String,
}
