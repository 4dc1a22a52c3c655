use chrono::{DateTime, Utc};
use diesel::prelude::*;
use uuid::Uuid;

use crate::schema::plans;

#[derive(Debug, Clone, Identifiable, Selectable, Queryable)]
#[diesel(table_name = plans)]
pub struct PlanEntity {
    pub id: Uuid,
    pub code: String,
    pub name: String,
    pub billing_type: String,
    pub billing_interval: String,
    pub scans_per_day: i32,
    pub trial_days: i32,
    pub price_minor: i32,
    pub stripe_price_id: Option<String>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Seed row, upserted by `code` so repeated startups never duplicate plans.
#[derive(Debug, Clone, Insertable, AsChangeset)]
#[diesel(table_name = plans)]
pub struct UpsertPlanEntity {
    pub code: String,
    pub name: String,
    pub billing_type: String,
    pub billing_interval: String,
    pub scans_per_day: i32,
    pub trial_days: i32,
    pub price_minor: i32,
    pub stripe_price_id: Option<String>,
    pub is_active: bool,
}
