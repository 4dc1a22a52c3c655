use chrono::{DateTime, Utc};
use diesel::prelude::*;
use uuid::Uuid;

use crate::schema::subscriptions;

#[derive(Debug, Clone, Identifiable, Selectable, Queryable)]
#[diesel(table_name = subscriptions)]
pub struct SubscriptionEntity {
    pub id: Uuid,
    pub user_id: Uuid,
    pub plan_id: Uuid,
    pub status: String,
    pub current_period_start: DateTime<Utc>,
    pub current_period_end: Option<DateTime<Utc>>,
    pub is_current: bool,
    pub is_active: bool,
    pub ended_at: Option<DateTime<Utc>>,
    pub stripe_customer_ref: Option<String>,
    pub stripe_subscription_ref: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl SubscriptionEntity {
    /// A row is expirable only when it carries a period end that has passed.
    /// Free rows have no period end and therefore never expire by time.
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        matches!(self.current_period_end, Some(end) if end <= now)
    }
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = subscriptions)]
pub struct InsertSubscriptionEntity {
    pub user_id: Uuid,
    pub plan_id: Uuid,
    pub status: String,
    pub current_period_start: DateTime<Utc>,
    pub current_period_end: Option<DateTime<Utc>>,
    pub is_current: bool,
    pub is_active: bool,
    pub stripe_customer_ref: Option<String>,
    pub stripe_subscription_ref: Option<String>,
}
