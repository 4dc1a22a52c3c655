use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::entities::{plans::PlanEntity, subscriptions::SubscriptionEntity};
use crate::value_objects::{
    enums::subscription_statuses::SubscriptionStatus,
    plans::PlanDto,
};

/// The single row per user that governs entitlement decisions, joined with
/// its plan for the API surface.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CurrentSubscriptionDto {
    pub status: SubscriptionStatus,
    pub plan: PlanDto,
    pub current_period_start: DateTime<Utc>,
    pub current_period_end: Option<DateTime<Utc>>,
    pub is_active: bool,
    pub is_current: bool,
}

impl CurrentSubscriptionDto {
    pub fn from_parts(subscription: &SubscriptionEntity, plan: PlanEntity) -> Self {
        Self {
            status: SubscriptionStatus::from_str(&subscription.status),
            plan: PlanDto::from(plan),
            current_period_start: subscription.current_period_start,
            current_period_end: subscription.current_period_end,
            is_active: subscription.is_active,
            is_current: subscription.is_current,
        }
    }
}

/// Everything the billing reconciler learned from a verified checkout event,
/// keyed by (`user_id`, `stripe_subscription_ref`) for idempotent upserts.
#[derive(Debug, Clone, PartialEq)]
pub struct CheckoutUpsert {
    pub user_id: Uuid,
    pub plan_id: Uuid,
    pub period_start: DateTime<Utc>,
    pub period_end: DateTime<Utc>,
    pub stripe_customer_ref: Option<String>,
    pub stripe_subscription_ref: String,
}
