use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::entities::plans::PlanEntity;
use crate::value_objects::enums::{billing_types::BillingType, plan_intervals::PlanInterval};

/// Well-known plan codes. Seeded at startup; referenced by code so that
/// historical subscription rows survive plan retirement.
pub const FREE_PLAN_CODE: &str = "FREE_PLAN";
pub const TRIAL_PLAN_CODE: &str = "TRIAL_7_DAYS";
pub const UNLIMITED_PLAN_CODE: &str = "UNLIMITED_INTERNAL";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PlanDto {
    pub id: Uuid,
    pub code: String,
    pub name: String,
    pub billing_type: BillingType,
    pub billing_interval: PlanInterval,
    pub scans_per_day: i32,
    pub trial_days: i32,
    pub price_minor: i32,
    pub is_active: bool,
}

impl From<PlanEntity> for PlanDto {
    fn from(entity: PlanEntity) -> Self {
        Self {
            id: entity.id,
            code: entity.code,
            name: entity.name,
            billing_type: BillingType::from_str(&entity.billing_type)
                .unwrap_or(BillingType::Free),
            billing_interval: PlanInterval::from_str(&entity.billing_interval)
                .unwrap_or_default(),
            scans_per_day: entity.scans_per_day,
            trial_days: entity.trial_days,
            price_minor: entity.price_minor,
            is_active: entity.is_active,
        }
    }
}
