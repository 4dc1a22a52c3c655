pub mod billing_types;
pub mod plan_intervals;
pub mod subscription_statuses;
pub mod user_roles;
