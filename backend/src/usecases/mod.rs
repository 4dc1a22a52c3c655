pub mod billing;
pub mod errors;
pub mod plan_catalog;
pub mod subscription_lifecycle;
pub mod usage_meter;
