pub mod identity;
pub mod notifier;
pub mod plans;
pub mod run_audits;
pub mod subscriptions;
pub mod usage_counters;
