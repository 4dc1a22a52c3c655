pub mod billing;
pub mod plans;
pub mod scans;
pub mod subscriptions;
