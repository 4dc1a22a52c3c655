pub mod expire_due_subscriptions;
