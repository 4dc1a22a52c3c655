use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use mockall::automock;
use uuid::Uuid;

use crate::entities::subscriptions::{InsertSubscriptionEntity, SubscriptionEntity};
use crate::value_objects::subscriptions::CheckoutUpsert;

/// Persistence seam for subscription rows.
///
/// Every method that both clears a user's `is_current` flags and sets one
/// runs as a single transaction; together with the partial unique index on
/// (`user_id`) where `is_current`, at most one row per user can hold the
/// flag at any instant.
#[automock]
#[async_trait]
pub trait SubscriptionRepository {
    async fn find_current(&self, user_id: Uuid) -> Result<Option<SubscriptionEntity>>;

    /// Newest row by creation time; tolerates historical data that predates
    /// the `is_current` flag.
    async fn find_latest(&self, user_id: Uuid) -> Result<Option<SubscriptionEntity>>;

    /// Re-asserts the flag on one row after clearing the user's others.
    async fn mark_current(&self, user_id: Uuid, subscription_id: Uuid) -> Result<()>;

    /// `is_active = false`, `is_current = false`, `ended_at = ended_at`.
    async fn expire(&self, subscription_id: Uuid, ended_at: DateTime<Utc>) -> Result<()>;

    /// Creates or reuses the user's active free row and makes it current.
    async fn make_current_free(
        &self,
        user_id: Uuid,
        free_plan_id: Uuid,
    ) -> Result<SubscriptionEntity>;

    /// Inserts a new row and claims the `is_current` flag for it.
    async fn insert_current(
        &self,
        subscription: InsertSubscriptionEntity,
    ) -> Result<SubscriptionEntity>;

    /// Find-or-create of a current, non-expiring row on the given plan.
    /// Prior rows keep their history; nothing is deleted.
    async fn assign_override_plan(
        &self,
        user_id: Uuid,
        plan_id: Uuid,
    ) -> Result<SubscriptionEntity>;

    /// Upsert keyed by (`user_id`, `stripe_subscription_ref`); idempotent
    /// under gateway redelivery of the same checkout event.
    async fn upsert_from_checkout(&self, upsert: CheckoutUpsert) -> Result<SubscriptionEntity>;

    /// Sweep candidates: active, period end due, status trial or active.
    async fn list_due(
        &self,
        now: DateTime<Utc>,
        limit: Option<i64>,
    ) -> Result<Vec<SubscriptionEntity>>;
}
