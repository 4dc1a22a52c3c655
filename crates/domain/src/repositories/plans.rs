use anyhow::Result;
use async_trait::async_trait;
use mockall::automock;
use uuid::Uuid;

use crate::entities::plans::{PlanEntity, UpsertPlanEntity};

#[automock]
#[async_trait]
pub trait PlanRepository {
    async fn find_by_id(&self, plan_id: Uuid) -> Result<PlanEntity>;

    async fn find_by_code(&self, code: &str) -> Result<Option<PlanEntity>>;

    /// Maps a payment-gateway price back to the plan that carries it.
    async fn find_by_stripe_price_id(&self, price_id: &str) -> Result<Option<PlanEntity>>;

    /// Active plans only, cheapest first.
    async fn list_active_plans(&self) -> Result<Vec<PlanEntity>>;

    /// Insert-or-update keyed by `code`; re-running a seed never duplicates.
    async fn upsert_by_code(&self, plan: UpsertPlanEntity) -> Result<Uuid>;
}
