use std::sync::Arc;

use domain::{
    entities::plans::UpsertPlanEntity,
    repositories::plans::PlanRepository,
    value_objects::{
        enums::{billing_types::BillingType, plan_intervals::PlanInterval},
        plans::{FREE_PLAN_CODE, PlanDto, TRIAL_PLAN_CODE, UNLIMITED_PLAN_CODE},
    },
};
use tracing::{error, info};

use crate::usecases::errors::{EngineError, UseCaseResult};

pub struct PlanCatalogUseCase<P>
where
    P: PlanRepository + Send + Sync + 'static,
{
    plan_repo: Arc<P>,
}

impl<P> PlanCatalogUseCase<P>
where
    P: PlanRepository + Send + Sync + 'static,
{
    pub fn new(plan_repo: Arc<P>) -> Self {
        Self { plan_repo }
    }

    pub async fn list_plans(&self) -> UseCaseResult<Vec<PlanDto>> {
        let plans = self.plan_repo.list_active_plans().await.map_err(|err| {
            error!(db_error = ?err, "plan_catalog: failed to list active plans");
            EngineError::Internal(err)
        })?;

        info!(plan_count = plans.len(), "plan_catalog: active plans loaded");
        Ok(plans.into_iter().map(PlanDto::from).collect())
    }

    pub async fn get_by_code(&self, code: &str) -> UseCaseResult<PlanDto> {
        let plan = self
            .plan_repo
            .find_by_code(code)
            .await
            .map_err(|err| {
                error!(code, db_error = ?err, "plan_catalog: failed to load plan by code");
                EngineError::Internal(err)
            })?
            .ok_or_else(|| EngineError::NotFound(format!("plan {code}")))?;

        Ok(PlanDto::from(plan))
    }

    /// Upserts the built-in plan set, keyed by code. Safe to run on every
    /// startup; retirement is `is_active = false`, never a delete.
    pub async fn seed_default_plans(&self) -> UseCaseResult<()> {
        for plan in default_plan_seeds() {
            let code = plan.code.clone();
            self.plan_repo.upsert_by_code(plan).await.map_err(|err| {
                error!(code, db_error = ?err, "plan_catalog: failed to seed plan");
                EngineError::Internal(err)
            })?;
        }

        info!("plan_catalog: default plans seeded");
        Ok(())
    }
}

fn default_plan_seeds() -> Vec<UpsertPlanEntity> {
    vec![
        UpsertPlanEntity {
            code: TRIAL_PLAN_CODE.to_string(),
            name: "7-day trial".to_string(),
            billing_type: BillingType::Trial.as_str().to_string(),
            billing_interval: PlanInterval::None.as_str().to_string(),
            scans_per_day: 10,
            trial_days: 7,
            price_minor: 0,
            stripe_price_id: None,
            is_active: true,
        },
        UpsertPlanEntity {
            code: FREE_PLAN_CODE.to_string(),
            name: "Free".to_string(),
            billing_type: BillingType::Free.as_str().to_string(),
            billing_interval: PlanInterval::None.as_str().to_string(),
            scans_per_day: 2,
            trial_days: 0,
            price_minor: 0,
            stripe_price_id: None,
            is_active: true,
        },
        UpsertPlanEntity {
            code: "STANDARD_MONTHLY".to_string(),
            name: "Standard (monthly)".to_string(),
            billing_type: BillingType::Recurring.as_str().to_string(),
            billing_interval: PlanInterval::Month.as_str().to_string(),
            scans_per_day: 25,
            trial_days: 0,
            price_minor: 990,
            stripe_price_id: std::env::var("STRIPE_PRICE_STANDARD_MONTHLY").ok(),
            is_active: true,
        },
        UpsertPlanEntity {
            code: "STANDARD_YEARLY".to_string(),
            name: "Standard (yearly)".to_string(),
            billing_type: BillingType::Recurring.as_str().to_string(),
            billing_interval: PlanInterval::Year.as_str().to_string(),
            scans_per_day: 25,
            trial_days: 0,
            price_minor: 9900,
            stripe_price_id: std::env::var("STRIPE_PRICE_STANDARD_YEARLY").ok(),
            is_active: true,
        },
        UpsertPlanEntity {
            code: UNLIMITED_PLAN_CODE.to_string(),
            name: "Unlimited (internal)".to_string(),
            billing_type: BillingType::Free.as_str().to_string(),
            billing_interval: PlanInterval::None.as_str().to_string(),
            scans_per_day: i32::MAX,
            trial_days: 0,
            price_minor: 0,
            stripe_price_id: None,
            is_active: true,
        },
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::anyhow;
    use chrono::Utc;
    use domain::entities::plans::PlanEntity;
    use domain::repositories::plans::MockPlanRepository;
    use uuid::Uuid;

    fn plan_fixture(code: &str, price_minor: i32) -> PlanEntity {
        PlanEntity {
            id: Uuid::new_v4(),
            code: code.to_string(),
            name: code.to_string(),
            billing_type: "recurring".to_string(),
            billing_interval: "month".to_string(),
            scans_per_day: 25,
            trial_days: 0,
            price_minor,
            stripe_price_id: Some("price_123".to_string()),
            is_active: true,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn list_plans_maps_entities_to_dtos() {
        let mut plan_repo = MockPlanRepository::new();
        plan_repo
            .expect_list_active_plans()
            .returning(|| Ok(vec![plan_fixture("FREE_PLAN", 0), plan_fixture("STANDARD_MONTHLY", 990)]));

        let usecase = PlanCatalogUseCase::new(Arc::new(plan_repo));
        let plans = usecase.list_plans().await.unwrap();

        assert_eq!(plans.len(), 2);
        assert_eq!(plans[0].code, "FREE_PLAN");
        assert_eq!(plans[1].price_minor, 990);
    }

    #[tokio::test]
    async fn get_by_code_returns_not_found_for_unknown_code() {
        let mut plan_repo = MockPlanRepository::new();
        plan_repo.expect_find_by_code().returning(|_| Ok(None));

        let usecase = PlanCatalogUseCase::new(Arc::new(plan_repo));
        let err = usecase.get_by_code("NO_SUCH_PLAN").await.unwrap_err();

        assert!(matches!(err, EngineError::NotFound(_)));
    }

    #[tokio::test]
    async fn seed_upserts_every_default_plan() {
        let mut plan_repo = MockPlanRepository::new();
        plan_repo
            .expect_upsert_by_code()
            .times(5)
            .returning(|_| Ok(Uuid::new_v4()));

        let usecase = PlanCatalogUseCase::new(Arc::new(plan_repo));
        usecase.seed_default_plans().await.unwrap();
    }

    #[tokio::test]
    async fn seed_surfaces_repository_failures() {
        let mut plan_repo = MockPlanRepository::new();
        plan_repo
            .expect_upsert_by_code()
            .returning(|_| Err(anyhow!("connection refused")));

        let usecase = PlanCatalogUseCase::new(Arc::new(plan_repo));
        let err = usecase.seed_default_plans().await.unwrap_err();

        assert!(matches!(err, EngineError::Internal(_)));
    }
}
