use std::sync::Arc;

use chrono::Utc;
use domain::{
    repositories::{
        identity::IdentityProvider, plans::PlanRepository,
        subscriptions::SubscriptionRepository, usage_counters::UsageCounterRepository,
    },
    value_objects::usage::ScanAllowance,
};
use tracing::{error, info};
use uuid::Uuid;

use crate::usecases::errors::{EngineError, UseCaseResult};
use crate::usecases::subscription_lifecycle::SubscriptionLifecycleUseCase;

/// Enforces "N scans per UTC calendar day" where N comes from the plan the
/// lifecycle resolver says is currently in effect.
pub struct UsageMeterUseCase<P, S, I, U>
where
    P: PlanRepository + Send + Sync + 'static,
    S: SubscriptionRepository + Send + Sync + 'static,
    I: IdentityProvider + Send + Sync + 'static,
    U: UsageCounterRepository + Send + Sync + 'static,
{
    lifecycle: Arc<SubscriptionLifecycleUseCase<P, S, I>>,
    usage_repo: Arc<U>,
}

impl<P, S, I, U> UsageMeterUseCase<P, S, I, U>
where
    P: PlanRepository + Send + Sync + 'static,
    S: SubscriptionRepository + Send + Sync + 'static,
    I: IdentityProvider + Send + Sync + 'static,
    U: UsageCounterRepository + Send + Sync + 'static,
{
    pub fn new(
        lifecycle: Arc<SubscriptionLifecycleUseCase<P, S, I>>,
        usage_repo: Arc<U>,
    ) -> Self {
        Self {
            lifecycle,
            usage_repo,
        }
    }

    pub async fn check(&self, user_id: Uuid) -> UseCaseResult<ScanAllowance> {
        let current = self.lifecycle.resolve_current(user_id).await?;
        let limit = current.plan.scans_per_day;
        let date_key = Utc::now().date_naive();

        let used = self
            .usage_repo
            .find_for_day(user_id, date_key)
            .await
            .map_err(|err| {
                error!(%user_id, db_error = ?err, "usage_meter: failed to read day counter");
                EngineError::Internal(err)
            })?
            .map(|counter| counter.used)
            .unwrap_or(0);

        Ok(ScanAllowance::checked(used, limit, date_key))
    }

    /// Consumes one scan if capacity remains. The increment-then-insert
    /// order, with both steps atomic in the store, keeps `used <= limit`
    /// and one row per day under concurrent callers.
    pub async fn consume(&self, user_id: Uuid) -> UseCaseResult<ScanAllowance> {
        let current = self.lifecycle.resolve_current(user_id).await?;
        let limit = current.plan.scans_per_day;
        let date_key = Utc::now().date_naive();

        if limit <= 0 {
            info!(
                %user_id,
                plan_code = %current.plan.code,
                "usage_meter: plan grants no scans, refusing without a row"
            );
            return Ok(ScanAllowance::denied(0, limit, date_key));
        }

        if let Some(counter) = self
            .usage_repo
            .try_increment(user_id, date_key, limit)
            .await
            .map_err(|err| {
                error!(%user_id, db_error = ?err, "usage_meter: increment failed");
                EngineError::Internal(err)
            })?
        {
            return Ok(ScanAllowance::granted(counter.used, limit, date_key));
        }

        if let Some(counter) = self
            .usage_repo
            .insert_first(user_id, date_key, &current.plan.code)
            .await
            .map_err(|err| {
                error!(%user_id, db_error = ?err, "usage_meter: first-scan insert failed");
                EngineError::Internal(err)
            })?
        {
            return Ok(ScanAllowance::granted(counter.used, limit, date_key));
        }

        // Lost the creation race; the winner's row exists now, so one more
        // increment attempt settles it either way.
        if let Some(counter) = self
            .usage_repo
            .try_increment(user_id, date_key, limit)
            .await
            .map_err(|err| {
                error!(%user_id, db_error = ?err, "usage_meter: retry increment failed");
                EngineError::Internal(err)
            })?
        {
            return Ok(ScanAllowance::granted(counter.used, limit, date_key));
        }

        let used = self
            .usage_repo
            .find_for_day(user_id, date_key)
            .await
            .map_err(|err| {
                error!(%user_id, db_error = ?err, "usage_meter: failed to read exhausted counter");
                EngineError::Internal(err)
            })?
            .map(|counter| counter.used)
            .unwrap_or(limit);

        info!(%user_id, used, limit, "usage_meter: daily quota exhausted");
        Ok(ScanAllowance::denied(used, limit, date_key))
    }
}
