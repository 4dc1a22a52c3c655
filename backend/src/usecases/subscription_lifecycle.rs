use std::sync::Arc;

use chrono::{Duration, Utc};
use domain::{
    entities::{
        plans::PlanEntity,
        subscriptions::{InsertSubscriptionEntity, SubscriptionEntity},
    },
    repositories::{
        identity::IdentityProvider, plans::PlanRepository,
        subscriptions::SubscriptionRepository,
    },
    value_objects::{
        enums::{subscription_statuses::SubscriptionStatus, user_roles::UserRole},
        plans::{FREE_PLAN_CODE, TRIAL_PLAN_CODE, UNLIMITED_PLAN_CODE},
        subscriptions::CurrentSubscriptionDto,
    },
};
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::usecases::errors::{EngineError, UseCaseResult, is_unique_violation};

/// Decides which subscription row governs a user right now, expiring lapsed
/// periods lazily on the way. The expiry transition itself is shared with
/// the sweep worker so both paths apply one policy.
pub struct SubscriptionLifecycleUseCase<P, S, I>
where
    P: PlanRepository + Send + Sync + 'static,
    S: SubscriptionRepository + Send + Sync + 'static,
    I: IdentityProvider + Send + Sync + 'static,
{
    plan_repo: Arc<P>,
    subscription_repo: Arc<S>,
    identity: Arc<I>,
}

impl<P, S, I> SubscriptionLifecycleUseCase<P, S, I>
where
    P: PlanRepository + Send + Sync + 'static,
    S: SubscriptionRepository + Send + Sync + 'static,
    I: IdentityProvider + Send + Sync + 'static,
{
    pub fn new(plan_repo: Arc<P>, subscription_repo: Arc<S>, identity: Arc<I>) -> Self {
        Self {
            plan_repo,
            subscription_repo,
            identity,
        }
    }

    pub async fn resolve_current(&self, user_id: Uuid) -> UseCaseResult<CurrentSubscriptionDto> {
        let role = match self.identity.resolve_user(user_id).await {
            Ok(profile) => profile.role,
            Err(err) => {
                // Identity is best-effort here; an outage must not block
                // entitlement resolution for regular members.
                warn!(
                    %user_id,
                    error = %err,
                    "lifecycle: identity lookup failed, treating user as member"
                );
                UserRole::Member
            }
        };

        if role == UserRole::Admin {
            return self.resolve_admin_override(user_id).await;
        }

        let (subscription, flag_missing) = match self.find_governing_row(user_id).await? {
            Some(found) => found,
            None => {
                info!(%user_id, "lifecycle: no subscription rows, creating free");
                let free_plan = self.required_plan(FREE_PLAN_CODE).await?;
                let row = self.install_free_row(user_id, free_plan.id).await?;
                return Ok(CurrentSubscriptionDto::from_parts(&row, free_plan));
            }
        };

        let now = Utc::now();

        if subscription.is_active && !subscription.is_expired_at(now) {
            let mut subscription = subscription;
            if flag_missing {
                self.subscription_repo
                    .mark_current(user_id, subscription.id)
                    .await
                    .map_err(|err| {
                        error!(
                            %user_id,
                            subscription_id = %subscription.id,
                            db_error = ?err,
                            "lifecycle: failed to re-assert is_current flag"
                        );
                        EngineError::Internal(err)
                    })?;
                subscription.is_current = true;
            }
            let plan = self.plan_for(&subscription).await?;
            return Ok(CurrentSubscriptionDto::from_parts(&subscription, plan));
        }

        if subscription.is_active && subscription.is_expired_at(now) {
            info!(
                %user_id,
                subscription_id = %subscription.id,
                status = %subscription.status,
                "lifecycle: subscription lapsed, moving to free"
            );
            let free_row = self.expire_to_free(&subscription).await?;
            let free_plan = self.plan_for(&free_row).await?;
            return Ok(CurrentSubscriptionDto::from_parts(&free_row, free_plan));
        }

        // Latest row is already ended; fall back to free.
        info!(%user_id, "lifecycle: latest row inactive, falling back to free");
        let free_plan = self.required_plan(FREE_PLAN_CODE).await?;
        let row = self.install_free_row(user_id, free_plan.id).await?;
        Ok(CurrentSubscriptionDto::from_parts(&row, free_plan))
    }

    /// Installs the user's free row as current, retrying once when the
    /// partial unique index on (`user_id`) where `is_current` trips: the
    /// loser of a concurrent resolution re-runs against the winner's state
    /// and reuses the row the winner installed.
    async fn install_free_row(
        &self,
        user_id: Uuid,
        free_plan_id: Uuid,
    ) -> UseCaseResult<SubscriptionEntity> {
        match self
            .subscription_repo
            .make_current_free(user_id, free_plan_id)
            .await
        {
            Ok(row) => Ok(row),
            Err(err) if is_unique_violation(&err) => {
                warn!(%user_id, "lifecycle: lost a current-flag race, retrying once");
                self.subscription_repo
                    .make_current_free(user_id, free_plan_id)
                    .await
                    .map_err(|retry_err| {
                        if is_unique_violation(&retry_err) {
                            error!(%user_id, "lifecycle: current-flag race persisted after retry");
                            EngineError::Concurrency
                        } else {
                            error!(
                                %user_id,
                                db_error = ?retry_err,
                                "lifecycle: failed to install free row"
                            );
                            EngineError::Internal(retry_err)
                        }
                    })
            }
            Err(err) => {
                error!(%user_id, db_error = ?err, "lifecycle: failed to install free row");
                Err(EngineError::Internal(err))
            }
        }
    }

    /// Expires one lapsed row and installs the user's free row as current,
    /// in that order. `ended_at` records the period end, not the processing
    /// time, so the history reflects when the entitlement actually lapsed.
    pub async fn expire_to_free(
        &self,
        subscription: &SubscriptionEntity,
    ) -> UseCaseResult<SubscriptionEntity> {
        let ended_at = subscription.current_period_end.unwrap_or_else(Utc::now);

        self.subscription_repo
            .expire(subscription.id, ended_at)
            .await
            .map_err(|err| {
                error!(
                    user_id = %subscription.user_id,
                    subscription_id = %subscription.id,
                    db_error = ?err,
                    "lifecycle: failed to expire subscription"
                );
                EngineError::Internal(err)
            })?;

        let free_plan = self.required_plan(FREE_PLAN_CODE).await?;
        let free_row = self
            .install_free_row(subscription.user_id, free_plan.id)
            .await?;

        info!(
            user_id = %subscription.user_id,
            expired_subscription_id = %subscription.id,
            free_subscription_id = %free_row.id,
            "lifecycle: moved user to free plan"
        );

        Ok(free_row)
    }

    pub async fn start_trial(&self, user_id: Uuid) -> UseCaseResult<CurrentSubscriptionDto> {
        let trial_plan = self.required_plan(TRIAL_PLAN_CODE).await?;

        if let Some((existing, _)) = self.find_governing_row(user_id).await? {
            let status = SubscriptionStatus::from_str(&existing.status);
            let blocking = existing.is_active
                && !existing.is_expired_at(Utc::now())
                && matches!(
                    status,
                    SubscriptionStatus::Trial | SubscriptionStatus::Active
                );
            if blocking {
                warn!(
                    %user_id,
                    subscription_id = %existing.id,
                    status = %existing.status,
                    "lifecycle: trial refused, unexpired subscription exists"
                );
                return Err(EngineError::InvalidPlan(
                    "user already has an unexpired trial or paid subscription".to_string(),
                ));
            }
        }

        let now = Utc::now();
        let row = self
            .subscription_repo
            .insert_current(InsertSubscriptionEntity {
                user_id,
                plan_id: trial_plan.id,
                status: SubscriptionStatus::Trial.as_str().to_string(),
                current_period_start: now,
                current_period_end: Some(now + Duration::days(trial_plan.trial_days.into())),
                is_current: true,
                is_active: true,
                stripe_customer_ref: None,
                stripe_subscription_ref: None,
            })
            .await
            .map_err(|err| {
                if is_unique_violation(&err) {
                    warn!(%user_id, "lifecycle: concurrent trial start detected");
                    EngineError::Concurrency
                } else {
                    error!(%user_id, db_error = ?err, "lifecycle: failed to insert trial row");
                    EngineError::Internal(err)
                }
            })?;

        info!(
            %user_id,
            subscription_id = %row.id,
            trial_days = trial_plan.trial_days,
            "lifecycle: trial started"
        );

        Ok(CurrentSubscriptionDto::from_parts(&row, trial_plan))
    }

    async fn resolve_admin_override(&self, user_id: Uuid) -> UseCaseResult<CurrentSubscriptionDto> {
        // Fail fast when the unlimited plan was never seeded; silently
        // downgrading an operator to a metered plan hides a deployment bug.
        let unlimited = self.required_plan(UNLIMITED_PLAN_CODE).await?;

        let row = self
            .subscription_repo
            .assign_override_plan(user_id, unlimited.id)
            .await
            .map_err(|err| {
                error!(%user_id, db_error = ?err, "lifecycle: failed to assign override plan");
                EngineError::Internal(err)
            })?;

        info!(%user_id, "lifecycle: admin resolved to unlimited plan");
        Ok(CurrentSubscriptionDto::from_parts(&row, unlimited))
    }

    /// The row entitlement decisions are based on: the flagged current row
    /// when present, otherwise the newest row (flag to be re-asserted).
    async fn find_governing_row(
        &self,
        user_id: Uuid,
    ) -> UseCaseResult<Option<(SubscriptionEntity, bool)>> {
        if let Some(current) = self
            .subscription_repo
            .find_current(user_id)
            .await
            .map_err(|err| {
                error!(%user_id, db_error = ?err, "lifecycle: failed to load current row");
                EngineError::Internal(err)
            })?
        {
            return Ok(Some((current, false)));
        }

        let latest = self
            .subscription_repo
            .find_latest(user_id)
            .await
            .map_err(|err| {
                error!(%user_id, db_error = ?err, "lifecycle: failed to load latest row");
                EngineError::Internal(err)
            })?;

        Ok(latest.map(|row| (row, true)))
    }

    async fn plan_for(&self, subscription: &SubscriptionEntity) -> UseCaseResult<PlanEntity> {
        self.plan_repo
            .find_by_id(subscription.plan_id)
            .await
            .map_err(|err| {
                error!(
                    user_id = %subscription.user_id,
                    plan_id = %subscription.plan_id,
                    db_error = ?err,
                    "lifecycle: failed to load plan for subscription"
                );
                EngineError::Internal(err)
            })
    }

    async fn required_plan(&self, code: &str) -> UseCaseResult<PlanEntity> {
        self.plan_repo
            .find_by_code(code)
            .await
            .map_err(|err| {
                error!(code, db_error = ?err, "lifecycle: failed to load plan by code");
                EngineError::Internal(err)
            })?
            .ok_or_else(|| EngineError::NotFound(format!("plan {code}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::anyhow;
    use chrono::Duration;
    use domain::repositories::identity::{MockIdentityProvider, UserProfile};
    use domain::repositories::plans::MockPlanRepository;
    use domain::repositories::subscriptions::MockSubscriptionRepository;
    use mockall::predicate::eq;

    fn plan_fixture(code: &str, billing_type: &str, scans_per_day: i32) -> PlanEntity {
        PlanEntity {
            id: Uuid::new_v4(),
            code: code.to_string(),
            name: code.to_string(),
            billing_type: billing_type.to_string(),
            billing_interval: "none".to_string(),
            scans_per_day,
            trial_days: 7,
            price_minor: 0,
            stripe_price_id: None,
            is_active: true,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn subscription_fixture(
        user_id: Uuid,
        plan_id: Uuid,
        status: &str,
        period_end: Option<chrono::DateTime<Utc>>,
    ) -> SubscriptionEntity {
        SubscriptionEntity {
            id: Uuid::new_v4(),
            user_id,
            plan_id,
            status: status.to_string(),
            current_period_start: Utc::now() - Duration::days(7),
            current_period_end: period_end,
            is_current: true,
            is_active: true,
            ended_at: None,
            stripe_customer_ref: None,
            stripe_subscription_ref: None,
            created_at: Utc::now() - Duration::days(7),
        }
    }

    fn unique_violation() -> anyhow::Error {
        anyhow::Error::new(diesel::result::Error::DatabaseError(
            diesel::result::DatabaseErrorKind::UniqueViolation,
            Box::new("duplicate key value violates unique constraint".to_string()),
        ))
    }

    fn member_identity(user_id: Uuid) -> MockIdentityProvider {
        let mut identity = MockIdentityProvider::new();
        identity.expect_resolve_user().returning(move |_| {
            Ok(UserProfile {
                id: user_id,
                role: UserRole::Member,
                email: None,
            })
        });
        identity
    }

    #[tokio::test]
    async fn missing_rows_resolve_to_a_new_free_subscription() {
        let user_id = Uuid::new_v4();
        let free_plan = plan_fixture(FREE_PLAN_CODE, "free", 2);
        let free_plan_id = free_plan.id;

        let mut plan_repo = MockPlanRepository::new();
        plan_repo
            .expect_find_by_code()
            .with(eq(FREE_PLAN_CODE))
            .returning(move |_| Ok(Some(free_plan.clone())));

        let mut subscription_repo = MockSubscriptionRepository::new();
        subscription_repo.expect_find_current().returning(|_| Ok(None));
        subscription_repo.expect_find_latest().returning(|_| Ok(None));
        subscription_repo
            .expect_make_current_free()
            .with(eq(user_id), eq(free_plan_id))
            .returning(move |user_id, plan_id| {
                Ok(subscription_fixture(user_id, plan_id, "free", None))
            });

        let usecase = SubscriptionLifecycleUseCase::new(
            Arc::new(plan_repo),
            Arc::new(subscription_repo),
            Arc::new(member_identity(user_id)),
        );

        let current = usecase.resolve_current(user_id).await.unwrap();
        assert_eq!(current.status, SubscriptionStatus::Free);
        assert_eq!(current.plan.code, FREE_PLAN_CODE);
        assert!(current.current_period_end.is_none());
    }

    #[tokio::test]
    async fn unexpired_trial_is_returned_unchanged() {
        let user_id = Uuid::new_v4();
        let trial_plan = plan_fixture(TRIAL_PLAN_CODE, "trial", 10);
        let trial_plan_id = trial_plan.id;
        let row = subscription_fixture(
            user_id,
            trial_plan_id,
            "trial",
            Some(Utc::now() + Duration::days(3)),
        );

        let mut plan_repo = MockPlanRepository::new();
        plan_repo
            .expect_find_by_id()
            .with(eq(trial_plan_id))
            .returning(move |_| Ok(trial_plan.clone()));

        let mut subscription_repo = MockSubscriptionRepository::new();
        subscription_repo
            .expect_find_current()
            .returning(move |_| Ok(Some(row.clone())));

        let usecase = SubscriptionLifecycleUseCase::new(
            Arc::new(plan_repo),
            Arc::new(subscription_repo),
            Arc::new(member_identity(user_id)),
        );

        let current = usecase.resolve_current(user_id).await.unwrap();
        assert_eq!(current.status, SubscriptionStatus::Trial);
        assert!(current.is_active);
    }

    #[tokio::test]
    async fn lost_current_flag_race_is_retried_once() {
        let user_id = Uuid::new_v4();
        let free_plan = plan_fixture(FREE_PLAN_CODE, "free", 2);
        let free_plan_id = free_plan.id;

        let mut plan_repo = MockPlanRepository::new();
        plan_repo
            .expect_find_by_code()
            .with(eq(FREE_PLAN_CODE))
            .returning(move |_| Ok(Some(free_plan.clone())));

        let mut subscription_repo = MockSubscriptionRepository::new();
        subscription_repo.expect_find_current().returning(|_| Ok(None));
        subscription_repo.expect_find_latest().returning(|_| Ok(None));
        let mut attempts = 0;
        subscription_repo
            .expect_make_current_free()
            .times(2)
            .returning(move |user_id, plan_id| {
                attempts += 1;
                if attempts == 1 {
                    // A concurrent resolution installed the flag first.
                    Err(unique_violation())
                } else {
                    Ok(subscription_fixture(user_id, plan_id, "free", None))
                }
            });

        let usecase = SubscriptionLifecycleUseCase::new(
            Arc::new(plan_repo),
            Arc::new(subscription_repo),
            Arc::new(member_identity(user_id)),
        );

        let current = usecase.resolve_current(user_id).await.unwrap();
        assert_eq!(current.status, SubscriptionStatus::Free);
        assert_eq!(current.plan.id, free_plan_id);
    }

    #[tokio::test]
    async fn persistent_current_flag_race_maps_to_concurrency() {
        let user_id = Uuid::new_v4();
        let free_plan = plan_fixture(FREE_PLAN_CODE, "free", 2);

        let mut plan_repo = MockPlanRepository::new();
        plan_repo
            .expect_find_by_code()
            .with(eq(FREE_PLAN_CODE))
            .returning(move |_| Ok(Some(free_plan.clone())));

        let mut subscription_repo = MockSubscriptionRepository::new();
        subscription_repo.expect_find_current().returning(|_| Ok(None));
        subscription_repo.expect_find_latest().returning(|_| Ok(None));
        subscription_repo
            .expect_make_current_free()
            .times(2)
            .returning(|_, _| Err(unique_violation()));

        let usecase = SubscriptionLifecycleUseCase::new(
            Arc::new(plan_repo),
            Arc::new(subscription_repo),
            Arc::new(member_identity(user_id)),
        );

        let err = usecase.resolve_current(user_id).await.unwrap_err();
        assert!(matches!(err, EngineError::Concurrency));
        assert_eq!(err.status_code(), axum::http::StatusCode::CONFLICT);
    }

    #[tokio::test]
    async fn concurrent_trial_start_maps_to_concurrency() {
        let user_id = Uuid::new_v4();
        let trial_plan = plan_fixture(TRIAL_PLAN_CODE, "trial", 10);

        let mut plan_repo = MockPlanRepository::new();
        plan_repo
            .expect_find_by_code()
            .with(eq(TRIAL_PLAN_CODE))
            .returning(move |_| Ok(Some(trial_plan.clone())));

        let mut subscription_repo = MockSubscriptionRepository::new();
        subscription_repo.expect_find_current().returning(|_| Ok(None));
        subscription_repo.expect_find_latest().returning(|_| Ok(None));
        subscription_repo
            .expect_insert_current()
            .returning(|_| Err(unique_violation()));

        let usecase = SubscriptionLifecycleUseCase::new(
            Arc::new(plan_repo),
            Arc::new(subscription_repo),
            Arc::new(member_identity(user_id)),
        );

        let err = usecase.start_trial(user_id).await.unwrap_err();
        assert!(matches!(err, EngineError::Concurrency));
    }

    #[tokio::test]
    async fn missing_current_flag_is_reasserted_on_the_latest_row() {
        let user_id = Uuid::new_v4();
        let trial_plan = plan_fixture(TRIAL_PLAN_CODE, "trial", 10);
        let trial_plan_id = trial_plan.id;
        let mut row = subscription_fixture(
            user_id,
            trial_plan_id,
            "trial",
            Some(Utc::now() + Duration::days(3)),
        );
        row.is_current = false;
        let row_id = row.id;

        let mut plan_repo = MockPlanRepository::new();
        plan_repo
            .expect_find_by_id()
            .with(eq(trial_plan_id))
            .returning(move |_| Ok(trial_plan.clone()));

        let mut subscription_repo = MockSubscriptionRepository::new();
        subscription_repo.expect_find_current().returning(|_| Ok(None));
        subscription_repo
            .expect_find_latest()
            .returning(move |_| Ok(Some(row.clone())));
        subscription_repo
            .expect_mark_current()
            .with(eq(user_id), eq(row_id))
            .times(1)
            .returning(|_, _| Ok(()));

        let usecase = SubscriptionLifecycleUseCase::new(
            Arc::new(plan_repo),
            Arc::new(subscription_repo),
            Arc::new(member_identity(user_id)),
        );

        let current = usecase.resolve_current(user_id).await.unwrap();
        assert_eq!(current.status, SubscriptionStatus::Trial);
        assert!(current.is_current);
    }

    #[tokio::test]
    async fn expired_trial_moves_to_free_with_period_end_as_ended_at() {
        let user_id = Uuid::new_v4();
        let trial_plan = plan_fixture(TRIAL_PLAN_CODE, "trial", 10);
        let free_plan = plan_fixture(FREE_PLAN_CODE, "free", 2);
        let free_plan_id = free_plan.id;
        let period_end = Utc::now() - Duration::days(1);
        let row = subscription_fixture(user_id, trial_plan.id, "trial", Some(period_end));
        let row_id = row.id;

        let mut plan_repo = MockPlanRepository::new();
        plan_repo
            .expect_find_by_code()
            .with(eq(FREE_PLAN_CODE))
            .returning(move |_| Ok(Some(free_plan.clone())));
        plan_repo
            .expect_find_by_id()
            .with(eq(free_plan_id))
            .returning(move |plan_id| {
                let mut plan = plan_fixture(FREE_PLAN_CODE, "free", 2);
                plan.id = plan_id;
                Ok(plan)
            });

        let mut subscription_repo = MockSubscriptionRepository::new();
        subscription_repo
            .expect_find_current()
            .returning(move |_| Ok(Some(row.clone())));
        subscription_repo
            .expect_expire()
            .with(eq(row_id), eq(period_end))
            .times(1)
            .returning(|_, _| Ok(()));
        subscription_repo
            .expect_make_current_free()
            .with(eq(user_id), eq(free_plan_id))
            .times(1)
            .returning(move |user_id, plan_id| {
                Ok(subscription_fixture(user_id, plan_id, "free", None))
            });

        let usecase = SubscriptionLifecycleUseCase::new(
            Arc::new(plan_repo),
            Arc::new(subscription_repo),
            Arc::new(member_identity(user_id)),
        );

        let current = usecase.resolve_current(user_id).await.unwrap();
        assert_eq!(current.status, SubscriptionStatus::Free);
        assert!(current.current_period_end.is_none());
    }

    #[tokio::test]
    async fn free_rows_never_expire() {
        let user_id = Uuid::new_v4();
        let free_plan = plan_fixture(FREE_PLAN_CODE, "free", 2);
        let free_plan_id = free_plan.id;
        let row = subscription_fixture(user_id, free_plan_id, "free", None);

        let mut plan_repo = MockPlanRepository::new();
        plan_repo
            .expect_find_by_id()
            .with(eq(free_plan_id))
            .returning(move |_| Ok(free_plan.clone()));

        let mut subscription_repo = MockSubscriptionRepository::new();
        subscription_repo
            .expect_find_current()
            .returning(move |_| Ok(Some(row.clone())));
        subscription_repo.expect_expire().times(0);

        let usecase = SubscriptionLifecycleUseCase::new(
            Arc::new(plan_repo),
            Arc::new(subscription_repo),
            Arc::new(member_identity(user_id)),
        );

        let current = usecase.resolve_current(user_id).await.unwrap();
        assert_eq!(current.status, SubscriptionStatus::Free);
        assert!(current.is_active);
    }

    #[tokio::test]
    async fn admin_short_circuits_to_unlimited_plan() {
        let user_id = Uuid::new_v4();
        let unlimited = plan_fixture(UNLIMITED_PLAN_CODE, "free", i32::MAX);
        let unlimited_id = unlimited.id;

        let mut identity = MockIdentityProvider::new();
        identity.expect_resolve_user().returning(move |_| {
            Ok(UserProfile {
                id: user_id,
                role: UserRole::Admin,
                email: Some("ops@example.com".to_string()),
            })
        });

        let mut plan_repo = MockPlanRepository::new();
        plan_repo
            .expect_find_by_code()
            .with(eq(UNLIMITED_PLAN_CODE))
            .returning(move |_| Ok(Some(unlimited.clone())));

        let mut subscription_repo = MockSubscriptionRepository::new();
        subscription_repo
            .expect_assign_override_plan()
            .with(eq(user_id), eq(unlimited_id))
            .times(1)
            .returning(move |user_id, plan_id| {
                Ok(subscription_fixture(user_id, plan_id, "free", None))
            });
        // Normal resolution must be skipped entirely for admins.
        subscription_repo.expect_find_current().times(0);

        let usecase = SubscriptionLifecycleUseCase::new(
            Arc::new(plan_repo),
            Arc::new(subscription_repo),
            Arc::new(identity),
        );

        let current = usecase.resolve_current(user_id).await.unwrap();
        assert_eq!(current.plan.code, UNLIMITED_PLAN_CODE);
        assert_eq!(current.plan.scans_per_day, i32::MAX);
    }

    #[tokio::test]
    async fn admin_resolution_fails_fast_when_unlimited_plan_is_missing() {
        let user_id = Uuid::new_v4();

        let mut identity = MockIdentityProvider::new();
        identity.expect_resolve_user().returning(move |_| {
            Ok(UserProfile {
                id: user_id,
                role: UserRole::Admin,
                email: None,
            })
        });

        let mut plan_repo = MockPlanRepository::new();
        plan_repo
            .expect_find_by_code()
            .with(eq(UNLIMITED_PLAN_CODE))
            .returning(|_| Ok(None));

        let usecase = SubscriptionLifecycleUseCase::new(
            Arc::new(plan_repo),
            Arc::new(MockSubscriptionRepository::new()),
            Arc::new(identity),
        );

        let err = usecase.resolve_current(user_id).await.unwrap_err();
        assert!(matches!(err, EngineError::NotFound(_)));
    }

    #[tokio::test]
    async fn identity_outage_degrades_to_member_resolution() {
        let user_id = Uuid::new_v4();
        let free_plan = plan_fixture(FREE_PLAN_CODE, "free", 2);

        let mut identity = MockIdentityProvider::new();
        identity
            .expect_resolve_user()
            .returning(|_| Err(anyhow!("identity service unreachable")));

        let mut plan_repo = MockPlanRepository::new();
        plan_repo
            .expect_find_by_code()
            .returning(move |_| Ok(Some(free_plan.clone())));

        let mut subscription_repo = MockSubscriptionRepository::new();
        subscription_repo.expect_find_current().returning(|_| Ok(None));
        subscription_repo.expect_find_latest().returning(|_| Ok(None));
        subscription_repo
            .expect_make_current_free()
            .returning(move |user_id, plan_id| {
                Ok(subscription_fixture(user_id, plan_id, "free", None))
            });

        let usecase = SubscriptionLifecycleUseCase::new(
            Arc::new(plan_repo),
            Arc::new(subscription_repo),
            Arc::new(identity),
        );

        let current = usecase.resolve_current(user_id).await.unwrap();
        assert_eq!(current.status, SubscriptionStatus::Free);
    }

    #[tokio::test]
    async fn start_trial_rejects_users_with_an_unexpired_subscription() {
        let user_id = Uuid::new_v4();
        let trial_plan = plan_fixture(TRIAL_PLAN_CODE, "trial", 10);
        let row = subscription_fixture(
            user_id,
            trial_plan.id,
            "trial",
            Some(Utc::now() + Duration::days(2)),
        );

        let mut plan_repo = MockPlanRepository::new();
        plan_repo
            .expect_find_by_code()
            .with(eq(TRIAL_PLAN_CODE))
            .returning(move |_| Ok(Some(trial_plan.clone())));

        let mut subscription_repo = MockSubscriptionRepository::new();
        subscription_repo
            .expect_find_current()
            .returning(move |_| Ok(Some(row.clone())));
        subscription_repo.expect_insert_current().times(0);

        let usecase = SubscriptionLifecycleUseCase::new(
            Arc::new(plan_repo),
            Arc::new(subscription_repo),
            Arc::new(member_identity(user_id)),
        );

        let err = usecase.start_trial(user_id).await.unwrap_err();
        assert!(matches!(err, EngineError::InvalidPlan(_)));
    }

    #[tokio::test]
    async fn start_trial_requires_a_configured_trial_plan() {
        let user_id = Uuid::new_v4();

        let mut plan_repo = MockPlanRepository::new();
        plan_repo
            .expect_find_by_code()
            .with(eq(TRIAL_PLAN_CODE))
            .returning(|_| Ok(None));

        let usecase = SubscriptionLifecycleUseCase::new(
            Arc::new(plan_repo),
            Arc::new(MockSubscriptionRepository::new()),
            Arc::new(member_identity(user_id)),
        );

        let err = usecase.start_trial(user_id).await.unwrap_err();
        assert!(matches!(err, EngineError::NotFound(_)));
    }

    #[tokio::test]
    async fn start_trial_creates_a_current_trial_row() {
        let user_id = Uuid::new_v4();
        let trial_plan = plan_fixture(TRIAL_PLAN_CODE, "trial", 10);
        let trial_plan_id = trial_plan.id;

        let mut plan_repo = MockPlanRepository::new();
        plan_repo
            .expect_find_by_code()
            .with(eq(TRIAL_PLAN_CODE))
            .returning(move |_| Ok(Some(trial_plan.clone())));

        let mut subscription_repo = MockSubscriptionRepository::new();
        subscription_repo.expect_find_current().returning(|_| Ok(None));
        subscription_repo.expect_find_latest().returning(|_| Ok(None));
        subscription_repo
            .expect_insert_current()
            .withf(move |insert| {
                insert.plan_id == trial_plan_id
                    && insert.status == "trial"
                    && insert.is_current
                    && insert.is_active
                    && insert.current_period_end.is_some()
            })
            .times(1)
            .returning(move |insert| {
                let mut row =
                    subscription_fixture(insert.user_id, insert.plan_id, "trial", insert.current_period_end);
                row.current_period_start = insert.current_period_start;
                Ok(row)
            });

        let usecase = SubscriptionLifecycleUseCase::new(
            Arc::new(plan_repo),
            Arc::new(subscription_repo),
            Arc::new(member_identity(user_id)),
        );

        let current = usecase.start_trial(user_id).await.unwrap();
        assert_eq!(current.status, SubscriptionStatus::Trial);
        assert!(current.current_period_end.is_some());
    }
}
