use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use backend::usecases::subscription_lifecycle::SubscriptionLifecycleUseCase;
use chrono::Utc;
use domain::{
    entities::subscriptions::SubscriptionEntity,
    repositories::{
        identity::IdentityProvider, notifier::ExpiryNotifier, plans::PlanRepository,
        run_audits::RunAuditRepository, subscriptions::SubscriptionRepository,
    },
    value_objects::enums::{
        billing_types::BillingType, subscription_statuses::SubscriptionStatus,
    },
};
use serde::Serialize;
use tracing::{error, info, warn};

const JOB_NAME: &str = "expire_due_subscriptions";
const IDENTITY_LOOKUP_TIMEOUT: Duration = Duration::from_secs(2);

#[derive(Debug, Clone)]
pub struct ExpireDueSubscriptionsParams {
    pub dry_run: bool,
    pub limit: Option<i64>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct SweepFlows {
    pub trial: usize,
    pub paid_recurring: usize,
    pub other: usize,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct ExpireDueSubscriptionsSummary {
    pub total_found: usize,
    pub processed: usize,
    pub success: usize,
    pub failed: usize,
    pub skipped: usize,
    pub moved_to_free: usize,
    pub flows: SweepFlows,
    pub dry_run: bool,
}

/// Batch counterpart of the lazy expiry in the lifecycle resolver. Both
/// call the same transition, so a user resolved mid-sweep ends up in the
/// same state either way; rows that fail here are re-selected next run.
pub struct ExpireDueSubscriptionsUseCase<P, S, I>
where
    P: PlanRepository + Send + Sync + 'static,
    S: SubscriptionRepository + Send + Sync + 'static,
    I: IdentityProvider + Send + Sync + 'static,
{
    lifecycle: Arc<SubscriptionLifecycleUseCase<P, S, I>>,
    plan_repo: Arc<P>,
    subscription_repo: Arc<S>,
    identity: Arc<I>,
    audit_repo: Arc<dyn RunAuditRepository + Send + Sync>,
    notifier: Option<Arc<dyn ExpiryNotifier + Send + Sync>>,
}

impl<P, S, I> ExpireDueSubscriptionsUseCase<P, S, I>
where
    P: PlanRepository + Send + Sync + 'static,
    S: SubscriptionRepository + Send + Sync + 'static,
    I: IdentityProvider + Send + Sync + 'static,
{
    pub fn new(
        lifecycle: Arc<SubscriptionLifecycleUseCase<P, S, I>>,
        plan_repo: Arc<P>,
        subscription_repo: Arc<S>,
        identity: Arc<I>,
        audit_repo: Arc<dyn RunAuditRepository + Send + Sync>,
        notifier: Option<Arc<dyn ExpiryNotifier + Send + Sync>>,
    ) -> Self {
        Self {
            lifecycle,
            plan_repo,
            subscription_repo,
            identity,
            audit_repo,
            notifier,
        }
    }

    pub async fn run(
        &self,
        params: ExpireDueSubscriptionsParams,
    ) -> Result<ExpireDueSubscriptionsSummary> {
        // The audit trail is observability only; a failure to open it must
        // not stop the sweep itself.
        let audit_id = match self.audit_repo.start(JOB_NAME).await {
            Ok(id) => Some(id),
            Err(err) => {
                warn!(error = ?err, "sweep: failed to open run audit");
                None
            }
        };

        let now = Utc::now();
        let limit = params.limit.filter(|l| *l > 0);

        let candidates = match self.subscription_repo.list_due(now, limit).await {
            Ok(candidates) => candidates,
            Err(err) => {
                error!(error = ?err, "sweep: failed to list due subscriptions");
                self.finish_audit(audit_id, false, &ExpireDueSubscriptionsSummary::default(), Some(err.to_string()))
                    .await;
                return Err(err);
            }
        };

        let mut summary = ExpireDueSubscriptionsSummary {
            total_found: candidates.len(),
            dry_run: params.dry_run,
            ..Default::default()
        };

        for candidate in candidates {
            // Re-check against the current clock; the resolver may have
            // already handled this row between query and processing.
            if !candidate.is_active || !candidate.is_expired_at(Utc::now()) {
                summary.skipped += 1;
                continue;
            }

            let status = SubscriptionStatus::from_str(&candidate.status);
            match status {
                SubscriptionStatus::Trial => summary.flows.trial += 1,
                SubscriptionStatus::Active => {
                    if self.is_recurring_plan(&candidate).await {
                        summary.flows.paid_recurring += 1;
                    } else {
                        summary.flows.other += 1;
                    }
                }
                SubscriptionStatus::Free => summary.flows.other += 1,
            }

            if params.dry_run {
                info!(
                    user_id = %candidate.user_id,
                    subscription_id = %candidate.id,
                    status = %candidate.status,
                    period_end = ?candidate.current_period_end,
                    "sweep: dry run, would expire"
                );
                summary.processed += 1;
                continue;
            }

            match self.lifecycle.expire_to_free(&candidate).await {
                Ok(free_row) => {
                    summary.processed += 1;
                    summary.success += 1;
                    summary.moved_to_free += 1;

                    if status == SubscriptionStatus::Trial {
                        self.notify_expired(&candidate).await;
                    }

                    info!(
                        user_id = %candidate.user_id,
                        expired_subscription_id = %candidate.id,
                        free_subscription_id = %free_row.id,
                        "sweep: subscription expired to free"
                    );
                }
                Err(err) => {
                    summary.processed += 1;
                    summary.failed += 1;
                    error!(
                        user_id = %candidate.user_id,
                        subscription_id = %candidate.id,
                        error = ?err,
                        "sweep: failed to expire subscription, continuing batch"
                    );
                }
            }
        }

        info!(
            total_found = summary.total_found,
            processed = summary.processed,
            success = summary.success,
            failed = summary.failed,
            skipped = summary.skipped,
            moved_to_free = summary.moved_to_free,
            dry_run = summary.dry_run,
            "sweep: completed"
        );

        self.finish_audit(audit_id, summary.failed == 0, &summary, None)
            .await;

        Ok(summary)
    }

    /// The plan's billing type decides the flow bucket; a row whose plan
    /// cannot be loaded counts under `other`.
    async fn is_recurring_plan(&self, candidate: &SubscriptionEntity) -> bool {
        match self.plan_repo.find_by_id(candidate.plan_id).await {
            Ok(plan) => BillingType::from_str(&plan.billing_type) == Some(BillingType::Recurring),
            Err(err) => {
                warn!(
                    user_id = %candidate.user_id,
                    plan_id = %candidate.plan_id,
                    error = ?err,
                    "sweep: plan lookup failed while classifying flow"
                );
                false
            }
        }
    }

    /// Best-effort trial-expiry ping. The identity lookup is bounded so a
    /// slow provider cannot stall the batch, and every failure is swallowed.
    async fn notify_expired(&self, candidate: &SubscriptionEntity) {
        let Some(notifier) = self.notifier.as_ref() else {
            return;
        };

        let lookup = tokio::time::timeout(
            IDENTITY_LOOKUP_TIMEOUT,
            self.identity.resolve_user(candidate.user_id),
        )
        .await;

        let email = match lookup {
            Ok(Ok(profile)) => profile.email,
            Ok(Err(err)) => {
                warn!(
                    user_id = %candidate.user_id,
                    error = %err,
                    "sweep: identity lookup failed, skipping notification"
                );
                return;
            }
            Err(_) => {
                warn!(
                    user_id = %candidate.user_id,
                    "sweep: identity lookup timed out, skipping notification"
                );
                return;
            }
        };

        let Some(email) = email else {
            return;
        };

        let plan_code = match self.plan_repo.find_by_id(candidate.plan_id).await {
            Ok(plan) => plan.code,
            Err(err) => {
                warn!(
                    user_id = %candidate.user_id,
                    plan_id = %candidate.plan_id,
                    error = ?err,
                    "sweep: plan lookup failed, skipping notification"
                );
                return;
            }
        };

        if let Err(err) = notifier.subscription_expired(&email, &plan_code).await {
            warn!(
                user_id = %candidate.user_id,
                error = %err,
                "sweep: expiry notification failed"
            );
        }
    }

    async fn finish_audit(
        &self,
        audit_id: Option<uuid::Uuid>,
        ok: bool,
        summary: &ExpireDueSubscriptionsSummary,
        error: Option<String>,
    ) {
        let Some(audit_id) = audit_id else {
            return;
        };

        let summary_json = serde_json::to_value(summary).unwrap_or_default();
        if let Err(err) = self
            .audit_repo
            .finish(audit_id, ok, summary_json, error)
            .await
        {
            warn!(%audit_id, error = ?err, "sweep: failed to close run audit");
        }
    }
}
