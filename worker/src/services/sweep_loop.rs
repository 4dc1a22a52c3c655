use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use domain::repositories::{
    identity::IdentityProvider, plans::PlanRepository, subscriptions::SubscriptionRepository,
};
use tracing::{error, info};

use crate::usecases::expire_due_subscriptions::{
    ExpireDueSubscriptionsParams, ExpireDueSubscriptionsUseCase,
};

pub async fn run<P, S, I>(
    usecase: Arc<ExpireDueSubscriptionsUseCase<P, S, I>>,
    interval: Duration,
    batch_limit: Option<i64>,
) -> Result<()>
where
    P: PlanRepository + Send + Sync + 'static,
    S: SubscriptionRepository + Send + Sync + 'static,
    I: IdentityProvider + Send + Sync + 'static,
{
    info!(interval_seconds = interval.as_secs(), "sweep loop started");

    loop {
        let params = ExpireDueSubscriptionsParams {
            dry_run: false,
            limit: batch_limit,
        };

        if let Err(e) = usecase.run(params).await {
            error!("Error while sweeping due subscriptions: {}", e);
        }

        tokio::time::sleep(interval).await;
    }
}
