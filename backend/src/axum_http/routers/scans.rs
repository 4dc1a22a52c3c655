use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use axum::{
    Json, Router,
    extract::{Path, State},
    routing::{get, post},
};
use domain::{
    repositories::{
        identity::IdentityProvider, plans::PlanRepository,
        subscriptions::SubscriptionRepository, usage_counters::UsageCounterRepository,
    },
    value_objects::usage::ScanAllowance,
};
use infra::{
    db::{
        postgres::postgres_connection::PgPoolSquad,
        repositories::{
            plans::PlanPostgres, subscriptions::SubscriptionPostgres,
            usage_counters::UsageCounterPostgres,
        },
    },
    identity::http_identity::HttpIdentityProvider,
};
use url::Url;
use uuid::Uuid;

use crate::config::config_model::DotEnvyConfig;
use crate::usecases::errors::EngineError;
use crate::usecases::subscription_lifecycle::SubscriptionLifecycleUseCase;
use crate::usecases::usage_meter::UsageMeterUseCase;

pub fn routes(db_pool: Arc<PgPoolSquad>, config: Arc<DotEnvyConfig>) -> Result<Router> {
    let identity = HttpIdentityProvider::new(
        Url::parse(&config.identity.base_url)?,
        config.identity.api_key.clone(),
        Duration::from_secs(config.identity.timeout_seconds),
    )?;

    let lifecycle = SubscriptionLifecycleUseCase::new(
        Arc::new(PlanPostgres::new(Arc::clone(&db_pool))),
        Arc::new(SubscriptionPostgres::new(Arc::clone(&db_pool))),
        Arc::new(identity),
    );

    let usage_meter = UsageMeterUseCase::new(
        Arc::new(lifecycle),
        Arc::new(UsageCounterPostgres::new(Arc::clone(&db_pool))),
    );

    Ok(Router::new()
        .route("/:user_id/check", get(check_scan_allowance))
        .route("/:user_id/consume", post(consume_scan))
        .with_state(Arc::new(usage_meter)))
}

pub async fn check_scan_allowance<P, S, I, U>(
    State(usage_meter): State<Arc<UsageMeterUseCase<P, S, I, U>>>,
    Path(user_id): Path<Uuid>,
) -> Result<Json<ScanAllowance>, EngineError>
where
    P: PlanRepository + Send + Sync + 'static,
    S: SubscriptionRepository + Send + Sync + 'static,
    I: IdentityProvider + Send + Sync + 'static,
    U: UsageCounterRepository + Send + Sync + 'static,
{
    let allowance = usage_meter.check(user_id).await?;
    Ok(Json(allowance))
}

pub async fn consume_scan<P, S, I, U>(
    State(usage_meter): State<Arc<UsageMeterUseCase<P, S, I, U>>>,
    Path(user_id): Path<Uuid>,
) -> Result<Json<ScanAllowance>, EngineError>
where
    P: PlanRepository + Send + Sync + 'static,
    S: SubscriptionRepository + Send + Sync + 'static,
    I: IdentityProvider + Send + Sync + 'static,
    U: UsageCounterRepository + Send + Sync + 'static,
{
    let allowance = usage_meter.consume(user_id).await?;
    Ok(Json(allowance))
}
