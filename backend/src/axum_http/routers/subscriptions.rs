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
        subscriptions::SubscriptionRepository,
    },
    value_objects::subscriptions::CurrentSubscriptionDto,
};
use infra::{
    db::{
        postgres::postgres_connection::PgPoolSquad,
        repositories::{plans::PlanPostgres, subscriptions::SubscriptionPostgres},
    },
    identity::http_identity::HttpIdentityProvider,
};
use url::Url;
use uuid::Uuid;

use crate::config::config_model::DotEnvyConfig;
use crate::usecases::errors::EngineError;
use crate::usecases::subscription_lifecycle::SubscriptionLifecycleUseCase;

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

    Ok(Router::new()
        .route("/:user_id/current", get(get_current_subscription))
        .route("/:user_id/trial", post(start_trial))
        .with_state(Arc::new(lifecycle)))
}

pub async fn get_current_subscription<P, S, I>(
    State(lifecycle): State<Arc<SubscriptionLifecycleUseCase<P, S, I>>>,
    Path(user_id): Path<Uuid>,
) -> Result<Json<CurrentSubscriptionDto>, EngineError>
where
    P: PlanRepository + Send + Sync + 'static,
    S: SubscriptionRepository + Send + Sync + 'static,
    I: IdentityProvider + Send + Sync + 'static,
{
    let current = lifecycle.resolve_current(user_id).await?;
    Ok(Json(current))
}

pub async fn start_trial<P, S, I>(
    State(lifecycle): State<Arc<SubscriptionLifecycleUseCase<P, S, I>>>,
    Path(user_id): Path<Uuid>,
) -> Result<Json<CurrentSubscriptionDto>, EngineError>
where
    P: PlanRepository + Send + Sync + 'static,
    S: SubscriptionRepository + Send + Sync + 'static,
    I: IdentityProvider + Send + Sync + 'static,
{
    let current = lifecycle.start_trial(user_id).await?;
    Ok(Json(current))
}
