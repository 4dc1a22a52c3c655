use std::sync::Arc;

use axum::{
    Json, Router,
    extract::State,
    http::{HeaderMap, StatusCode, header::AUTHORIZATION},
    response::{IntoResponse, Response},
    routing::post,
};
use domain::repositories::{
    identity::IdentityProvider, plans::PlanRepository, subscriptions::SubscriptionRepository,
};
use serde::Deserialize;
use tracing::error;

use crate::{
    config::config_model::DotEnvyConfig,
    usecases::expire_due_subscriptions::{
        ExpireDueSubscriptionsParams, ExpireDueSubscriptionsUseCase,
    },
};

// Run example
//   curl -X POST "http://localhost:$SERVER_PORT_WORKER/internal/v1/sweeps/subscriptions" \
//     -H "Authorization: Bearer $INTERNAL_SWEEP_TOKEN" \
//     -H "Content-Type: application/json" \
//     -d '{"dry_run":true,"limit":100}'

pub struct SweepRouteState<P, S, I>
where
    P: PlanRepository + Send + Sync + 'static,
    S: SubscriptionRepository + Send + Sync + 'static,
    I: IdentityProvider + Send + Sync + 'static,
{
    config: Arc<DotEnvyConfig>,
    usecase: Arc<ExpireDueSubscriptionsUseCase<P, S, I>>,
}

impl<P, S, I> Clone for SweepRouteState<P, S, I>
where
    P: PlanRepository + Send + Sync + 'static,
    S: SubscriptionRepository + Send + Sync + 'static,
    I: IdentityProvider + Send + Sync + 'static,
{
    fn clone(&self) -> Self {
        Self {
            config: Arc::clone(&self.config),
            usecase: Arc::clone(&self.usecase),
        }
    }
}

pub fn routes<P, S, I>(
    config: Arc<DotEnvyConfig>,
    usecase: Arc<ExpireDueSubscriptionsUseCase<P, S, I>>,
) -> Router
where
    P: PlanRepository + Send + Sync + 'static,
    S: SubscriptionRepository + Send + Sync + 'static,
    I: IdentityProvider + Send + Sync + 'static,
{
    Router::new()
        .route("/subscriptions", post(sweep_subscriptions))
        .with_state(SweepRouteState { config, usecase })
}

#[derive(Debug, Deserialize)]
pub struct SweepSubscriptionsRequest {
    pub dry_run: Option<bool>,
    pub limit: Option<i64>,
}

pub async fn sweep_subscriptions<P, S, I>(
    State(state): State<SweepRouteState<P, S, I>>,
    headers: HeaderMap,
    Json(payload): Json<SweepSubscriptionsRequest>,
) -> Response
where
    P: PlanRepository + Send + Sync + 'static,
    S: SubscriptionRepository + Send + Sync + 'static,
    I: IdentityProvider + Send + Sync + 'static,
{
    let expected_token = match state.config.sweep.internal_token.as_deref() {
        Some(token) => token,
        None => {
            return (
                StatusCode::SERVICE_UNAVAILABLE,
                "sweep token is not configured",
            )
                .into_response();
        }
    };

    if let Err(status) = authorize_bearer(&headers, expected_token) {
        return (status, "unauthorized").into_response();
    }

    let params = ExpireDueSubscriptionsParams {
        dry_run: payload.dry_run.unwrap_or(false),
        limit: payload.limit.or(state.config.sweep.batch_limit),
    };

    match state.usecase.run(params).await {
        Ok(summary) => Json(summary).into_response(),
        Err(err) => {
            error!(error = ?err, "sweep_subscriptions: usecase failed");
            (StatusCode::INTERNAL_SERVER_ERROR, "sweep failed").into_response()
        }
    }
}

fn authorize_bearer(headers: &HeaderMap, expected_token: &str) -> Result<(), StatusCode> {
    let auth = headers
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .ok_or(StatusCode::UNAUTHORIZED)?;

    let token = auth
        .strip_prefix("Bearer ")
        .ok_or(StatusCode::UNAUTHORIZED)?;

    if token == expected_token {
        Ok(())
    } else {
        Err(StatusCode::UNAUTHORIZED)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bearer_guard_accepts_only_the_configured_token() {
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, "Bearer sweep-token".parse().unwrap());
        assert!(authorize_bearer(&headers, "sweep-token").is_ok());
        assert_eq!(
            authorize_bearer(&headers, "other-token"),
            Err(StatusCode::UNAUTHORIZED)
        );

        let empty = HeaderMap::new();
        assert_eq!(
            authorize_bearer(&empty, "sweep-token"),
            Err(StatusCode::UNAUTHORIZED)
        );
    }

    #[test]
    fn bearer_guard_rejects_non_bearer_schemes() {
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, "Basic c3dlZXA=".parse().unwrap());
        assert_eq!(
            authorize_bearer(&headers, "sweep-token"),
            Err(StatusCode::UNAUTHORIZED)
        );
    }
}
