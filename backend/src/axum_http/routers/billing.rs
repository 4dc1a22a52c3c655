use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use axum::{
    Json, Router,
    body::Bytes,
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    routing::post,
};
use domain::repositories::{
    identity::IdentityProvider, plans::PlanRepository, subscriptions::SubscriptionRepository,
};
use infra::{
    db::{
        postgres::postgres_connection::PgPoolSquad,
        repositories::{plans::PlanPostgres, subscriptions::SubscriptionPostgres},
    },
    identity::http_identity::HttpIdentityProvider,
    payments::stripe_client::StripeClient,
};
use serde::{Deserialize, Serialize};
use url::Url;
use uuid::Uuid;

use crate::config::config_model::DotEnvyConfig;
use crate::usecases::billing::{BillingUseCase, PaymentGateway};
use crate::usecases::errors::EngineError;

#[derive(Debug, Deserialize)]
pub struct CheckoutRequest {
    pub plan_code: String,
}

#[derive(Debug, Serialize)]
pub struct CheckoutResponse {
    pub url: String,
}

/// Declares full paths so the webhook and the per-user checkout route can
/// live under different prefixes while sharing one use-case state.
pub fn routes(db_pool: Arc<PgPoolSquad>, config: Arc<DotEnvyConfig>) -> Result<Router> {
    let identity = HttpIdentityProvider::new(
        Url::parse(&config.identity.base_url)?,
        config.identity.api_key.clone(),
        Duration::from_secs(config.identity.timeout_seconds),
    )?;

    let stripe_client = StripeClient::new(
        config.stripe.secret_key.clone(),
        config.stripe.webhook_secret.clone(),
    );

    let billing = BillingUseCase::new(
        Arc::new(PlanPostgres::new(Arc::clone(&db_pool))),
        Arc::new(SubscriptionPostgres::new(Arc::clone(&db_pool))),
        Arc::new(identity),
        Arc::new(stripe_client),
        config.stripe.success_url.clone(),
        config.stripe.cancel_url.clone(),
    );

    Ok(Router::new()
        .route("/api/v1/billing/webhook", post(stripe_webhook))
        .route(
            "/api/v1/subscriptions/:user_id/checkout",
            post(create_checkout_session),
        )
        .with_state(Arc::new(billing)))
}

pub async fn create_checkout_session<P, S, I, G>(
    State(billing): State<Arc<BillingUseCase<P, S, I, G>>>,
    Path(user_id): Path<Uuid>,
    Json(request): Json<CheckoutRequest>,
) -> Result<Json<CheckoutResponse>, EngineError>
where
    P: PlanRepository + Send + Sync + 'static,
    S: SubscriptionRepository + Send + Sync + 'static,
    I: IdentityProvider + Send + Sync + 'static,
    G: PaymentGateway + Send + Sync + 'static,
{
    let url = billing
        .create_checkout_session(user_id, &request.plan_code)
        .await?;
    Ok(Json(CheckoutResponse { url }))
}

pub async fn stripe_webhook<P, S, I, G>(
    State(billing): State<Arc<BillingUseCase<P, S, I, G>>>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<impl IntoResponse, EngineError>
where
    P: PlanRepository + Send + Sync + 'static,
    S: SubscriptionRepository + Send + Sync + 'static,
    I: IdentityProvider + Send + Sync + 'static,
    G: PaymentGateway + Send + Sync + 'static,
{
    let signature = headers
        .get("Stripe-Signature")
        .and_then(|value| value.to_str().ok())
        .ok_or(EngineError::SignatureInvalid)?;

    billing.handle_event(&body, signature).await?;
    Ok(StatusCode::OK)
}
