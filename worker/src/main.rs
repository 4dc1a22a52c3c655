use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use backend::usecases::subscription_lifecycle::SubscriptionLifecycleUseCase;
use domain::repositories::{notifier::ExpiryNotifier, run_audits::RunAuditRepository};
use infra::{
    db::{
        postgres::postgres_connection,
        repositories::{
            plans::PlanPostgres, run_audits::RunAuditPostgres,
            subscriptions::SubscriptionPostgres,
        },
    },
    identity::http_identity::HttpIdentityProvider,
    notify::webhook_notifier::WebhookExpiryNotifier,
};
use tracing::{error, info, warn};
use url::Url;
use worker::{
    axum_http, config, services,
    usecases::expire_due_subscriptions::ExpireDueSubscriptionsUseCase,
};

#[tokio::main]
async fn main() -> Result<()> {
    if let Err(error) = run().await {
        error!("Worker exited with error: {}", error);
        std::process::exit(1);
    }
    Ok(())
}

async fn run() -> Result<()> {
    dotenvy::dotenv().ok();
    observability::init_observability("worker")?;

    let dotenvy_env = Arc::new(config::config_loader::load()?);
    info!("ENV has been loaded");

    let postgres_pool = postgres_connection::establish_connection(&dotenvy_env.database.url)?;
    info!("Postgres connection has been established");

    let db_pool_arc = Arc::new(postgres_pool);

    let plan_repository = Arc::new(PlanPostgres::new(Arc::clone(&db_pool_arc)));
    let subscription_repository = Arc::new(SubscriptionPostgres::new(Arc::clone(&db_pool_arc)));
    let audit_repository: Arc<dyn RunAuditRepository + Send + Sync> =
        Arc::new(RunAuditPostgres::new(Arc::clone(&db_pool_arc)));

    let identity = Arc::new(HttpIdentityProvider::new(
        Url::parse(&dotenvy_env.identity.base_url)?,
        dotenvy_env.identity.api_key.clone(),
        Duration::from_secs(dotenvy_env.identity.timeout_seconds),
    )?);

    let notifier: Option<Arc<dyn ExpiryNotifier + Send + Sync>> =
        match dotenvy_env.notifier.webhook_url.as_deref() {
            Some(raw_url) => Some(Arc::new(WebhookExpiryNotifier::new(Url::parse(raw_url)?))),
            None => {
                warn!("EXPIRY_NOTIFY_WEBHOOK_URL not set; expiry notifications disabled");
                None
            }
        };

    let lifecycle = Arc::new(SubscriptionLifecycleUseCase::new(
        Arc::clone(&plan_repository),
        Arc::clone(&subscription_repository),
        Arc::clone(&identity),
    ));

    let sweep_usecase = Arc::new(ExpireDueSubscriptionsUseCase::new(
        lifecycle,
        plan_repository,
        subscription_repository,
        identity,
        audit_repository,
        notifier,
    ));

    let loop_usecase = Arc::clone(&sweep_usecase);
    let sweep_interval = Duration::from_secs(dotenvy_env.sweep.interval_seconds);
    let batch_limit = dotenvy_env.sweep.batch_limit;
    let sweep_loop = tokio::spawn(services::sweep_loop::run(
        loop_usecase,
        sweep_interval,
        batch_limit,
    ));

    let server_config = Arc::clone(&dotenvy_env);
    let server_usecase = Arc::clone(&sweep_usecase);
    let sweep_server =
        tokio::spawn(
            async move { axum_http::http_serve::start(server_config, server_usecase).await },
        );

    tokio::select! {
        result = sweep_loop => result??,
        result = sweep_server => result??,
    };

    Ok(())
}
