use std::sync::Arc;

use anyhow::Result;
use backend::axum_http::http_serve;
use backend::config::config_loader;
use backend::usecases::plan_catalog::PlanCatalogUseCase;
use infra::db::postgres::postgres_connection;
use infra::db::repositories::plans::PlanPostgres;
use tracing::{error, info};

#[tokio::main]
async fn main() {
    if let Err(error) = run().await {
        error!("Backend exited with error: {}", error);
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    dotenvy::dotenv().ok();
    observability::init_observability("backend")?;

    let dotenvy_env = config_loader::load()?;
    info!("ENV has been loaded");

    let postgres_pool = postgres_connection::establish_connection(&dotenvy_env.database.url)?;
    info!("Postgres connection has been established");

    let postgres_pool = Arc::new(postgres_pool);

    let plan_catalog =
        PlanCatalogUseCase::new(Arc::new(PlanPostgres::new(Arc::clone(&postgres_pool))));
    plan_catalog.seed_default_plans().await?;
    info!("Plan catalog has been seeded");

    http_serve::start(Arc::new(dotenvy_env), postgres_pool).await?;

    Ok(())
}
