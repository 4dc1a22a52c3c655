use std::sync::Arc;

use axum::{Json, Router, extract::State, routing::get};
use domain::{repositories::plans::PlanRepository, value_objects::plans::PlanDto};
use infra::db::{
    postgres::postgres_connection::PgPoolSquad, repositories::plans::PlanPostgres,
};

use crate::usecases::errors::EngineError;
use crate::usecases::plan_catalog::PlanCatalogUseCase;

pub fn routes(db_pool: Arc<PgPoolSquad>) -> Router {
    let plan_catalog = PlanCatalogUseCase::new(Arc::new(PlanPostgres::new(db_pool)));

    Router::new()
        .route("/", get(list_plans))
        .with_state(Arc::new(plan_catalog))
}

pub async fn list_plans<P>(
    State(plan_catalog): State<Arc<PlanCatalogUseCase<P>>>,
) -> Result<Json<Vec<PlanDto>>, EngineError>
where
    P: PlanRepository + Send + Sync + 'static,
{
    let plans = plan_catalog.list_plans().await?;
    Ok(Json(plans))
}
