use axum::{
    Json, Router,
    extract::{Query, State},
    http::StatusCode,
    routing::get,
};
use serde::Deserialize;
use std::sync::Arc;
use tracing::info;

use crate::db::entities::log;
use crate::db::services::LogService;
use crate::web::{AppError, AppState};

#[derive(Debug, Deserialize)]
pub struct LogQuery {
    pub category: Option<String>,
}

pub fn log_router() -> Router<Arc<AppState>> {
    Router::new().route("/", get(list_logs).delete(clear_logs))
}

async fn list_logs(
    State(app_state): State<Arc<AppState>>,
    Query(query): Query<LogQuery>,
) -> Result<Json<Vec<log::Model>>, AppError> {
    let category = query.category.as_deref().filter(|c| !c.is_empty());
    Ok(Json(LogService::list(&app_state.db_pool, category).await?))
}

async fn clear_logs(State(app_state): State<Arc<AppState>>) -> Result<StatusCode, AppError> {
    let deleted = LogService::clear(&app_state.db_pool).await?;
    info!(deleted, "Audit log cleared.");
    Ok(StatusCode::NO_CONTENT)
}
