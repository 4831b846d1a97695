use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::StatusCode,
    routing::get,
};
use std::sync::Arc;

use crate::db::entities::category;
use crate::db::services::{
    CategoryError, CategoryInput, CategoryService, LogCategory, LogService,
};
use crate::web::models::WebsiteQuery;
use crate::web::{AppError, AppState};

pub fn category_router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/", get(list_categories).post(create_category))
        .route(
            "/{id}",
            get(get_category).put(update_category).delete(delete_category),
        )
}

async fn list_categories(
    State(app_state): State<Arc<AppState>>,
    Query(query): Query<WebsiteQuery>,
) -> Result<Json<Vec<category::Model>>, AppError> {
    Ok(Json(
        CategoryService::list(&app_state.db_pool, query.website_id).await?,
    ))
}

async fn create_category(
    State(app_state): State<Arc<AppState>>,
    Json(payload): Json<CategoryInput>,
) -> Result<(StatusCode, Json<category::Model>), AppError> {
    let created = CategoryService::create(&app_state.db_pool, payload).await?;
    LogService::record_quietly(
        &app_state.db_pool,
        format!("Category '{}' created", created.name),
        LogCategory::Category,
        Some(created.id),
    )
    .await;
    Ok((StatusCode::CREATED, Json(created)))
}

async fn get_category(
    State(app_state): State<Arc<AppState>>,
    Path(id): Path<i32>,
) -> Result<Json<category::Model>, AppError> {
    Ok(Json(CategoryService::get(&app_state.db_pool, id).await?))
}

async fn update_category(
    State(app_state): State<Arc<AppState>>,
    Path(id): Path<i32>,
    Json(payload): Json<CategoryInput>,
) -> Result<Json<category::Model>, AppError> {
    let updated = CategoryService::update(&app_state.db_pool, id, payload).await?;
    LogService::record_quietly(
        &app_state.db_pool,
        format!("Category '{}' updated", updated.name),
        LogCategory::Category,
        Some(updated.id),
    )
    .await;
    Ok(Json(updated))
}

async fn delete_category(
    State(app_state): State<Arc<AppState>>,
    Path(id): Path<i32>,
) -> Result<StatusCode, AppError> {
    let deleted = CategoryService::delete(&app_state.db_pool, id).await?;
    LogService::record_quietly(
        &app_state.db_pool,
        format!(
            "Category {id} deleted with {} descendant(s), {} website(s) updated",
            deleted.deleted_ids.len().saturating_sub(1),
            deleted.websites_updated
        ),
        LogCategory::Category,
        Some(id),
    )
    .await;
    Ok(StatusCode::NO_CONTENT)
}

impl From<CategoryError> for AppError {
    fn from(err: CategoryError) -> Self {
        match err {
            CategoryError::DbErr(e) => AppError::DatabaseError(e.to_string()),
            CategoryError::NotFound(id) => {
                AppError::NotFound(format!("Category with ID {id} not found"))
            }
            CategoryError::InvalidInput(msg) => AppError::InvalidInput(msg),
            CategoryError::Website(e) => e.into(),
        }
    }
}
