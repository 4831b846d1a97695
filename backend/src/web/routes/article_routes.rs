use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, post},
};
use std::sync::Arc;

use crate::db::entities::article;
use crate::db::services::{
    ArticleError, ArticleFilter, ArticleService, ArticleUpdate, LogCategory, LogService,
};
use crate::pipeline::{GenerateRequest, GenerateResult, VariantOutcome};
use crate::web::{AppError, AppState};

pub fn article_router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/", get(list_articles))
        .route("/generate", post(generate_articles))
        .route(
            "/{id}",
            get(get_article).put(update_article).delete(delete_article),
        )
}

async fn list_articles(
    State(app_state): State<Arc<AppState>>,
    Query(filter): Query<ArticleFilter>,
) -> Result<Json<Vec<article::Model>>, AppError> {
    Ok(Json(ArticleService::list(&app_state.db_pool, filter).await?))
}

async fn get_article(
    State(app_state): State<Arc<AppState>>,
    Path(id): Path<i32>,
) -> Result<Json<article::Model>, AppError> {
    Ok(Json(ArticleService::get(&app_state.db_pool, id).await?))
}

async fn update_article(
    State(app_state): State<Arc<AppState>>,
    Path(id): Path<i32>,
    Json(payload): Json<ArticleUpdate>,
) -> Result<Json<article::Model>, AppError> {
    if payload.title.trim().is_empty() {
        return Err(AppError::InvalidInput("title is required".to_string()));
    }
    let updated = ArticleService::update(&app_state.db_pool, id, payload).await?;
    LogService::record_quietly(
        &app_state.db_pool,
        format!("Article '{}' edited", updated.title),
        LogCategory::Article,
        Some(updated.id),
    )
    .await;
    Ok(Json(updated))
}

async fn delete_article(
    State(app_state): State<Arc<AppState>>,
    Path(id): Path<i32>,
) -> Result<StatusCode, AppError> {
    ArticleService::delete(&app_state.db_pool, id).await?;
    LogService::record_quietly(
        &app_state.db_pool,
        format!("Article {id} deleted"),
        LogCategory::Article,
        Some(id),
    )
    .await;
    Ok(StatusCode::NO_CONTENT)
}

/// Runs the pipeline for one feed item on the request path. Variants whose rewrite
/// call failed come back as `failed` placeholders; the request itself still succeeds.
async fn generate_articles(
    State(app_state): State<Arc<AppState>>,
    Json(payload): Json<GenerateRequest>,
) -> Result<(StatusCode, Json<GenerateResult>), AppError> {
    let result = app_state.generator.generate_from_feed(payload).await?;
    let generated = result
        .variants
        .iter()
        .filter(|variant| matches!(variant, VariantOutcome::Generated { .. }))
        .count();
    LogService::record_quietly(
        &app_state.db_pool,
        format!(
            "Generated {generated} of {} requested article(s) from '{}'",
            result.variants.len(),
            result.item_link
        ),
        LogCategory::Article,
        None,
    )
    .await;
    Ok((StatusCode::CREATED, Json(result)))
}

impl From<ArticleError> for AppError {
    fn from(err: ArticleError) -> Self {
        match err {
            ArticleError::DbErr(e) => AppError::DatabaseError(e.to_string()),
            ArticleError::NotFound(id) => {
                AppError::NotFound(format!("Article with ID {id} not found"))
            }
        }
    }
}
