use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post},
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::db::entities::task;
use crate::db::services::{LogCategory, LogService, TaskError, TaskInput, TaskService};
use crate::db::types::FeedItemMapping;
use crate::pipeline::feed::map_item;
use crate::pipeline::{FeedError, FeedItem, GeneratorError, RunSummary, RunTrigger};
use crate::web::{AppError, AppState};

const DEFAULT_PREVIEW_LIMIT: usize = 5;

pub fn task_router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/", get(list_tasks).post(create_task))
        .route("/preview", post(preview_feed))
        .route("/{id}", get(get_task).put(update_task).delete(delete_task))
        .route("/{id}/run", post(run_task))
}

async fn list_tasks(
    State(app_state): State<Arc<AppState>>,
) -> Result<Json<Vec<task::Model>>, AppError> {
    Ok(Json(TaskService::list(&app_state.db_pool).await?))
}

async fn create_task(
    State(app_state): State<Arc<AppState>>,
    Json(payload): Json<TaskInput>,
) -> Result<(StatusCode, Json<task::Model>), AppError> {
    let created = TaskService::create(&app_state.db_pool, payload).await?;
    LogService::record_quietly(
        &app_state.db_pool,
        format!("Task for feed '{}' created", created.feed_url),
        LogCategory::Task,
        Some(created.id),
    )
    .await;
    Ok((StatusCode::CREATED, Json(created)))
}

async fn get_task(
    State(app_state): State<Arc<AppState>>,
    Path(id): Path<i32>,
) -> Result<Json<task::Model>, AppError> {
    Ok(Json(TaskService::get(&app_state.db_pool, id).await?))
}

async fn update_task(
    State(app_state): State<Arc<AppState>>,
    Path(id): Path<i32>,
    Json(payload): Json<TaskInput>,
) -> Result<Json<task::Model>, AppError> {
    let updated = TaskService::update(&app_state.db_pool, id, payload).await?;
    LogService::record_quietly(
        &app_state.db_pool,
        format!("Task for feed '{}' updated", updated.feed_url),
        LogCategory::Task,
        Some(updated.id),
    )
    .await;
    Ok(Json(updated))
}

async fn delete_task(
    State(app_state): State<Arc<AppState>>,
    Path(id): Path<i32>,
) -> Result<StatusCode, AppError> {
    TaskService::delete(&app_state.db_pool, id).await?;
    LogService::record_quietly(
        &app_state.db_pool,
        format!("Task {id} deleted"),
        LogCategory::Task,
        Some(id),
    )
    .await;
    Ok(StatusCode::NO_CONTENT)
}

async fn run_task(
    State(app_state): State<Arc<AppState>>,
    Path(id): Path<i32>,
) -> Result<Json<RunSummary>, AppError> {
    let summary = app_state.generator.run_task(id, RunTrigger::Manual).await?;
    LogService::record_quietly(
        &app_state.db_pool,
        format!(
            "Task {id} run manually: {} article(s) generated",
            summary.articles.len()
        ),
        LogCategory::Task,
        Some(id),
    )
    .await;
    Ok(Json(summary))
}

#[derive(Debug, Deserialize)]
pub struct PreviewRequest {
    pub feed_url: String,
    #[serde(default)]
    pub item_mapping: FeedItemMapping,
    pub limit: Option<usize>,
}

#[derive(Debug, Serialize)]
pub struct PreviewResponse {
    pub channel_title: String,
    pub items: Vec<FeedItem>,
}

/// Fetches a feed so an operator can see its items and the field keys a mapping can use.
async fn preview_feed(
    State(app_state): State<Arc<AppState>>,
    Json(payload): Json<PreviewRequest>,
) -> Result<Json<PreviewResponse>, AppError> {
    let feed_url = payload.feed_url.trim();
    if !(feed_url.starts_with("http://") || feed_url.starts_with("https://")) {
        return Err(AppError::InvalidInput("feed_url must be an http(s) URL".to_string()));
    }
    let fetcher = app_state.generator.fetcher();
    let channel = fetcher.fetch_channel(feed_url).await?;
    let limit = payload.limit.unwrap_or(DEFAULT_PREVIEW_LIMIT);
    let items = channel
        .items()
        .iter()
        .take(limit)
        .map(|item| map_item(item, &payload.item_mapping))
        .collect();
    Ok(Json(PreviewResponse {
        channel_title: channel.title().to_string(),
        items,
    }))
}

impl From<TaskError> for AppError {
    fn from(err: TaskError) -> Self {
        match err {
            TaskError::DbErr(e) => AppError::DatabaseError(e.to_string()),
            TaskError::NotFound(id) => AppError::NotFound(format!("Task with ID {id} not found")),
            TaskError::InvalidInput(msg) => AppError::InvalidInput(msg),
            TaskError::AlreadyActive(feed_url) => {
                AppError::Conflict(format!("A task for feed '{feed_url}' is already running."))
            }
        }
    }
}

impl From<FeedError> for AppError {
    fn from(err: FeedError) -> Self {
        AppError::BadGateway(err.to_string())
    }
}

impl From<GeneratorError> for AppError {
    fn from(err: GeneratorError) -> Self {
        match err {
            GeneratorError::InvalidInput(msg) => AppError::InvalidInput(msg),
            GeneratorError::EmptyFeed(url) => AppError::NotFound(format!("Feed '{url}' has no items")),
            GeneratorError::Feed(e) => e.into(),
            GeneratorError::Task(e) => e.into(),
            GeneratorError::Website(e) => e.into(),
            GeneratorError::Category(e) => e.into(),
        }
    }
}
