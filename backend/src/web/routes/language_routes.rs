use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    routing::get,
};
use std::sync::Arc;

use crate::db::entities::language;
use crate::db::services::{LanguageError, LanguageInput, LanguageService, LogCategory, LogService};
use crate::web::{AppError, AppState};

pub fn language_router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/", get(list_languages).post(create_language))
        .route(
            "/{id}",
            get(get_language).put(update_language).delete(delete_language),
        )
}

async fn list_languages(
    State(app_state): State<Arc<AppState>>,
) -> Result<Json<Vec<language::Model>>, AppError> {
    Ok(Json(LanguageService::list(&app_state.db_pool).await?))
}

async fn create_language(
    State(app_state): State<Arc<AppState>>,
    Json(payload): Json<LanguageInput>,
) -> Result<(StatusCode, Json<language::Model>), AppError> {
    let created = LanguageService::create(&app_state.db_pool, payload).await?;
    LogService::record_quietly(
        &app_state.db_pool,
        format!("Language '{}' ({}) created", created.name, created.code),
        LogCategory::Language,
        Some(created.id),
    )
    .await;
    Ok((StatusCode::CREATED, Json(created)))
}

async fn get_language(
    State(app_state): State<Arc<AppState>>,
    Path(id): Path<i32>,
) -> Result<Json<language::Model>, AppError> {
    Ok(Json(LanguageService::get(&app_state.db_pool, id).await?))
}

async fn update_language(
    State(app_state): State<Arc<AppState>>,
    Path(id): Path<i32>,
    Json(payload): Json<LanguageInput>,
) -> Result<Json<language::Model>, AppError> {
    let updated = LanguageService::update(&app_state.db_pool, id, payload).await?;
    LogService::record_quietly(
        &app_state.db_pool,
        format!("Language '{}' updated", updated.code),
        LogCategory::Language,
        Some(updated.id),
    )
    .await;
    Ok(Json(updated))
}

async fn delete_language(
    State(app_state): State<Arc<AppState>>,
    Path(id): Path<i32>,
) -> Result<StatusCode, AppError> {
    LanguageService::delete(&app_state.db_pool, id).await?;
    LogService::record_quietly(
        &app_state.db_pool,
        format!("Language {id} deleted"),
        LogCategory::Language,
        Some(id),
    )
    .await;
    Ok(StatusCode::NO_CONTENT)
}

impl From<LanguageError> for AppError {
    fn from(err: LanguageError) -> Self {
        match err {
            LanguageError::DbErr(e) => AppError::DatabaseError(e.to_string()),
            LanguageError::NotFound(id) => {
                AppError::NotFound(format!("Language with ID {id} not found"))
            }
            LanguageError::DuplicateCode(code) => {
                AppError::Conflict(format!("A language with the code '{code}' already exists."))
            }
            LanguageError::InvalidInput(msg) => AppError::InvalidInput(msg),
        }
    }
}
