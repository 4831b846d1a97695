use axum::{
    Json, Router,
    extract::{Multipart, Path, State},
    http::StatusCode,
    routing::{get, post},
};
use std::path::Path as FsPath;
use std::sync::Arc;
use tracing::{info, warn};

use crate::db::entities::website;
use crate::db::services::{LogCategory, LogService, WebsiteError, WebsiteInput, WebsiteService};
use crate::services::upload_service::{self, UploadError};
use crate::web::{AppError, AppState};

pub fn website_router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/", get(list_websites).post(create_website))
        .route(
            "/{id}",
            get(get_website).put(update_website).delete(delete_website),
        )
        .route("/{id}/thumbnail", post(upload_thumbnail))
}

async fn list_websites(
    State(app_state): State<Arc<AppState>>,
) -> Result<Json<Vec<website::Model>>, AppError> {
    Ok(Json(WebsiteService::list(&app_state.db_pool).await?))
}

async fn create_website(
    State(app_state): State<Arc<AppState>>,
    Json(payload): Json<WebsiteInput>,
) -> Result<(StatusCode, Json<website::Model>), AppError> {
    let site = WebsiteService::create(&app_state.db_pool, payload).await?;
    LogService::record_quietly(
        &app_state.db_pool,
        format!("Website '{}' created", site.name),
        LogCategory::Website,
        Some(site.id),
    )
    .await;
    Ok((StatusCode::CREATED, Json(site)))
}

async fn get_website(
    State(app_state): State<Arc<AppState>>,
    Path(id): Path<i32>,
) -> Result<Json<website::Model>, AppError> {
    Ok(Json(WebsiteService::get(&app_state.db_pool, id).await?))
}

async fn update_website(
    State(app_state): State<Arc<AppState>>,
    Path(id): Path<i32>,
    Json(payload): Json<WebsiteInput>,
) -> Result<Json<website::Model>, AppError> {
    let site = WebsiteService::update(&app_state.db_pool, id, payload).await?;
    LogService::record_quietly(
        &app_state.db_pool,
        format!("Website '{}' updated", site.name),
        LogCategory::Website,
        Some(site.id),
    )
    .await;
    Ok(Json(site))
}

async fn delete_website(
    State(app_state): State<Arc<AppState>>,
    Path(id): Path<i32>,
) -> Result<StatusCode, AppError> {
    let deleted = WebsiteService::delete(&app_state.db_pool, id).await?;
    if let Some(thumbnail) = deleted.thumbnail.as_deref() {
        let upload_dir = FsPath::new(&app_state.config.upload_dir);
        if let Err(e) = upload_service::remove_public_file(upload_dir, thumbnail).await {
            warn!(website_id = id, error = %e, "Failed to remove website thumbnail.");
        }
    }
    LogService::record_quietly(
        &app_state.db_pool,
        format!("Website '{}' deleted", deleted.name),
        LogCategory::Website,
        Some(id),
    )
    .await;
    Ok(StatusCode::NO_CONTENT)
}

/// Expects a multipart body with a `file` part holding an image.
async fn upload_thumbnail(
    State(app_state): State<Arc<AppState>>,
    Path(id): Path<i32>,
    mut multipart: Multipart,
) -> Result<Json<website::Model>, AppError> {
    let site = WebsiteService::get(&app_state.db_pool, id).await?;
    let upload_dir = FsPath::new(&app_state.config.upload_dir);

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::InvalidInput(format!("Malformed multipart body: {e}")))?
    {
        if field.name() != Some("file") {
            continue;
        }
        let file_name = field.file_name().map(str::to_string);
        let content_type = field.content_type().map(str::to_string);
        let bytes = field
            .bytes()
            .await
            .map_err(|e| AppError::InvalidInput(format!("Failed to read upload: {e}")))?;

        let stored = upload_service::store_thumbnail(
            upload_dir,
            &site.slug,
            file_name.as_deref(),
            content_type.as_deref(),
            &bytes,
        )
        .await?;
        let previous = site.thumbnail.clone();
        let updated =
            WebsiteService::set_thumbnail(&app_state.db_pool, id, stored.public_path).await?;
        if let Some(previous) = previous.as_deref() {
            if let Err(e) = upload_service::remove_public_file(upload_dir, previous).await {
                warn!(website_id = id, error = %e, "Failed to remove previous thumbnail.");
            }
        }

        info!(website_id = id, path = %stored.relative_path, "Website thumbnail stored.");
        LogService::record_quietly(
            &app_state.db_pool,
            format!("Thumbnail uploaded for website '{}'", updated.name),
            LogCategory::Website,
            Some(id),
        )
        .await;
        return Ok(Json(updated));
    }

    Err(AppError::InvalidInput("A 'file' field is required".to_string()))
}

impl From<WebsiteError> for AppError {
    fn from(err: WebsiteError) -> Self {
        match err {
            WebsiteError::DbErr(e) => AppError::DatabaseError(e.to_string()),
            WebsiteError::NotFound(id) => AppError::NotFound(format!("Website with ID {id} not found")),
            WebsiteError::DuplicateSlug(slug) => {
                AppError::Conflict(format!("A website with the slug '{slug}' already exists."))
            }
            WebsiteError::InvalidInput(msg) => AppError::InvalidInput(msg),
        }
    }
}

impl From<UploadError> for AppError {
    fn from(err: UploadError) -> Self {
        match err {
            UploadError::InvalidFile(msg) => AppError::InvalidInput(msg),
            UploadError::InvalidPath => AppError::InvalidInput("Invalid path".to_string()),
            UploadError::NotFound => AppError::NotFound("File not found".to_string()),
            UploadError::Io(e) => AppError::InternalServerError(e.to_string()),
        }
    }
}
