use axum::{
    Router,
    extract::{Path, State},
    http::header,
    response::IntoResponse,
    routing::get,
};
use std::path::Path as FsPath;
use std::sync::Arc;

use crate::services::upload_service::{self, UPLOADS_PREFIX};
use crate::web::{AppError, AppState};

/// Serves stored uploads. Mounted without the auth layer.
pub fn file_router() -> Router<Arc<AppState>> {
    Router::new().route(&format!("{UPLOADS_PREFIX}/{{*path}}"), get(serve_upload))
}

async fn serve_upload(
    State(app_state): State<Arc<AppState>>,
    Path(path): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let upload_dir = FsPath::new(&app_state.config.upload_dir);
    let (bytes, mime) = upload_service::read_upload(upload_dir, &path).await?;
    Ok(([(header::CONTENT_TYPE, mime)], bytes))
}
