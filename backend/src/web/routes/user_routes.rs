use axum::{
    Extension, Json, Router,
    extract::{Path, State},
    http::StatusCode,
    routing::{get, put},
};
use std::sync::Arc;

use crate::db::services::{LogCategory, LogService, NewUser, UserError, UserService, UserUpdate};
use crate::web::models::{AuthenticatedUser, UserResponse};
use crate::web::{AppError, AppState};

/// Admin-only account management. Layered with `auth` and `require_admin`.
pub fn user_router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/", get(list_users).post(create_user))
        .route("/{id}", put(update_user).delete(delete_user))
}

async fn list_users(
    State(app_state): State<Arc<AppState>>,
) -> Result<Json<Vec<UserResponse>>, AppError> {
    let users = UserService::list(&app_state.db_pool).await?;
    Ok(Json(users.into_iter().map(UserResponse::from).collect()))
}

async fn create_user(
    Extension(admin): Extension<AuthenticatedUser>,
    State(app_state): State<Arc<AppState>>,
    Json(payload): Json<NewUser>,
) -> Result<(StatusCode, Json<UserResponse>), AppError> {
    let created = UserService::create(&app_state.db_pool, payload).await?;
    LogService::record_quietly(
        &app_state.db_pool,
        format!("User '{}' created by '{}'", created.email, admin.email),
        LogCategory::User,
        Some(created.id),
    )
    .await;
    Ok((StatusCode::CREATED, Json(created.into())))
}

async fn update_user(
    Extension(admin): Extension<AuthenticatedUser>,
    State(app_state): State<Arc<AppState>>,
    Path(id): Path<i32>,
    Json(payload): Json<UserUpdate>,
) -> Result<Json<UserResponse>, AppError> {
    if id == admin.id && payload.is_admin == Some(false) {
        return Err(AppError::InvalidInput(
            "You cannot remove your own administrator access.".to_string(),
        ));
    }
    let updated = UserService::update(&app_state.db_pool, id, payload).await?;
    LogService::record_quietly(
        &app_state.db_pool,
        format!("User '{}' updated by '{}'", updated.email, admin.email),
        LogCategory::User,
        Some(updated.id),
    )
    .await;
    Ok(Json(updated.into()))
}

async fn delete_user(
    Extension(admin): Extension<AuthenticatedUser>,
    State(app_state): State<Arc<AppState>>,
    Path(id): Path<i32>,
) -> Result<StatusCode, AppError> {
    if id == admin.id {
        return Err(AppError::InvalidInput("You cannot delete your own account.".to_string()));
    }
    UserService::delete(&app_state.db_pool, id).await?;
    LogService::record_quietly(
        &app_state.db_pool,
        format!("User {id} deleted by '{}'", admin.email),
        LogCategory::User,
        Some(id),
    )
    .await;
    Ok(StatusCode::NO_CONTENT)
}

impl From<UserError> for AppError {
    fn from(err: UserError) -> Self {
        match err {
            UserError::DbErr(e) => AppError::DatabaseError(e.to_string()),
            UserError::NotFound(id) => AppError::NotFound(format!("User with ID {id} not found")),
            UserError::DuplicateEmail(email) => {
                AppError::Conflict(format!("A user with the email '{email}' already exists."))
            }
            UserError::InvalidInput(msg) => AppError::InvalidInput(msg),
            UserError::Hashing(e) => AppError::InternalServerError(format!("Password hashing failed: {e}")),
        }
    }
}
