use axum::{Extension, Json, extract::State};
use bcrypt::verify;
use chrono::{Duration, Utc};
use jsonwebtoken::{EncodingKey, Header, encode};
use sea_orm::DatabaseConnection;
use std::sync::Arc;

use crate::db::entities::user;
use crate::db::services::{LogCategory, LogService, NewUser, UserService};
use crate::web::AppState;
use crate::web::error::AppError;
use crate::web::models::{
    AuthenticatedUser, Claims, LoginRequest, LoginResponse, RegisterRequest, UserResponse,
};

/// Creates the first account, which is always an administrator. Once any user exists
/// registration is closed and further accounts are created by an admin.
pub async fn register_user(
    pool: &DatabaseConnection,
    req: RegisterRequest,
) -> Result<UserResponse, AppError> {
    if UserService::count(pool).await? > 0 {
        return Err(AppError::Forbidden(
            "Registration is closed. Ask an administrator for an account.".to_string(),
        ));
    }

    let user_model = UserService::create(
        pool,
        NewUser {
            email: req.email,
            password: req.password,
            is_admin: true,
        },
    )
    .await?;

    LogService::record_quietly(
        pool,
        format!("Administrator account '{}' registered", user_model.email),
        LogCategory::Auth,
        Some(user_model.id),
    )
    .await;
    Ok(user_model.into())
}

pub async fn login_user(
    pool: &DatabaseConnection,
    req: LoginRequest,
    jwt_secret: &str,
) -> Result<LoginResponse, AppError> {
    if req.email.trim().is_empty() || req.password.is_empty() {
        return Err(AppError::InvalidInput(
            "Email and password must not be empty.".to_string(),
        ));
    }

    let user = UserService::find_by_email(pool, &req.email)
        .await?
        .ok_or(AppError::InvalidCredentials)?;

    let valid_password = verify(&req.password, &user.password_hash).map_err(|e| {
        AppError::InternalServerError(format!("Error while verifying password: {e}"))
    })?;
    if !valid_password {
        return Err(AppError::InvalidCredentials);
    }

    LogService::record_quietly(
        pool,
        format!("User '{}' logged in", user.email),
        LogCategory::Auth,
        Some(user.id),
    )
    .await;
    create_jwt_for_user(user, jwt_secret)
}

pub fn create_jwt_for_user(user: user::Model, jwt_secret: &str) -> Result<LoginResponse, AppError> {
    let now = Utc::now();
    // Token valid for 24 hours
    let expiration = (now + Duration::hours(24)).timestamp() as usize;

    let claims = Claims {
        sub: user.email.clone(),
        user_id: user.id,
        exp: expiration,
    };

    let token = encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(jwt_secret.as_ref()),
    )
    .map_err(|e| AppError::InternalServerError(format!("Failed to create token: {e}")))?;

    Ok(LoginResponse {
        token,
        user: user.into(),
    })
}

pub async fn me(
    Extension(user): Extension<AuthenticatedUser>,
    State(app_state): State<Arc<AppState>>,
) -> Result<Json<UserResponse>, AppError> {
    let user_model = UserService::get(&app_state.db_pool, user.id).await?;
    Ok(Json(user_model.into()))
}
