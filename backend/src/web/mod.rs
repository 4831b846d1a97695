use axum::{
    Json, Router,
    extract::State,
    http::{Method, StatusCode},
    middleware as axum_middleware,
    response::IntoResponse,
    routing::{get, post},
};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use sea_orm::DatabaseConnection;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};

use crate::pipeline::ArticleGenerator;
use crate::server::config::ServerConfig;
use crate::services::auth_service;
use crate::web::{
    middleware::auth,
    models::{LoginRequest, RegisterRequest},
    routes::*,
};

pub use crate::web::error::AppError;

pub mod error;
pub mod middleware;
pub mod models;
pub mod routes;

#[derive(Clone)]
pub struct AppState {
    pub db_pool: DatabaseConnection,
    pub config: Arc<ServerConfig>,
    pub generator: Arc<ArticleGenerator>,
}

async fn register_handler(
    State(app_state): State<Arc<AppState>>,
    Json(payload): Json<RegisterRequest>,
) -> Result<(StatusCode, Json<models::UserResponse>), AppError> {
    let user_response = auth_service::register_user(&app_state.db_pool, payload).await?;
    Ok((StatusCode::CREATED, Json(user_response)))
}

async fn login_handler(
    State(app_state): State<Arc<AppState>>,
    jar: CookieJar,
    Json(payload): Json<LoginRequest>,
) -> Result<impl IntoResponse, AppError> {
    let login_response =
        auth_service::login_user(&app_state.db_pool, payload, &app_state.config.jwt_secret).await?;

    let auth_cookie = Cookie::build(("token", login_response.token.clone()))
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax)
        .secure(true)
        .build();

    Ok((jar.add(auth_cookie), Json(login_response)))
}

async fn health_check_handler() -> &'static str {
    "OK"
}

pub fn create_axum_router(
    db_pool: DatabaseConnection,
    config: Arc<ServerConfig>,
    generator: Arc<ArticleGenerator>,
) -> Router {
    let app_state = Arc::new(AppState {
        db_pool,
        config,
        generator,
    });

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(vec![Method::GET, Method::POST, Method::PUT, Method::DELETE, Method::OPTIONS])
        .allow_headers(Any);

    Router::new()
        .route("/api/health", get(health_check_handler))
        .route("/api/auth/register", post(register_handler))
        .route("/api/auth/login", post(login_handler))
        .route("/api/auth/me", get(auth_service::me).route_layer(axum_middleware::from_fn_with_state(app_state.clone(), auth::auth)))
        .nest("/api/websites", website_routes::website_router().route_layer(axum_middleware::from_fn_with_state(app_state.clone(), auth::auth)))
        .nest("/api/categories", category_routes::category_router().route_layer(axum_middleware::from_fn_with_state(app_state.clone(), auth::auth)))
        .nest("/api/languages", language_routes::language_router().route_layer(axum_middleware::from_fn_with_state(app_state.clone(), auth::auth)))
        .nest("/api/tasks", task_routes::task_router().route_layer(axum_middleware::from_fn_with_state(app_state.clone(), auth::auth)))
        .nest("/api/articles", article_routes::article_router().route_layer(axum_middleware::from_fn_with_state(app_state.clone(), auth::auth)))
        .nest("/api/logs", log_routes::log_router().route_layer(axum_middleware::from_fn_with_state(app_state.clone(), auth::auth)))
        .nest(
            "/api/users",
            user_routes::user_router()
                .route_layer(axum_middleware::from_fn(auth::require_admin))
                .route_layer(axum_middleware::from_fn_with_state(app_state.clone(), auth::auth)),
        )
        .merge(feed_routes::feed_router())
        .merge(file_routes::file_router())
        .layer(cors)
        .with_state(app_state)
}
