pub mod article_routes;
pub mod category_routes;
pub mod feed_routes;
pub mod file_routes;
pub mod language_routes;
pub mod log_routes;
pub mod task_routes;
pub mod user_routes;
pub mod website_routes;
