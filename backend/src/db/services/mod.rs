//! The `services` module wraps every query the HTTP handlers and the pipeline need.
//! Each sub-module owns one entity and exposes a stateless `*Service` type plus the
//! input structs and error enum for that entity.

pub mod article_service;
pub mod category_service;
pub mod language_service;
pub mod log_service;
pub mod task_service;
pub mod user_service;
pub mod website_service;

pub use article_service::{ArticleError, ArticleFilter, ArticleService, ArticleUpdate, NewArticle};
pub use category_service::{CategoryError, CategoryInput, CategoryService, DeletedCategories};
pub use language_service::{LanguageError, LanguageInput, LanguageService};
pub use log_service::{LogCategory, LogService};
pub use task_service::{TaskError, TaskInput, TaskService};
pub use user_service::{NewUser, UserError, UserService, UserUpdate};
pub use website_service::{WebsiteError, WebsiteInput, WebsiteService};
