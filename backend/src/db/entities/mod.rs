//! SeaORM entities, one module per table.

pub mod article;
pub mod category;
pub mod language;
pub mod log;
pub mod task;
pub mod user;
pub mod website;

pub mod prelude {
    pub use super::article::Entity as Article;
    pub use super::article::Model as ArticleModel;
    pub use super::article::ActiveModel as ArticleActiveModel;
    pub use super::article::Column as ArticleColumn;

    pub use super::category::Entity as Category;
    pub use super::category::Model as CategoryModel;
    pub use super::category::ActiveModel as CategoryActiveModel;
    pub use super::category::Column as CategoryColumn;

    pub use super::language::Entity as Language;
    pub use super::language::Model as LanguageModel;
    pub use super::language::ActiveModel as LanguageActiveModel;
    pub use super::language::Column as LanguageColumn;

    pub use super::log::Entity as Log;
    pub use super::log::Model as LogModel;
    pub use super::log::ActiveModel as LogActiveModel;
    pub use super::log::Column as LogColumn;

    pub use super::task::Entity as Task;
    pub use super::task::Model as TaskModel;
    pub use super::task::ActiveModel as TaskActiveModel;
    pub use super::task::Column as TaskColumn;

    pub use super::user::Entity as User;
    pub use super::user::Model as UserModel;
    pub use super::user::ActiveModel as UserActiveModel;
    pub use super::user::Column as UserColumn;

    pub use super::website::Entity as Website;
    pub use super::website::Model as WebsiteModel;
    pub use super::website::ActiveModel as WebsiteActiveModel;
    pub use super::website::Column as WebsiteColumn;
}
