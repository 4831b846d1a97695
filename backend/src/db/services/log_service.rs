use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DbConn, DbErr, EntityTrait, QueryFilter, QueryOrder, Set,
};
use tracing::warn;

use crate::db::entities::{log, prelude::Log};

/// Tag stored in the `category` column of an audit entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogCategory {
    Auth,
    Website,
    Category,
    Language,
    Task,
    Article,
    User,
    Generation,
    Quota,
}

impl LogCategory {
    pub fn as_str(self) -> &'static str {
        match self {
            LogCategory::Auth => "auth",
            LogCategory::Website => "website",
            LogCategory::Category => "category",
            LogCategory::Language => "language",
            LogCategory::Task => "task",
            LogCategory::Article => "article",
            LogCategory::User => "user",
            LogCategory::Generation => "generation",
            LogCategory::Quota => "quota",
        }
    }
}

pub struct LogService;

impl LogService {
    pub async fn record(
        db: &DbConn,
        message: impl Into<String>,
        category: LogCategory,
        entity_id: Option<i32>,
    ) -> Result<log::Model, DbErr> {
        let entry = log::ActiveModel {
            message: Set(message.into()),
            category: Set(category.as_str().to_string()),
            entity_id: Set(entity_id),
            created_at: Set(Utc::now()),
            ..Default::default()
        };
        entry.insert(db).await
    }

    /// Like [`LogService::record`], but a failed insert is only traced. Used where the
    /// audit entry must not change the outcome of the request.
    pub async fn record_quietly(
        db: &DbConn,
        message: impl Into<String>,
        category: LogCategory,
        entity_id: Option<i32>,
    ) {
        if let Err(e) = Self::record(db, message, category, entity_id).await {
            warn!(error = %e, category = category.as_str(), "Failed to write audit log entry.");
        }
    }

    /// Newest first, optionally restricted to one category.
    pub async fn list(db: &DbConn, category: Option<&str>) -> Result<Vec<log::Model>, DbErr> {
        let mut query = Log::find().order_by_desc(log::Column::Id);
        if let Some(category) = category {
            query = query.filter(log::Column::Category.eq(category));
        }
        query.all(db).await
    }

    pub async fn clear(db: &DbConn) -> Result<u64, DbErr> {
        Ok(Log::delete_many().exec(db).await?.rows_affected)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::test_connection;

    #[tokio::test]
    async fn test_list_filters_and_orders_newest_first() {
        let db = test_connection().await;
        LogService::record(&db, "website created", LogCategory::Website, Some(1)).await.unwrap();
        LogService::record(&db, "quota hit", LogCategory::Quota, None).await.unwrap();
        LogService::record(&db, "website updated", LogCategory::Website, Some(1)).await.unwrap();

        let all = LogService::list(&db, None).await.unwrap();
        assert_eq!(all.len(), 3);
        assert_eq!(all[0].message, "website updated");

        let websites = LogService::list(&db, Some("website")).await.unwrap();
        assert_eq!(websites.len(), 2);
        assert!(websites.iter().all(|entry| entry.category == "website"));

        assert_eq!(LogService::clear(&db).await.unwrap(), 3);
        assert!(LogService::list(&db, None).await.unwrap().is_empty());
    }
}
