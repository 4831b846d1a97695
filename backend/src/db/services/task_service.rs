use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DbConn, DbErr, EntityTrait, ModelTrait, QueryFilter, QueryOrder,
    Set, sea_query::Expr,
};
use serde::Deserialize;

use crate::db::entities::{
    prelude::Task,
    task::{self, TaskStatus},
};
use crate::db::types::{FeedConfig, FeedItemMapping};

/// Upper bound on variants per feed item for a single run.
pub const MAX_ARTICLE_COUNT: u32 = 10;

#[derive(Debug, thiserror::Error)]
pub enum TaskError {
    #[error("Database error: {0}")]
    DbErr(#[from] DbErr),
    #[error("Task not found: {0}")]
    NotFound(i32),
    #[error("Invalid task: {0}")]
    InvalidInput(String),
    #[error("A task for feed '{0}' is already running.")]
    AlreadyActive(String),
}

#[derive(Debug, Clone, Deserialize)]
pub struct TaskInput {
    pub feed_url: String,
    #[serde(default)]
    pub item_mapping: FeedItemMapping,
    #[serde(default)]
    pub feed_config: FeedConfig,
}

impl TaskInput {
    fn validate(&self) -> Result<(), TaskError> {
        let feed_url = self.feed_url.trim();
        if feed_url.is_empty() {
            return Err(TaskError::InvalidInput("feed_url is required".to_string()));
        }
        if !(feed_url.starts_with("http://") || feed_url.starts_with("https://")) {
            return Err(TaskError::InvalidInput("feed_url must be an http(s) URL".to_string()));
        }
        if self.feed_config.article_count == 0 || self.feed_config.article_count > MAX_ARTICLE_COUNT {
            return Err(TaskError::InvalidInput(format!(
                "article_count must be between 1 and {MAX_ARTICLE_COUNT}"
            )));
        }
        if self.feed_config.languages.is_empty() {
            return Err(TaskError::InvalidInput("at least one language must be selected".to_string()));
        }
        Ok(())
    }
}

pub struct TaskService;

impl TaskService {
    pub async fn create(db: &DbConn, input: TaskInput) -> Result<task::Model, TaskError> {
        input.validate()?;
        let feed_url = input.feed_url.trim().to_string();
        Self::ensure_feed_not_running(db, &feed_url, None).await?;

        let now = Utc::now();
        let new_task = task::ActiveModel {
            feed_url: Set(feed_url),
            item_mapping: Set(input.item_mapping),
            feed_config: Set(input.feed_config),
            status: Set(TaskStatus::Idle),
            last_item_link: Set(None),
            last_run_at: Set(None),
            created_at: Set(now),
            updated_at: Set(now),
            ..Default::default()
        };
        Ok(new_task.insert(db).await?)
    }

    pub async fn list(db: &DbConn) -> Result<Vec<task::Model>, TaskError> {
        Ok(Task::find().order_by_asc(task::Column::Id).all(db).await?)
    }

    pub async fn list_idle(db: &DbConn) -> Result<Vec<task::Model>, TaskError> {
        Ok(Task::find()
            .filter(task::Column::Status.eq(TaskStatus::Idle))
            .order_by_asc(task::Column::Id)
            .all(db)
            .await?)
    }

    pub async fn get(db: &DbConn, task_id: i32) -> Result<task::Model, TaskError> {
        Task::find_by_id(task_id)
            .one(db)
            .await?
            .ok_or(TaskError::NotFound(task_id))
    }

    pub async fn update(db: &DbConn, task_id: i32, input: TaskInput) -> Result<task::Model, TaskError> {
        input.validate()?;
        let existing = Self::get(db, task_id).await?;
        if existing.status != TaskStatus::Idle {
            return Err(TaskError::AlreadyActive(existing.feed_url));
        }
        let feed_url = input.feed_url.trim().to_string();
        Self::ensure_feed_not_running(db, &feed_url, Some(task_id)).await?;

        let feed_changed = feed_url != existing.feed_url;
        let mut active: task::ActiveModel = existing.into();
        active.feed_url = Set(feed_url);
        active.item_mapping = Set(input.item_mapping);
        active.feed_config = Set(input.feed_config);
        if feed_changed {
            active.last_item_link = Set(None);
        }
        active.updated_at = Set(Utc::now());
        Ok(active.update(db).await?)
    }

    pub async fn delete(db: &DbConn, task_id: i32) -> Result<(), TaskError> {
        let existing = Self::get(db, task_id).await?;
        if existing.status != TaskStatus::Idle {
            return Err(TaskError::AlreadyActive(existing.feed_url));
        }
        existing.delete(db).await?;
        Ok(())
    }

    /// Moves an idle task to `running`. Fails with `AlreadyActive` when any task for
    /// the same feed URL is running, or when this task left `idle` in the meantime.
    pub async fn try_mark_running(db: &DbConn, task_id: i32) -> Result<task::Model, TaskError> {
        let existing = Self::get(db, task_id).await?;
        Self::ensure_feed_not_running(db, &existing.feed_url, None).await?;

        let result = Task::update_many()
            .col_expr(task::Column::Status, Expr::value(TaskStatus::Running))
            .col_expr(task::Column::UpdatedAt, Expr::value(Utc::now()))
            .filter(task::Column::Id.eq(task_id))
            .filter(task::Column::Status.eq(TaskStatus::Idle))
            .exec(db)
            .await?;
        if result.rows_affected == 0 {
            return Err(TaskError::AlreadyActive(existing.feed_url));
        }
        Self::get(db, task_id).await
    }

    /// Returns a task to `idle`, recording the run time and, when given, the link of
    /// the item that was processed.
    pub async fn mark_idle(
        db: &DbConn,
        task_id: i32,
        processed_link: Option<String>,
    ) -> Result<task::Model, TaskError> {
        let existing = Self::get(db, task_id).await?;
        let now = Utc::now();
        let mut active: task::ActiveModel = existing.into();
        active.status = Set(TaskStatus::Idle);
        active.last_run_at = Set(Some(now));
        if processed_link.is_some() {
            active.last_item_link = Set(processed_link);
        }
        active.updated_at = Set(now);
        Ok(active.update(db).await?)
    }

    /// Puts every task back to `idle`. A process that stopped mid-run leaves tasks in
    /// `running`; this is called once at start-up.
    pub async fn reset_running(db: &DbConn) -> Result<u64, TaskError> {
        let result = Task::update_many()
            .col_expr(task::Column::Status, Expr::value(TaskStatus::Idle))
            .filter(task::Column::Status.eq(TaskStatus::Running))
            .exec(db)
            .await?;
        Ok(result.rows_affected)
    }

    async fn ensure_feed_not_running(
        db: &DbConn,
        feed_url: &str,
        except_id: Option<i32>,
    ) -> Result<(), TaskError> {
        let running = Task::find()
            .filter(task::Column::FeedUrl.eq(feed_url))
            .filter(task::Column::Status.ne(TaskStatus::Idle))
            .all(db)
            .await?;
        if running.iter().any(|t| Some(t.id) != except_id) {
            return Err(TaskError::AlreadyActive(feed_url.to_string()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::test_connection;

    fn input(feed_url: &str) -> TaskInput {
        TaskInput {
            feed_url: feed_url.to_string(),
            item_mapping: FeedItemMapping::default(),
            feed_config: FeedConfig {
                websites: Vec::new(),
                languages: vec!["en".to_string()],
                prompt: "Rewrite for a general audience.".to_string(),
                article_count: 2,
            },
        }
    }

    #[tokio::test]
    async fn test_only_one_running_task_per_feed() {
        let db = test_connection().await;
        let first = TaskService::create(&db, input("https://feed.example/rss")).await.unwrap();
        let second = TaskService::create(&db, input("https://feed.example/rss")).await.unwrap();

        let running = TaskService::try_mark_running(&db, first.id).await.unwrap();
        assert_eq!(running.status, TaskStatus::Running);

        let err = TaskService::try_mark_running(&db, second.id).await.unwrap_err();
        assert!(matches!(err, TaskError::AlreadyActive(_)));
        let err = TaskService::create(&db, input("https://feed.example/rss")).await.unwrap_err();
        assert!(matches!(err, TaskError::AlreadyActive(_)));

        let idle = TaskService::mark_idle(&db, first.id, Some("https://feed.example/a".to_string()))
            .await
            .unwrap();
        assert_eq!(idle.status, TaskStatus::Idle);
        assert_eq!(idle.last_item_link.as_deref(), Some("https://feed.example/a"));
        assert!(idle.last_run_at.is_some());

        TaskService::try_mark_running(&db, second.id).await.unwrap();
        assert_eq!(TaskService::list_idle(&db).await.unwrap().len(), 1);
        assert_eq!(TaskService::reset_running(&db).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_feed_config_round_trips_through_json_column() {
        let db = test_connection().await;
        let mut task_input = input("https://feed.example/rss");
        task_input.feed_config.websites = vec![3, 1];
        task_input.item_mapping.thumbnail = Some("media:thumbnail".to_string());
        let created = TaskService::create(&db, task_input.clone()).await.unwrap();

        let loaded = TaskService::get(&db, created.id).await.unwrap();
        assert_eq!(loaded.feed_config, task_input.feed_config);
        assert_eq!(loaded.item_mapping, task_input.item_mapping);
    }

    #[tokio::test]
    async fn test_validation() {
        let db = test_connection().await;
        let mut bad = input("ftp://feed.example");
        assert!(matches!(
            TaskService::create(&db, bad.clone()).await.unwrap_err(),
            TaskError::InvalidInput(_)
        ));
        bad.feed_url = "https://feed.example".to_string();
        bad.feed_config.article_count = MAX_ARTICLE_COUNT + 1;
        assert!(matches!(
            TaskService::create(&db, bad).await.unwrap_err(),
            TaskError::InvalidInput(_)
        ));
    }
}
