use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DbConn, DbErr, EntityTrait, ModelTrait, QueryFilter, QueryOrder,
    QuerySelect, Set,
};
use serde::Deserialize;

use crate::db::entities::{article, prelude::Article};

#[derive(Debug, thiserror::Error)]
pub enum ArticleError {
    #[error("Database error: {0}")]
    DbErr(#[from] DbErr),
    #[error("Article not found: {0}")]
    NotFound(i32),
}

/// A freshly generated article, before it has an id.
#[derive(Debug, Clone, PartialEq)]
pub struct NewArticle {
    pub task_id: Option<i32>,
    pub website_id: Option<i32>,
    pub language: String,
    pub source_url: String,
    pub title: String,
    pub content: String,
    pub seo_title: String,
    pub meta_title: String,
    pub meta_description: String,
    pub meta_keywords: String,
    pub summary: String,
    pub primary_category: String,
    pub secondary_category: String,
    pub prompt_tokens: i32,
    pub completion_tokens: i32,
    pub total_tokens: i32,
    pub cost: f64,
}

/// Editable fields of a stored article.
#[derive(Debug, Clone, Deserialize)]
pub struct ArticleUpdate {
    pub title: String,
    pub content: String,
    #[serde(default)]
    pub seo_title: String,
    #[serde(default)]
    pub meta_title: String,
    #[serde(default)]
    pub meta_description: String,
    #[serde(default)]
    pub meta_keywords: String,
    #[serde(default)]
    pub summary: String,
    #[serde(default)]
    pub primary_category: String,
    #[serde(default)]
    pub secondary_category: String,
}

#[derive(Debug, Clone, Copy, Default, Deserialize)]
pub struct ArticleFilter {
    pub website_id: Option<i32>,
    pub task_id: Option<i32>,
}

pub struct ArticleService;

impl ArticleService {
    pub async fn insert(db: &DbConn, new: NewArticle) -> Result<article::Model, ArticleError> {
        let now = Utc::now();
        let model = article::ActiveModel {
            task_id: Set(new.task_id),
            website_id: Set(new.website_id),
            language: Set(new.language),
            source_url: Set(new.source_url),
            title: Set(new.title),
            content: Set(new.content),
            seo_title: Set(new.seo_title),
            meta_title: Set(new.meta_title),
            meta_description: Set(new.meta_description),
            meta_keywords: Set(new.meta_keywords),
            summary: Set(new.summary),
            primary_category: Set(new.primary_category),
            secondary_category: Set(new.secondary_category),
            prompt_tokens: Set(new.prompt_tokens),
            completion_tokens: Set(new.completion_tokens),
            total_tokens: Set(new.total_tokens),
            cost: Set(new.cost),
            created_at: Set(now),
            updated_at: Set(now),
            ..Default::default()
        };
        Ok(model.insert(db).await?)
    }

    /// Newest first.
    pub async fn list(db: &DbConn, filter: ArticleFilter) -> Result<Vec<article::Model>, ArticleError> {
        let mut query = Article::find().order_by_desc(article::Column::Id);
        if let Some(website_id) = filter.website_id {
            query = query.filter(article::Column::WebsiteId.eq(website_id));
        }
        if let Some(task_id) = filter.task_id {
            query = query.filter(article::Column::TaskId.eq(task_id));
        }
        Ok(query.all(db).await?)
    }

    /// The `limit` most recently created articles, optionally for one website.
    pub async fn recent(
        db: &DbConn,
        website_id: Option<i32>,
        limit: u64,
    ) -> Result<Vec<article::Model>, ArticleError> {
        let mut query = Article::find()
            .order_by_desc(article::Column::CreatedAt)
            .order_by_desc(article::Column::Id)
            .limit(limit);
        if let Some(website_id) = website_id {
            query = query.filter(article::Column::WebsiteId.eq(website_id));
        }
        Ok(query.all(db).await?)
    }

    pub async fn get(db: &DbConn, article_id: i32) -> Result<article::Model, ArticleError> {
        Article::find_by_id(article_id)
            .one(db)
            .await?
            .ok_or(ArticleError::NotFound(article_id))
    }

    pub async fn update(
        db: &DbConn,
        article_id: i32,
        changes: ArticleUpdate,
    ) -> Result<article::Model, ArticleError> {
        let existing = Self::get(db, article_id).await?;
        let mut active: article::ActiveModel = existing.into();
        active.title = Set(changes.title);
        active.content = Set(changes.content);
        active.seo_title = Set(changes.seo_title);
        active.meta_title = Set(changes.meta_title);
        active.meta_description = Set(changes.meta_description);
        active.meta_keywords = Set(changes.meta_keywords);
        active.summary = Set(changes.summary);
        active.primary_category = Set(changes.primary_category);
        active.secondary_category = Set(changes.secondary_category);
        active.updated_at = Set(Utc::now());
        Ok(active.update(db).await?)
    }

    pub async fn delete(db: &DbConn, article_id: i32) -> Result<(), ArticleError> {
        let existing = Self::get(db, article_id).await?;
        existing.delete(db).await?;
        Ok(())
    }
}

#[cfg(test)]
pub(crate) fn sample_article(title: &str, website_id: Option<i32>) -> NewArticle {
    NewArticle {
        task_id: None,
        website_id,
        language: "en".to_string(),
        source_url: format!("https://source.example/{title}"),
        title: title.to_string(),
        content: format!("<h2>{title}</h2><p>Body</p>"),
        seo_title: title.to_string(),
        meta_title: title.to_string(),
        meta_description: "Description".to_string(),
        meta_keywords: "news".to_string(),
        summary: "Summary".to_string(),
        primary_category: "World".to_string(),
        secondary_category: String::new(),
        prompt_tokens: 1000,
        completion_tokens: 500,
        total_tokens: 1500,
        cost: 0.00045,
    }
}
