use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DbConn, DbErr, EntityTrait, ModelTrait, QueryFilter, QueryOrder,
    Set,
};
use serde::Deserialize;
use tracing::debug;

use crate::db::entities::{category, prelude::Website, website};
use crate::db::services::category_service::with_descendants;
use crate::db::types::{CategoryIds, join_languages, slugify};

#[derive(Debug, thiserror::Error)]
pub enum WebsiteError {
    #[error("Database error: {0}")]
    DbErr(#[from] DbErr),
    #[error("Website not found: {0}")]
    NotFound(i32),
    #[error("A website with the slug '{0}' already exists.")]
    DuplicateSlug(String),
    #[error("Invalid website: {0}")]
    InvalidInput(String),
}

#[derive(Debug, Clone, Deserialize)]
pub struct WebsiteInput {
    pub name: String,
    pub url: String,
    pub slug: Option<String>,
    #[serde(default)]
    pub languages: Vec<String>,
    #[serde(default)]
    pub author: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub category_ids: Vec<i32>,
}

impl WebsiteInput {
    fn validated_slug(&self) -> Result<String, WebsiteError> {
        if self.name.trim().is_empty() || self.url.trim().is_empty() {
            return Err(WebsiteError::InvalidInput("name and url are required".to_string()));
        }
        let slug = match self.slug.as_deref() {
            Some(slug) if !slug.trim().is_empty() => slugify(slug),
            _ => slugify(&self.name),
        };
        if slug.is_empty() {
            return Err(WebsiteError::InvalidInput(
                "slug must contain at least one letter or digit".to_string(),
            ));
        }
        Ok(slug)
    }
}

pub struct WebsiteService;

impl WebsiteService {
    pub async fn create(db: &DbConn, input: WebsiteInput) -> Result<website::Model, WebsiteError> {
        let slug = input.validated_slug()?;
        Self::ensure_slug_free(db, &slug, None).await?;

        let now = Utc::now();
        let new_website = website::ActiveModel {
            name: Set(input.name.trim().to_string()),
            url: Set(input.url.trim().to_string()),
            slug: Set(slug),
            languages: Set(join_languages(&input.languages)),
            author: Set(input.author),
            description: Set(input.description),
            thumbnail: Set(None),
            category_ids: Set(CategoryIds(input.category_ids)),
            created_at: Set(now),
            updated_at: Set(now),
            ..Default::default()
        };
        Ok(new_website.insert(db).await?)
    }

    pub async fn list(db: &DbConn) -> Result<Vec<website::Model>, WebsiteError> {
        Ok(Website::find().order_by_asc(website::Column::Name).all(db).await?)
    }

    pub async fn get(db: &DbConn, website_id: i32) -> Result<website::Model, WebsiteError> {
        Website::find_by_id(website_id)
            .one(db)
            .await?
            .ok_or(WebsiteError::NotFound(website_id))
    }

    pub async fn find_many(db: &DbConn, ids: &[i32]) -> Result<Vec<website::Model>, WebsiteError> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        Ok(Website::find()
            .filter(website::Column::Id.is_in(ids.iter().copied()))
            .all(db)
            .await?)
    }

    pub async fn update(
        db: &DbConn,
        website_id: i32,
        input: WebsiteInput,
    ) -> Result<website::Model, WebsiteError> {
        let existing = Self::get(db, website_id).await?;
        let slug = input.validated_slug()?;
        if slug != existing.slug {
            Self::ensure_slug_free(db, &slug, Some(website_id)).await?;
        }

        let mut active: website::ActiveModel = existing.into();
        active.name = Set(input.name.trim().to_string());
        active.url = Set(input.url.trim().to_string());
        active.slug = Set(slug);
        active.languages = Set(join_languages(&input.languages));
        active.author = Set(input.author);
        active.description = Set(input.description);
        active.category_ids = Set(CategoryIds(input.category_ids));
        active.updated_at = Set(Utc::now());
        Ok(active.update(db).await?)
    }

    pub async fn set_thumbnail(
        db: &DbConn,
        website_id: i32,
        thumbnail: String,
    ) -> Result<website::Model, WebsiteError> {
        let existing = Self::get(db, website_id).await?;
        let mut active: website::ActiveModel = existing.into();
        active.thumbnail = Set(Some(thumbnail));
        active.updated_at = Set(Utc::now());
        Ok(active.update(db).await?)
    }

    /// Deletes the website, the categories that belong to it and every descendant of
    /// those, then strips the removed ids from the remaining websites' lists.
    pub async fn delete(db: &DbConn, website_id: i32) -> Result<website::Model, WebsiteError> {
        let existing = Self::get(db, website_id).await?;
        let owned = category::Entity::find()
            .filter(category::Column::WebsiteId.eq(website_id))
            .all(db)
            .await?
            .into_iter()
            .map(|owned| owned.id)
            .collect::<Vec<_>>();
        let removed = with_descendants(db, owned).await?;

        if !removed.is_empty() {
            category::Entity::delete_many()
                .filter(category::Column::Id.is_in(removed.clone()))
                .exec(db)
                .await?;
        }
        existing.clone().delete(db).await?;
        let websites_updated = Self::remove_category_ids(db, &removed).await?;

        debug!(website_id, categories = removed.len(), websites_updated, "Website cascade finished.");
        Ok(existing)
    }

    /// Adds one category id to a website's list, if not already present.
    pub async fn attach_category(
        db: &DbConn,
        website_id: i32,
        category_id: i32,
    ) -> Result<(), WebsiteError> {
        let existing = Self::get(db, website_id).await?;
        if existing.category_ids.contains(category_id) {
            return Ok(());
        }
        let mut ids = existing.category_ids.clone();
        ids.0.push(category_id);
        let mut active: website::ActiveModel = existing.into();
        active.category_ids = Set(ids);
        active.updated_at = Set(Utc::now());
        active.update(db).await?;
        Ok(())
    }

    /// Removes one category id from a website's list. A missing website is not an error.
    pub async fn detach_category(
        db: &DbConn,
        website_id: i32,
        category_id: i32,
    ) -> Result<(), WebsiteError> {
        let Some(existing) = Website::find_by_id(website_id).one(db).await? else {
            return Ok(());
        };
        let mut ids = existing.category_ids.clone();
        if !ids.remove_all(&[category_id]) {
            return Ok(());
        }
        let mut active: website::ActiveModel = existing.into();
        active.category_ids = Set(ids);
        active.updated_at = Set(Utc::now());
        active.update(db).await?;
        Ok(())
    }

    /// Strips the given category ids from every website's list. Returns how many
    /// websites were rewritten.
    pub async fn remove_category_ids(db: &DbConn, ids: &[i32]) -> Result<usize, WebsiteError> {
        let mut touched = 0;
        for site in Website::find().all(db).await? {
            let mut category_ids = site.category_ids.clone();
            if !category_ids.remove_all(ids) {
                continue;
            }
            let mut active: website::ActiveModel = site.into();
            active.category_ids = Set(category_ids);
            active.updated_at = Set(Utc::now());
            active.update(db).await?;
            touched += 1;
        }
        Ok(touched)
    }

    async fn ensure_slug_free(
        db: &DbConn,
        slug: &str,
        except_id: Option<i32>,
    ) -> Result<(), WebsiteError> {
        let clash = Website::find()
            .filter(website::Column::Slug.eq(slug))
            .one(db)
            .await?;
        match clash {
            Some(other) if Some(other.id) != except_id => {
                Err(WebsiteError::DuplicateSlug(slug.to_string()))
            }
            _ => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::test_connection;

    fn input(name: &str) -> WebsiteInput {
        WebsiteInput {
            name: name.to_string(),
            url: format!("https://{}.example", slugify(name)),
            slug: None,
            languages: vec!["en".to_string(), "fr".to_string()],
            author: "Desk".to_string(),
            description: String::new(),
            category_ids: Vec::new(),
        }
    }

    #[tokio::test]
    async fn test_create_derives_slug_and_joins_languages() {
        let db = test_connection().await;
        let site = WebsiteService::create(&db, input("Daily Planet")).await.unwrap();
        assert_eq!(site.slug, "daily-planet");
        assert_eq!(site.languages, "en,fr");
        assert_eq!(site.language_codes(), vec!["en", "fr"]);
    }

    #[tokio::test]
    async fn test_duplicate_slug_is_rejected() {
        let db = test_connection().await;
        WebsiteService::create(&db, input("Daily Planet")).await.unwrap();
        let err = WebsiteService::create(&db, input("daily planet")).await.unwrap_err();
        assert!(matches!(err, WebsiteError::DuplicateSlug(slug) if slug == "daily-planet"));
    }

    #[tokio::test]
    async fn test_delete_cascades_to_descendants_of_owned_categories() {
        use crate::db::services::category_service::{CategoryInput, CategoryService};

        let db = test_connection().await;
        let owner = WebsiteService::create(&db, input("Owner")).await.unwrap();
        let parent = CategoryService::create(
            &db,
            CategoryInput {
                name: "World".to_string(),
                slug: None,
                value: None,
                is_parent: true,
                parent_id: None,
                website_id: Some(owner.id),
            },
        )
        .await
        .unwrap();
        let child = CategoryService::create(
            &db,
            CategoryInput {
                name: "Europe".to_string(),
                slug: None,
                value: None,
                is_parent: false,
                parent_id: Some(parent.id),
                website_id: None,
            },
        )
        .await
        .unwrap();
        let unrelated = CategoryService::create(
            &db,
            CategoryInput {
                name: "Sport".to_string(),
                slug: None,
                value: None,
                is_parent: false,
                parent_id: None,
                website_id: None,
            },
        )
        .await
        .unwrap();

        let mut sharing = input("Sharing");
        sharing.category_ids = vec![parent.id, child.id, unrelated.id];
        let sharing = WebsiteService::create(&db, sharing).await.unwrap();

        WebsiteService::delete(&db, owner.id).await.unwrap();

        assert!(matches!(
            WebsiteService::get(&db, owner.id).await.unwrap_err(),
            WebsiteError::NotFound(_)
        ));
        let remaining = CategoryService::list(&db, None).await.unwrap();
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].id, unrelated.id);
        let sharing = WebsiteService::get(&db, sharing.id).await.unwrap();
        assert_eq!(sharing.category_ids.0, vec![unrelated.id]);
    }

    #[tokio::test]
    async fn test_remove_category_ids_only_touches_affected_sites() {
        let db = test_connection().await;
        let mut with_categories = input("One");
        with_categories.category_ids = vec![1, 2, 3];
        let one = WebsiteService::create(&db, with_categories).await.unwrap();
        let mut unrelated = input("Two");
        unrelated.category_ids = vec![7];
        let two = WebsiteService::create(&db, unrelated).await.unwrap();

        let touched = WebsiteService::remove_category_ids(&db, &[2, 3]).await.unwrap();
        assert_eq!(touched, 1);
        assert_eq!(WebsiteService::get(&db, one.id).await.unwrap().category_ids.0, vec![1]);
        assert_eq!(WebsiteService::get(&db, two.id).await.unwrap().category_ids.0, vec![7]);
    }
}
