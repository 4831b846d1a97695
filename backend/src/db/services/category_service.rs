use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DbConn, DbErr, EntityTrait, QueryFilter, QueryOrder, Set,
};
use serde::Deserialize;
use tracing::debug;

use crate::db::entities::{category, prelude::Category};
use crate::db::services::website_service::{WebsiteError, WebsiteService};
use crate::db::types::slugify;

#[derive(Debug, thiserror::Error)]
pub enum CategoryError {
    #[error("Database error: {0}")]
    DbErr(#[from] DbErr),
    #[error("Category not found: {0}")]
    NotFound(i32),
    #[error("Invalid category: {0}")]
    InvalidInput(String),
    #[error(transparent)]
    Website(#[from] WebsiteError),
}

#[derive(Debug, Clone, Deserialize)]
pub struct CategoryInput {
    pub name: String,
    pub slug: Option<String>,
    pub value: Option<String>,
    #[serde(default)]
    pub is_parent: bool,
    pub parent_id: Option<i32>,
    pub website_id: Option<i32>,
}

/// Result of a cascading delete: every category row removed, parent first.
#[derive(Debug, Clone, serde::Serialize)]
pub struct DeletedCategories {
    pub deleted_ids: Vec<i32>,
    pub websites_updated: usize,
}

/// Expands `roots` with every category below them, walking `parent_id` breadth first.
/// Roots come first in the result.
pub(crate) async fn with_descendants(db: &DbConn, roots: Vec<i32>) -> Result<Vec<i32>, DbErr> {
    let mut ids = roots.clone();
    let mut frontier = roots;
    while !frontier.is_empty() {
        let children = Category::find()
            .filter(category::Column::ParentId.is_in(frontier.clone()))
            .all(db)
            .await?;
        frontier = children
            .into_iter()
            .map(|child| child.id)
            .filter(|id| !ids.contains(id))
            .collect();
        ids.extend(frontier.iter().copied());
    }
    Ok(ids)
}

pub struct CategoryService;

impl CategoryService {
    pub async fn create(db: &DbConn, input: CategoryInput) -> Result<category::Model, CategoryError> {
        let (name, slug, value) = Self::normalize(&input)?;
        if let Some(parent_id) = input.parent_id {
            Self::ensure_parent(db, parent_id, None).await?;
        }

        let now = Utc::now();
        let new_category = category::ActiveModel {
            name: Set(name),
            slug: Set(slug),
            value: Set(value),
            is_parent: Set(input.is_parent),
            parent_id: Set(input.parent_id),
            website_id: Set(input.website_id),
            created_at: Set(now),
            updated_at: Set(now),
            ..Default::default()
        };
        let created = new_category.insert(db).await?;

        if let Some(website_id) = created.website_id {
            WebsiteService::attach_category(db, website_id, created.id).await?;
        }
        Ok(created)
    }

    pub async fn list(
        db: &DbConn,
        website_id: Option<i32>,
    ) -> Result<Vec<category::Model>, CategoryError> {
        let mut query = Category::find().order_by_asc(category::Column::Name);
        if let Some(website_id) = website_id {
            query = query.filter(category::Column::WebsiteId.eq(website_id));
        }
        Ok(query.all(db).await?)
    }

    pub async fn get(db: &DbConn, category_id: i32) -> Result<category::Model, CategoryError> {
        Category::find_by_id(category_id)
            .one(db)
            .await?
            .ok_or(CategoryError::NotFound(category_id))
    }

    /// Category names for the given ids, in id order. Unknown ids are ignored.
    pub async fn names_for_ids(db: &DbConn, ids: &[i32]) -> Result<Vec<String>, CategoryError> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let categories = Category::find()
            .filter(category::Column::Id.is_in(ids.iter().copied()))
            .order_by_asc(category::Column::Id)
            .all(db)
            .await?;
        Ok(categories.into_iter().map(|c| c.name).collect())
    }

    pub async fn update(
        db: &DbConn,
        category_id: i32,
        input: CategoryInput,
    ) -> Result<category::Model, CategoryError> {
        let existing = Self::get(db, category_id).await?;
        let (name, slug, value) = Self::normalize(&input)?;
        if let Some(parent_id) = input.parent_id {
            Self::ensure_parent(db, parent_id, Some(category_id)).await?;
        }
        if existing.is_parent && !input.is_parent {
            let has_children = Category::find()
                .filter(category::Column::ParentId.eq(category_id))
                .one(db)
                .await?
                .is_some();
            if has_children {
                return Err(CategoryError::InvalidInput(format!(
                    "category {category_id} still has children"
                )));
            }
        }
        let previous_website = existing.website_id;

        let mut active: category::ActiveModel = existing.into();
        active.name = Set(name);
        active.slug = Set(slug);
        active.value = Set(value);
        active.is_parent = Set(input.is_parent);
        active.parent_id = Set(input.parent_id);
        active.website_id = Set(input.website_id);
        active.updated_at = Set(Utc::now());
        let updated = active.update(db).await?;

        if let Some(previous) = previous_website.filter(|id| Some(*id) != updated.website_id) {
            WebsiteService::detach_category(db, previous, updated.id).await?;
        }
        if let Some(website_id) = updated.website_id {
            WebsiteService::attach_category(db, website_id, updated.id).await?;
        }
        Ok(updated)
    }

    /// Deletes a category together with every descendant, then strips the removed
    /// ids from all website category lists. The steps are separate statements; a
    /// failure part way leaves the earlier steps applied.
    pub async fn delete(db: &DbConn, category_id: i32) -> Result<DeletedCategories, CategoryError> {
        let root = Self::get(db, category_id).await?;
        let deleted_ids = with_descendants(db, vec![root.id]).await?;

        Category::delete_many()
            .filter(category::Column::Id.is_in(deleted_ids.clone()))
            .exec(db)
            .await?;
        let websites_updated = WebsiteService::remove_category_ids(db, &deleted_ids).await?;

        debug!(category_id, deleted = deleted_ids.len(), websites_updated, "Category cascade finished.");
        Ok(DeletedCategories {
            deleted_ids,
            websites_updated,
        })
    }

    fn normalize(input: &CategoryInput) -> Result<(String, String, String), CategoryError> {
        let name = input.name.trim().to_string();
        if name.is_empty() {
            return Err(CategoryError::InvalidInput("name is required".to_string()));
        }
        let slug = match input.slug.as_deref() {
            Some(slug) if !slug.trim().is_empty() => slugify(slug),
            _ => slugify(&name),
        };
        let value = input
            .value
            .clone()
            .filter(|value| !value.trim().is_empty())
            .unwrap_or_else(|| slug.clone());
        Ok((name, slug, value))
    }

    async fn ensure_parent(
        db: &DbConn,
        parent_id: i32,
        self_id: Option<i32>,
    ) -> Result<(), CategoryError> {
        if Some(parent_id) == self_id {
            return Err(CategoryError::InvalidInput(
                "a category cannot be its own parent".to_string(),
            ));
        }
        match Category::find_by_id(parent_id).one(db).await? {
            Some(parent) if parent.is_parent => Ok(()),
            Some(_) => Err(CategoryError::InvalidInput(format!(
                "category {parent_id} is not a parent category"
            ))),
            None => Err(CategoryError::InvalidInput(format!(
                "parent category {parent_id} does not exist"
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::services::website_service::WebsiteInput;
    use crate::db::test_connection;

    fn input(name: &str, is_parent: bool, parent_id: Option<i32>) -> CategoryInput {
        CategoryInput {
            name: name.to_string(),
            slug: None,
            value: None,
            is_parent,
            parent_id,
            website_id: None,
        }
    }

    fn website(name: &str, category_ids: Vec<i32>) -> WebsiteInput {
        WebsiteInput {
            name: name.to_string(),
            url: "https://news.example".to_string(),
            slug: None,
            languages: vec!["en".to_string()],
            author: String::new(),
            description: String::new(),
            category_ids,
        }
    }

    #[tokio::test]
    async fn test_deleting_parent_removes_children_and_website_references() {
        let db = test_connection().await;
        let parent = CategoryService::create(&db, input("World", true, None)).await.unwrap();
        let europe = CategoryService::create(&db, input("Europe", false, Some(parent.id))).await.unwrap();
        let asia = CategoryService::create(&db, input("Asia", false, Some(parent.id))).await.unwrap();
        let sport = CategoryService::create(&db, input("Sport", false, None)).await.unwrap();

        let site = WebsiteService::create(
            &db,
            website("Globe", vec![parent.id, europe.id, sport.id]),
        )
        .await
        .unwrap();
        let other = WebsiteService::create(&db, website("Other", vec![parent.id])).await.unwrap();

        let result = CategoryService::delete(&db, parent.id).await.unwrap();
        assert_eq!(result.deleted_ids.len(), 3);
        assert!(result.deleted_ids.contains(&asia.id));
        assert_eq!(result.websites_updated, 2);

        let remaining = CategoryService::list(&db, None).await.unwrap();
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].id, sport.id);

        let site = WebsiteService::get(&db, site.id).await.unwrap();
        assert_eq!(site.category_ids.0, vec![sport.id]);
        let other = WebsiteService::get(&db, other.id).await.unwrap();
        assert!(other.category_ids.0.is_empty());
    }

    #[tokio::test]
    async fn test_parent_must_exist_and_be_a_parent() {
        let db = test_connection().await;
        let err = CategoryService::create(&db, input("Orphan", false, Some(42))).await.unwrap_err();
        assert!(matches!(err, CategoryError::InvalidInput(_)));

        let leaf = CategoryService::create(&db, input("Leaf", false, None)).await.unwrap();
        let err = CategoryService::create(&db, input("Child", false, Some(leaf.id))).await.unwrap_err();
        assert!(matches!(err, CategoryError::InvalidInput(_)));
    }

    #[tokio::test]
    async fn test_create_with_website_attaches_id() {
        let db = test_connection().await;
        let site = WebsiteService::create(&db, website("Globe", Vec::new())).await.unwrap();
        let mut tech = input("Tech News", false, None);
        tech.website_id = Some(site.id);
        let created = CategoryService::create(&db, tech).await.unwrap();
        assert_eq!(created.slug, "tech-news");
        assert_eq!(created.value, "tech-news");

        let site = WebsiteService::get(&db, site.id).await.unwrap();
        assert_eq!(site.category_ids.0, vec![created.id]);
        assert_eq!(
            CategoryService::names_for_ids(&db, &site.category_ids.0).await.unwrap(),
            vec!["Tech News"]
        );
    }

    #[tokio::test]
    async fn test_moving_category_detaches_it_from_previous_website() {
        let db = test_connection().await;
        let first = WebsiteService::create(&db, website("First", Vec::new())).await.unwrap();
        let second = WebsiteService::create(&db, website("Second", Vec::new())).await.unwrap();
        let mut tech = input("Tech", false, None);
        tech.website_id = Some(first.id);
        let created = CategoryService::create(&db, tech.clone()).await.unwrap();

        tech.website_id = Some(second.id);
        CategoryService::update(&db, created.id, tech.clone()).await.unwrap();
        assert!(WebsiteService::get(&db, first.id).await.unwrap().category_ids.0.is_empty());
        assert_eq!(
            WebsiteService::get(&db, second.id).await.unwrap().category_ids.0,
            vec![created.id]
        );

        tech.website_id = None;
        let updated = CategoryService::update(&db, created.id, tech).await.unwrap();
        assert_eq!(updated.website_id, None);
        assert!(WebsiteService::get(&db, second.id).await.unwrap().category_ids.0.is_empty());
    }

    #[tokio::test]
    async fn test_parent_with_children_cannot_be_demoted() {
        let db = test_connection().await;
        let parent = CategoryService::create(&db, input("World", true, None)).await.unwrap();
        let child = CategoryService::create(&db, input("Europe", false, Some(parent.id))).await.unwrap();

        let err = CategoryService::update(&db, parent.id, input("World", false, None))
            .await
            .unwrap_err();
        assert!(matches!(err, CategoryError::InvalidInput(_)));
        assert!(CategoryService::get(&db, parent.id).await.unwrap().is_parent);

        CategoryService::delete(&db, child.id).await.unwrap();
        let demoted = CategoryService::update(&db, parent.id, input("World", false, None))
            .await
            .unwrap();
        assert!(!demoted.is_parent);
    }
}
