//! Typed values for the serialized columns.
//!
//! These are decoded by sea-orm at the persistence boundary, so a malformed stored
//! value surfaces as a `DbErr` on load instead of leaking into business logic.

use sea_orm::FromJsonQueryResult;
use serde::{Deserialize, Serialize};

/// Category ids attached to a website, stored as a JSON array.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize, FromJsonQueryResult)]
#[serde(transparent)]
pub struct CategoryIds(pub Vec<i32>);

impl CategoryIds {
    pub fn contains(&self, id: i32) -> bool {
        self.0.contains(&id)
    }

    /// Removes every id in `ids`. Returns true when the list changed.
    pub fn remove_all(&mut self, ids: &[i32]) -> bool {
        let before = self.0.len();
        self.0.retain(|id| !ids.contains(id));
        self.0.len() != before
    }
}

impl From<Vec<i32>> for CategoryIds {
    fn from(ids: Vec<i32>) -> Self {
        CategoryIds(ids)
    }
}

fn default_article_count() -> u32 {
    1
}

/// What a task run targets: which websites and languages, the rewriting
/// instruction, and how many variants to produce per feed item.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, FromJsonQueryResult)]
pub struct FeedConfig {
    #[serde(default)]
    pub websites: Vec<i32>,
    #[serde(default)]
    pub languages: Vec<String>,
    #[serde(default)]
    pub prompt: String,
    #[serde(default = "default_article_count")]
    pub article_count: u32,
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            websites: Vec::new(),
            languages: Vec::new(),
            prompt: String::new(),
            article_count: default_article_count(),
        }
    }
}

fn default_title_field() -> String {
    "title".to_string()
}

fn default_content_field() -> String {
    "content:encoded".to_string()
}

fn default_link_field() -> String {
    "link".to_string()
}

/// Which RSS item field feeds each pipeline input.
///
/// Keys are plain item fields (`title`, `description`, `content:encoded`, ...) or a
/// namespaced extension such as `media:content`. A `None` thumbnail means the
/// thumbnail is auto-detected.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, FromJsonQueryResult)]
pub struct FeedItemMapping {
    #[serde(default = "default_title_field")]
    pub title: String,
    #[serde(default = "default_content_field")]
    pub content: String,
    #[serde(default = "default_link_field")]
    pub link: String,
    #[serde(default)]
    pub thumbnail: Option<String>,
}

impl Default for FeedItemMapping {
    fn default() -> Self {
        Self {
            title: default_title_field(),
            content: default_content_field(),
            link: default_link_field(),
            thumbnail: None,
        }
    }
}

/// Splits the comma-joined language column into trimmed codes.
pub fn split_languages(languages: &str) -> Vec<String> {
    languages
        .split(',')
        .map(str::trim)
        .filter(|code| !code.is_empty())
        .map(str::to_string)
        .collect()
}

pub fn join_languages(languages: &[String]) -> String {
    languages
        .iter()
        .map(|code| code.trim())
        .filter(|code| !code.is_empty())
        .collect::<Vec<_>>()
        .join(",")
}

/// Lowercase ASCII slug: alphanumerics kept, every other run collapsed into one `-`.
pub fn slugify(name: &str) -> String {
    let mut slug = String::with_capacity(name.len());
    let mut pending_dash = false;
    for ch in name.chars() {
        if ch.is_ascii_alphanumeric() {
            if pending_dash && !slug.is_empty() {
                slug.push('-');
            }
            pending_dash = false;
            slug.push(ch.to_ascii_lowercase());
        } else {
            pending_dash = true;
        }
    }
    slug
}
