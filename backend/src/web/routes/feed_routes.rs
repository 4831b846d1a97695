use axum::{
    Router,
    extract::{Query, State},
    http::header,
    response::IntoResponse,
    routing::get,
};
use rss::{ChannelBuilder, GuidBuilder, Item, ItemBuilder};
use std::sync::Arc;

use crate::db::entities::article;
use crate::db::services::{ArticleService, WebsiteService};
use crate::web::models::WebsiteQuery;
use crate::web::{AppError, AppState};

const FEED_ITEM_LIMIT: u64 = 10;
const RSS_CONTENT_TYPE: &str = "application/rss+xml; charset=utf-8";

/// Public routes, mounted without the auth layer.
pub fn feed_router() -> Router<Arc<AppState>> {
    Router::new().route("/rss.xml", get(rss_feed))
}

fn article_item(article: &article::Model, public_url: &str) -> Item {
    let link = format!("{public_url}/articles/{}", article.id);
    let categories = [&article.primary_category, &article.secondary_category]
        .into_iter()
        .filter(|name| !name.is_empty())
        .map(|name| rss::CategoryBuilder::default().name(name.clone()).build())
        .collect::<Vec<_>>();
    let description = if article.summary.is_empty() {
        article.meta_description.clone()
    } else {
        article.summary.clone()
    };

    ItemBuilder::default()
        .title(Some(article.title.clone()))
        .link(Some(link.clone()))
        .description(Some(description))
        .content(Some(article.content.clone()))
        .categories(categories)
        .guid(Some(GuidBuilder::default().value(link).permalink(true).build()))
        .pub_date(Some(article.created_at.to_rfc2822()))
        .build()
}

/// Renders the most recent generated articles as an RSS 2.0 document.
pub async fn render_feed(
    app_state: &AppState,
    website_id: Option<i32>,
) -> Result<String, AppError> {
    let public_url = app_state.config.public_url.as_str();
    let (title, link, description) = match website_id {
        Some(id) => {
            let website = WebsiteService::get(&app_state.db_pool, id).await?;
            (website.name, website.url, website.description)
        }
        None => (
            "Newsdesk".to_string(),
            public_url.to_string(),
            "Recently generated articles".to_string(),
        ),
    };

    let articles = ArticleService::recent(&app_state.db_pool, website_id, FEED_ITEM_LIMIT).await?;
    let items = articles
        .iter()
        .map(|article| article_item(article, public_url))
        .collect::<Vec<_>>();

    let channel = ChannelBuilder::default()
        .title(title)
        .link(link)
        .description(description)
        .items(items)
        .build();
    Ok(channel.to_string())
}

async fn rss_feed(
    State(app_state): State<Arc<AppState>>,
    Query(query): Query<WebsiteQuery>,
) -> Result<impl IntoResponse, AppError> {
    let body = render_feed(&app_state, query.website_id).await?;
    Ok(([(header::CONTENT_TYPE, RSS_CONTENT_TYPE)], body))
}
