use reqwest::{Client, StatusCode};
use rss::{Channel, Item};
use serde::Serialize;
use thiserror::Error;

use crate::db::types::FeedItemMapping;

#[derive(Error, Debug)]
pub enum FeedError {
    #[error("Network error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("Feed returned non-success status: {0}")]
    Status(StatusCode),
    #[error("Failed to parse feed: {0}")]
    Parse(#[from] rss::Error),
}

/// One feed item with the pipeline inputs already resolved through a mapping.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FeedItem {
    pub title: String,
    pub link: String,
    pub content: String,
    pub thumbnail: Option<String>,
    pub published_at: Option<String>,
    /// Field keys present on the source item, usable in a `FeedItemMapping`.
    pub fields: Vec<String>,
}

/// Plain item fields a mapping may name, besides namespaced extensions.
const STANDARD_FIELDS: &[&str] = &[
    "title",
    "link",
    "description",
    "content:encoded",
    "guid",
    "author",
    "pubDate",
    "enclosure",
];

pub struct FeedFetcher {
    client: Client,
}

impl FeedFetcher {
    pub fn new() -> Self {
        Self {
            client: Client::new(),
        }
    }

    pub async fn fetch_channel(&self, url: &str) -> Result<Channel, FeedError> {
        let response = self.client.get(url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(FeedError::Status(status));
        }
        let bytes = response.bytes().await?;
        Ok(Channel::read_from(&bytes[..])?)
    }

    /// Fetches the feed and resolves every item through `mapping`, in document order.
    pub async fn fetch_items(
        &self,
        url: &str,
        mapping: &FeedItemMapping,
    ) -> Result<Vec<FeedItem>, FeedError> {
        let channel = self.fetch_channel(url).await?;
        Ok(channel
            .items()
            .iter()
            .map(|item| map_item(item, mapping))
            .collect())
    }
}

impl Default for FeedFetcher {
    fn default() -> Self {
        Self::new()
    }
}

pub fn map_item(item: &Item, mapping: &FeedItemMapping) -> FeedItem {
    let title = resolve_field(item, &mapping.title)
        .or_else(|| item.title().map(str::to_string))
        .unwrap_or_else(|| "Untitled".to_string());
    let content = resolve_field(item, &mapping.content)
        .or_else(|| item.description().map(str::to_string))
        .unwrap_or_default();
    let link = resolve_field(item, &mapping.link)
        .or_else(|| item.link().map(str::to_string))
        .or_else(|| item.guid().map(|guid| guid.value().to_string()))
        .unwrap_or_default();
    let thumbnail = match mapping.thumbnail.as_deref() {
        Some(key) => resolve_field(item, key),
        None => detect_thumbnail(item),
    };

    FeedItem {
        title,
        link,
        content,
        thumbnail,
        published_at: item.pub_date().map(str::to_string),
        fields: available_fields(item),
    }
}

/// Reads one field by mapping key. Unknown keys and empty values yield `None`.
pub fn resolve_field(item: &Item, key: &str) -> Option<String> {
    let value = match key {
        "title" => item.title().map(str::to_string),
        "link" => item.link().map(str::to_string),
        "description" => item.description().map(str::to_string),
        "content" | "content:encoded" => item.content().map(str::to_string),
        "guid" => item.guid().map(|guid| guid.value().to_string()),
        "author" => item.author().map(str::to_string),
        "pubDate" => item.pub_date().map(str::to_string),
        "enclosure" => item.enclosure().map(|enclosure| enclosure.url().to_string()),
        "dc:creator" => item
            .dublin_core_ext()
            .and_then(|dc| dc.creators().first().cloned()),
        namespaced => {
            let (prefix, name) = namespaced.split_once(':')?;
            extension_value(item, prefix, name)
        }
    };
    value.filter(|v| !v.trim().is_empty())
}

fn extension_value(item: &Item, prefix: &str, name: &str) -> Option<String> {
    let extension = item.extensions().get(prefix)?.get(name)?.first()?;
    extension
        .value()
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(str::to_string)
        .or_else(|| extension.attrs().get("url").cloned())
}

/// `media:thumbnail`, then `media:content`, then an image enclosure.
pub fn detect_thumbnail(item: &Item) -> Option<String> {
    extension_value(item, "media", "thumbnail")
        .or_else(|| extension_value(item, "media", "content"))
        .or_else(|| {
            item.enclosure()
                .filter(|enclosure| enclosure.mime_type().starts_with("image/"))
                .map(|enclosure| enclosure.url().to_string())
        })
}

pub fn available_fields(item: &Item) -> Vec<String> {
    let mut fields: Vec<String> = STANDARD_FIELDS
        .iter()
        .filter(|key| resolve_field(item, key).is_some())
        .map(|key| key.to_string())
        .collect();
    if item
        .dublin_core_ext()
        .is_some_and(|dc| !dc.creators().is_empty())
    {
        fields.push("dc:creator".to_string());
    }
    for (prefix, elements) in item.extensions() {
        for name in elements.keys() {
            fields.push(format!("{prefix}:{name}"));
        }
    }
    fields
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const SAMPLE_FEED: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<rss version="2.0" xmlns:content="http://purl.org/rss/1.0/modules/content/" xmlns:media="http://search.yahoo.com/mrss/">
  <channel>
    <title>Source News</title>
    <link>https://source.example</link>
    <description>Latest</description>
    <item>
      <title>Rivers rise across the valley</title>
      <link>https://source.example/rivers</link>
      <description>Short teaser</description>
      <content:encoded><![CDATA[<p>Water levels climbed.</p><img src="https://cdn.example/thumb.jpg"><p>More.</p>]]></content:encoded>
      <media:content url="https://cdn.example/thumb.jpg" medium="image"/>
      <pubDate>Mon, 12 Oct 2026 08:00:00 GMT</pubDate>
    </item>
    <item>
      <title>Second story</title>
      <link>https://source.example/second</link>
      <description><![CDATA[<p>Only a description.</p>]]></description>
      <enclosure url="https://cdn.example/second.png" length="100" type="image/png"/>
    </item>
  </channel>
</rss>"#;

    fn sample_items() -> Vec<Item> {
        Channel::read_from(SAMPLE_FEED.as_bytes()).unwrap().items().to_vec()
    }

    #[test]
    fn test_default_mapping_prefers_encoded_content() {
        let items = sample_items();
        let mapped = map_item(&items[0], &FeedItemMapping::default());
        assert_eq!(mapped.title, "Rivers rise across the valley");
        assert_eq!(mapped.link, "https://source.example/rivers");
        assert!(mapped.content.starts_with("<p>Water levels climbed.</p>"));
        assert_eq!(mapped.thumbnail.as_deref(), Some("https://cdn.example/thumb.jpg"));
    }

    #[test]
    fn test_content_falls_back_to_description_and_enclosure_thumbnail() {
        let items = sample_items();
        let mapped = map_item(&items[1], &FeedItemMapping::default());
        assert_eq!(mapped.content, "<p>Only a description.</p>");
        assert_eq!(mapped.thumbnail.as_deref(), Some("https://cdn.example/second.png"));
    }

    #[test]
    fn test_explicit_mapping_and_available_fields() {
        let items = sample_items();
        let mapping = FeedItemMapping {
            content: "description".to_string(),
            thumbnail: Some("media:content".to_string()),
            ..FeedItemMapping::default()
        };
        let mapped = map_item(&items[0], &mapping);
        assert_eq!(mapped.content, "Short teaser");
        assert_eq!(mapped.thumbnail.as_deref(), Some("https://cdn.example/thumb.jpg"));
        assert!(mapped.fields.contains(&"content:encoded".to_string()));
        assert!(mapped.fields.contains(&"media:content".to_string()));
        assert!(!mapped.fields.contains(&"enclosure".to_string()));
        assert_eq!(resolve_field(&items[0], "media:missing"), None);
        assert_eq!(resolve_field(&items[0], "nonsense"), None);
    }

    #[tokio::test]
    async fn test_fetch_items_and_status_errors() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/rss"))
            .respond_with(ResponseTemplate::new(200).set_body_string(SAMPLE_FEED))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/gone"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let fetcher = FeedFetcher::new();
        let items = fetcher
            .fetch_items(&format!("{}/rss", server.uri()), &FeedItemMapping::default())
            .await
            .unwrap();
        assert_eq!(items.len(), 2);

        let err = fetcher.fetch_channel(&format!("{}/gone", server.uri())).await.unwrap_err();
        assert!(matches!(err, FeedError::Status(StatusCode::NOT_FOUND)));
    }
}
