use std::sync::Arc;

use futures::future::join_all;
use sea_orm::DatabaseConnection;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, error, info, warn};

use super::feed::{FeedError, FeedFetcher, FeedItem};
use super::prompt::{PromptInput, build_system_prompt};
use super::reassembly::{RewrittenArticle, substitute_blockquotes};
use super::rewrite_client::{
    ArticleRewriter, RewriteError, RewriteRequest, RewriteResponse, SCHEDULED_TEMPERATURE,
    TokenUsage,
};
use super::sanitizer::{SanitizedContent, sanitize};
use crate::db::entities::{article, task};
use crate::db::services::{
    ArticleError, ArticleService, CategoryError, CategoryService, LogCategory, LogService,
    NewArticle, TaskError, TaskService, WebsiteError, WebsiteService,
    task_service::MAX_ARTICLE_COUNT,
};
use crate::db::types::{FeedConfig, FeedItemMapping};

pub const FAILED_ARTICLE_MESSAGE: &str = "Failed to generate article";

#[derive(Error, Debug)]
pub enum GeneratorError {
    #[error("{0}")]
    InvalidInput(String),
    #[error("Feed '{0}' has no items")]
    EmptyFeed(String),
    #[error("Feed error: {0}")]
    Feed(#[from] FeedError),
    #[error(transparent)]
    Task(#[from] TaskError),
    #[error(transparent)]
    Website(#[from] WebsiteError),
    #[error(transparent)]
    Category(#[from] CategoryError),
}

/// USD per million tokens.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Pricing {
    pub input_per_million: f64,
    pub output_per_million: f64,
}

impl Pricing {
    pub fn cost(&self, usage: &TokenUsage) -> f64 {
        f64::from(usage.prompt_tokens) * self.input_per_million / 1_000_000.0
            + f64::from(usage.completion_tokens) * self.output_per_million / 1_000_000.0
    }
}

/// State of one pipeline run over one feed item. Built per request and shared by
/// reference between all variants of that item.
#[derive(Debug, Clone)]
pub struct PipelineContext {
    pub item: FeedItem,
    pub content: SanitizedContent,
    pub categories: Vec<String>,
    pub instruction: String,
}

impl PipelineContext {
    pub fn new(item: FeedItem, categories: Vec<String>, instruction: String) -> Self {
        let content = sanitize(&item.content, item.thumbnail.as_deref());
        Self {
            item,
            content,
            categories,
            instruction,
        }
    }
}

/// How many variants to produce and where they go.
#[derive(Debug, Clone)]
pub struct VariantPlan {
    pub count: u32,
    pub languages: Vec<String>,
    pub websites: Vec<i32>,
    pub temperature: f32,
    pub task_id: Option<i32>,
    /// Keep a `Failed` placeholder for variants whose rewrite call failed. Task runs
    /// drop them instead.
    pub keep_failures: bool,
}

impl VariantPlan {
    fn language_for(&self, index: usize) -> &str {
        if self.languages.is_empty() {
            return "en";
        }
        &self.languages[index % self.languages.len()]
    }

    fn website_for(&self, index: usize) -> Option<i32> {
        if self.websites.is_empty() {
            return None;
        }
        Some(self.websites[index % self.websites.len()])
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum VariantOutcome {
    Generated {
        article: article::Model,
    },
    Failed {
        language: String,
        website_id: Option<i32>,
        message: String,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RunTrigger {
    Scheduler,
    Manual,
}

#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub task_id: i32,
    pub trigger: RunTrigger,
    pub item_link: Option<String>,
    pub item_title: Option<String>,
    /// Set when the run ended without generating anything on purpose.
    pub skipped: Option<String>,
    pub articles: Vec<article::Model>,
}

/// Body of a request-path generation.
#[derive(Debug, Clone, Deserialize)]
pub struct GenerateRequest {
    pub feed_url: String,
    #[serde(default)]
    pub item_mapping: FeedItemMapping,
    #[serde(default)]
    pub feed_config: FeedConfig,
    pub temperature: f32,
    /// Generate from the item with this link instead of the newest one.
    #[serde(default)]
    pub item_link: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct GenerateResult {
    pub item_link: String,
    pub item_title: String,
    pub variants: Vec<VariantOutcome>,
}

pub struct ArticleGenerator {
    db: DatabaseConnection,
    rewriter: Arc<dyn ArticleRewriter>,
    fetcher: FeedFetcher,
    pricing: Pricing,
}

impl ArticleGenerator {
    pub fn new(
        db: DatabaseConnection,
        rewriter: Arc<dyn ArticleRewriter>,
        fetcher: FeedFetcher,
        pricing: Pricing,
    ) -> Self {
        Self {
            db,
            rewriter,
            fetcher,
            pricing,
        }
    }

    pub fn fetcher(&self) -> &FeedFetcher {
        &self.fetcher
    }

    /// Runs every variant of `plan` concurrently. One variant failing never cancels
    /// the others; the result holds the outcomes in variant order.
    pub async fn generate_variants(
        &self,
        ctx: &PipelineContext,
        plan: &VariantPlan,
    ) -> Vec<VariantOutcome> {
        let variants = (0..plan.count as usize).map(|index| self.generate_variant(ctx, plan, index));
        join_all(variants).await.into_iter().flatten().collect()
    }

    async fn generate_variant(
        &self,
        ctx: &PipelineContext,
        plan: &VariantPlan,
        index: usize,
    ) -> Option<VariantOutcome> {
        let language = plan.language_for(index);
        let website_id = plan.website_for(index);
        let request = RewriteRequest {
            system_prompt: build_system_prompt(&PromptInput {
                language,
                categories: &ctx.categories,
                instruction: &ctx.instruction,
                content: &ctx.content,
            }),
            content: ctx.content.text.clone(),
            temperature: plan.temperature,
        };

        let failure = match self.rewriter.rewrite(request).await {
            Ok(response) => {
                match self.store_variant(ctx, plan, language, website_id, response).await {
                    Ok(Some(article)) => return Some(VariantOutcome::Generated { article }),
                    Ok(None) => return None,
                    Err(e) => {
                        error!(error = %e, language, "Failed to store generated article.");
                        e.to_string()
                    }
                }
            }
            Err(RewriteError::Parse(reason)) => {
                warn!(language, %reason, "Skipping variant with unparseable model output.");
                LogService::record_quietly(
                    &self.db,
                    format!(
                        "Skipped {language} variant of '{}': model output was not valid JSON ({reason})",
                        ctx.item.title
                    ),
                    LogCategory::Generation,
                    plan.task_id,
                )
                .await;
                return None;
            }
            Err(RewriteError::QuotaExceeded) => {
                warn!(language, "Language model quota exhausted.");
                LogService::record_quietly(
                    &self.db,
                    format!(
                        "Quota exhausted while generating {language} variant of '{}'",
                        ctx.item.title
                    ),
                    LogCategory::Quota,
                    plan.task_id,
                )
                .await;
                RewriteError::QuotaExceeded.to_string()
            }
            Err(e) => {
                error!(error = %e, language, "Rewrite request failed.");
                LogService::record_quietly(
                    &self.db,
                    format!("Failed to generate {language} variant of '{}': {e}", ctx.item.title),
                    LogCategory::Generation,
                    plan.task_id,
                )
                .await;
                e.to_string()
            }
        };

        debug!(language, reason = %failure, "Variant failed.");
        plan.keep_failures.then(|| VariantOutcome::Failed {
            language: language.to_string(),
            website_id,
            message: FAILED_ARTICLE_MESSAGE.to_string(),
        })
    }

    /// Reassembles and persists one rewrite. `Ok(None)` means the envelope did not have
    /// the expected shape and the variant was skipped.
    async fn store_variant(
        &self,
        ctx: &PipelineContext,
        plan: &VariantPlan,
        language: &str,
        website_id: Option<i32>,
        response: RewriteResponse,
    ) -> Result<Option<article::Model>, ArticleError> {
        let RewriteResponse { mut article, usage } = response;
        substitute_blockquotes(&mut article, &ctx.content.blockquotes);

        let rewritten = match RewrittenArticle::from_value(article) {
            Ok(rewritten) => rewritten,
            Err(e) => {
                warn!(language, error = %e, "Skipping variant with unexpected envelope shape.");
                LogService::record_quietly(
                    &self.db,
                    format!(
                        "Skipped {language} variant of '{}': unexpected response shape ({e})",
                        ctx.item.title
                    ),
                    LogCategory::Generation,
                    plan.task_id,
                )
                .await;
                return Ok(None);
            }
        };

        let content = rewritten.content_html();
        let title = if rewritten.title.trim().is_empty() {
            ctx.item.title.clone()
        } else {
            rewritten.title
        };
        let new_article = NewArticle {
            task_id: plan.task_id,
            website_id,
            language: language.to_string(),
            source_url: ctx.item.link.clone(),
            title,
            content,
            seo_title: rewritten.seo_title,
            meta_title: rewritten.meta_title,
            meta_description: rewritten.meta_description,
            meta_keywords: rewritten.meta_keywords,
            summary: rewritten.summary,
            primary_category: rewritten.primary_category,
            secondary_category: rewritten.secondary_category,
            prompt_tokens: usage.prompt_tokens,
            completion_tokens: usage.completion_tokens,
            total_tokens: usage.total_tokens,
            cost: self.pricing.cost(&usage),
        };
        let stored = ArticleService::insert(&self.db, new_article).await?;
        info!(article_id = stored.id, language, "Generated article stored.");
        Ok(Some(stored))
    }

    /// Names of every category attached to the given websites.
    async fn allowed_categories(&self, website_ids: &[i32]) -> Result<Vec<String>, GeneratorError> {
        let websites = WebsiteService::find_many(&self.db, website_ids).await?;
        let mut category_ids: Vec<i32> = websites
            .iter()
            .flat_map(|site| site.category_ids.0.iter().copied())
            .collect();
        category_ids.sort_unstable();
        category_ids.dedup();
        Ok(CategoryService::names_for_ids(&self.db, &category_ids).await?)
    }

    /// Request path: fetch a feed, pick one item and generate the variants, keeping a
    /// placeholder for each variant whose rewrite call failed.
    pub async fn generate_from_feed(
        &self,
        request: GenerateRequest,
    ) -> Result<GenerateResult, GeneratorError> {
        if !(0.0..=1.0).contains(&request.temperature) {
            return Err(GeneratorError::InvalidInput(
                "temperature must be between 0 and 1".to_string(),
            ));
        }
        let config = &request.feed_config;
        if config.article_count == 0 || config.article_count > MAX_ARTICLE_COUNT {
            return Err(GeneratorError::InvalidInput(format!(
                "article_count must be between 1 and {MAX_ARTICLE_COUNT}"
            )));
        }
        if config.languages.is_empty() {
            return Err(GeneratorError::InvalidInput(
                "at least one language must be selected".to_string(),
            ));
        }

        let items = self
            .fetcher
            .fetch_items(request.feed_url.trim(), &request.item_mapping)
            .await?;
        let item = match request.item_link.as_deref() {
            Some(link) => items.into_iter().find(|item| item.link == link).ok_or_else(|| {
                GeneratorError::InvalidInput(format!("no item with link '{link}' in the feed"))
            })?,
            None => items
                .into_iter()
                .next()
                .ok_or_else(|| GeneratorError::EmptyFeed(request.feed_url.clone()))?,
        };

        let categories = self.allowed_categories(&config.websites).await?;
        let plan = VariantPlan {
            count: config.article_count,
            languages: config.languages.clone(),
            websites: config.websites.clone(),
            temperature: request.temperature,
            task_id: None,
            keep_failures: true,
        };
        let ctx = PipelineContext::new(item, categories, config.prompt.clone());
        let variants = self.generate_variants(&ctx, &plan).await;

        Ok(GenerateResult {
            item_link: ctx.item.link,
            item_title: ctx.item.title,
            variants,
        })
    }

    /// Runs one task: newest feed item, `article_count` variants, failed variants
    /// dropped. The task is `running` for the duration and always returns to `idle`.
    pub async fn run_task(
        &self,
        task_id: i32,
        trigger: RunTrigger,
    ) -> Result<RunSummary, GeneratorError> {
        let task = TaskService::try_mark_running(&self.db, task_id).await?;
        info!(task_id, feed_url = %task.feed_url, ?trigger, "Task run started.");

        let outcome = self.process_task(&task, trigger).await;
        let processed_link = match &outcome {
            Ok(summary) if summary.skipped.is_none() => summary.item_link.clone(),
            _ => None,
        };
        if let Err(e) = TaskService::mark_idle(&self.db, task_id, processed_link).await {
            error!(task_id, error = %e, "Failed to return task to idle.");
        }

        match &outcome {
            Ok(summary) => info!(
                task_id,
                generated = summary.articles.len(),
                skipped = summary.skipped.as_deref().unwrap_or(""),
                "Task run finished."
            ),
            Err(e) => {
                warn!(task_id, error = %e, "Task run failed.");
                LogService::record_quietly(
                    &self.db,
                    format!("Task run for '{}' failed: {e}", task.feed_url),
                    LogCategory::Generation,
                    Some(task_id),
                )
                .await;
            }
        }
        outcome
    }

    async fn process_task(
        &self,
        task: &task::Model,
        trigger: RunTrigger,
    ) -> Result<RunSummary, GeneratorError> {
        let mut summary = RunSummary {
            task_id: task.id,
            trigger,
            item_link: None,
            item_title: None,
            skipped: None,
            articles: Vec::new(),
        };

        let items = self.fetcher.fetch_items(&task.feed_url, &task.item_mapping).await?;
        let Some(item) = items.into_iter().next() else {
            summary.skipped = Some("feed has no items".to_string());
            return Ok(summary);
        };
        summary.item_link = Some(item.link.clone());
        summary.item_title = Some(item.title.clone());

        if !item.link.is_empty() && task.last_item_link.as_deref() == Some(item.link.as_str()) {
            summary.skipped = Some("newest item was already processed".to_string());
            return Ok(summary);
        }

        let config = &task.feed_config;
        let categories = self.allowed_categories(&config.websites).await?;
        let plan = VariantPlan {
            count: config.article_count,
            languages: config.languages.clone(),
            websites: config.websites.clone(),
            temperature: SCHEDULED_TEMPERATURE,
            task_id: Some(task.id),
            keep_failures: false,
        };
        let ctx = PipelineContext::new(item, categories, config.prompt.clone());
        summary.articles = self
            .generate_variants(&ctx, &plan)
            .await
            .into_iter()
            .filter_map(|outcome| match outcome {
                VariantOutcome::Generated { article } => Some(article),
                VariantOutcome::Failed { .. } => None,
            })
            .collect();
        Ok(summary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::entities::task::TaskStatus;
    use crate::db::services::{
        ArticleFilter, CategoryInput, TaskInput, WebsiteInput,
    };
    use crate::db::test_connection;
    use async_trait::async_trait;
    use serde_json::json;
    use wiremock::matchers::method;
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const FEED: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<rss version="2.0" xmlns:content="http://purl.org/rss/1.0/modules/content/">
  <channel>
    <title>Wire</title>
    <link>https://wire.example</link>
    <description>Wire</description>
    <item>
      <title>Harbour reopens</title>
      <link>https://wire.example/harbour</link>
      <content:encoded><![CDATA[<p>Ships returned.</p><blockquote class="twitter-tweet">Mayor: finally</blockquote><img src="https://cdn.example/ship.jpg">]]></content:encoded>
    </item>
    <item>
      <title>Older story</title>
      <link>https://wire.example/older</link>
      <description>Old</description>
    </item>
  </channel>
</rss>"#;

    /// Answers per target language, which it reads back out of the system prompt.
    struct ScriptedRewriter;

    fn language_of(request: &RewriteRequest) -> String {
        let marker = "this language: ";
        let start = request.system_prompt.find(marker).unwrap() + marker.len();
        let end = request.system_prompt[start..].find('.').unwrap();
        request.system_prompt[start..start + end].to_string()
    }

    #[async_trait]
    impl ArticleRewriter for ScriptedRewriter {
        async fn rewrite(&self, request: RewriteRequest) -> Result<RewriteResponse, RewriteError> {
            match language_of(&request).as_str() {
                "fr" => Err(RewriteError::QuotaExceeded),
                "de" => Err(RewriteError::Parse("expected value at line 1".to_string())),
                "es" => Ok(RewriteResponse {
                    article: json!({ "title": "Sin forma", "sections": "not a list" }),
                    usage: TokenUsage::default(),
                }),
                language => Ok(RewriteResponse {
                    article: json!({
                        "title": format!("Harbour ({language})"),
                        "sections": [
                            { "heading": "Back to work", "paragraphs": ["Ships returned.", "[BLOCKQUOTE]"] }
                        ],
                        "seo_title": "Harbour reopens",
                        "meta_title": "Harbour",
                        "meta_description": "The harbour reopened.",
                        "meta_keywords": "harbour, ships",
                        "summary": "Reopened.",
                        "primary_category": "Local",
                        "secondary_category": ""
                    }),
                    usage: TokenUsage {
                        prompt_tokens: 1000,
                        completion_tokens: 500,
                        total_tokens: 1500,
                    },
                }),
            }
        }
    }

    const PRICING: Pricing = Pricing {
        input_per_million: 0.15,
        output_per_million: 0.60,
    };

    fn generator(db: &DatabaseConnection) -> ArticleGenerator {
        ArticleGenerator::new(db.clone(), Arc::new(ScriptedRewriter), FeedFetcher::new(), PRICING)
    }

    fn sample_item() -> FeedItem {
        FeedItem {
            title: "Harbour reopens".to_string(),
            link: "https://wire.example/harbour".to_string(),
            content: "<p>Ships returned.</p><blockquote>Mayor: finally</blockquote>".to_string(),
            thumbnail: None,
            published_at: None,
            fields: Vec::new(),
        }
    }

    fn plan(languages: &[&str], keep_failures: bool) -> VariantPlan {
        VariantPlan {
            count: languages.len() as u32,
            languages: languages.iter().map(|l| l.to_string()).collect(),
            websites: Vec::new(),
            temperature: 0.7,
            task_id: None,
            keep_failures,
        }
    }

    async fn serve_feed() -> MockServer {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string(FEED))
            .mount(&server)
            .await;
        server
    }

    #[test]
    fn test_cost_uses_per_million_prices() {
        let usage = TokenUsage {
            prompt_tokens: 1000,
            completion_tokens: 500,
            total_tokens: 1500,
        };
        assert!((PRICING.cost(&usage) - 0.00045).abs() < 1e-12);
    }

    #[tokio::test]
    async fn test_quota_failure_is_logged_and_siblings_still_return() {
        let db = test_connection().await;
        let generator = generator(&db);
        let ctx = PipelineContext::new(sample_item(), Vec::new(), "Rewrite.".to_string());

        let outcomes = generator.generate_variants(&ctx, &plan(&["en", "fr", "it"], true)).await;
        assert_eq!(outcomes.len(), 3);
        assert!(matches!(outcomes[0], VariantOutcome::Generated { .. }));
        match &outcomes[1] {
            VariantOutcome::Failed { language, message, .. } => {
                assert_eq!(language, "fr");
                assert_eq!(message, FAILED_ARTICLE_MESSAGE);
            }
            other => panic!("expected a failed placeholder, got {other:?}"),
        }
        assert!(matches!(outcomes[2], VariantOutcome::Generated { .. }));

        let quota_logs = LogService::list(&db, Some("quota")).await.unwrap();
        assert_eq!(quota_logs.len(), 1);
        let stored = ArticleService::list(&db, ArticleFilter::default()).await.unwrap();
        assert_eq!(stored.len(), 2);
    }

    #[tokio::test]
    async fn test_malformed_output_is_skipped_on_both_paths() {
        let db = test_connection().await;
        let generator = generator(&db);
        let ctx = PipelineContext::new(sample_item(), Vec::new(), "Rewrite.".to_string());

        let outcomes = generator.generate_variants(&ctx, &plan(&["de", "en", "es"], true)).await;
        assert_eq!(outcomes.len(), 1);
        let VariantOutcome::Generated { article } = &outcomes[0] else {
            panic!("expected the english variant to succeed");
        };
        assert_eq!(article.language, "en");
        assert_eq!(
            article.content,
            "<h2>Back to work</h2><p>Ships returned.</p><p><blockquote>Mayor: finally</blockquote></p>"
        );
        assert_eq!(article.total_tokens, 1500);
        assert!((article.cost - 0.00045).abs() < 1e-12);

        let generation_logs = LogService::list(&db, Some("generation")).await.unwrap();
        assert_eq!(generation_logs.len(), 2);

        let outcomes = generator.generate_variants(&ctx, &plan(&["fr", "de"], false)).await;
        assert!(outcomes.is_empty());
    }

    #[tokio::test]
    async fn test_variants_cycle_languages_and_websites() {
        let db = test_connection().await;
        let generator = generator(&db);
        let ctx = PipelineContext::new(sample_item(), Vec::new(), "Rewrite.".to_string());
        let mut plan = plan(&["en", "it"], true);
        plan.count = 4;
        plan.websites = vec![7, 8, 9];

        let outcomes = generator.generate_variants(&ctx, &plan).await;
        let targets: Vec<(String, Option<i32>)> = outcomes
            .into_iter()
            .map(|outcome| match outcome {
                VariantOutcome::Generated { article } => (article.language, article.website_id),
                VariantOutcome::Failed { .. } => panic!("no failures expected"),
            })
            .collect();
        assert_eq!(
            targets,
            vec![
                ("en".to_string(), Some(7)),
                ("it".to_string(), Some(8)),
                ("en".to_string(), Some(9)),
                ("it".to_string(), Some(7)),
            ]
        );
    }

    #[tokio::test]
    async fn test_run_task_processes_newest_item_once() {
        let db = test_connection().await;
        let server = serve_feed().await;
        let generator = generator(&db);

        let site = WebsiteService::create(
            &db,
            WebsiteInput {
                name: "Harbour Times".to_string(),
                url: "https://harbour.example".to_string(),
                slug: None,
                languages: vec!["en".to_string()],
                author: "Desk".to_string(),
                description: String::new(),
                category_ids: Vec::new(),
            },
        )
        .await
        .unwrap();
        CategoryService::create(
            &db,
            CategoryInput {
                name: "Local".to_string(),
                slug: None,
                value: Some("local".to_string()),
                is_parent: true,
                parent_id: None,
                website_id: Some(site.id),
            },
        )
        .await
        .unwrap();
        let task = TaskService::create(
            &db,
            TaskInput {
                feed_url: format!("{}/rss", server.uri()),
                item_mapping: FeedItemMapping::default(),
                feed_config: FeedConfig {
                    websites: vec![site.id],
                    languages: vec!["en".to_string(), "fr".to_string()],
                    prompt: "Rewrite for locals.".to_string(),
                    article_count: 2,
                },
            },
        )
        .await
        .unwrap();

        let summary = generator.run_task(task.id, RunTrigger::Manual).await.unwrap();
        assert_eq!(summary.item_link.as_deref(), Some("https://wire.example/harbour"));
        assert!(summary.skipped.is_none());
        assert_eq!(summary.articles.len(), 1);
        assert_eq!(summary.articles[0].website_id, Some(site.id));
        assert_eq!(summary.articles[0].task_id, Some(task.id));
        assert!(summary.articles[0].content.contains("Mayor: finally"));

        let after = TaskService::get(&db, task.id).await.unwrap();
        assert_eq!(after.status, TaskStatus::Idle);
        assert_eq!(after.last_item_link.as_deref(), Some("https://wire.example/harbour"));

        let again = generator.run_task(task.id, RunTrigger::Scheduler).await.unwrap();
        assert!(again.skipped.is_some());
        assert!(again.articles.is_empty());
        assert_eq!(
            ArticleService::list(&db, ArticleFilter::default()).await.unwrap().len(),
            1
        );
    }

    #[tokio::test]
    async fn test_run_task_rejects_running_task_and_recovers_from_feed_errors() {
        let db = test_connection().await;
        let generator = generator(&db);
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let task = TaskService::create(
            &db,
            TaskInput {
                feed_url: format!("{}/rss", server.uri()),
                item_mapping: FeedItemMapping::default(),
                feed_config: FeedConfig {
                    languages: vec!["en".to_string()],
                    ..FeedConfig::default()
                },
            },
        )
        .await
        .unwrap();

        let err = generator.run_task(task.id, RunTrigger::Manual).await.unwrap_err();
        assert!(matches!(err, GeneratorError::Feed(FeedError::Status(_))));
        assert_eq!(TaskService::get(&db, task.id).await.unwrap().status, TaskStatus::Idle);

        TaskService::try_mark_running(&db, task.id).await.unwrap();
        let err = generator.run_task(task.id, RunTrigger::Scheduler).await.unwrap_err();
        assert!(matches!(err, GeneratorError::Task(TaskError::AlreadyActive(_))));
    }

    #[tokio::test]
    async fn test_generate_from_feed_validates_and_keeps_placeholders() {
        let db = test_connection().await;
        let server = serve_feed().await;
        let generator = generator(&db);

        let mut request = GenerateRequest {
            feed_url: format!("{}/rss", server.uri()),
            item_mapping: FeedItemMapping::default(),
            feed_config: FeedConfig {
                languages: vec!["en".to_string(), "fr".to_string()],
                prompt: "Rewrite.".to_string(),
                article_count: 2,
                ..FeedConfig::default()
            },
            temperature: 1.5,
            item_link: None,
        };
        assert!(matches!(
            generator.generate_from_feed(request.clone()).await.unwrap_err(),
            GeneratorError::InvalidInput(_)
        ));

        request.temperature = 0.9;
        request.item_link = Some("https://wire.example/older".to_string());
        let result = generator.generate_from_feed(request).await.unwrap();
        assert_eq!(result.item_title, "Older story");
        assert_eq!(result.variants.len(), 2);
        assert!(matches!(result.variants[1], VariantOutcome::Failed { .. }));
    }
}
