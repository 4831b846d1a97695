//! Feed item → rewritten article pipeline.
//!
//! `feed` fetches and maps RSS items, `sanitizer` swaps embedded media for placeholder
//! tokens, `prompt` composes the system message, `rewrite_client` calls the language
//! model, `reassembly` puts blockquotes back and flattens sections to HTML, and
//! `generator` runs the stages per variant and persists the results.

pub mod feed;
pub mod generator;
pub mod prompt;
pub mod reassembly;
pub mod rewrite_client;
pub mod sanitizer;

pub use feed::{FeedError, FeedFetcher, FeedItem};
pub use generator::{
    ArticleGenerator, GenerateRequest, GenerateResult, GeneratorError, PipelineContext, Pricing,
    RunSummary, RunTrigger, VariantOutcome, VariantPlan,
};
pub use rewrite_client::{ArticleRewriter, ChatCompletionClient, RewriteError};
