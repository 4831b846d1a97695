use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

/// Temperature used by scheduled task runs.
pub const SCHEDULED_TEMPERATURE: f32 = 0.2;

#[derive(Error, Debug)]
pub enum RewriteError {
    #[error("Language model quota exhausted")]
    QuotaExceeded,
    #[error("Language model API returned {status}: {body}")]
    Api { status: StatusCode, body: String },
    #[error("Network error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("Model response is not valid JSON: {0}")]
    Parse(String),
}

#[derive(Debug, Clone)]
pub struct RewriteRequest {
    pub system_prompt: String,
    pub content: String,
    pub temperature: f32,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenUsage {
    #[serde(default)]
    pub prompt_tokens: i32,
    #[serde(default)]
    pub completion_tokens: i32,
    #[serde(default)]
    pub total_tokens: i32,
}

/// The parsed JSON envelope returned by the model, plus what it cost.
#[derive(Debug, Clone)]
pub struct RewriteResponse {
    pub article: Value,
    pub usage: TokenUsage,
}

/// Something that turns a prompt and sanitized content into a rewritten article.
#[async_trait]
pub trait ArticleRewriter: Send + Sync {
    async fn rewrite(&self, request: RewriteRequest) -> Result<RewriteResponse, RewriteError>;
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    temperature: f32,
    messages: [ChatMessage<'a>; 2],
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
    #[serde(default)]
    usage: TokenUsage,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatResponseMessage,
}

#[derive(Deserialize)]
struct ChatResponseMessage {
    #[serde(default)]
    content: Option<String>,
}

/// OpenAI-compatible chat completion client.
pub struct ChatCompletionClient {
    client: Client,
    api_url: String,
    api_key: String,
    model: String,
}

impl ChatCompletionClient {
    pub fn new(api_url: String, api_key: String, model: String) -> Self {
        Self {
            client: Client::new(),
            api_url,
            api_key,
            model,
        }
    }
}

#[async_trait]
impl ArticleRewriter for ChatCompletionClient {
    async fn rewrite(&self, request: RewriteRequest) -> Result<RewriteResponse, RewriteError> {
        let payload = ChatRequest {
            model: &self.model,
            temperature: request.temperature,
            messages: [
                ChatMessage {
                    role: "system",
                    content: &request.system_prompt,
                },
                ChatMessage {
                    role: "user",
                    content: &request.content,
                },
            ],
        };

        let response = self
            .client
            .post(&self.api_url)
            .bearer_auth(&self.api_key)
            .json(&payload)
            .send()
            .await?;
        let status = response.status();

        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "Failed to read error body".to_string());
            return Err(classify_failure(status, body));
        }

        let chat: ChatResponse = response
            .json()
            .await
            .map_err(|e| RewriteError::Parse(e.to_string()))?;
        let content = chat
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or_else(|| RewriteError::Parse("response has no message content".to_string()))?;

        let article = parse_envelope(&content)?;
        Ok(RewriteResponse {
            article,
            usage: chat.usage,
        })
    }
}

fn classify_failure(status: StatusCode, body: String) -> RewriteError {
    if status == StatusCode::TOO_MANY_REQUESTS {
        return RewriteError::QuotaExceeded;
    }
    let quota_exhausted = serde_json::from_str::<Value>(&body)
        .ok()
        .and_then(|parsed| parsed.get("error").cloned())
        .is_some_and(|error| {
            ["type", "code"]
                .iter()
                .any(|key| error.get(key).and_then(Value::as_str) == Some("insufficient_quota"))
        });
    if quota_exhausted {
        RewriteError::QuotaExceeded
    } else {
        RewriteError::Api { status, body }
    }
}

/// Parses the model's message content. A surrounding markdown code fence is tolerated.
pub fn parse_envelope(content: &str) -> Result<Value, RewriteError> {
    let mut trimmed = content.trim();
    if let Some(rest) = trimmed.strip_prefix("```") {
        let rest = rest.strip_prefix("json").unwrap_or(rest);
        trimmed = rest.strip_suffix("```").unwrap_or(rest).trim();
    }
    serde_json::from_str(trimmed).map_err(|e| RewriteError::Parse(e.to_string()))
}
