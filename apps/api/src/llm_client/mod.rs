//! LLM client: the single point of entry for all remote model calls in cvchat.
//!
//! No other module talks to the provider over HTTP. Embeddings and chat
//! completions both go through `LlmClient`, which speaks the OpenAI-compatible
//! REST API and owns the timeout and retry policy.
//!
//! The rest of the crate only sees the `Embedder` and `ChatCompleter` traits.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

use crate::config::Config;
use crate::models::message::{Message, Role};

#[derive(Debug, Error)]
pub enum LlmError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API error (status {status}): {message}")]
    Api { status: u16, message: String },

    #[error("JSON parse error: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Request timed out after {secs}s")]
    Timeout { secs: u64 },

    #[error("Gave up after {attempts} attempts: {last}")]
    RetryExhausted { attempts: u32, last: String },

    #[error("LLM returned empty content")]
    EmptyContent,

    #[error("Malformed response: {0}")]
    Malformed(String),
}

/// Turns texts into vectors. One vector per input, in input order.
#[async_trait]
pub trait Embedder: Send + Sync {
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, LlmError>;
}

/// Produces the assistant's next reply given a system instruction and the turns so far.
#[async_trait]
pub trait ChatCompleter: Send + Sync {
    async fn complete(&self, system: &str, turns: &[Message]) -> Result<String, LlmError>;
}

/// Bounded exponential backoff: waits `base_delay`, `2 * base_delay`, ... between attempts.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
}

impl RetryPolicy {
    fn delay_before(&self, attempt: u32) -> Duration {
        self.base_delay * (1u32 << (attempt - 1).min(16))
    }

    /// Log line for a retry; `failed` is the 1-based attempt that just failed.
    fn retry_notice(&self, path: &str, failed: u32, delay: Duration) -> String {
        format!(
            "Provider call to {} failed on attempt {}/{}, starting attempt {} after {}ms",
            path,
            failed,
            self.max_attempts,
            failed + 1,
            delay.as_millis()
        )
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(1000),
        }
    }
}

#[derive(Debug, Clone)]
pub struct LlmSettings {
    pub api_key: String,
    pub base_url: String,
    pub chat_model: String,
    pub embedding_model: String,
    pub temperature: f32,
    pub timeout: Duration,
    pub retry: RetryPolicy,
}

impl LlmSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            api_key: config.openai_api_key.clone(),
            base_url: config.openai_base_url.trim_end_matches('/').to_string(),
            chat_model: config.chat_model.clone(),
            embedding_model: config.embedding_model.clone(),
            temperature: config.chat_temperature,
            timeout: config.request_timeout(),
            retry: RetryPolicy {
                max_attempts: config.max_retries,
                ..RetryPolicy::default()
            },
        }
    }
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    temperature: f32,
    messages: Vec<WireMessage<'a>>,
}

#[derive(Debug, Serialize)]
struct WireMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
    usage: Option<Usage>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChatChoiceMessage {
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Usage {
    prompt_tokens: u32,
    #[serde(default)]
    completion_tokens: u32,
}

#[derive(Debug, Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: &'a [String],
}

#[derive(Debug, Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingData {
    index: usize,
    embedding: Vec<f32>,
}

#[derive(Debug, Deserialize)]
struct ProviderError {
    error: ProviderErrorBody,
}

#[derive(Debug, Deserialize)]
struct ProviderErrorBody {
    message: String,
}

/// Outcome of a single HTTP attempt, before the retry loop decides what to do with it.
enum Attempt<T> {
    Done(T),
    Retry(LlmError),
}

/// The single provider client used by the indexer and the conversation engine.
#[derive(Clone)]
pub struct LlmClient {
    client: Client,
    settings: LlmSettings,
}

impl LlmClient {
    pub fn new(settings: LlmSettings) -> Result<Self, LlmError> {
        Ok(Self {
            client: Client::builder().build()?,
            settings,
        })
    }

    pub fn chat_model(&self) -> &str {
        &self.settings.chat_model
    }

    pub fn embedding_model(&self) -> &str {
        &self.settings.embedding_model
    }

    /// POSTs `body` to `{base_url}{path}` and decodes the JSON reply.
    ///
    /// Each attempt is bounded by the configured timeout; a timed-out attempt
    /// is reported as `LlmError::Timeout` and not retried. 429, 5xx and
    /// transport failures are retried with exponential backoff until the
    /// attempt budget runs out, which yields `LlmError::RetryExhausted`.
    async fn post_json<B, R>(&self, path: &str, body: &B) -> Result<R, LlmError>
    where
        B: Serialize + Sync,
        R: DeserializeOwned,
    {
        let url = format!("{}{}", self.settings.base_url, path);
        let retry = self.settings.retry;
        let mut last_error: Option<LlmError> = None;

        for attempt in 0..retry.max_attempts {
            if attempt > 0 {
                let delay = retry.delay_before(attempt);
                warn!("{}", retry.retry_notice(path, attempt, delay));
                tokio::time::sleep(delay).await;
            }

            let outcome = tokio::time::timeout(self.settings.timeout, self.attempt(&url, body))
                .await
                .map_err(|_| LlmError::Timeout {
                    secs: self.settings.timeout.as_secs(),
                })?;

            match outcome? {
                Attempt::Done(value) => return Ok(value),
                Attempt::Retry(err) => last_error = Some(err),
            }
        }

        Err(LlmError::RetryExhausted {
            attempts: retry.max_attempts,
            last: last_error
                .map(|e| e.to_string())
                .unwrap_or_else(|| "no attempt was made".to_string()),
        })
    }

    async fn attempt<B, R>(&self, url: &str, body: &B) -> Result<Attempt<R>, LlmError>
    where
        B: Serialize + Sync,
        R: DeserializeOwned,
    {
        let response = self
            .client
            .post(url)
            .bearer_auth(&self.settings.api_key)
            .json(body)
            .send()
            .await;

        let response = match response {
            Ok(r) => r,
            Err(e) if e.is_connect() || e.is_timeout() || e.is_request() => {
                return Ok(Attempt::Retry(LlmError::Http(e)))
            }
            Err(e) => return Err(LlmError::Http(e)),
        };

        let status = response.status();

        if status.as_u16() == 429 || status.is_server_error() {
            let body = response.text().await.unwrap_or_default();
            warn!("Provider returned {}: {}", status, body);
            return Ok(Attempt::Retry(LlmError::Api {
                status: status.as_u16(),
                message: body,
            }));
        }

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let message = serde_json::from_str::<ProviderError>(&body)
                .map(|e| e.error.message)
                .unwrap_or(body);
            return Err(LlmError::Api {
                status: status.as_u16(),
                message,
            });
        }

        let bytes = response.bytes().await?;
        Ok(Attempt::Done(serde_json::from_slice(&bytes)?))
    }
}

#[async_trait]
impl ChatCompleter for LlmClient {
    async fn complete(&self, system: &str, turns: &[Message]) -> Result<String, LlmError> {
        let mut messages = Vec::with_capacity(turns.len() + 1);
        messages.push(WireMessage {
            role: "system",
            content: system,
        });
        messages.extend(turns.iter().map(|m| WireMessage {
            role: match m.role {
                Role::User => "user",
                Role::Assistant => "assistant",
            },
            content: &m.content,
        }));

        let request = ChatRequest {
            model: &self.settings.chat_model,
            temperature: self.settings.temperature,
            messages,
        };

        let response: ChatResponse = self.post_json("/chat/completions", &request).await?;

        if let Some(usage) = &response.usage {
            debug!(
                "Chat completion succeeded: prompt_tokens={}, completion_tokens={}",
                usage.prompt_tokens, usage.completion_tokens
            );
        }

        response
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .filter(|text| !text.trim().is_empty())
            .ok_or(LlmError::EmptyContent)
    }
}

#[async_trait]
impl Embedder for LlmClient {
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, LlmError> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let request = EmbeddingRequest {
            model: &self.settings.embedding_model,
            input: texts,
        };

        let mut response: EmbeddingResponse = self.post_json("/embeddings", &request).await?;

        if response.data.len() != texts.len() {
            return Err(LlmError::Malformed(format!(
                "sent {} inputs, received {} embeddings",
                texts.len(),
                response.data.len()
            )));
        }

        // The API does not promise to keep input order.
        response.data.sort_by_key(|d| d.index);
        debug!("Embedded {} texts", texts.len());

        Ok(response.data.into_iter().map(|d| d.embedding).collect())
    }
}
