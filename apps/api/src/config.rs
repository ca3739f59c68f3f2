use std::str::FromStr;
use std::time::Duration;

use anyhow::{Context, Result};

/// Application configuration loaded from environment variables.
/// Startup fails if a required variable is missing or a value does not parse.
#[derive(Debug, Clone)]
pub struct Config {
    pub openai_api_key: String,
    pub openai_base_url: String,
    pub chat_model: String,
    pub embedding_model: String,
    pub chat_temperature: f32,
    /// Number of chunks handed to the chat model per question.
    pub retrieval_k: usize,
    pub request_timeout_secs: u64,
    pub max_retries: u32,
    pub max_upload_bytes: usize,
    /// Sessions untouched for this long are discarded.
    pub session_idle_ttl_secs: u64,
    pub port: u16,
    pub rust_log: String,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok(); // load .env if present; ignore if missing

        let config = Config {
            openai_api_key: require_env("OPENAI_API_KEY")?,
            openai_base_url: std::env::var("OPENAI_BASE_URL")
                .unwrap_or_else(|_| "https://api.openai.com/v1".to_string()),
            chat_model: std::env::var("CHAT_MODEL").unwrap_or_else(|_| "gpt-3.5-turbo".to_string()),
            embedding_model: std::env::var("EMBEDDING_MODEL")
                .unwrap_or_else(|_| "text-embedding-ada-002".to_string()),
            chat_temperature: parse_or("CHAT_TEMPERATURE", std::env::var("CHAT_TEMPERATURE").ok(), 0.7)?,
            retrieval_k: parse_or("RETRIEVAL_K", std::env::var("RETRIEVAL_K").ok(), 4)?,
            request_timeout_secs: parse_or(
                "REQUEST_TIMEOUT_SECS",
                std::env::var("REQUEST_TIMEOUT_SECS").ok(),
                60,
            )?,
            max_retries: parse_or("MAX_RETRIES", std::env::var("MAX_RETRIES").ok(), 3)?,
            max_upload_bytes: parse_or(
                "MAX_UPLOAD_BYTES",
                std::env::var("MAX_UPLOAD_BYTES").ok(),
                20 * 1024 * 1024,
            )?,
            session_idle_ttl_secs: parse_or(
                "SESSION_IDLE_TTL_SECS",
                std::env::var("SESSION_IDLE_TTL_SECS").ok(),
                30 * 60,
            )?,
            port: parse_or("PORT", std::env::var("PORT").ok(), 8080)?,
            rust_log: std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string()),
        };

        anyhow::ensure!(config.retrieval_k > 0, "RETRIEVAL_K must be at least 1");
        anyhow::ensure!(config.max_retries > 0, "MAX_RETRIES must be at least 1");
        anyhow::ensure!(
            config.session_idle_ttl_secs > 0,
            "SESSION_IDLE_TTL_SECS must be at least 1"
        );

        Ok(config)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn session_idle_ttl(&self) -> Duration {
        Duration::from_secs(self.session_idle_ttl_secs)
    }
}

fn require_env(key: &str) -> Result<String> {
    std::env::var(key).with_context(|| format!("Required environment variable '{key}' is not set"))
}

/// Parses an optional raw value, falling back to `default` when absent or blank.
fn parse_or<T>(key: &str, raw: Option<String>, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match raw.as_deref().map(str::trim) {
        None | Some("") => Ok(default),
        Some(value) => value
            .parse::<T>()
            .with_context(|| format!("{key} has an invalid value: '{value}'")),
    }
}
