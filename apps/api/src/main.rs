mod config;
mod conversation;
mod errors;
mod extractors;
mod knowledge;
mod llm_client;
mod models;
mod routes;
mod session;
mod state;
#[cfg(test)]
mod testing;

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::Config;
use crate::knowledge::chunker::{
    ChunkConfig, DEFAULT_CHUNK_OVERLAP, DEFAULT_CHUNK_SIZE, DEFAULT_SEPARATOR,
};
use crate::llm_client::{LlmClient, LlmSettings};
use crate::routes::build_router;
use crate::session::controller::{Providers, SessionSettings};
use crate::state::{AppState, SessionStore};

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration first (fails fast on missing credentials)
    let config = Config::from_env()?;

    // Initialize structured logging
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(format!("{}={}", env!("CARGO_PKG_NAME"), &config.rust_log))
        }))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting cvchat v{}", env!("CARGO_PKG_VERSION"));

    // One client serves both capabilities; sessions only see the traits.
    let llm = LlmClient::new(LlmSettings::from_config(&config))?;
    info!(
        "LLM client initialized (chat: {}, embeddings: {}, timeout: {}s, attempts: {})",
        llm.chat_model(),
        llm.embedding_model(),
        config.request_timeout_secs,
        config.max_retries
    );

    let providers = Providers {
        embedder: Arc::new(llm.clone()),
        chat: Arc::new(llm),
    };

    let settings = SessionSettings {
        chunking: ChunkConfig::new(DEFAULT_SEPARATOR, DEFAULT_CHUNK_SIZE, DEFAULT_CHUNK_OVERLAP)?,
        retrieval_k: config.retrieval_k,
    };
    info!(
        "Chunking at {} chars with {} overlap, retrieving top {}",
        settings.chunking.chunk_size(),
        settings.chunking.chunk_overlap(),
        settings.retrieval_k
    );

    let sessions = SessionStore::default();
    let idle_ttl = config.session_idle_ttl();
    sessions.spawn_sweeper(idle_ttl, idle_ttl.min(Duration::from_secs(60)));
    info!("Idle sessions expire after {}s", idle_ttl.as_secs());

    let state = AppState {
        sessions,
        providers,
        settings,
        max_upload_bytes: config.max_upload_bytes,
    };

    let app = build_router(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive());

    let addr: SocketAddr = format!("0.0.0.0:{}", config.port).parse()?;
    info!("Listening on {addr}");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
