//! Session controller: one user's workflow as an explicit state machine.
//!
//! `NoIndex` → `Indexed` on the first successful build; every later build
//! replaces the conversation wholesale. Failed builds leave the current state
//! exactly as it was.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{info, warn};

use crate::conversation::engine::ConversationEngine;
use crate::errors::AppError;
use crate::knowledge::chunker::{CharacterSplitter, ChunkConfig};
use crate::knowledge::extract::extract_text;
use crate::knowledge::index::{ScoredChunk, VectorIndex};
use crate::llm_client::{ChatCompleter, Embedder};
use crate::models::document::Document;
use crate::models::message::Message;
use crate::session::render::{render_turns, RenderedTurn};

/// The remote capabilities a session is wired to.
#[derive(Clone)]
pub struct Providers {
    pub embedder: Arc<dyn Embedder>,
    pub chat: Arc<dyn ChatCompleter>,
}

#[derive(Debug, Clone)]
pub struct SessionSettings {
    pub chunking: ChunkConfig,
    pub retrieval_k: usize,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            chunking: ChunkConfig::default(),
            retrieval_k: 4,
        }
    }
}

pub enum SessionState {
    NoIndex,
    Indexed(ConversationEngine),
}

#[derive(Debug)]
pub enum SessionEvent {
    BuildIndex(Vec<Document>),
    AskQuestion(String),
}

#[derive(Debug)]
pub enum SessionOutcome {
    Indexed(BuildSummary),
    Answered(AskReply),
}

#[derive(Debug, Clone, Serialize)]
pub struct BuildSummary {
    pub documents: usize,
    pub characters: usize,
    pub chunks: usize,
    pub dimension: usize,
    pub built_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct AskReply {
    pub turns: Vec<RenderedTurn>,
    pub sources: Vec<ScoredChunk>,
    pub standalone_question: String,
}

pub struct Session {
    state: SessionState,
    providers: Providers,
    settings: SessionSettings,
    created_at: DateTime<Utc>,
}

impl Session {
    pub fn new(providers: Providers, settings: SessionSettings) -> Self {
        Self {
            state: SessionState::NoIndex,
            providers,
            settings,
            created_at: Utc::now(),
        }
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn is_indexed(&self) -> bool {
        matches!(self.state, SessionState::Indexed(_))
    }

    pub fn history(&self) -> &[Message] {
        match &self.state {
            SessionState::NoIndex => &[],
            SessionState::Indexed(engine) => engine.history(),
        }
    }

    pub fn turns(&self) -> Vec<RenderedTurn> {
        render_turns(self.history())
    }

    /// Chunks held by the current index, or zero before the first build.
    pub fn indexed_chunks(&self) -> usize {
        match &self.state {
            SessionState::NoIndex => 0,
            SessionState::Indexed(engine) => engine.index().len(),
        }
    }

    pub async fn handle(&mut self, event: SessionEvent) -> Result<SessionOutcome, AppError> {
        match event {
            SessionEvent::BuildIndex(documents) => {
                self.build_index(documents).await.map(SessionOutcome::Indexed)
            }
            SessionEvent::AskQuestion(question) => {
                self.ask(&question).await.map(SessionOutcome::Answered)
            }
        }
    }

    /// Extract → chunk → embed, then install a fresh conversation. Any failure
    /// returns before the state is touched.
    pub async fn build_index(&mut self, documents: Vec<Document>) -> Result<BuildSummary, AppError> {
        if documents.is_empty() {
            return Err(AppError::Validation(
                "Upload at least one document before building the index".to_string(),
            ));
        }

        info!("Building index from {} document(s)", documents.len());

        let text = extract_text(&documents).await?;
        if text.trim().is_empty() {
            warn!("Uploaded documents contained no extractable text");
            return Err(AppError::Extraction(
                "no extractable text found (image-only or empty documents?)".to_string(),
            ));
        }

        let chunks = CharacterSplitter::new(self.settings.chunking.clone()).split(&text);
        let index = VectorIndex::build(chunks, self.providers.embedder.clone()).await?;

        let summary = BuildSummary {
            documents: documents.len(),
            characters: text.chars().count(),
            chunks: index.len(),
            dimension: index.dimension(),
            built_at: Utc::now(),
        };

        let replaced = self.is_indexed();
        self.state = SessionState::Indexed(ConversationEngine::new(
            index,
            self.providers.chat.clone(),
            self.settings.retrieval_k,
        ));
        info!(
            "Index ready: {} chunks{}",
            summary.chunks,
            if replaced { " (previous conversation discarded)" } else { "" }
        );

        Ok(summary)
    }

    pub async fn ask(&mut self, question: &str) -> Result<AskReply, AppError> {
        let SessionState::Indexed(engine) = &mut self.state else {
            return Err(AppError::InvalidState(
                "No documents have been indexed yet. Upload CVs and run them first.".to_string(),
            ));
        };

        let outcome = engine.ask(question).await?;

        Ok(AskReply {
            turns: render_turns(&outcome.history),
            sources: outcome.sources,
            standalone_question: outcome.standalone_question,
        })
    }
}
