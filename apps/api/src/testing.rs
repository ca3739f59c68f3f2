//! Deterministic stand-ins for the remote providers, shared by unit tests.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use crate::conversation::prompts::{CONDENSE_SYSTEM, CONTEXT_DELIMITER, FOLLOW_UP_LABEL};
use crate::llm_client::{ChatCompleter, Embedder, LlmError};
use crate::models::message::Message;
use crate::session::controller::Providers;

fn provider_down() -> LlmError {
    LlmError::Api {
        status: 401,
        message: "invalid credentials".to_string(),
    }
}

/// Bag-of-words embedder: each lowercase alphanumeric token bumps one hashed dimension.
/// Identical texts embed identically; texts sharing words score higher.
pub struct HashEmbedder {
    dims: usize,
    failing: AtomicBool,
    calls: AtomicUsize,
}

impl HashEmbedder {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            dims: 256,
            failing: AtomicBool::new(false),
            calls: AtomicUsize::new(0),
        })
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn vector(&self, text: &str) -> Vec<f32> {
        let mut v = vec![0.0; self.dims];
        for token in text
            .split(|c: char| !c.is_alphanumeric())
            .filter(|t| !t.is_empty())
        {
            let mut hasher = DefaultHasher::new();
            token.to_lowercase().hash(&mut hasher);
            v[(hasher.finish() % self.dims as u64) as usize] += 1.0;
        }
        v
    }
}

#[async_trait]
impl Embedder for HashEmbedder {
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, LlmError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.failing.load(Ordering::SeqCst) {
            return Err(provider_down());
        }
        Ok(texts.iter().map(|t| self.vector(t)).collect())
    }
}

/// Chat stand-in. Condense requests get the follow-up question back verbatim;
/// answer requests get the retrieved context back, prefixed.
pub struct EchoChat {
    failing: AtomicBool,
    requests: Mutex<Vec<(String, Vec<Message>)>>,
}

impl EchoChat {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            failing: AtomicBool::new(false),
            requests: Mutex::new(Vec::new()),
        })
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn requests(&self) -> Vec<(String, Vec<Message>)> {
        self.requests.lock().unwrap().clone()
    }

    pub fn condense_requests(&self) -> usize {
        self.requests()
            .iter()
            .filter(|(system, _)| system == CONDENSE_SYSTEM)
            .count()
    }
}

#[async_trait]
impl ChatCompleter for EchoChat {
    async fn complete(&self, system: &str, turns: &[Message]) -> Result<String, LlmError> {
        self.requests
            .lock()
            .unwrap()
            .push((system.to_string(), turns.to_vec()));

        if self.failing.load(Ordering::SeqCst) {
            return Err(provider_down());
        }

        let last = turns.last().map(|m| m.content.as_str()).unwrap_or_default();
        if system == CONDENSE_SYSTEM {
            let follow_up = last
                .rsplit_once(FOLLOW_UP_LABEL)
                .map(|(_, q)| q.trim())
                .unwrap_or(last);
            return Ok(follow_up.to_string());
        }

        let context = system
            .split_once(CONTEXT_DELIMITER)
            .map(|(_, ctx)| ctx.trim())
            .unwrap_or_default();
        Ok(format!("According to the CVs: {context}"))
    }
}

pub fn providers(embedder: &Arc<HashEmbedder>, chat: &Arc<EchoChat>) -> Providers {
    Providers {
        embedder: embedder.clone(),
        chat: chat.clone(),
    }
}
