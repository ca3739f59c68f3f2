use std::sync::Arc;

use tracing::{debug, info};

use crate::conversation::prompts::{condense_prompt, qa_system, CONDENSE_SYSTEM};
use crate::errors::{AppError, RemoteCall};
use crate::knowledge::index::{ScoredChunk, VectorIndex};
use crate::llm_client::ChatCompleter;
use crate::models::message::Message;

/// Result of one `ask`: the whole history after the exchange, plus what was retrieved.
#[derive(Debug, Clone)]
pub struct AskOutcome {
    pub history: Vec<Message>,
    pub sources: Vec<ScoredChunk>,
    pub standalone_question: String,
}

/// Owns the session's vector index, the chat capability, and the dialogue memory.
pub struct ConversationEngine {
    index: VectorIndex,
    chat: Arc<dyn ChatCompleter>,
    history: Vec<Message>,
    retrieval_k: usize,
}

impl ConversationEngine {
    pub fn new(index: VectorIndex, chat: Arc<dyn ChatCompleter>, retrieval_k: usize) -> Self {
        Self {
            index,
            chat,
            history: Vec::new(),
            retrieval_k,
        }
    }

    pub fn history(&self) -> &[Message] {
        &self.history
    }

    pub fn index(&self) -> &VectorIndex {
        &self.index
    }

    /// Answers `question` from the indexed documents.
    ///
    /// Follow-ups are first condensed into a standalone question so retrieval
    /// sees the conversation's subject. History grows by exactly one user and
    /// one assistant message, and only once the reply is in hand.
    pub async fn ask(&mut self, question: &str) -> Result<AskOutcome, AppError> {
        let question = question.trim();
        if question.is_empty() {
            return Err(AppError::Validation("Question must not be empty".to_string()));
        }

        let standalone = self.standalone_question(question).await?;
        let sources = self.index.retrieve(&standalone, self.retrieval_k).await?;
        debug!(
            "Retrieved {} chunks for '{}' (best score {:.3})",
            sources.len(),
            standalone,
            sources.first().map(|s| s.score).unwrap_or_default()
        );

        let system = qa_system(&sources);
        let mut turns = self.history.clone();
        turns.push(Message::user(question));

        let reply = self
            .chat
            .complete(&system, &turns)
            .await
            .map_err(|e| AppError::remote(RemoteCall::ChatCompletion, e))?;

        self.history.push(Message::user(question));
        self.history.push(Message::assistant(reply.trim()));
        info!("Answered question; history now {} messages", self.history.len());

        Ok(AskOutcome {
            history: self.history.clone(),
            sources,
            standalone_question: standalone,
        })
    }

    async fn standalone_question(&self, question: &str) -> Result<String, AppError> {
        if self.history.is_empty() {
            return Ok(question.to_string());
        }

        let prompt = condense_prompt(&self.history, question);
        let rewritten = self
            .chat
            .complete(CONDENSE_SYSTEM, &[Message::user(prompt)])
            .await
            .map_err(|e| AppError::remote(RemoteCall::ChatCompletion, e))?;

        let rewritten = rewritten.trim();
        if rewritten.is_empty() {
            Ok(question.to_string())
        } else {
            Ok(rewritten.to_string())
        }
    }
}
