// Conversation prompt templates.
// All prompts for the conversation module are defined here.

use crate::knowledge::index::ScoredChunk;
use crate::models::message::{Message, Role};

/// Separates the answering instructions from the retrieved context.
pub const CONTEXT_DELIMITER: &str = "----------------";

/// Marks the question to rewrite inside the condense prompt.
pub const FOLLOW_UP_LABEL: &str = "Follow-up question:";

pub const QA_SYSTEM: &str = "\
You answer questions about the CVs (résumés) the user uploaded. \
Use only the pieces of context below. \
If the context does not contain the answer, say that you don't know. \
Do NOT make up names, dates, employers, or skills.";

pub const CONDENSE_SYSTEM: &str = "\
You rewrite follow-up questions so they can be understood without the conversation. \
Reply with the rewritten question only, in the language it was asked in.";

/// System message for the answering call: instructions, then the retrieved chunks.
pub fn qa_system(context: &[ScoredChunk]) -> String {
    let joined = context
        .iter()
        .map(|c| c.text.as_str())
        .collect::<Vec<_>>()
        .join("\n\n");
    format!("{QA_SYSTEM}\n{CONTEXT_DELIMITER}\n{joined}")
}

/// User message for the condense call: transcript so far plus the follow-up.
pub fn condense_prompt(history: &[Message], question: &str) -> String {
    let transcript = history
        .iter()
        .map(|m| match m.role {
            Role::User => format!("Human: {}", m.content),
            Role::Assistant => format!("Assistant: {}", m.content),
        })
        .collect::<Vec<_>>()
        .join("\n");
    format!(
        "Given the conversation below and a follow-up question, rephrase the follow-up \
         question to be a standalone question.\n\nConversation:\n{transcript}\n\n\
         {FOLLOW_UP_LABEL} {question}"
    )
}
