// Retrieval-augmented conversation over the session's vector index.
// All chat calls go through the ChatCompleter trait, never directly to HTTP.

pub mod engine;
pub mod prompts;
