// Knowledge base: uploaded documents -> plain text -> chunks -> vector index.
// Rebuilt from scratch on every upload batch; nothing is persisted.

pub mod chunker;
pub mod extract;
pub mod index;
