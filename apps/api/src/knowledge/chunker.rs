//! Character splitter: cuts extracted text into overlapping, size-bounded chunks.
//!
//! Lengths are counted in `char`s. The text is split on the separator, oversized
//! pieces are windowed, and pieces are then greedily merged back together up
//! to `chunk_size`. Each new chunk starts with a tail of the previous one no
//! longer than `chunk_overlap`.

use std::collections::VecDeque;

use thiserror::Error;
use tracing::debug;

pub const DEFAULT_SEPARATOR: &str = "\n";
pub const DEFAULT_CHUNK_SIZE: usize = 1000;
pub const DEFAULT_CHUNK_OVERLAP: usize = 200;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ChunkConfigError {
    #[error("chunk_size must be greater than zero")]
    ZeroSize,

    #[error("chunk_overlap ({overlap}) must be smaller than chunk_size ({size})")]
    OverlapTooLarge { size: usize, overlap: usize },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChunkConfig {
    separator: String,
    chunk_size: usize,
    chunk_overlap: usize,
}

impl ChunkConfig {
    pub fn new(
        separator: impl Into<String>,
        chunk_size: usize,
        chunk_overlap: usize,
    ) -> Result<Self, ChunkConfigError> {
        if chunk_size == 0 {
            return Err(ChunkConfigError::ZeroSize);
        }
        if chunk_overlap >= chunk_size {
            return Err(ChunkConfigError::OverlapTooLarge {
                size: chunk_size,
                overlap: chunk_overlap,
            });
        }
        Ok(Self {
            separator: separator.into(),
            chunk_size,
            chunk_overlap,
        })
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    pub fn chunk_overlap(&self) -> usize {
        self.chunk_overlap
    }
}

impl Default for ChunkConfig {
    fn default() -> Self {
        Self {
            separator: DEFAULT_SEPARATOR.to_string(),
            chunk_size: DEFAULT_CHUNK_SIZE,
            chunk_overlap: DEFAULT_CHUNK_OVERLAP,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct CharacterSplitter {
    config: ChunkConfig,
}

impl CharacterSplitter {
    pub fn new(config: ChunkConfig) -> Self {
        Self { config }
    }

    pub fn split(&self, text: &str) -> Vec<String> {
        let pieces = self.pieces(text);
        let chunks = self.merge(&pieces);
        debug!(
            "Split {} characters into {} chunks",
            char_len(text),
            chunks.len()
        );
        chunks
    }

    /// Non-empty separator-delimited pieces, none longer than `chunk_size`.
    fn pieces<'a>(&self, text: &'a str) -> Vec<&'a str> {
        let raw: Vec<&str> = if self.config.separator.is_empty() {
            text.char_indices()
                .map(|(i, c)| &text[i..i + c.len_utf8()])
                .collect()
        } else {
            text.split(self.config.separator.as_str()).collect()
        };

        let mut pieces = Vec::with_capacity(raw.len());
        for piece in raw.into_iter().filter(|p| !p.is_empty()) {
            if char_len(piece) <= self.config.chunk_size {
                pieces.push(piece);
            } else {
                pieces.extend(self.windows(piece));
            }
        }
        pieces
    }

    /// Fixed windows over a piece that has no separator to break on.
    fn windows<'a>(&self, piece: &'a str) -> Vec<&'a str> {
        let boundaries: Vec<usize> = piece
            .char_indices()
            .map(|(i, _)| i)
            .chain(std::iter::once(piece.len()))
            .collect();
        let total = boundaries.len() - 1;
        let step = self.config.chunk_size - self.config.chunk_overlap;

        let mut windows = Vec::new();
        let mut start = 0;
        loop {
            let end = (start + self.config.chunk_size).min(total);
            windows.push(&piece[boundaries[start]..boundaries[end]]);
            if end == total {
                break;
            }
            start += step;
        }
        windows
    }

    fn merge(&self, pieces: &[&str]) -> Vec<String> {
        let size = self.config.chunk_size;
        let overlap = self.config.chunk_overlap;
        let sep_len = char_len(&self.config.separator);

        let mut chunks = Vec::new();
        let mut current: VecDeque<&str> = VecDeque::new();
        let mut total = 0usize;

        for &piece in pieces {
            let len = char_len(piece);
            let joiner = |current: &VecDeque<&str>| if current.is_empty() { 0 } else { sep_len };

            if total + len + joiner(&current) > size && !current.is_empty() {
                self.emit(&current, &mut chunks);

                while total > overlap || (total > 0 && total + len + joiner(&current) > size) {
                    let had_more = current.len() > 1;
                    let Some(first) = current.pop_front() else {
                        break;
                    };
                    total -= char_len(first) + if had_more { sep_len } else { 0 };
                }
            }

            current.push_back(piece);
            total += len + if current.len() > 1 { sep_len } else { 0 };
        }

        self.emit(&current, &mut chunks);
        chunks
    }

    fn emit(&self, current: &VecDeque<&str>, chunks: &mut Vec<String>) {
        let joined = current
            .iter()
            .copied()
            .collect::<Vec<_>>()
            .join(self.config.separator.as_str());
        let trimmed = joined.trim();
        if !trimmed.is_empty() {
            chunks.push(trimmed.to_string());
        }
    }
}

fn char_len(s: &str) -> usize {
    s.chars().count()
}
