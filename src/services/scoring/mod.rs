// Scoring Pipeline
// Hybrid rule + classifier risk scoring: rule matching, token-window
// chunking, worst-case model aggregation, linear blending and bucketing,
// plus the best-effort explanation decorator.

pub mod chunker;
pub mod classifier;
pub mod combiner;
pub mod engine;
pub mod explain;

#[cfg(test)]
pub(crate) mod test_support;

pub use chunker::{chunk_tokens, Chunk, OVERLAP_FRACTION};
pub use classifier::{ClassifierAdapter, ClassifierError, ClassifierHandle};
pub use combiner::{bucket, combine, round3};
pub use engine::{ScoringEngine, Scored};
pub use explain::{Explanation, GenerationError, GenerativeModel, GeneratorHandle};

use thiserror::Error;

/// Request-level errors. The scoring pipeline itself never fails for
/// well-formed text; only operations with a documented hard requirement
/// (non-empty text on the explanation path) surface an error.
#[derive(Debug, Error)]
pub enum ScoreError {
    #[error("text is required")]
    EmptyText,
}

/// Truncate to at most `max_chars` characters on a char boundary.
/// Byte-indexed slicing would panic inside multi-byte sequences.
pub(crate) fn truncate_chars(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((byte_idx, _)) => &text[..byte_idx],
        None => text,
    }
}
