// Text Chunker
// Splits an encoded text into overlapping token windows sized to the
// classifier's input limit. Windows are decoded back to text downstream
// because the classifier contract is text-in/score-out.

use super::classifier::{ClassifierAdapter, ClassifierError};

/// Fraction of the window shared between consecutive chunks. Overlap keeps
/// signal that straddles a window boundary from being lost.
pub const OVERLAP_FRACTION: f64 = 0.2;

/// A bounded slice of a tokenized text. Derived and transient: chunks live
/// only for the duration of one scoring call.
#[derive(Debug, Clone, PartialEq)]
pub struct Chunk {
    pub token_ids: Vec<u32>,
    pub index: usize,
}

/// Number of tokens shared between consecutive windows.
pub fn stride_for(max_len: usize, overlap_fraction: f64) -> usize {
    let raw = (max_len.saturating_sub(2) as f64 * overlap_fraction).floor() as usize;
    raw.max(1)
}

/// Encode `text` and window the token sequence. An empty result signals
/// degenerate tokenizer output; the caller falls back to a single truncated
/// classifier pass on the raw text.
pub fn chunk_tokens(
    adapter: &mut dyn ClassifierAdapter,
    text: &str,
    max_len: usize,
    overlap_fraction: f64,
) -> Result<Vec<Chunk>, ClassifierError> {
    let ids = adapter.encode(text)?;
    Ok(windows(&ids, max_len, overlap_fraction))
}

/// Window a token sequence: one chunk when it fits, otherwise sliding
/// windows of `max_len` tokens whose consecutive pairs share `stride`
/// tokens. The final window may be short; the union covers the sequence.
pub fn windows(ids: &[u32], max_len: usize, overlap_fraction: f64) -> Vec<Chunk> {
    if ids.is_empty() || max_len == 0 {
        return Vec::new();
    }
    if ids.len() <= max_len {
        return vec![Chunk {
            token_ids: ids.to_vec(),
            index: 0,
        }];
    }

    let stride = stride_for(max_len, overlap_fraction);
    let step = max_len.saturating_sub(stride).max(1);

    let mut chunks = Vec::new();
    let mut start = 0;
    let mut index = 0;
    loop {
        let end = (start + max_len).min(ids.len());
        chunks.push(Chunk {
            token_ids: ids[start..end].to_vec(),
            index,
        });
        if end == ids.len() {
            break;
        }
        start += step;
        index += 1;
    }
    chunks
}
