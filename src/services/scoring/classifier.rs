// Classifier Adapter & Handle
// The sequence classifier and its tokenizer are external capabilities.
// Adapter implementations own any output-shape normalization; the core
// sees a single well-defined interface. The handle serializes every
// encode/decode/classify sequence behind one lock because the underlying
// capability may keep internal mutable buffers.

use std::sync::Mutex;
use thiserror::Error;
use tracing::warn;

use super::chunker::{chunk_tokens, OVERLAP_FRACTION};
use super::truncate_chars;

#[derive(Debug, Error)]
pub enum ClassifierError {
    #[error("classifier backend error: {0}")]
    Backend(String),
    #[error("classifier handle poisoned")]
    Poisoned,
    #[error("classifier produced no usable output")]
    NoOutput,
}

/// Contract for the external classifier/tokenizer capability:
/// `encode(text) -> token ids`, `decode(token ids) -> text`,
/// `classify(text) -> probability in [0, 1]`.
///
/// Methods take `&mut self`: implementations are not assumed safe for
/// concurrent invocation.
pub trait ClassifierAdapter: Send {
    fn encode(&mut self, text: &str) -> Result<Vec<u32>, ClassifierError>;
    fn decode(&mut self, token_ids: &[u32]) -> Result<String, ClassifierError>;
    /// Implementations must truncate input past their own token limit
    /// themselves: the single-pass fallback hands over raw text that may
    /// exceed one window.
    fn classify(&mut self, text: &str) -> Result<f64, ClassifierError>;
}

/// Process-wide classifier handle. All access goes through [`Self::session`],
/// which holds the lock for the whole critical section so interleaved
/// encode/decode/classify sequences from different callers cannot corrupt
/// each other.
pub struct ClassifierHandle {
    inner: Mutex<Box<dyn ClassifierAdapter>>,
}

impl ClassifierHandle {
    pub fn new(adapter: Box<dyn ClassifierAdapter>) -> Self {
        Self {
            inner: Mutex::new(adapter),
        }
    }

    /// Run `f` with exclusive access to the adapter.
    pub fn session<T>(
        &self,
        f: impl FnOnce(&mut dyn ClassifierAdapter) -> T,
    ) -> Result<T, ClassifierError> {
        let mut guard = self.inner.lock().map_err(|_| ClassifierError::Poisoned)?;
        Ok(f(guard.as_mut()))
    }

    /// Worst-case model score for one text: the maximum classifier
    /// probability across all chunk windows. Chunking failures fall back to
    /// a single truncated pass; individual chunk failures are skipped. An
    /// error here means no usable classifier output at all, and the caller
    /// degrades to a rule-only score.
    pub fn model_score(
        &self,
        text: &str,
        max_len: usize,
        max_text_len: usize,
    ) -> Result<f64, ClassifierError> {
        if text.is_empty() {
            return Ok(0.0);
        }
        let text = truncate_chars(text, max_text_len);

        self.session(|adapter| {
            let chunks = match chunk_tokens(adapter, text, max_len, OVERLAP_FRACTION) {
                Ok(chunks) => chunks,
                Err(e) => {
                    warn!(error = %e, "encode failed; single-pass fallback");
                    Vec::new()
                }
            };

            if chunks.is_empty() {
                // Degenerate tokenizer output: score the raw (truncated) text once.
                return adapter.classify(text).map(|p| p.clamp(0.0, 1.0));
            }

            let mut best: f64 = 0.0;
            let mut any_ok = false;
            for chunk in &chunks {
                let chunk_text = match adapter.decode(&chunk.token_ids) {
                    Ok(t) => t,
                    Err(e) => {
                        warn!(chunk = chunk.index, error = %e, "decode failed; skipping chunk");
                        continue;
                    }
                };
                match adapter.classify(&chunk_text) {
                    Ok(p) => {
                        any_ok = true;
                        best = best.max(p.clamp(0.0, 1.0));
                    }
                    Err(e) => {
                        warn!(chunk = chunk.index, error = %e, "classify failed; skipping chunk");
                    }
                }
            }

            if any_ok {
                Ok(best)
            } else {
                Err(ClassifierError::NoOutput)
            }
        })?
    }
}
