// Deterministic stubs for the external classifier/tokenizer and the
// generative model. No network, no weights: a whitespace tokenizer with an
// interned vocabulary and scripted probabilities.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use super::classifier::{ClassifierAdapter, ClassifierError};
use super::explain::{GenerationError, GenerativeModel};
use crate::services::config::GenerationConfig;

/// Observes how many sessions are inside the adapter at once.
#[derive(Debug, Default)]
pub struct ConcurrencyProbe {
    current: AtomicUsize,
    max: AtomicUsize,
}

impl ConcurrencyProbe {
    fn enter(&self) {
        let now = self.current.fetch_add(1, Ordering::SeqCst) + 1;
        self.max.fetch_max(now, Ordering::SeqCst);
    }

    fn exit(&self) {
        self.current.fetch_sub(1, Ordering::SeqCst);
    }

    pub fn max_observed(&self) -> usize {
        self.max.load(Ordering::SeqCst)
    }
}

/// Whitespace tokenizer + scripted classifier. Token ids index an interned
/// vocabulary so decode exactly reverses encode.
pub struct StubClassifier {
    vocab: Vec<String>,
    scores: Vec<f64>,
    next_score: usize,
    fail_encode: bool,
    fail_classify: bool,
    probe: Option<Arc<ConcurrencyProbe>>,
}

impl StubClassifier {
    pub fn fixed(probability: f64) -> Self {
        Self::with_scores(vec![probability])
    }

    /// Scripted per-call probabilities; the last one repeats.
    pub fn with_scores(scores: Vec<f64>) -> Self {
        assert!(!scores.is_empty());
        Self {
            vocab: Vec::new(),
            scores,
            next_score: 0,
            fail_encode: false,
            fail_classify: false,
            probe: None,
        }
    }

    pub fn failing_encode(mut self) -> Self {
        self.fail_encode = true;
        self
    }

    pub fn failing_classify(mut self) -> Self {
        self.fail_classify = true;
        self
    }

    pub fn tracking(mut self) -> Self {
        self.probe = Some(Arc::new(ConcurrencyProbe::default()));
        self
    }

    pub fn concurrency_probe(&self) -> Arc<ConcurrencyProbe> {
        self.probe.as_ref().expect("call tracking() first").clone()
    }

    fn intern(&mut self, word: &str) -> u32 {
        if let Some(pos) = self.vocab.iter().position(|w| w == word) {
            return pos as u32;
        }
        self.vocab.push(word.to_string());
        (self.vocab.len() - 1) as u32
    }
}

impl ClassifierAdapter for StubClassifier {
    fn encode(&mut self, text: &str) -> Result<Vec<u32>, ClassifierError> {
        if self.fail_encode {
            return Err(ClassifierError::Backend("stub encode failure".to_string()));
        }
        let words: Vec<String> = text.split_whitespace().map(str::to_string).collect();
        Ok(words.iter().map(|w| self.intern(w)).collect())
    }

    fn decode(&mut self, token_ids: &[u32]) -> Result<String, ClassifierError> {
        let mut words = Vec::with_capacity(token_ids.len());
        for &id in token_ids {
            let word = self
                .vocab
                .get(id as usize)
                .ok_or_else(|| ClassifierError::Backend(format!("unknown token id {}", id)))?;
            words.push(word.as_str());
        }
        Ok(words.join(" "))
    }

    fn classify(&mut self, _text: &str) -> Result<f64, ClassifierError> {
        if let Some(probe) = &self.probe {
            probe.enter();
            std::thread::sleep(Duration::from_millis(2));
            probe.exit();
        }
        if self.fail_classify {
            return Err(ClassifierError::Backend("stub classify failure".to_string()));
        }
        let idx = self.next_score.min(self.scores.len() - 1);
        self.next_score += 1;
        Ok(self.scores[idx])
    }
}

/// Scripted generative model for the explanation path.
pub struct StubGenerator {
    reply: Option<String>,
    fail: bool,
}

impl StubGenerator {
    pub fn replying(text: &str) -> Self {
        Self {
            reply: Some(text.to_string()),
            fail: false,
        }
    }

    pub fn empty() -> Self {
        Self {
            reply: Some(String::new()),
            fail: false,
        }
    }

    pub fn failing() -> Self {
        Self {
            reply: None,
            fail: true,
        }
    }
}

impl GenerativeModel for StubGenerator {
    fn generate(
        &mut self,
        _prompt: &str,
        _config: &GenerationConfig,
    ) -> Result<String, GenerationError> {
        if self.fail {
            return Err(GenerationError::Backend("stub generator failure".to_string()));
        }
        Ok(self.reply.clone().unwrap_or_default())
    }
}
