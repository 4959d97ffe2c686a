// Explanation Decorator
// Best-effort prose explanation of a score via an external generative
// capability. Every failure path degrades to a deterministic template, so
// the caller always receives non-empty output; the outcome variant records
// which path produced it.

use std::sync::Mutex;
use thiserror::Error;
use tracing::warn;

use super::truncate_chars;
use crate::models::RiskBucket;
use crate::services::config::GenerationConfig;

/// Prompt body cap, in characters.
pub const PROMPT_TEXT_CAP: usize = 1_200;
/// At most this many bullet signals go into the prompt.
const PROMPT_MAX_BULLETS: usize = 6;
/// The templated fallback lists at most this many bullets.
const FALLBACK_MAX_BULLETS: usize = 5;
/// Cap on bullets surfaced to the caller.
pub const MAX_BULLETS: usize = 8;

#[derive(Debug, Error)]
pub enum GenerationError {
    #[error("generator backend error: {0}")]
    Backend(String),
    #[error("generator handle poisoned")]
    Poisoned,
}

/// Contract for the optional generative capability:
/// `generate(prompt, sampling config) -> text`. Absence must not break
/// scoring, so everything downstream treats this as best-effort.
pub trait GenerativeModel: Send {
    fn generate(
        &mut self,
        prompt: &str,
        config: &GenerationConfig,
    ) -> Result<String, GenerationError>;
}

/// Same mutual-exclusion discipline as the classifier handle: the
/// generative capability may keep internal mutable state.
pub struct GeneratorHandle {
    inner: Mutex<Box<dyn GenerativeModel>>,
}

impl GeneratorHandle {
    pub fn new(model: Box<dyn GenerativeModel>) -> Self {
        Self {
            inner: Mutex::new(model),
        }
    }

    fn generate(
        &self,
        prompt: &str,
        config: &GenerationConfig,
    ) -> Result<String, GenerationError> {
        let mut guard = self.inner.lock().map_err(|_| GenerationError::Poisoned)?;
        guard.generate(prompt, config)
    }
}

/// Explanation outcome. `Generated` came from the model, `Templated` from
/// the deterministic fallback; tests and callers can tell them apart.
#[derive(Debug, Clone, PartialEq)]
pub enum Explanation {
    Generated(String),
    Templated(String),
}

impl Explanation {
    pub fn text(&self) -> &str {
        match self {
            Explanation::Generated(t) | Explanation::Templated(t) => t,
        }
    }

    pub fn source(&self) -> &'static str {
        match self {
            Explanation::Generated(_) => "generated",
            Explanation::Templated(_) => "templated",
        }
    }

    pub fn is_generated(&self) -> bool {
        matches!(self, Explanation::Generated(_))
    }
}

/// Build the bounded prompt sent to the generative model.
pub fn build_prompt(text: &str, bullets: &[String], risk: RiskBucket, score: f64) -> String {
    let cleaned: Vec<&str> = bullets
        .iter()
        .map(|b| b.trim())
        .filter(|b| !b.is_empty())
        .take(PROMPT_MAX_BULLETS)
        .collect();
    let bullets_block = if cleaned.is_empty() {
        "- (no explicit rule signals)".to_string()
    } else {
        cleaned
            .iter()
            .map(|b| format!("- {}", b))
            .collect::<Vec<_>>()
            .join("\n")
    };

    format!(
        "You are a financial safety expert.\n\
         Explain clearly why the following message could be a scam or risky.\n\
         Give practical guidance on what the user should do (verify, avoid payment/links, report).\n\
         Risk: {}  |  Score: {:.2}\n\
         Signals:\n{}\n\n\
         Message:\n\"\"\"\n{}\n\"\"\"\n\n\
         Write 3-5 concise sentences. Avoid emojis and sensational language.",
        risk.as_str(),
        score,
        bullets_block,
        truncate_chars(text, PROMPT_TEXT_CAP),
    )
}

/// Produce an explanation. Tries the generator when one is configured;
/// unavailable, failing, or empty generation all fall back to the template.
pub fn explain(
    generator: Option<&GeneratorHandle>,
    config: &GenerationConfig,
    text: &str,
    bullets: &[String],
    risk: RiskBucket,
    score: f64,
) -> Explanation {
    let Some(generator) = generator else {
        return Explanation::Templated(templated(bullets, risk, score));
    };

    let prompt = build_prompt(text, bullets, risk, score);
    match generator.generate(&prompt, config) {
        Ok(output) => {
            let output = output.trim();
            if output.is_empty() {
                Explanation::Templated(templated(bullets, risk, score))
            } else {
                Explanation::Generated(output.to_string())
            }
        }
        Err(e) => {
            warn!(error = %e, "generation failed; using templated explanation");
            Explanation::Templated(templated(bullets, risk, score))
        }
    }
}

/// Deterministic fallback sentence. Always non-empty.
fn templated(bullets: &[String], risk: RiskBucket, score: f64) -> String {
    let cleaned: Vec<&str> = bullets
        .iter()
        .map(|b| b.trim())
        .filter(|b| !b.is_empty())
        .take(FALLBACK_MAX_BULLETS)
        .collect();
    if cleaned.is_empty() {
        return format!(
            "No explicit scam patterns matched, but overall risk is {} ({:.2}). Stay cautious.",
            risk.as_lower(),
            score
        );
    }
    format!(
        "This text shows these scam signals: {}. Overall risk is {} ({:.2}). \
         Consider verifying the sender, avoiding payments/links, and reporting if suspicious.",
        cleaned.join("; "),
        risk.as_lower(),
        score
    )
}
