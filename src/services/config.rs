// Engine Configuration
// Environment-driven knobs, read once at startup and validated before
// any scoring happens. Rule/config failures here are fatal by design;
// per-request failures are handled downstream with fallbacks.

use serde::{Deserialize, Serialize};
use std::str::FromStr;
use thiserror::Error;

/// Hard ceiling on a single text, in characters. Caps pathological-input
/// cost; longer inputs are truncated, not rejected.
pub const DEFAULT_MAX_TEXT_LEN: usize = 12_000;
/// Hard ceiling on batch size; excess items are silently dropped.
pub const DEFAULT_MAX_ITEMS: usize = 1_000;
/// Default classifier input limit in tokens (model-imposed).
pub const DEFAULT_CLASSIFIER_MAX_LEN: usize = 512;

const CLASSIFIER_LEN_FLOOR: usize = 16;
const CLASSIFIER_LEN_CEIL: usize = 512;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid value for {var}: {value}")]
    Invalid { var: &'static str, value: String },
    #[error("{var} out of range: {detail}")]
    OutOfRange { var: &'static str, detail: String },
}

/// Sampling parameters forwarded to the generative explanation model.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationConfig {
    pub temperature: f64,
    pub top_p: f64,
    pub max_new_tokens: usize,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            temperature: 0.35,
            top_p: 0.9,
            max_new_tokens: 180,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    pub max_text_len: usize,
    pub max_items: usize,
    /// Classifier input limit in tokens, clamped into [16, 512].
    pub classifier_max_len: usize,
    pub generation: GenerationConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_text_len: DEFAULT_MAX_TEXT_LEN,
            max_items: DEFAULT_MAX_ITEMS,
            classifier_max_len: DEFAULT_CLASSIFIER_MAX_LEN,
            generation: GenerationConfig::default(),
        }
    }
}

impl EngineConfig {
    /// Read configuration from the environment. Unset variables fall back to
    /// defaults; unparseable or out-of-range values are a startup error.
    pub fn from_env() -> Result<Self, ConfigError> {
        let config = Self {
            max_text_len: read_env("MARKETGUARD_MAX_TEXT_LEN", DEFAULT_MAX_TEXT_LEN)?,
            max_items: read_env("MARKETGUARD_MAX_ITEMS", DEFAULT_MAX_ITEMS)?,
            classifier_max_len: read_env(
                "MARKETGUARD_CLASSIFIER_MAX_LEN",
                DEFAULT_CLASSIFIER_MAX_LEN,
            )?,
            generation: GenerationConfig {
                temperature: read_env("GEN_TEMPERATURE", 0.35)?,
                top_p: read_env("GEN_TOP_P", 0.9)?,
                max_new_tokens: read_env("GEN_MAX_NEW_TOKENS", 180)?,
            },
        };
        config.validated()
    }

    /// Validate ranges and apply the classifier-length safety clamp.
    pub fn validated(mut self) -> Result<Self, ConfigError> {
        if self.max_text_len == 0 {
            return Err(ConfigError::OutOfRange {
                var: "MARKETGUARD_MAX_TEXT_LEN",
                detail: "must be positive".to_string(),
            });
        }
        if self.max_items == 0 {
            return Err(ConfigError::OutOfRange {
                var: "MARKETGUARD_MAX_ITEMS",
                detail: "must be positive".to_string(),
            });
        }
        // Tokenizers report nonsense limits often enough that the original
        // service clamped instead of failing; keep that behavior.
        self.classifier_max_len = self
            .classifier_max_len
            .clamp(CLASSIFIER_LEN_FLOOR, CLASSIFIER_LEN_CEIL);

        let gen = &self.generation;
        if !gen.temperature.is_finite() || gen.temperature <= 0.0 || gen.temperature > 2.0 {
            return Err(ConfigError::OutOfRange {
                var: "GEN_TEMPERATURE",
                detail: format!("{} not in (0, 2]", gen.temperature),
            });
        }
        if !gen.top_p.is_finite() || gen.top_p <= 0.0 || gen.top_p > 1.0 {
            return Err(ConfigError::OutOfRange {
                var: "GEN_TOP_P",
                detail: format!("{} not in (0, 1]", gen.top_p),
            });
        }
        if gen.max_new_tokens == 0 || gen.max_new_tokens > 2048 {
            return Err(ConfigError::OutOfRange {
                var: "GEN_MAX_NEW_TOKENS",
                detail: format!("{} not in [1, 2048]", gen.max_new_tokens),
            });
        }
        Ok(self)
    }
}

fn read_env<T>(var: &'static str, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
{
    match std::env::var(var) {
        Ok(raw) if !raw.trim().is_empty() => {
            raw.trim().parse::<T>().map_err(|_| ConfigError::Invalid {
                var,
                value: raw,
            })
        }
        _ => Ok(default),
    }
}
