// MarketGuard Data Models
// Wire shapes for the scoring and explanation pipeline

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

// ============ Risk Bucket ============

/// Discrete risk label derived from a combined score.
/// Ordering follows severity: `Low < Medium < High`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RiskBucket {
    Low,
    Medium,
    High,
}

impl RiskBucket {
    pub fn as_str(&self) -> &'static str {
        match self {
            RiskBucket::Low => "LOW",
            RiskBucket::Medium => "MEDIUM",
            RiskBucket::High => "HIGH",
        }
    }

    /// Lowercase form used in explanation prose ("overall risk is high").
    pub fn as_lower(&self) -> &'static str {
        match self {
            RiskBucket::Low => "low",
            RiskBucket::Medium => "medium",
            RiskBucket::High => "high",
        }
    }
}

// ============ Highlights ============

/// Evidence record for one triggered rule: the pattern that matched,
/// its category tag, and the human-readable justification.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Highlight {
    pub span: String,
    pub tag: String,
    pub reason: String,
}

// ============ Scoring Requests ============

/// One batch entry. Ids are caller-supplied and echoed back for correlation;
/// they are not required to be unique.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchItem {
    pub id: i64,
    #[serde(default)]
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<HashMap<String, serde_json::Value>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchScoreRequest {
    #[serde(default = "default_lang")]
    pub lang: String,
    pub items: Vec<BatchItem>,
}

/// Legacy-compatible request: either a full batch payload or a bare
/// `{"text": ...}` single-item shape. Both run the identical pipeline.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum ScoreRequest {
    Batch(BatchScoreRequest),
    Single {
        #[serde(default)]
        text: String,
    },
}

// ============ Scoring Responses ============

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoreResponse {
    pub risk: RiskBucket,
    pub score: f64,
    pub highlights: Vec<Highlight>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchResultItem {
    pub id: i64,
    pub score: f64,
    pub risk: RiskBucket,
    pub highlights: Vec<Highlight>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchScoreResponse {
    pub results: Vec<BatchResultItem>,
}

/// Result of the legacy-compatible dispatch: mirrors the request shape.
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum ScoreReply {
    Batch(BatchScoreResponse),
    Single(ScoreResponse),
}

// ============ Explanation ============

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExplainRequest {
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub highlights: Option<Vec<Highlight>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExplainResponse {
    pub risk: RiskBucket,
    pub score: f64,
    pub explanation: String,
    /// "generated" when the generative model produced the prose,
    /// "templated" when the deterministic fallback did.
    pub source: String,
    pub bullets: Vec<String>,
    pub highlights: Vec<Highlight>,
}

// ============ Health ============

/// Startup/health summary of the loaded engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineInfo {
    pub ok: bool,
    pub rules_loaded: usize,
    pub max_len: usize,
    pub max_text_len: usize,
    pub max_items: usize,
}

fn default_lang() -> String {
    "en".to_string()
}
