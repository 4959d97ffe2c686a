// Score Combiner
// Fixed linear blend of the rule and model scores, plus bucketing.

use crate::models::RiskBucket;

/// Blend weights: rules dominate because they encode explicit scam signals.
pub const MODEL_WEIGHT: f64 = 0.4;
pub const RULE_WEIGHT: f64 = 0.6;

/// Canonical bucket thresholds (batch-service policy).
pub const HIGH_THRESHOLD: f64 = 0.75;
pub const MEDIUM_THRESHOLD: f64 = 0.5;

/// `0.4 * model + 0.6 * rule`, clamped to [0, 1].
pub fn combine(rule_score: f64, model_score: f64) -> f64 {
    (MODEL_WEIGHT * model_score + RULE_WEIGHT * rule_score).clamp(0.0, 1.0)
}

/// Deterministic, monotonic mapping from combined score to risk bucket.
pub fn bucket(score: f64) -> RiskBucket {
    if score >= HIGH_THRESHOLD {
        RiskBucket::High
    } else if score >= MEDIUM_THRESHOLD {
        RiskBucket::Medium
    } else {
        RiskBucket::Low
    }
}

/// Round to 3 decimals for reporting.
pub fn round3(score: f64) -> f64 {
    (score * 1000.0).round() / 1000.0
}
