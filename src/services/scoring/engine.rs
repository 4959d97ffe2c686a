// Scoring Engine
// Owns the rule table, the classifier handle, and the optional generator,
// and runs the full pipeline: rule match + chunked model score, combined
// into a bounded score with a risk bucket and evidence highlights.

use tracing::{debug, warn};

use super::classifier::{ClassifierError, ClassifierHandle};
use super::combiner::{bucket, combine, round3};
use super::explain::{explain, GeneratorHandle, MAX_BULLETS};
use super::ScoreError;
use crate::models::{
    BatchItem, BatchResultItem, BatchScoreResponse, EngineInfo, ExplainRequest, ExplainResponse,
    Highlight, ScoreReply, ScoreRequest, ScoreResponse,
};
use crate::services::config::EngineConfig;
use crate::services::rules::RuleTable;

/// Full outcome of scoring one text.
#[derive(Debug, Clone)]
pub struct Scored {
    pub risk: crate::models::RiskBucket,
    pub score: f64,
    pub highlights: Vec<Highlight>,
    /// Reason strings of triggered rules, used for explanation bullets.
    pub signals: Vec<String>,
}

pub struct ScoringEngine {
    config: EngineConfig,
    rules: RuleTable,
    classifier: ClassifierHandle,
    generator: Option<GeneratorHandle>,
}

impl ScoringEngine {
    pub fn new(config: EngineConfig, rules: RuleTable, classifier: ClassifierHandle) -> Self {
        Self {
            config,
            rules,
            classifier,
            generator: None,
        }
    }

    pub fn with_generator(mut self, generator: GeneratorHandle) -> Self {
        self.generator = Some(generator);
        self
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Score one text. Pure with respect to the text: rule match plus the
    /// chunked classifier pass, combined and rounded. A classifier failure
    /// degrades to the rule score alone rather than failing the request.
    fn score_inner(&self, text: &str) -> Scored {
        let rule = self.rules.match_text(text, self.config.max_text_len);

        let model_score = match self.classifier.model_score(
            text,
            self.config.classifier_max_len,
            self.config.max_text_len,
        ) {
            Ok(p) => Some(p),
            Err(e) => {
                warn!(error = %e, "classifier unavailable; scoring on rules only");
                None
            }
        };

        let combined = match model_score {
            Some(p) => combine(rule.score, p),
            None => rule.score.clamp(0.0, 1.0),
        };
        // Bucket the raw combined value; rounding is for reporting only.
        let risk = bucket(combined);
        let score = round3(combined);

        debug!(
            rule_score = rule.score,
            model_score = ?model_score,
            score,
            risk = risk.as_str(),
            "scored text"
        );

        Scored {
            risk,
            score,
            highlights: rule.highlights,
            signals: rule.signals,
        }
    }

    pub fn score_text(&self, text: &str) -> ScoreResponse {
        let scored = self.score_inner(text);
        ScoreResponse {
            risk: scored.risk,
            score: scored.score,
            highlights: scored.highlights,
        }
    }

    /// Score a batch in order, echoing each caller-supplied id. Items past
    /// the batch cap are dropped silently; every kept item yields exactly
    /// one result, including empty texts.
    pub fn score_batch(&self, items: &[BatchItem]) -> BatchScoreResponse {
        if items.len() > self.config.max_items {
            warn!(
                submitted = items.len(),
                kept = self.config.max_items,
                "batch over limit; extra items dropped"
            );
        }
        let results = items
            .iter()
            .take(self.config.max_items)
            .map(|item| {
                let scored = self.score_inner(&item.text);
                BatchResultItem {
                    id: item.id,
                    score: scored.score,
                    risk: scored.risk,
                    highlights: scored.highlights,
                }
            })
            .collect();
        BatchScoreResponse { results }
    }

    /// Dispatch either request shape through the same pipeline.
    pub fn handle(&self, request: ScoreRequest) -> ScoreReply {
        match request {
            ScoreRequest::Single { text } => ScoreReply::Single(self.score_text(&text)),
            ScoreRequest::Batch(batch) => ScoreReply::Batch(self.score_batch(&batch.items)),
        }
    }

    /// Score a text and decorate the result with a prose explanation.
    /// Caller-supplied highlights, when present, take precedence over the
    /// freshly computed ones for the evidence bullets.
    pub fn explain_request(&self, request: ExplainRequest) -> Result<ExplainResponse, ScoreError> {
        if request.text.trim().is_empty() {
            return Err(ScoreError::EmptyText);
        }

        let scored = self.score_inner(&request.text);
        let highlights = request.highlights.unwrap_or_else(|| scored.highlights.clone());

        let mut bullets: Vec<String> = if scored.signals.is_empty() {
            highlights.iter().map(|h| h.reason.clone()).collect()
        } else {
            scored.signals.clone()
        };
        bullets.retain(|b| !b.trim().is_empty());
        bullets.truncate(MAX_BULLETS);

        let explanation = explain(
            self.generator.as_ref(),
            &self.config.generation,
            &request.text,
            &bullets,
            scored.risk,
            scored.score,
        );

        Ok(ExplainResponse {
            risk: scored.risk,
            score: scored.score,
            explanation: explanation.text().to_string(),
            source: explanation.source().to_string(),
            bullets,
            highlights,
        })
    }

    pub fn info(&self) -> EngineInfo {
        EngineInfo {
            ok: true,
            rules_loaded: self.rules.len(),
            max_len: self.config.classifier_max_len,
            max_text_len: self.config.max_text_len,
            max_items: self.config.max_items,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::RiskBucket;
    use crate::services::scoring::test_support::{StubClassifier, StubGenerator};

    fn engine_with(stub: StubClassifier) -> ScoringEngine {
        ScoringEngine::new(
            EngineConfig::default(),
            RuleTable::default_rules(),
            ClassifierHandle::new(Box::new(stub)),
        )
    }

    fn items(texts: &[(i64, &str)]) -> Vec<BatchItem> {
        texts
            .iter()
            .map(|(id, text)| BatchItem {
                id: *id,
                text: text.to_string(),
                metadata: None,
            })
            .collect()
    }

    #[test]
    fn test_guaranteed_no_risk_is_high() {
        // Rule score (0.7 + 0.6) / 2 = 0.65, model 0.9:
        // 0.4 * 0.9 + 0.6 * 0.65 = 0.75.
        let engine = engine_with(StubClassifier::fixed(0.9));
        let out = engine.score_text("This is guaranteed, no risk at all!");
        assert_eq!(out.score, 0.75);
        assert_eq!(out.risk, RiskBucket::High);
        assert_eq!(out.highlights.len(), 2);
    }

    #[test]
    fn test_bucket_derives_from_unrounded_score() {
        // Rule score 0.65, model 0.899: combined = 0.7496, which rounds up
        // to 0.75 for display but sits below the HIGH threshold.
        let engine = engine_with(StubClassifier::fixed(0.899));
        let out = engine.score_text("guaranteed no risk returns");
        assert_eq!(out.score, 0.75);
        assert_eq!(out.risk, RiskBucket::Medium);
    }

    #[test]
    fn test_benign_text_is_low() {
        let engine = engine_with(StubClassifier::fixed(0.1));
        let out = engine.score_text("hello there, how are you?");
        assert_eq!(out.score, 0.04);
        assert_eq!(out.risk, RiskBucket::Low);
        assert!(out.highlights.is_empty());
    }

    #[test]
    fn test_scoring_is_deterministic() {
        let engine = engine_with(StubClassifier::fixed(0.42));
        let text = "double money with quick profits";
        let first = engine.score_text(text);
        let second = engine.score_text(text);
        assert_eq!(first.score, second.score);
        assert_eq!(first.risk, second.risk);
        assert_eq!(first.highlights, second.highlights);
    }

    #[test]
    fn test_batch_preserves_order_and_ids() {
        let engine = engine_with(StubClassifier::fixed(0.2));
        let out = engine.score_batch(&items(&[(3, "guaranteed returns"), (1, "hello")]));
        assert_eq!(out.results.len(), 2);
        assert_eq!(out.results[0].id, 3);
        assert_eq!(out.results[1].id, 1);
        assert!(out.results[0].score > out.results[1].score);
    }

    #[test]
    fn test_batch_over_limit_is_truncated() {
        let engine = engine_with(StubClassifier::fixed(0.0));
        let batch: Vec<BatchItem> = (0..1_500)
            .map(|i| BatchItem {
                id: i,
                text: "hi".to_string(),
                metadata: None,
            })
            .collect();
        let out = engine.score_batch(&batch);
        assert_eq!(out.results.len(), 1_000);
        assert_eq!(out.results.last().map(|r| r.id), Some(999));
    }

    #[test]
    fn test_empty_batch_item_still_scored() {
        let engine = engine_with(StubClassifier::fixed(0.9));
        let out = engine.score_batch(&items(&[(5, "")]));
        assert_eq!(out.results.len(), 1);
        assert_eq!(out.results[0].score, 0.0);
        assert_eq!(out.results[0].risk, RiskBucket::Low);
        assert!(out.results[0].highlights.is_empty());
    }

    #[test]
    fn test_classifier_failure_degrades_to_rules() {
        let engine = engine_with(StubClassifier::fixed(0.9).failing_classify());
        let out = engine.score_text("This is guaranteed, no risk at all!");
        // Rule score alone: (0.7 + 0.6) / 2.
        assert_eq!(out.score, 0.65);
        assert_eq!(out.risk, RiskBucket::Medium);
        assert_eq!(out.highlights.len(), 2);
    }

    #[test]
    fn test_classifier_failure_batch_is_complete() {
        let engine = engine_with(StubClassifier::fixed(0.9).failing_classify());
        let out = engine.score_batch(&items(&[(1, "guaranteed"), (2, "hello"), (3, "1000x")]));
        assert_eq!(out.results.len(), 3);
        assert_eq!(out.results[2].score, 1.0);
    }

    #[test]
    fn test_single_and_batch_agree() {
        let engine = engine_with(StubClassifier::fixed(0.5));
        let text = "risk-free quick profits";
        let single = engine.score_text(text);
        let batch = engine.score_batch(&items(&[(0, text)]));
        assert_eq!(single.score, batch.results[0].score);
        assert_eq!(single.risk, batch.results[0].risk);
        assert_eq!(single.highlights, batch.results[0].highlights);
    }

    #[test]
    fn test_handle_dispatches_both_shapes() {
        let engine = engine_with(StubClassifier::fixed(0.1));
        let single: ScoreRequest = serde_json::from_str(r#"{"text": "hello"}"#).unwrap();
        match engine.handle(single) {
            ScoreReply::Single(resp) => assert_eq!(resp.risk, RiskBucket::Low),
            ScoreReply::Batch(_) => panic!("expected single reply"),
        }
        let batch: ScoreRequest =
            serde_json::from_str(r#"{"items": [{"id": 1, "text": "hello"}]}"#).unwrap();
        match engine.handle(batch) {
            ScoreReply::Batch(resp) => assert_eq!(resp.results.len(), 1),
            ScoreReply::Single(_) => panic!("expected batch reply"),
        }
    }

    #[test]
    fn test_explain_rejects_empty_text() {
        let engine = engine_with(StubClassifier::fixed(0.1));
        let err = engine
            .explain_request(ExplainRequest {
                text: "   ".to_string(),
                highlights: None,
            })
            .unwrap_err();
        assert!(matches!(err, ScoreError::EmptyText));
    }

    #[test]
    fn test_explain_without_generator_is_templated() {
        let engine = engine_with(StubClassifier::fixed(0.9));
        let out = engine
            .explain_request(ExplainRequest {
                text: "guaranteed 1000x returns".to_string(),
                highlights: None,
            })
            .unwrap();
        assert_eq!(out.source, "templated");
        assert!(!out.explanation.is_empty());
        assert!(!out.bullets.is_empty());
        assert!(out.explanation.contains("guaranteed") || out.explanation.contains("Claims"));
    }

    #[test]
    fn test_explain_with_generator_is_generated() {
        let engine = engine_with(StubClassifier::fixed(0.9)).with_generator(
            GeneratorHandle::new(Box::new(StubGenerator::replying("Looks risky."))),
        );
        let out = engine
            .explain_request(ExplainRequest {
                text: "guaranteed returns".to_string(),
                highlights: None,
            })
            .unwrap();
        assert_eq!(out.source, "generated");
        assert_eq!(out.explanation, "Looks risky.");
    }

    #[test]
    fn test_explain_uses_caller_highlights() {
        let engine = engine_with(StubClassifier::fixed(0.1));
        let supplied = vec![Highlight {
            span: "wire me money".to_string(),
            tag: "payment".to_string(),
            reason: "Request to wire money.".to_string(),
        }];
        let out = engine
            .explain_request(ExplainRequest {
                text: "please wire me money today".to_string(),
                highlights: Some(supplied.clone()),
            })
            .unwrap();
        assert_eq!(out.highlights, supplied);
    }

    #[test]
    fn test_info_reports_engine_shape() {
        let engine = engine_with(StubClassifier::fixed(0.0));
        let info = engine.info();
        assert!(info.ok);
        assert_eq!(info.rules_loaded, 8);
        assert_eq!(info.max_len, 512);
        assert_eq!(info.max_text_len, 12_000);
        assert_eq!(info.max_items, 1_000);
    }
}
