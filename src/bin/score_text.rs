use anyhow::{Context, Result};
use marketguard_lib::models::{BatchScoreRequest, ExplainRequest};
use marketguard_lib::services::config::EngineConfig;
use marketguard_lib::services::rules::RuleTable;
use marketguard_lib::services::scoring::{ClassifierAdapter, ClassifierError, ClassifierHandle};
use marketguard_lib::ScoringEngine;

use std::collections::HashMap;
use std::path::Path;

/// Offline stand-in for the sequence classifier: whitespace tokenization
/// with an interned vocabulary, and a bounded lexical heuristic in place of
/// model inference. Deterministic, so scores are reproducible across runs.
struct LexicalClassifier {
    vocab: Vec<String>,
    ids: HashMap<String, u32>,
}

impl LexicalClassifier {
    fn new() -> Self {
        Self {
            vocab: Vec::new(),
            ids: HashMap::new(),
        }
    }

    fn intern(&mut self, token: &str) -> u32 {
        if let Some(&id) = self.ids.get(token) {
            return id;
        }
        let id = self.vocab.len() as u32;
        self.vocab.push(token.to_string());
        self.ids.insert(token.to_string(), id);
        id
    }
}

impl ClassifierAdapter for LexicalClassifier {
    fn encode(&mut self, text: &str) -> Result<Vec<u32>, ClassifierError> {
        Ok(text
            .split_whitespace()
            .map(|tok| self.intern(&tok.to_lowercase()))
            .collect())
    }

    fn decode(&mut self, token_ids: &[u32]) -> Result<String, ClassifierError> {
        let words: Vec<&str> = token_ids
            .iter()
            .filter_map(|&id| self.vocab.get(id as usize).map(|s| s.as_str()))
            .collect();
        Ok(words.join(" "))
    }

    fn classify(&mut self, text: &str) -> Result<f64, ClassifierError> {
        let urgency = [
            "urgent", "now", "today", "immediately", "limited", "hurry", "act", "fast",
        ];
        let tokens: Vec<&str> = text.split_whitespace().collect();
        if tokens.is_empty() {
            return Ok(0.0);
        }
        let urgency_hits = tokens
            .iter()
            .filter(|t| urgency.contains(&t.trim_matches(|c: char| !c.is_alphanumeric())))
            .count();
        let exclamations = text.matches('!').count();
        let digits = text.chars().filter(|c| c.is_ascii_digit()).count();

        let score = 0.12 * urgency_hits as f64
            + 0.08 * exclamations.min(5) as f64
            + 0.02 * digits.min(10) as f64;
        Ok(score.clamp(0.0, 1.0))
    }
}

fn preview(s: &str, max_chars: usize) -> String {
    let mut out: String = s.chars().take(max_chars).collect();
    if s.chars().count() > max_chars {
        out.push_str("...");
    }
    out.replace('\n', " ")
}

fn parse_arg_value(args: &[String], key: &str) -> Option<String> {
    args.iter()
        .position(|a| a == key)
        .and_then(|i| args.get(i + 1))
        .cloned()
}

fn has_flag(args: &[String], key: &str) -> bool {
    args.iter().any(|a| a == key)
}

fn main() -> Result<()> {
    marketguard_lib::init_logging();

    let args: Vec<String> = std::env::args().collect();
    if args.len() < 2 {
        eprintln!(
            "Usage:\n  cargo run --bin score_text -- <text> [--rules <rules.json>] [--explain] [--out <json_path>]\n  cargo run --bin score_text -- --batch <batch.json> [--rules <rules.json>] [--out <json_path>]\n\nNotes:\n  - <batch.json> holds {{\"items\": [{{\"id\": ..., \"text\": ...}}]}}.\n  - Without --rules the built-in rule table is used.\n  - --explain adds a prose explanation (templated; no generator is wired in)."
        );
        return Ok(());
    }

    let rules_path = parse_arg_value(&args, "--rules");
    let batch_path = parse_arg_value(&args, "--batch");
    let out_path = parse_arg_value(&args, "--out");
    let explain = has_flag(&args, "--explain");

    let rules = match rules_path {
        Some(ref path) => RuleTable::from_file(Path::new(path))
            .with_context(|| format!("failed to load rules from {}", path))?,
        None => RuleTable::default_rules(),
    };

    let config = EngineConfig::from_env().context("invalid engine configuration")?;
    let engine = ScoringEngine::new(
        config,
        rules,
        ClassifierHandle::new(Box::new(LexicalClassifier::new())),
    );

    let info = engine.info();
    println!(
        "Engine: {} rules, classifier max_len={}, text cap={} chars, batch cap={}",
        info.rules_loaded, info.max_len, info.max_text_len, info.max_items
    );
    println!();

    let json = if let Some(batch_path) = batch_path {
        let raw = std::fs::read_to_string(&batch_path)
            .with_context(|| format!("failed to read {}", batch_path))?;
        let request: BatchScoreRequest =
            serde_json::from_str(&raw).context("invalid batch payload")?;
        let response = engine.score_batch(&request.items);
        for result in &response.results {
            println!(
                "[{}] score={:.3} risk={} highlights={}",
                result.id,
                result.score,
                result.risk.as_str(),
                result.highlights.len()
            );
        }
        serde_json::to_string_pretty(&response)?
    } else {
        let text = args[1].clone();
        if explain {
            let response = engine.explain_request(ExplainRequest {
                text,
                highlights: None,
            })?;
            println!(
                "score={:.3} risk={} source={}",
                response.score,
                response.risk.as_str(),
                response.source
            );
            println!("{}", response.explanation);
            serde_json::to_string_pretty(&response)?
        } else {
            let response = engine.score_text(&text);
            println!("score={:.3} risk={}", response.score, response.risk.as_str());
            for h in &response.highlights {
                println!("  [{}] {}  ({})", h.tag, preview(&h.span, 60), h.reason);
            }
            serde_json::to_string_pretty(&response)?
        }
    };

    if let Some(out_path) = out_path {
        std::fs::write(&out_path, &json).with_context(|| format!("failed to write {}", out_path))?;
        println!();
        println!("Wrote JSON: {}", out_path);
    }

    Ok(())
}
