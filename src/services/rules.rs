// Rule Table & Matcher
// Weighted detection rules, loaded once at startup and immutable for the
// process lifetime. Two config shapes (phrase lists and weighted regex
// maps) are unified into one canonical representation at load time; the
// matcher only ever sees compiled rules.

use crate::models::Highlight;
use regex::{Regex, RegexBuilder};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::Path;
use thiserror::Error;
use tracing::{info, warn};

use super::scoring::truncate_chars;

/// Weight assigned to phrase-list rules, which carry no explicit weight.
pub const DEFAULT_PHRASE_WEIGHT: f64 = 0.6;

#[derive(Debug, Error)]
pub enum RuleLoadError {
    #[error("malformed pattern {pattern:?}: {source}")]
    InvalidPattern {
        pattern: String,
        #[source]
        source: Box<regex::Error>,
    },
    #[error("weight {weight} for {pattern:?} not in (0, 1]")]
    InvalidWeight { pattern: String, weight: f64 },
    #[error("category {tag:?} has no phrases")]
    EmptyCategory { tag: String },
    #[error("failed to read rule file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse rule file: {0}")]
    Parse(#[from] serde_json::Error),
}

/// One canonical detection rule. Identity is the source pattern string.
#[derive(Debug, Clone)]
pub struct Rule {
    regex: Regex,
    pub source: String,
    pub weight: f64,
    pub tag: String,
    pub reason: String,
}

impl Rule {
    fn compile(source: &str, weight: f64, tag: &str, reason: &str) -> Result<Self, RuleLoadError> {
        if !weight.is_finite() || weight <= 0.0 || weight > 1.0 {
            return Err(RuleLoadError::InvalidWeight {
                pattern: source.to_string(),
                weight,
            });
        }
        let regex = RegexBuilder::new(source)
            .case_insensitive(true)
            .build()
            .map_err(|e| RuleLoadError::InvalidPattern {
                pattern: source.to_string(),
                source: Box::new(e),
            })?;
        Ok(Self {
            regex,
            source: source.to_string(),
            weight,
            tag: tag.to_string(),
            reason: reason.to_string(),
        })
    }

    pub fn is_match(&self, text: &str) -> bool {
        self.regex.is_match(text)
    }
}

/// Supported rule-file shapes. Shape (a): category tag mapped to literal
/// phrases. Shape (b): regex pattern mapped to `[weight, reason]`.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum RuleFile {
    Weighted(BTreeMap<String, (f64, String)>),
    Phrases(BTreeMap<String, Vec<String>>),
}

/// Immutable collection of weighted detection rules.
#[derive(Debug, Clone)]
pub struct RuleTable {
    rules: Vec<Rule>,
}

/// Outcome of matching one text against the table.
#[derive(Debug, Clone, Default)]
pub struct RuleMatch {
    /// Mean of the weights of all distinct triggered rules; 0 when none fire.
    pub score: f64,
    pub highlights: Vec<Highlight>,
    /// Reason strings of triggered rules, in table order.
    pub signals: Vec<String>,
}

impl RuleTable {
    /// Built-in scam rule set (pattern, weight, reason).
    pub fn default_rules() -> Self {
        let table = [
            (
                r"\bguaranteed\b",
                0.7,
                "Claims of guaranteed profits (no investment is risk-free).",
            ),
            (r"\bno\s*risk\b", 0.6, "False claim of no risk."),
            (
                r"\b1000x\b",
                1.0,
                "Unrealistic promise of 1000x returns (impossible in real investments).",
            ),
            (
                r"\b\d+x\s*returns?\b",
                0.9,
                "Exaggerated return claim (e.g. 50x, 100x).",
            ),
            (
                r"\bdouble\s*money\b",
                0.8,
                "Suspicious promise of doubling money quickly.",
            ),
            (
                r"\brisk[-\s]*free\b",
                0.7,
                "Misleading claim of risk-free profits.",
            ),
            (
                r"\bquick\s*profits?\b",
                0.8,
                "Promise of quick profits, a common scam tactic.",
            ),
            (
                r"\bget\s*richer?\s*fast\b",
                1.0,
                "Classic 'get rich quick' scheme.",
            ),
        ];
        let rules = table
            .iter()
            .map(|(pattern, weight, reason)| {
                // Static patterns; a compile failure here is a programming error.
                Rule::compile(pattern, *weight, pattern, reason).expect("builtin rule")
            })
            .collect();
        Self { rules }
    }

    /// Build a table from a parsed rule file, normalizing both shapes into
    /// canonical rules. Errors are fatal at startup, never at match time.
    pub fn from_config(file: RuleFile) -> Result<Self, RuleLoadError> {
        let mut rules = Vec::new();
        match file {
            RuleFile::Weighted(map) => {
                for (pattern, (weight, reason)) in map {
                    rules.push(Rule::compile(&pattern, weight, &pattern, &reason)?);
                }
            }
            RuleFile::Phrases(map) => {
                for (tag, phrases) in map {
                    if phrases.iter().all(|p| p.trim().is_empty()) {
                        return Err(RuleLoadError::EmptyCategory { tag });
                    }
                    for phrase in phrases {
                        let trimmed = phrase.trim();
                        if trimmed.is_empty() {
                            continue;
                        }
                        let pattern = phrase_pattern(trimmed);
                        let reason =
                            format!("Matches known risk phrase \"{}\" ({}).", trimmed, tag);
                        rules.push(Rule::compile(
                            &pattern,
                            DEFAULT_PHRASE_WEIGHT,
                            &tag,
                            &reason,
                        )?);
                    }
                }
            }
        }
        if rules.is_empty() {
            warn!("rule table loaded with zero rules; rule scores will always be 0");
        } else {
            info!(rules = rules.len(), "rule table loaded");
        }
        Ok(Self { rules })
    }

    pub fn from_json(raw: &str) -> Result<Self, RuleLoadError> {
        let file: RuleFile = serde_json::from_str(raw)?;
        Self::from_config(file)
    }

    pub fn from_file(path: &Path) -> Result<Self, RuleLoadError> {
        let raw = std::fs::read_to_string(path).map_err(|e| RuleLoadError::Io {
            path: path.display().to_string(),
            source: e,
        })?;
        Self::from_json(&raw)
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Match a text against every rule. Existence-only: multiple occurrences
    /// of one rule count once. Pure function of the text and the table.
    pub fn match_text(&self, text: &str, max_text_len: usize) -> RuleMatch {
        if text.is_empty() {
            return RuleMatch::default();
        }
        let text = truncate_chars(text, max_text_len);

        let mut total = 0.0;
        let mut highlights = Vec::new();
        let mut signals = Vec::new();

        for rule in &self.rules {
            if rule.is_match(text) {
                total += rule.weight;
                signals.push(rule.reason.clone());
                highlights.push(Highlight {
                    span: rule.source.clone(),
                    tag: rule.tag.clone(),
                    reason: rule.reason.clone(),
                });
            }
        }

        let count = highlights.len();
        let score = if count > 0 { total / count as f64 } else { 0.0 };
        RuleMatch {
            score,
            highlights,
            signals,
        }
    }
}

/// Turn a literal phrase into a word-boundary, whitespace-flexible pattern.
fn phrase_pattern(phrase: &str) -> String {
    let words: Vec<String> = phrase
        .split_whitespace()
        .map(regex::escape)
        .collect();
    format!(r"\b{}\b", words.join(r"\s+"))
}
