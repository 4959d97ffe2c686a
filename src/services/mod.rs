// Services module
// Engine configuration, the weighted rule table, and the scoring pipeline.

pub mod config;
pub mod rules;
pub mod scoring;

pub use config::EngineConfig;
pub use rules::RuleTable;
pub use scoring::ScoringEngine;
