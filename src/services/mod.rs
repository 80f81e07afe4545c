// Humniz Core Services

pub mod config_store;
pub mod detection;
pub mod humanize;
pub mod providers;
pub mod store;
pub mod text_processor;

pub use config_store::*;
pub use providers::*;
pub use store::*;
pub use text_processor::*;

pub use detection::{
    aggregate_scores, heuristic_score, is_passing, machine_probability, perplexity_score,
    RemoteClassifier, DEFAULT_PASS_THRESHOLD, NEUTRAL_SCORE,
};
pub use humanize::{
    HumanizationOutcome, HumanizeError, Orchestrator, OrchestratorSettings, Rewriter,
};
