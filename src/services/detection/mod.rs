// Detection Module
// Machine-likeness scoring organized into specialized submodules:
// - heuristic: sentence statistics, vocabulary and formal phrasing
// - perplexity: commonness and n-gram repetition as a perplexity stand-in
// - remote_classifier: external classifier with heuristic fallback
// - aggregation: score set mean and pass policy

pub mod aggregation;
pub mod heuristic;
pub mod perplexity;
pub mod remote_classifier;

/// Local detector floor, also returned for degenerate input
pub const MIN_SCORE: f64 = 5.0;
pub const MAX_SCORE: f64 = 95.0;
/// Substituted for a detector that failed unexpectedly
pub const NEUTRAL_SCORE: f64 = 50.0;

pub(crate) fn clamp_score(score: f64) -> f64 {
    score.clamp(MIN_SCORE, MAX_SCORE)
}

pub use aggregation::{aggregate_scores, is_passing, round2, DEFAULT_PASS_THRESHOLD};
pub use heuristic::heuristic_score;
pub use perplexity::perplexity_score;
pub use remote_classifier::{machine_probability, RemoteClassifier, DEFAULT_CLASSIFY_TIMEOUT};
