// Humanize Module
// - prompts: attempt-indexed rewrite instructions
// - mutation: seeded offline rewrite used when generation is unavailable
// - rewriter: remote rewrite with timeout and fallback
// - orchestrator: the bounded rewrite/score/decide loop and credit settlement

pub mod mutation;
pub mod orchestrator;
pub mod prompts;
pub mod rewriter;

#[cfg(test)]
pub(crate) mod fakes;

pub use orchestrator::{
    decide, Decision, HumanizationOutcome, HumanizeError, Orchestrator, OrchestratorSettings,
    CREDIT_COST, DEFAULT_MAX_ATTEMPTS, DEFAULT_RETRY_DELAY,
};
pub use rewriter::{RewriteOutcome, Rewriter, DEFAULT_MAX_OUTPUT_TOKENS, DEFAULT_REWRITE_TIMEOUT};
