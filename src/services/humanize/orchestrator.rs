// Humanization Orchestrator
// Drives the rewrite -> score -> decide loop and settles credits and usage
// exactly once after the loop exits.

use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::task::JoinError;
use tracing::{info, warn};
use uuid::Uuid;

use crate::models::{
    Attempt, CreditLedgerEntry, DetectorScoreSet, HumanizationRequest, HumanizationResult,
    LedgerAction, LedgerDetails,
};
use crate::services::detection::{
    aggregate_scores, heuristic_score, is_passing, perplexity_score, RemoteClassifier,
    DEFAULT_CLASSIFY_TIMEOUT, DEFAULT_PASS_THRESHOLD, NEUTRAL_SCORE,
};
use crate::services::providers::{ClassifierService, RewriteService};
use crate::services::store::{CreditStore, StoreError, UsageLedger};

use super::rewriter::{Rewriter, DEFAULT_MAX_OUTPUT_TOKENS, DEFAULT_REWRITE_TIMEOUT};

pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;
pub const DEFAULT_RETRY_DELAY: Duration = Duration::from_secs(2);
/// Credits consumed by one passing request
pub const CREDIT_COST: i64 = 1;

#[derive(Debug, Clone)]
pub struct OrchestratorSettings {
    pub max_attempts: u32,
    pub pass_threshold: f64,
    pub retry_delay: Duration,
    pub rewrite_timeout: Duration,
    pub classify_timeout: Duration,
    pub max_output_tokens: u32,
    pub mutation_seed: Option<u64>,
}

impl Default for OrchestratorSettings {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            pass_threshold: DEFAULT_PASS_THRESHOLD,
            retry_delay: DEFAULT_RETRY_DELAY,
            rewrite_timeout: DEFAULT_REWRITE_TIMEOUT,
            classify_timeout: DEFAULT_CLASSIFY_TIMEOUT,
            max_output_tokens: DEFAULT_MAX_OUTPUT_TOKENS,
            mutation_seed: None,
        }
    }
}

#[derive(Error, Debug)]
pub enum HumanizeError {
    #[error("insufficient credits for user {0}")]
    InsufficientCredits(String),
    #[error("credit store failure: {0}")]
    CreditStore(#[source] StoreError),
    /// The outcome was decided; only the usage record is missing
    #[error("usage ledger failure: {source}")]
    Ledger {
        #[source]
        source: StoreError,
        result: Box<HumanizationResult>,
    },
}

/// What happens after an attempt has been scored
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Pass,
    Retry,
    Exhausted,
}

/// Pass below threshold, otherwise retry until the attempt budget is spent
pub fn decide(aggregate: f64, attempt: u32, settings: &OrchestratorSettings) -> Decision {
    if is_passing(aggregate, settings.pass_threshold) {
        Decision::Pass
    } else if attempt >= settings.max_attempts {
        Decision::Exhausted
    } else {
        Decision::Retry
    }
}

/// Loop result plus the bookkeeping that followed it
#[derive(Debug, Clone)]
pub struct HumanizationOutcome {
    pub result: HumanizationResult,
    pub credits_remaining: i64,
    pub ledger_entry_id: Uuid,
}

pub struct Orchestrator {
    rewriter: Rewriter,
    classifier: RemoteClassifier,
    credits: Arc<dyn CreditStore>,
    ledger: Arc<dyn UsageLedger>,
    settings: OrchestratorSettings,
}

impl Orchestrator {
    pub fn new(
        rewrite_service: Arc<dyn RewriteService>,
        classifier_service: Arc<dyn ClassifierService>,
        credits: Arc<dyn CreditStore>,
        ledger: Arc<dyn UsageLedger>,
        settings: OrchestratorSettings,
    ) -> Self {
        let rewriter = Rewriter::new(rewrite_service, settings.rewrite_timeout)
            .with_max_output_tokens(settings.max_output_tokens)
            .with_mutation_seed(settings.mutation_seed);
        let classifier = RemoteClassifier::new(classifier_service, settings.classify_timeout);
        Self {
            rewriter,
            classifier,
            credits,
            ledger,
            settings,
        }
    }

    pub fn settings(&self) -> &OrchestratorSettings {
        &self.settings
    }

    /// Run the attempt loop for an admitted request, then settle credits and usage
    pub async fn run(
        &self,
        request: &HumanizationRequest,
    ) -> Result<HumanizationOutcome, HumanizeError> {
        if request.credit_balance <= 0 {
            return Err(HumanizeError::InsufficientCredits(request.user_id.clone()));
        }

        info!(
            user_id = %request.user_id,
            chars = request.text.chars().count(),
            max_attempts = self.settings.max_attempts,
            "[ORCHESTRATOR] starting humanization"
        );

        let result = self.attempt_loop(&request.text).await;
        self.settle(request, result).await
    }

    async fn attempt_loop(&self, input: &str) -> HumanizationResult {
        let mut text = input.to_string();
        let mut history: Vec<Attempt> = Vec::new();
        let mut attempt: u32 = 0;

        loop {
            attempt += 1;

            let rewrite = self.rewriter.rewrite(&text, attempt).await;
            text = rewrite.text;

            let scores = self.score(&text).await;
            let aggregate = aggregate_scores(&scores);
            let decision = decide(aggregate, attempt, &self.settings);

            info!(
                attempt,
                remote = scores.remote,
                heuristic = scores.heuristic,
                perplexity = scores.perplexity,
                aggregate,
                fallback_rewrite = rewrite.used_fallback,
                decision = ?decision,
                "[ORCHESTRATOR] attempt scored"
            );

            history.push(Attempt {
                ordinal: attempt,
                text: text.clone(),
                scores,
                aggregate,
                used_fallback_rewrite: rewrite.used_fallback,
            });

            match decision {
                Decision::Retry => {
                    if !self.settings.retry_delay.is_zero() {
                        tokio::time::sleep(self.settings.retry_delay).await;
                    }
                }
                Decision::Pass | Decision::Exhausted => {
                    let passed = decision == Decision::Pass;
                    return HumanizationResult {
                        final_text: text,
                        scores,
                        aggregate_score: aggregate,
                        attempts: attempt,
                        passed,
                        credits_charged: if passed { CREDIT_COST } else { 0 },
                        history,
                    };
                }
            }
        }
    }

    /// Run the three detectors concurrently. Always returns a complete set.
    pub async fn score(&self, text: &str) -> DetectorScoreSet {
        let remote = {
            let classifier = self.classifier.clone();
            let text = text.to_string();
            tokio::spawn(async move { classifier.detect(&text).await })
        };
        let heuristic = {
            let text = text.to_string();
            tokio::task::spawn_blocking(move || heuristic_score(&text))
        };
        let perplexity = {
            let text = text.to_string();
            tokio::task::spawn_blocking(move || perplexity_score(&text))
        };

        let (remote, heuristic, perplexity) = tokio::join!(remote, heuristic, perplexity);

        DetectorScoreSet {
            remote: settle_score("remote", remote),
            heuristic: settle_score("heuristic", heuristic),
            perplexity: settle_score("perplexity", perplexity),
        }
    }

    /// Charge (on pass) and log usage (always); each step runs once, no retries
    async fn settle(
        &self,
        request: &HumanizationRequest,
        result: HumanizationResult,
    ) -> Result<HumanizationOutcome, HumanizeError> {
        let charge = if result.passed {
            self.credits
                .decrement(&request.user_id, CREDIT_COST)
                .await
                .map(Some)
        } else {
            Ok(None)
        };

        let delta = match charge {
            Ok(Some(_)) => -CREDIT_COST,
            _ => 0,
        };
        let entry = ledger_entry(request, &result, delta);
        let entry_id = entry.id;
        let logged = self.ledger.append(entry).await;

        let remaining = match charge {
            Ok(remaining) => remaining.unwrap_or(request.credit_balance),
            Err(e) => {
                if let Err(ledger_err) = &logged {
                    warn!(error = %ledger_err, "[ORCHESTRATOR] usage ledger write failed");
                }
                return Err(HumanizeError::CreditStore(e));
            }
        };

        if let Err(source) = logged {
            warn!(
                user_id = %request.user_id,
                error = %source,
                "[ORCHESTRATOR] usage ledger write failed after outcome was decided"
            );
            return Err(HumanizeError::Ledger {
                source,
                result: Box::new(result),
            });
        }

        info!(
            user_id = %request.user_id,
            passed = result.passed,
            attempts = result.attempts,
            aggregate = result.aggregate_score,
            credits_remaining = remaining,
            "[ORCHESTRATOR] humanization settled"
        );

        Ok(HumanizationOutcome {
            result,
            credits_remaining: remaining,
            ledger_entry_id: entry_id,
        })
    }
}

fn settle_score(detector: &str, joined: Result<f64, JoinError>) -> f64 {
    match joined {
        Ok(score) => score,
        Err(e) => {
            warn!(detector, error = %e, "[ORCHESTRATOR] detector failed, using neutral score");
            NEUTRAL_SCORE
        }
    }
}

fn ledger_entry(
    request: &HumanizationRequest,
    result: &HumanizationResult,
    credits_delta: i64,
) -> CreditLedgerEntry {
    CreditLedgerEntry {
        id: Uuid::new_v4(),
        user_id: request.user_id.clone(),
        action: LedgerAction::Humanize,
        credits_delta,
        details: LedgerDetails {
            input_chars: request.text.chars().count(),
            output_chars: result.final_text.chars().count(),
            aggregate_score: result.aggregate_score,
            scores: result.scores,
            passed: result.passed,
            attempts: result.attempts,
        },
        created_at: Utc::now(),
    }
}
