// Rewriter
// Remote rewrite with an attempt-indexed prompt; falls back to the offline
// mutation on timeout, API error or an unusable reply, so the loop always advances.

use rand::rngs::StdRng;
use rand::SeedableRng;
use regex::Regex;
use std::sync::{Arc, OnceLock};
use std::time::Duration;
use tracing::{info, warn};

use crate::services::providers::{ProviderError, RewriteService};

use super::mutation::{mutate, MutationOutcome};
use super::prompts::system_prompt;

pub const DEFAULT_REWRITE_TIMEOUT: Duration = Duration::from_secs(30);
pub const DEFAULT_MAX_OUTPUT_TOKENS: u32 = 4000;

const BASE_TEMPERATURE: f64 = 0.7;
const TEMPERATURE_STEP: f64 = 0.1;
const OUTPUT_TOKENS_PER_INPUT_CHAR: f64 = 1.5;

/// Rewritten text and where it came from
#[derive(Debug, Clone, PartialEq)]
pub struct RewriteOutcome {
    pub text: String,
    pub used_fallback: bool,
}

#[derive(Clone)]
pub struct Rewriter {
    service: Arc<dyn RewriteService>,
    timeout: Duration,
    max_output_tokens: u32,
    mutation_seed: Option<u64>,
}

impl Rewriter {
    pub fn new(service: Arc<dyn RewriteService>, timeout: Duration) -> Self {
        Self {
            service,
            timeout,
            max_output_tokens: DEFAULT_MAX_OUTPUT_TOKENS,
            mutation_seed: None,
        }
    }

    pub fn with_max_output_tokens(mut self, max_output_tokens: u32) -> Self {
        self.max_output_tokens = max_output_tokens.max(1);
        self
    }

    /// Fix the fallback RNG seed (per attempt) for reproducible offline rewrites
    pub fn with_mutation_seed(mut self, seed: Option<u64>) -> Self {
        self.mutation_seed = seed;
        self
    }

    /// Rewrite `text` for the given 1-based attempt. Never fails.
    pub async fn rewrite(&self, text: &str, attempt: u32) -> RewriteOutcome {
        match self.try_remote(text, attempt).await {
            Ok(rewritten) => {
                info!(
                    attempt,
                    chars = rewritten.chars().count(),
                    "[REWRITER] remote rewrite ok"
                );
                RewriteOutcome {
                    text: rewritten,
                    used_fallback: false,
                }
            }
            Err(e) => {
                let outcome = self.fallback(text, attempt);
                warn!(
                    attempt,
                    error = %e,
                    stages = outcome.stages_applied,
                    "[REWRITER] remote rewrite failed, applied offline mutation"
                );
                RewriteOutcome {
                    text: outcome.text,
                    used_fallback: true,
                }
            }
        }
    }

    async fn try_remote(&self, text: &str, attempt: u32) -> Result<String, ProviderError> {
        let temperature = rewrite_temperature(attempt);
        let max_tokens = output_token_budget(text, self.max_output_tokens);
        let call = self
            .service
            .complete(system_prompt(attempt), text, temperature, max_tokens);

        let raw = tokio::time::timeout(self.timeout, call)
            .await
            .map_err(|_| ProviderError::Timeout(self.timeout))??;

        let cleaned = clean_generation(&raw);
        if cleaned.is_empty() {
            return Err(ProviderError::MissingContent);
        }
        Ok(cleaned)
    }

    fn fallback(&self, text: &str, attempt: u32) -> MutationOutcome {
        let mut rng = match self.mutation_seed {
            Some(seed) => StdRng::seed_from_u64(seed.wrapping_add(u64::from(attempt))),
            None => StdRng::from_os_rng(),
        };
        mutate(text, attempt, &mut rng)
    }
}

/// 0.7 + 0.1 per attempt
pub fn rewrite_temperature(attempt: u32) -> f64 {
    let t = BASE_TEMPERATURE + TEMPERATURE_STEP * f64::from(attempt);
    (t * 100.0).round() / 100.0
}

/// 1.5x the input length, capped
pub fn output_token_budget(text: &str, cap: u32) -> u32 {
    let budget = (text.chars().count() as f64 * OUTPUT_TOKENS_PER_INPUT_CHAR).ceil() as u32;
    budget.clamp(1, cap.max(1))
}

fn preamble_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(
            r"(?i)^\s*(?:(?:certainly|sure|of course|absolutely)[!.,]?\s*)?(?:here(?:'s|\s+is)[^\n:]*:|(?:humanized|rewritten)\s+(?:text|version):)\s*",
        )
        .expect("preamble regex")
    })
}

const QUOTE_PAIRS: &[(char, char)] = &[('"', '"'), ('\'', '\''), ('\u{201c}', '\u{201d}')];

/// Strip assistant preambles and one layer of quotes wrapping the whole generation
pub fn clean_generation(raw: &str) -> String {
    let text = preamble_re().replace(raw, "").trim().to_string();
    let mut chars = text.chars();
    let (first, last) = match (chars.next(), chars.next_back()) {
        (Some(f), Some(l)) => (f, l),
        _ => return text,
    };
    if !QUOTE_PAIRS.contains(&(first, last)) {
        return text;
    }
    let inner = &text[first.len_utf8()..text.len() - last.len_utf8()];
    // a quote inside means the outer marks belong to separate quotations
    if inner.contains(first) || inner.contains(last) {
        return text;
    }
    inner.trim().to_string()
}
