// Remote Classifier Client
// Scores text with an external human-vs-machine classifier under a time budget.
// Any failure degrades to the local heuristic score for the same text.

use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

use crate::services::providers::{ClassifierService, LabelScore, ProviderError};

use super::aggregation::round2;
use super::heuristic::heuristic_score;

pub const DEFAULT_CLASSIFY_TIMEOUT: Duration = Duration::from_secs(15);

/// Labels that denote the machine-generated class across common detector models
const MACHINE_LABELS: &[&str] = &[
    "fake",
    "label_1",
    "machine",
    "machine-generated",
    "ai",
    "ai-generated",
    "generated",
    "chatgpt",
];

#[derive(Clone)]
pub struct RemoteClassifier {
    service: Arc<dyn ClassifierService>,
    timeout: Duration,
}

impl RemoteClassifier {
    pub fn new(service: Arc<dyn ClassifierService>, timeout: Duration) -> Self {
        Self { service, timeout }
    }

    /// Machine-likeness in [0, 100]. Never fails: falls back to the heuristic score.
    pub async fn detect(&self, text: &str) -> f64 {
        match self.try_detect(text).await {
            Ok(score) => {
                debug!(score, "[CLASSIFIER] remote score");
                score
            }
            Err(e) => {
                let fallback = heuristic_score(text);
                warn!(
                    error = %e,
                    fallback,
                    "[CLASSIFIER] remote classification unavailable, using heuristic score"
                );
                fallback
            }
        }
    }

    async fn try_detect(&self, text: &str) -> Result<f64, ProviderError> {
        let labels = tokio::time::timeout(self.timeout, self.service.classify(text))
            .await
            .map_err(|_| ProviderError::Timeout(self.timeout))??;
        machine_probability(&labels).ok_or(ProviderError::MissingContent)
    }
}

/// Probability mass on the machine-generated label, scaled to a two-decimal percentage
pub fn machine_probability(labels: &[LabelScore]) -> Option<f64> {
    labels
        .iter()
        .find(|l| MACHINE_LABELS.contains(&l.label.trim().to_lowercase().as_str()))
        .filter(|l| l.score.is_finite())
        .map(|l| round2(l.score.clamp(0.0, 1.0) * 100.0))
}
