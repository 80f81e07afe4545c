// Scripted service doubles shared by the orchestrator and API tests

use async_trait::async_trait;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use crate::models::CreditLedgerEntry;
use crate::services::providers::{ClassifierService, LabelScore, ProviderError, RewriteService};
use crate::services::store::{StoreError, UsageLedger};

use super::orchestrator::OrchestratorSettings;

/// Casual text that scores at the local floor on both offline detectors
pub(crate) const PASS_TEXT: &str = "I know it was not what you had in mind. \
    But we can go out and get one when the time is right, if you like. So that is that.";

pub(crate) fn fast_settings() -> OrchestratorSettings {
    OrchestratorSettings {
        retry_delay: Duration::ZERO,
        rewrite_timeout: Duration::from_millis(50),
        classify_timeout: Duration::from_millis(20),
        mutation_seed: Some(7),
        ..OrchestratorSettings::default()
    }
}

pub(crate) enum RewriteMode {
    /// "Rewritten draft number N." for the Nth call
    Drafts,
    Fixed(String),
    Fail,
}

pub(crate) struct ScriptedRewrite {
    mode: RewriteMode,
    pub calls: AtomicU32,
    inputs: Mutex<Vec<String>>,
}

impl ScriptedRewrite {
    pub fn new(mode: RewriteMode) -> Self {
        Self {
            mode,
            calls: AtomicU32::new(0),
            inputs: Mutex::new(Vec::new()),
        }
    }

    pub fn inputs(&self) -> Vec<String> {
        self.inputs.lock().unwrap().clone()
    }
}

#[async_trait]
impl RewriteService for ScriptedRewrite {
    async fn complete(
        &self,
        _system: &str,
        user: &str,
        _temperature: f64,
        _max_tokens: u32,
    ) -> Result<String, ProviderError> {
        let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        self.inputs.lock().unwrap().push(user.to_string());
        match &self.mode {
            RewriteMode::Drafts => Ok(format!("Rewritten draft number {n}.")),
            RewriteMode::Fixed(text) => Ok(text.clone()),
            RewriteMode::Fail => Err(ProviderError::ApiError {
                status: 503,
                message: "unavailable".to_string(),
            }),
        }
    }
}

pub(crate) enum ClassifierMode {
    /// Machine probability per call; the last value repeats
    Scores(Vec<f64>),
    Fail,
    Hang(Duration),
    Panic,
}

pub(crate) struct ScriptedClassifier {
    mode: ClassifierMode,
    pub calls: AtomicU32,
}

impl ScriptedClassifier {
    pub fn new(mode: ClassifierMode) -> Self {
        Self {
            mode,
            calls: AtomicU32::new(0),
        }
    }
}

#[async_trait]
impl ClassifierService for ScriptedClassifier {
    async fn classify(&self, _text: &str) -> Result<Vec<LabelScore>, ProviderError> {
        let index = self.calls.fetch_add(1, Ordering::SeqCst) as usize;
        match &self.mode {
            ClassifierMode::Scores(scores) => {
                let machine = scores
                    .get(index)
                    .or(scores.last())
                    .copied()
                    .unwrap_or(0.0);
                Ok(vec![
                    LabelScore {
                        label: "Real".to_string(),
                        score: 1.0 - machine,
                    },
                    LabelScore {
                        label: "Fake".to_string(),
                        score: machine,
                    },
                ])
            }
            ClassifierMode::Fail => Err(ProviderError::MissingContent),
            ClassifierMode::Hang(delay) => {
                tokio::time::sleep(*delay).await;
                Ok(Vec::new())
            }
            ClassifierMode::Panic => panic!("classifier crashed"),
        }
    }
}

#[derive(Default)]
pub(crate) struct FailingLedger {
    pub calls: AtomicU32,
}

#[async_trait]
impl UsageLedger for FailingLedger {
    async fn append(&self, _entry: CreditLedgerEntry) -> Result<(), StoreError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Err(StoreError::Unavailable("ledger offline".to_string()))
    }
}
