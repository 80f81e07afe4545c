// Request Boundary
// Session check, input validation, user lookup and admission in front of the
// orchestrator, plus the process-record lifecycle around each run.

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;
use tracing::{error, info, warn};

use crate::models::{HumanizationRequest, HumanizeBody, HumanizeResponse, Session};
use crate::services::humanize::{HumanizationOutcome, HumanizeError, Orchestrator};
use crate::services::store::{CreditStore, ProcessStore, StoreError};
use crate::services::text_processor::normalize_punctuation;

pub const DEFAULT_MAX_INPUT_CHARS: usize = 10_000;

/// Machine-readable error kinds surfaced to callers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Unauthenticated,
    EmptyInput,
    InputTooLong,
    InsufficientCredits,
    UserNotFound,
    Internal,
}

impl ErrorKind {
    /// HTTP-style status code for the kind
    pub fn status_code(self) -> u16 {
        match self {
            ErrorKind::Unauthenticated => 401,
            ErrorKind::EmptyInput | ErrorKind::InputTooLong => 400,
            ErrorKind::InsufficientCredits => 402,
            ErrorKind::UserNotFound => 404,
            ErrorKind::Internal => 500,
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq, Serialize, Deserialize)]
#[error("{message}")]
pub struct ApiError {
    pub kind: ErrorKind,
    pub message: String,
}

impl ApiError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn status_code(&self) -> u16 {
        self.kind.status_code()
    }

    /// Generic outcome for anything the caller cannot act on
    fn internal() -> Self {
        Self::new(ErrorKind::Internal, "internal error, please try again later")
    }
}

impl From<StoreError> for ApiError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::UserNotFound(user) => {
                ApiError::new(ErrorKind::UserNotFound, format!("user not found: {}", user))
            }
            other => {
                error!(error = %other, "[API] store failure");
                ApiError::internal()
            }
        }
    }
}

impl From<HumanizeError> for ApiError {
    fn from(e: HumanizeError) -> Self {
        match e {
            HumanizeError::InsufficientCredits(_) => {
                ApiError::new(ErrorKind::InsufficientCredits, "no credits remaining")
            }
            other => {
                error!(error = %other, "[API] humanization failed");
                ApiError::internal()
            }
        }
    }
}

pub struct HumanizeApi {
    orchestrator: Orchestrator,
    credits: Arc<dyn CreditStore>,
    processes: Arc<dyn ProcessStore>,
    max_input_chars: usize,
}

impl HumanizeApi {
    /// `credits` must be the store the orchestrator settles against
    pub fn new(
        orchestrator: Orchestrator,
        credits: Arc<dyn CreditStore>,
        processes: Arc<dyn ProcessStore>,
    ) -> Self {
        Self {
            orchestrator,
            credits,
            processes,
            max_input_chars: DEFAULT_MAX_INPUT_CHARS,
        }
    }

    pub fn with_max_input_chars(mut self, max_input_chars: usize) -> Self {
        self.max_input_chars = max_input_chars;
        self
    }

    /// Humanize `body.text` for the session's user
    pub async fn humanize(
        &self,
        session: Option<&Session>,
        body: HumanizeBody,
    ) -> Result<HumanizeResponse, ApiError> {
        let session = session
            .ok_or_else(|| ApiError::new(ErrorKind::Unauthenticated, "sign in required"))?;
        let input_chars = self.validate(&body.text)?;

        let balance = self.credits.get(&session.user_id).await?;
        if balance <= 0 {
            info!(user_id = %session.user_id, "[API] rejected: no credits");
            return Err(HumanizeError::InsufficientCredits(session.user_id.clone()).into());
        }

        let record = self.processes.start(&session.user_id, input_chars).await?;
        info!(
            user_id = %session.user_id,
            process_id = %record.id,
            input_chars,
            "[API] humanize request admitted"
        );

        let text = normalize_punctuation(&body.text);
        let request = HumanizationRequest::new(text, session.user_id.clone(), balance);
        match self.orchestrator.run(&request).await {
            Ok(outcome) => {
                if let Err(e) = self.processes.complete(record.id, &outcome.result).await {
                    warn!(process_id = %record.id, error = %e, "[API] failed to complete process record");
                }
                Ok(to_response(outcome))
            }
            Err(e) => {
                if let Err(mark_err) = self.processes.fail(record.id, &e.to_string()).await {
                    warn!(
                        process_id = %record.id,
                        error = %mark_err,
                        "[API] failed to mark process record failed"
                    );
                }
                Err(e.into())
            }
        }
    }

    /// Returns the input length in chars
    fn validate(&self, text: &str) -> Result<usize, ApiError> {
        if text.trim().is_empty() {
            return Err(ApiError::new(ErrorKind::EmptyInput, "text must not be empty"));
        }
        let chars = text.chars().count();
        if chars > self.max_input_chars {
            return Err(ApiError::new(
                ErrorKind::InputTooLong,
                format!(
                    "text is {} characters, the limit is {}",
                    chars, self.max_input_chars
                ),
            ));
        }
        Ok(chars)
    }
}

fn to_response(outcome: HumanizationOutcome) -> HumanizeResponse {
    let result = outcome.result;
    HumanizeResponse {
        final_text: result.final_text,
        aggregate_score: result.aggregate_score,
        per_detector_scores: result.scores,
        passed: result.passed,
        attempts: result.attempts,
        credits_remaining: outcome.credits_remaining,
    }
}
