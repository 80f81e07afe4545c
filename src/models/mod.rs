// Humniz Data Models
// Records shared by the detectors, the humanization loop and the request boundary

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ============ Request ============

/// Accepted humanization request. Built once at admission and never mutated.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HumanizationRequest {
    pub text: String,
    pub user_id: String,
    /// Balance read at admission time
    pub credit_balance: i64,
}

impl HumanizationRequest {
    pub fn new(text: impl Into<String>, user_id: impl Into<String>, credit_balance: i64) -> Self {
        Self {
            text: text.into(),
            user_id: user_id.into(),
            credit_balance,
        }
    }
}

// ============ Scores ============

/// Machine-likeness estimates for one piece of text, each in [0, 100].
///
/// Every field is always populated: the remote score falls back to the
/// heuristic score, and a detector that crashes is replaced by a neutral 50.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DetectorScoreSet {
    pub remote: f64,
    pub heuristic: f64,
    pub perplexity: f64,
}

/// One rewrite-then-score cycle
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Attempt {
    /// 1-based, strictly increasing within a request
    pub ordinal: u32,
    pub text: String,
    pub scores: DetectorScoreSet,
    pub aggregate: f64,
    /// True when the rewrite came from the local mutation instead of the remote service
    pub used_fallback_rewrite: bool,
}

/// Terminal outcome of the attempt loop
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HumanizationResult {
    pub final_text: String,
    pub scores: DetectorScoreSet,
    pub aggregate_score: f64,
    pub attempts: u32,
    pub passed: bool,
    pub credits_charged: i64,
    pub history: Vec<Attempt>,
}

// ============ Ledger ============

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LedgerAction {
    Humanize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LedgerDetails {
    pub input_chars: usize,
    pub output_chars: usize,
    pub aggregate_score: f64,
    pub scores: DetectorScoreSet,
    pub passed: bool,
    pub attempts: u32,
}

/// Usage log row, appended exactly once per request
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreditLedgerEntry {
    pub id: Uuid,
    pub user_id: String,
    pub action: LedgerAction,
    /// -1 when a credit was consumed, 0 otherwise
    pub credits_delta: i64,
    pub details: LedgerDetails,
    pub created_at: DateTime<Utc>,
}

// ============ Process Records ============

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProcessStatus {
    Pending,
    Completed,
    Failed,
}

/// In-flight bookkeeping for one request
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessRecord {
    pub id: Uuid,
    pub user_id: String,
    pub input_chars: usize,
    pub status: ProcessStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub aggregate_score: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub attempts: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure_reason: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

// ============ Boundary ============

/// Authenticated caller identity, issued by the surrounding application
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    pub user_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HumanizeBody {
    pub text: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HumanizeResponse {
    pub final_text: String,
    pub aggregate_score: f64,
    pub per_detector_scores: DetectorScoreSet,
    pub passed: bool,
    pub attempts: u32,
    pub credits_remaining: i64,
}
