// Persistence Capabilities
// Credit balances, the usage ledger and process records, plus in-memory backends
// used by the CLI and tests.

use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};
use thiserror::Error;
use uuid::Uuid;

use crate::models::{CreditLedgerEntry, HumanizationResult, ProcessRecord, ProcessStatus};

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("user not found: {0}")]
    UserNotFound(String),
    #[error("insufficient balance for user {0}")]
    InsufficientBalance(String),
    #[error("process record not found: {0}")]
    RecordNotFound(Uuid),
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

/// Atomic credit balance operations
#[async_trait]
pub trait CreditStore: Send + Sync {
    async fn get(&self, user_id: &str) -> Result<i64, StoreError>;

    /// Atomically subtract `amount`; returns the remaining balance
    async fn decrement(&self, user_id: &str, amount: i64) -> Result<i64, StoreError>;
}

/// Append-only usage log
#[async_trait]
pub trait UsageLedger: Send + Sync {
    async fn append(&self, entry: CreditLedgerEntry) -> Result<(), StoreError>;
}

/// Lifecycle of in-flight request records
#[async_trait]
pub trait ProcessStore: Send + Sync {
    async fn start(&self, user_id: &str, input_chars: usize) -> Result<ProcessRecord, StoreError>;
    async fn complete(&self, id: Uuid, result: &HumanizationResult) -> Result<(), StoreError>;
    async fn fail(&self, id: Uuid, reason: &str) -> Result<(), StoreError>;
}

fn lock<T>(mutex: &Mutex<T>) -> Result<MutexGuard<'_, T>, StoreError> {
    mutex
        .lock()
        .map_err(|_| StoreError::Unavailable("lock poisoned".to_string()))
}

// ============ In-memory backends ============

#[derive(Debug, Default)]
pub struct InMemoryCreditStore {
    balances: Mutex<HashMap<String, i64>>,
}

impl InMemoryCreditStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_user(mut self, user_id: &str, balance: i64) -> Self {
        if let Ok(balances) = self.balances.get_mut() {
            balances.insert(user_id.to_string(), balance);
        }
        self
    }

    pub fn balance(&self, user_id: &str) -> Option<i64> {
        self.balances.lock().ok()?.get(user_id).copied()
    }
}

#[async_trait]
impl CreditStore for InMemoryCreditStore {
    async fn get(&self, user_id: &str) -> Result<i64, StoreError> {
        lock(&self.balances)?
            .get(user_id)
            .copied()
            .ok_or_else(|| StoreError::UserNotFound(user_id.to_string()))
    }

    async fn decrement(&self, user_id: &str, amount: i64) -> Result<i64, StoreError> {
        let mut balances = lock(&self.balances)?;
        let balance = balances
            .get_mut(user_id)
            .ok_or_else(|| StoreError::UserNotFound(user_id.to_string()))?;
        if *balance < amount {
            return Err(StoreError::InsufficientBalance(user_id.to_string()));
        }
        *balance -= amount;
        Ok(*balance)
    }
}

#[derive(Debug, Default)]
pub struct InMemoryUsageLedger {
    entries: Mutex<Vec<CreditLedgerEntry>>,
}

impl InMemoryUsageLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entries(&self) -> Vec<CreditLedgerEntry> {
        self.entries.lock().map(|e| e.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl UsageLedger for InMemoryUsageLedger {
    async fn append(&self, entry: CreditLedgerEntry) -> Result<(), StoreError> {
        lock(&self.entries)?.push(entry);
        Ok(())
    }
}

#[derive(Debug, Default)]
pub struct InMemoryProcessStore {
    records: Mutex<HashMap<Uuid, ProcessRecord>>,
}

impl InMemoryProcessStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, id: Uuid) -> Option<ProcessRecord> {
        self.records.lock().ok()?.get(&id).cloned()
    }

    pub fn records(&self) -> Vec<ProcessRecord> {
        self.records
            .lock()
            .map(|r| r.values().cloned().collect())
            .unwrap_or_default()
    }
}

#[async_trait]
impl ProcessStore for InMemoryProcessStore {
    async fn start(&self, user_id: &str, input_chars: usize) -> Result<ProcessRecord, StoreError> {
        let now = Utc::now();
        let record = ProcessRecord {
            id: Uuid::new_v4(),
            user_id: user_id.to_string(),
            input_chars,
            status: ProcessStatus::Pending,
            aggregate_score: None,
            attempts: None,
            failure_reason: None,
            created_at: now,
            updated_at: now,
        };
        lock(&self.records)?.insert(record.id, record.clone());
        Ok(record)
    }

    async fn complete(&self, id: Uuid, result: &HumanizationResult) -> Result<(), StoreError> {
        let mut records = lock(&self.records)?;
        let record = records.get_mut(&id).ok_or(StoreError::RecordNotFound(id))?;
        record.status = ProcessStatus::Completed;
        record.aggregate_score = Some(result.aggregate_score);
        record.attempts = Some(result.attempts);
        record.updated_at = Utc::now();
        Ok(())
    }

    async fn fail(&self, id: Uuid, reason: &str) -> Result<(), StoreError> {
        let mut records = lock(&self.records)?;
        let record = records.get_mut(&id).ok_or(StoreError::RecordNotFound(id))?;
        record.status = ProcessStatus::Failed;
        record.failure_reason = Some(reason.to_string());
        record.updated_at = Utc::now();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_credit_decrement() {
        let store = InMemoryCreditStore::new().with_user("u1", 2);
        assert_eq!(store.get("u1").await.unwrap(), 2);
        assert_eq!(store.decrement("u1", 1).await.unwrap(), 1);
        assert_eq!(store.decrement("u1", 1).await.unwrap(), 0);
        assert!(matches!(
            store.decrement("u1", 1).await,
            Err(StoreError::InsufficientBalance(_))
        ));
        assert_eq!(store.balance("u1"), Some(0));
    }

    #[tokio::test]
    async fn test_unknown_user() {
        let store = InMemoryCreditStore::new();
        assert!(matches!(store.get("ghost").await, Err(StoreError::UserNotFound(_))));
        assert!(matches!(
            store.decrement("ghost", 1).await,
            Err(StoreError::UserNotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_process_record_lifecycle() {
        let store = InMemoryProcessStore::new();
        let record = store.start("u1", 42).await.unwrap();
        assert_eq!(record.status, ProcessStatus::Pending);

        store.fail(record.id, "boom").await.unwrap();
        let stored = store.get(record.id).unwrap();
        assert_eq!(stored.status, ProcessStatus::Failed);
        assert_eq!(stored.failure_reason.as_deref(), Some("boom"));

        assert!(matches!(
            store.fail(Uuid::new_v4(), "x").await,
            Err(StoreError::RecordNotFound(_))
        ));
    }
}
