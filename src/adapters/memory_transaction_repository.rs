//! In-memory implementation of TransactionRepository.

use async_trait::async_trait;
use chrono::{Duration, Utc};
use std::collections::HashMap;
use tokio::sync::RwLock;

use crate::domain::Transaction;
use crate::ports::{RepositoryError, RepositoryResult, TransactionRepository};

/// Process-lifetime transaction store guarded by a single reader/writer lock.
#[derive(Debug, Default)]
pub struct MemoryTransactionRepository {
    transactions: RwLock<HashMap<String, Transaction>>,
}

impl MemoryTransactionRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl TransactionRepository for MemoryTransactionRepository {
    async fn create(&self, mut tx: Transaction) -> RepositoryResult<Transaction> {
        let mut transactions = self.transactions.write().await;

        if transactions.contains_key(&tx.id) {
            return Err(RepositoryError::AlreadyExists(tx.id));
        }

        let now = Utc::now();
        tx.created_at = now;
        tx.updated_at = now;
        transactions.insert(tx.id.clone(), tx.clone());

        Ok(tx)
    }

    async fn get_by_id(&self, id: &str) -> RepositoryResult<Transaction> {
        self.transactions
            .read()
            .await
            .get(id)
            .cloned()
            .ok_or_else(|| RepositoryError::NotFound(id.to_string()))
    }

    async fn get_by_external_id(&self, external_id: &str) -> RepositoryResult<Transaction> {
        let not_found = || RepositoryError::ExternalIdNotFound(external_id.to_string());
        if external_id.is_empty() {
            return Err(not_found());
        }

        self.transactions
            .read()
            .await
            .values()
            .find(|tx| tx.external_id == external_id)
            .cloned()
            .ok_or_else(not_found)
    }

    async fn list(&self) -> Vec<Transaction> {
        self.transactions.read().await.values().cloned().collect()
    }

    async fn update(&self, mut tx: Transaction) -> RepositoryResult<Transaction> {
        let mut transactions = self.transactions.write().await;

        let existing = transactions
            .get(&tx.id)
            .ok_or_else(|| RepositoryError::NotFound(tx.id.clone()))?;

        // Keep updated_at strictly increasing even when the clock has not moved.
        let mut now = Utc::now();
        if now <= existing.updated_at {
            now = existing.updated_at + Duration::microseconds(1);
        }
        tx.created_at = existing.created_at;
        tx.updated_at = now;
        transactions.insert(tx.id.clone(), tx.clone());

        Ok(tx)
    }
}
