//! Storage port for transaction records.

use async_trait::async_trait;
use thiserror::Error;

use crate::domain::Transaction;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RepositoryError {
    #[error("transaction {0} already exists")]
    AlreadyExists(String),

    #[error("transaction {0} not found")]
    NotFound(String),

    #[error("transaction with external ID {0} not found")]
    ExternalIdNotFound(String),
}

pub type RepositoryResult<T> = Result<T, RepositoryError>;

/// Keyed storage for transaction records. Records are never deleted.
///
/// Implementations own the `created_at`/`updated_at` stamps: whatever the
/// caller put in those fields is overwritten.
#[async_trait]
pub trait TransactionRepository: Send + Sync {
    /// Inserts a new record, failing if its id is already taken.
    async fn create(&self, tx: Transaction) -> RepositoryResult<Transaction>;

    async fn get_by_id(&self, id: &str) -> RepositoryResult<Transaction>;

    async fn get_by_external_id(&self, external_id: &str) -> RepositoryResult<Transaction>;

    /// Snapshot of every record, in no particular order.
    async fn list(&self) -> Vec<Transaction>;

    /// Replaces an existing record, failing if its id is unknown.
    async fn update(&self, tx: Transaction) -> RepositoryResult<Transaction>;
}
