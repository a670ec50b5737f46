use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info};

use crate::domain::{Transaction, TransactionStatusUpdate};
use crate::ports::{RepositoryError, TransactionRepository};

#[derive(Error, Debug)]
pub enum CallbackError {
    #[error("no transaction with external ID {0}")]
    NotFound(String),

    #[error("could not update transaction: {0}")]
    Repository(#[from] RepositoryError),
}

/// Applies status updates pushed by gateways after the initial dispatch.
#[derive(Clone)]
pub struct CallbackIngestor {
    repository: Arc<dyn TransactionRepository>,
}

impl CallbackIngestor {
    pub fn new(repository: Arc<dyn TransactionRepository>) -> Self {
        Self { repository }
    }

    /// Overwrites the status of the transaction the gateway knows as
    /// `update.transaction_id`. There is no ordering against an in-flight
    /// dispatch writing the same record: whichever update lands last wins.
    pub async fn apply_update(&self, update: &TransactionStatusUpdate) -> Result<Transaction, CallbackError> {
        let mut tx = self
            .repository
            .get_by_external_id(&update.transaction_id)
            .await
            .map_err(|e| match e {
                RepositoryError::ExternalIdNotFound(id) => CallbackError::NotFound(id),
                other => CallbackError::Repository(other),
            })?;

        let previous = tx.status;
        tx.status = update.status;

        let updated = self.repository.update(tx).await.map_err(|e| {
            debug!(error = %e, "Could not update transaction");
            CallbackError::from(e)
        })?;

        info!(
            transaction_id = %updated.id,
            external_id = %update.transaction_id,
            from = %previous,
            to = %updated.status,
            "Applied gateway callback"
        );

        Ok(updated)
    }
}
