use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::Semaphore;
use tokio::time::{timeout_at, Instant};
use tracing::{debug, error, info, warn};

use crate::domain::{
    BaseRequest, DepositRequest, Transaction, TransactionResponse, TransactionStatus,
    TransactionType, WithdrawalRequest,
};
use crate::gateway::{GatewayError, GatewayRegistry, PaymentGateway};
use crate::ports::{RepositoryError, TransactionRepository};

use super::in_flight::InFlight;

#[derive(Error, Debug)]
pub enum ProcessorError {
    #[error("unsupported payment gateway: {0}")]
    GatewayUnsupported(String),

    #[error("payment gateway not registered: {0}")]
    GatewayNotRegistered(String),

    #[error("could not persist transaction: {0}")]
    Repository(#[from] RepositoryError),

    #[error("could not process transaction: {0}")]
    Dispatch(#[from] GatewayError),

    #[error("dispatch task failed: {0}")]
    Join(String),

    #[error("dispatch capacity is no longer available")]
    CapacityClosed,
}

#[derive(Debug, Clone)]
pub struct ProcessorSettings {
    /// Budget for a dispatch, counted from the moment it is accepted.
    pub dispatch_timeout: Duration,
    /// Dispatches allowed to talk to gateways at the same time.
    pub max_concurrent_dispatches: usize,
}

impl Default for ProcessorSettings {
    fn default() -> Self {
        Self {
            dispatch_timeout: Duration::from_secs(30),
            max_concurrent_dispatches: 64,
        }
    }
}

/// Creates transactions and dispatches them to their gateway.
///
/// Each dispatch runs on its own tokio task so that it survives the caller
/// going away, but `deposit`/`withdrawal` wait for it and return the final
/// state. Every task is tracked until it completes so shutdown can `drain`.
#[derive(Clone)]
pub struct TransactionProcessor {
    gateways: GatewayRegistry,
    repository: Arc<dyn TransactionRepository>,
    permits: Arc<Semaphore>,
    in_flight: InFlight,
    dispatch_timeout: Duration,
}

impl TransactionProcessor {
    pub fn new(
        gateways: GatewayRegistry,
        repository: Arc<dyn TransactionRepository>,
        settings: ProcessorSettings,
    ) -> Self {
        Self {
            gateways,
            repository,
            permits: Arc::new(Semaphore::new(settings.max_concurrent_dispatches.max(1))),
            in_flight: InFlight::new(),
            dispatch_timeout: settings.dispatch_timeout,
        }
    }

    pub async fn deposit(&self, request: DepositRequest) -> Result<TransactionResponse, ProcessorError> {
        self.submit(request, TransactionType::Deposit).await
    }

    pub async fn withdrawal(
        &self,
        request: WithdrawalRequest,
    ) -> Result<TransactionResponse, ProcessorError> {
        self.submit(request, TransactionType::Withdrawal).await
    }

    pub async fn get_by_id(&self, id: &str) -> Result<Transaction, ProcessorError> {
        Ok(self.repository.get_by_id(id).await?)
    }

    pub async fn list(&self) -> Vec<Transaction> {
        self.repository.list().await
    }

    /// Number of dispatches accepted but not yet finished.
    pub fn in_flight(&self) -> usize {
        self.in_flight.len()
    }

    /// Waits until every accepted dispatch has finished, successfully or not.
    pub async fn drain(&self) {
        let pending = self.in_flight.len();
        if pending > 0 {
            info!(pending, "Waiting for in-flight transactions to complete");
        }
        self.in_flight.wait_idle().await;
    }

    async fn submit(
        &self,
        request: BaseRequest,
        transaction_type: TransactionType,
    ) -> Result<TransactionResponse, ProcessorError> {
        let tx = self.create(request, transaction_type).await.map_err(|e| {
            debug!(error = %e, %transaction_type, "Failed to create transaction");
            e
        })?;

        let processed = self.process(tx).await.map_err(|e| {
            debug!(error = %e, %transaction_type, "Failed to process transaction");
            e
        })?;

        Ok(TransactionResponse::from(&processed))
    }

    /// Persists a new pending transaction for a registered gateway.
    pub async fn create(
        &self,
        request: BaseRequest,
        transaction_type: TransactionType,
    ) -> Result<Transaction, ProcessorError> {
        if !self.gateways.contains(&request.gateway_details.id) {
            debug!(gateway = %request.gateway_details.id, "Unsupported payment gateway");
            return Err(ProcessorError::GatewayUnsupported(request.gateway_details.id));
        }

        let tx = Transaction::new(
            request.amount,
            request.card_details,
            request.gateway_details,
            transaction_type,
        );

        Ok(self.repository.create(tx).await?)
    }

    /// Sends a transaction to its gateway and stores the outcome.
    ///
    /// When the dispatch deadline passes first, the record is left untouched
    /// (still pending) and returned as is. A dispatch task that dies is
    /// recorded as failed.
    pub async fn process(&self, tx: Transaction) -> Result<Transaction, ProcessorError> {
        let gateway = self.gateways.get(tx.gateway_id()).ok_or_else(|| {
            debug!(gateway = %tx.gateway_id(), "Payment gateway not registered");
            ProcessorError::GatewayNotRegistered(tx.gateway_id().to_string())
        })?;

        let deadline = Instant::now() + self.dispatch_timeout;
        let guard = self.in_flight.register();
        let repository = self.repository.clone();
        let permits = self.permits.clone();
        let untouched = tx.clone();

        let handle = tokio::spawn(async move {
            let _guard = guard;
            let unit = async move {
                let _permit = permits
                    .acquire_owned()
                    .await
                    .map_err(|_| ProcessorError::CapacityClosed)?;
                dispatch(gateway.as_ref(), repository.as_ref(), tx).await
            };
            timeout_at(deadline, unit).await.ok()
        });

        match handle.await {
            Ok(Some(outcome)) => outcome,
            Ok(None) => {
                warn!(
                    transaction_id = %untouched.id,
                    gateway = %untouched.gateway_id(),
                    "Dispatch deadline elapsed, transaction left pending"
                );
                Ok(untouched)
            }
            Err(e) => {
                error!(transaction_id = %untouched.id, error = %e, "Dispatch task panicked or was cancelled");
                let mut failed = untouched;
                failed.status = TransactionStatus::Failed;
                if let Err(update_error) = self.repository.update(failed).await {
                    debug!(error = %update_error, "Could not update transaction");
                }
                Err(ProcessorError::Join(e.to_string()))
            }
        }
    }
}

async fn dispatch(
    gateway: &dyn PaymentGateway,
    repository: &dyn TransactionRepository,
    mut tx: Transaction,
) -> Result<Transaction, ProcessorError> {
    match gateway.process_transaction(&tx).await {
        Ok(response) => {
            info!(
                transaction_id = %tx.id,
                external_id = %response.transaction_id,
                status = %response.status,
                "Transaction processed"
            );
            tx.external_id = response.transaction_id;
            tx.status = response.status;

            repository.update(tx).await.map_err(|e| {
                debug!(error = %e, "Could not update transaction");
                ProcessorError::from(e)
            })
        }
        Err(gateway_error) => {
            warn!(transaction_id = %tx.id, error = %gateway_error, "Gateway dispatch failed");
            tx.status = TransactionStatus::Failed;

            if let Err(e) = repository.update(tx).await {
                debug!(error = %e, "Could not update transaction");
                return Err(e.into());
            }

            Err(gateway_error.into())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::MemoryTransactionRepository;
    use crate::client::ClientError;
    use crate::domain::{CardDetails, GatewayDetails, GatewayResponse, Money};
    use async_trait::async_trait;
    use bigdecimal::BigDecimal;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct StubGateway {
        outcome: Result<(String, TransactionStatus), u16>,
        delay: Duration,
        calls: AtomicUsize,
    }

    impl StubGateway {
        fn replying(external_id: &str, status: TransactionStatus) -> Arc<Self> {
            Arc::new(Self {
                outcome: Ok((external_id.to_string(), status)),
                delay: Duration::ZERO,
                calls: AtomicUsize::new(0),
            })
        }

        fn failing(status: u16) -> Arc<Self> {
            Arc::new(Self {
                outcome: Err(status),
                delay: Duration::ZERO,
                calls: AtomicUsize::new(0),
            })
        }

        fn slow(delay: Duration) -> Arc<Self> {
            Arc::new(Self {
                outcome: Ok(("ext-slow".to_string(), TransactionStatus::Succeeded)),
                delay,
                calls: AtomicUsize::new(0),
            })
        }
    }

    #[async_trait]
    impl PaymentGateway for StubGateway {
        async fn process_transaction(&self, _tx: &Transaction) -> Result<GatewayResponse, GatewayError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }
            match &self.outcome {
                Ok((external_id, status)) => Ok(GatewayResponse {
                    transaction_id: external_id.clone(),
                    status: *status,
                    message: None,
                    data: None,
                    processed_at: None,
                }),
                Err(code) => Err(GatewayError::Client(ClientError::Exhausted {
                    attempts: 5,
                    reason: format!("received server error: {code}"),
                })),
            }
        }
    }

    struct PanickingGateway;

    #[async_trait]
    impl PaymentGateway for PanickingGateway {
        async fn process_transaction(&self, _tx: &Transaction) -> Result<GatewayResponse, GatewayError> {
            panic!("gateway adapter blew up");
        }
    }

    fn request(gateway: &str) -> BaseRequest {
        BaseRequest {
            amount: Money {
                amount: BigDecimal::from(1000),
                currency: "USD".to_string(),
            },
            card_details: CardDetails {
                name: "John Doe".to_string(),
                number: "4111111111111111".to_string(),
                card_type: String::new(),
                expiry_month: 12,
                expiry_year: 2030,
                cvv: "123".to_string(),
            },
            gateway_details: GatewayDetails {
                id: gateway.to_string(),
                ..Default::default()
            },
        }
    }

    fn processor(
        gateway: Arc<StubGateway>,
        settings: ProcessorSettings,
    ) -> (TransactionProcessor, Arc<MemoryTransactionRepository>) {
        let repository = Arc::new(MemoryTransactionRepository::new());
        let registry = GatewayRegistry::builder().register("gatewayA", gateway).build();
        let processor = TransactionProcessor::new(registry, repository.clone(), settings);
        (processor, repository)
    }

    #[tokio::test]
    async fn test_create_persists_pending_record() {
        let (processor, repository) =
            processor(StubGateway::replying("ext-1", TransactionStatus::Succeeded), ProcessorSettings::default());

        let a = processor.create(request("gatewayA"), TransactionType::Deposit).await.unwrap();
        let b = processor.create(request("gatewayA"), TransactionType::Deposit).await.unwrap();

        assert_ne!(a.id, b.id);
        assert_eq!(a.status, TransactionStatus::Pending);
        assert_eq!(repository.get_by_id(&a.id).await.unwrap().status, TransactionStatus::Pending);
    }

    #[tokio::test]
    async fn test_create_rejects_unknown_gateway_without_side_effects() {
        let (processor, repository) =
            processor(StubGateway::replying("ext-1", TransactionStatus::Succeeded), ProcessorSettings::default());

        let err = processor.create(request("gatewayZ"), TransactionType::Deposit).await.unwrap_err();

        assert!(matches!(err, ProcessorError::GatewayUnsupported(ref id) if id == "gatewayZ"));
        assert!(repository.list().await.is_empty());
    }

    #[tokio::test]
    async fn test_process_rejects_unregistered_gateway() {
        let gateway = StubGateway::replying("ext-1", TransactionStatus::Succeeded);
        let (processor, _) = processor(gateway.clone(), ProcessorSettings::default());

        let mut tx = processor.create(request("gatewayA"), TransactionType::Deposit).await.unwrap();
        tx.gateway_details.id = "gatewayZ".to_string();

        let err = processor.process(tx).await.unwrap_err();
        assert!(matches!(err, ProcessorError::GatewayNotRegistered(_)));
        assert_eq!(gateway.calls.load(Ordering::SeqCst), 0);
        assert_eq!(processor.in_flight(), 0);
    }

    #[tokio::test]
    async fn test_successful_dispatch_applies_gateway_reply() {
        let (processor, repository) =
            processor(StubGateway::replying("ext-42", TransactionStatus::Succeeded), ProcessorSettings::default());

        let response = processor.deposit(request("gatewayA")).await.unwrap();

        assert_eq!(response.status, TransactionStatus::Succeeded);
        assert!(response.processed_at.is_none());

        let stored = repository.get_by_id(&response.transaction_id).await.unwrap();
        assert_eq!(stored.external_id, "ext-42");
        assert_eq!(stored.status, TransactionStatus::Succeeded);
        assert_eq!(stored.transaction_type, TransactionType::Deposit);
        assert!(stored.updated_at > stored.created_at);
    }

    #[tokio::test]
    async fn test_processing_reply_is_stored_as_is() {
        let (processor, repository) =
            processor(StubGateway::replying("ext-7", TransactionStatus::Processing), ProcessorSettings::default());

        let response = processor.withdrawal(request("gatewayA")).await.unwrap();
        let stored = repository.get_by_id(&response.transaction_id).await.unwrap();

        assert_eq!(stored.status, TransactionStatus::Processing);
        assert_eq!(stored.transaction_type, TransactionType::Withdrawal);
    }

    #[tokio::test]
    async fn test_failed_dispatch_marks_failed_and_surfaces_error() {
        let (processor, repository) = processor(StubGateway::failing(500), ProcessorSettings::default());

        let err = processor.withdrawal(request("gatewayA")).await.unwrap_err();
        assert!(matches!(err, ProcessorError::Dispatch(GatewayError::Client(_))));
        assert!(err.to_string().contains("received server error: 500"));

        let stored = repository.list().await;
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].status, TransactionStatus::Failed);
        assert!(stored[0].external_id.is_empty());
    }

    #[tokio::test]
    async fn test_panicking_dispatch_marks_failed() {
        let repository = Arc::new(MemoryTransactionRepository::new());
        let registry = GatewayRegistry::builder()
            .register("gatewayA", Arc::new(PanickingGateway))
            .build();
        let processor = TransactionProcessor::new(registry, repository.clone(), ProcessorSettings::default());

        let err = processor.deposit(request("gatewayA")).await.unwrap_err();
        assert!(matches!(err, ProcessorError::Join(_)));

        let stored = repository.list().await;
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].status, TransactionStatus::Failed);
        assert_eq!(processor.in_flight(), 0);
    }

    #[tokio::test]
    async fn test_closed_capacity_is_reported_as_such() {
        let (processor, repository) =
            processor(StubGateway::replying("ext-1", TransactionStatus::Succeeded), ProcessorSettings::default());
        processor.permits.close();

        let tx = processor.create(request("gatewayA"), TransactionType::Deposit).await.unwrap();
        let err = processor.process(tx.clone()).await.unwrap_err();

        assert!(matches!(err, ProcessorError::CapacityClosed));
        assert_eq!(repository.get_by_id(&tx.id).await.unwrap().status, TransactionStatus::Pending);
    }

    #[tokio::test]
    async fn test_deadline_leaves_transaction_pending_without_error() {
        let settings = ProcessorSettings {
            dispatch_timeout: Duration::from_millis(30),
            ..ProcessorSettings::default()
        };
        let (processor, repository) = processor(StubGateway::slow(Duration::from_millis(300)), settings);

        let response = processor.deposit(request("gatewayA")).await.unwrap();
        assert_eq!(response.status, TransactionStatus::Pending);

        let stored = repository.get_by_id(&response.transaction_id).await.unwrap();
        assert_eq!(stored.status, TransactionStatus::Pending);
        assert!(stored.external_id.is_empty());
        assert_eq!(processor.in_flight(), 0);
    }

    #[tokio::test]
    async fn test_deadline_counts_time_spent_waiting_for_a_permit() {
        let settings = ProcessorSettings {
            dispatch_timeout: Duration::from_millis(100),
            max_concurrent_dispatches: 1,
        };
        let gateway = StubGateway::slow(Duration::from_millis(60));
        let (processor, repository) = processor(gateway.clone(), settings);

        let first = processor.create(request("gatewayA"), TransactionType::Deposit).await.unwrap();
        let second = processor.create(request("gatewayA"), TransactionType::Deposit).await.unwrap();

        let (a, b) = tokio::join!(processor.process(first.clone()), processor.process(second.clone()));
        let statuses = [a.unwrap().status, b.unwrap().status];

        // One finishes in 60ms; the other waits 60ms for the permit and then
        // runs past its 100ms budget.
        assert!(statuses.contains(&TransactionStatus::Succeeded));
        assert!(statuses.contains(&TransactionStatus::Pending));

        let stored_first = repository.get_by_id(&first.id).await.unwrap();
        let stored_second = repository.get_by_id(&second.id).await.unwrap();
        assert_ne!(stored_first.status, stored_second.status);
    }

    #[tokio::test]
    async fn test_drain_waits_for_detached_dispatches() {
        let (processor, repository) =
            processor(StubGateway::slow(Duration::from_millis(100)), ProcessorSettings::default());

        let tx = processor.create(request("gatewayA"), TransactionType::Deposit).await.unwrap();

        // The caller gives up right away; the dispatch keeps running.
        let caller = {
            let processor = processor.clone();
            let tx = tx.clone();
            tokio::spawn(async move { processor.process(tx).await })
        };
        tokio::time::sleep(Duration::from_millis(10)).await;
        caller.abort();
        assert_eq!(processor.in_flight(), 1);

        processor.drain().await;

        assert_eq!(processor.in_flight(), 0);
        let stored = repository.get_by_id(&tx.id).await.unwrap();
        assert_eq!(stored.status, TransactionStatus::Succeeded);
        assert_eq!(stored.external_id, "ext-slow");
    }

    #[tokio::test]
    async fn test_get_by_id_and_list() {
        let (processor, _) =
            processor(StubGateway::replying("ext-1", TransactionStatus::Succeeded), ProcessorSettings::default());

        let response = processor.deposit(request("gatewayA")).await.unwrap();
        let fetched = processor.get_by_id(&response.transaction_id).await.unwrap();

        assert_eq!(fetched.status, TransactionStatus::Succeeded);
        assert_eq!(processor.list().await.len(), 1);
        assert!(matches!(
            processor.get_by_id("missing").await,
            Err(ProcessorError::Repository(RepositoryError::NotFound(_)))
        ));
    }
}
