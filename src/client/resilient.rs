use backoff::backoff::Backoff;
use backoff::{ExponentialBackoff, ExponentialBackoffBuilder};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::time::sleep;
use tracing::{debug, warn};

use super::breaker::{BreakerError, BreakerSettings, CircuitBreaker, CircuitState};
use super::transport::{OutboundRequest, OutboundResponse, Transport, TransportError};

#[derive(Error, Debug)]
pub enum ClientError {
    /// Retries were used up or the circuit breaker refused the call.
    #[error("dispatch exhausted after {attempts} attempt(s): {reason}")]
    Exhausted { attempts: u32, reason: String },
}

/// Why a single attempt counted as a failure.
#[derive(Error, Debug)]
enum AttemptError {
    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error("received client error: {0}")]
    ClientStatus(u16),

    #[error("received server error: {0}")]
    ServerStatus(u16),
}

#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Total attempts, the first one included.
    pub max_attempts: u32,
    pub initial_interval: Duration,
    pub max_interval: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            initial_interval: Duration::from_millis(500),
            max_interval: Duration::from_secs(5),
        }
    }
}

impl RetryPolicy {
    pub const MULTIPLIER: f64 = 1.5;
    pub const RANDOMIZATION_FACTOR: f64 = 0.5;

    /// Fresh backoff schedule for one `send`. Each delay is the current
    /// interval randomized by +/-50%; the interval grows by 1.5x up to
    /// `max_interval`.
    fn backoff(&self) -> ExponentialBackoff {
        ExponentialBackoffBuilder::new()
            .with_initial_interval(self.initial_interval)
            .with_multiplier(Self::MULTIPLIER)
            .with_randomization_factor(Self::RANDOMIZATION_FACTOR)
            .with_max_interval(self.max_interval.max(self.initial_interval))
            .with_max_elapsed_time(None)
            .build()
    }
}

/// HTTP client that retries failed calls with exponential backoff and stops
/// calling a failing dependency through a circuit breaker.
///
/// A transport error or a 4xx/5xx status counts as a failure. Once the breaker
/// rejects a call the remaining retries are skipped.
pub struct ResilientClient {
    transport: Arc<dyn Transport>,
    breaker: CircuitBreaker,
    retry: RetryPolicy,
}

impl ResilientClient {
    pub fn new(
        name: &str,
        transport: Arc<dyn Transport>,
        breaker: BreakerSettings,
        retry: RetryPolicy,
    ) -> Self {
        Self {
            transport,
            breaker: CircuitBreaker::new(name, &breaker),
            retry,
        }
    }

    pub fn circuit_state(&self) -> CircuitState {
        self.breaker.state()
    }

    pub async fn send(&self, request: OutboundRequest) -> Result<OutboundResponse, ClientError> {
        let max_attempts = self.retry.max_attempts.max(1);
        let mut backoff = self.retry.backoff();
        let mut attempt = 0;

        loop {
            attempt += 1;

            let transport = self.transport.clone();
            let outbound = request.clone();
            let result = self
                .breaker
                .call(async move {
                    let response = transport.execute(outbound).await?;
                    classify(response)
                })
                .await;

            match result {
                Ok(response) => {
                    debug!(url = %request.url, attempt, status = %response.status, "Outbound call succeeded");
                    return Ok(response);
                }
                Err(BreakerError::Rejected) => {
                    warn!(url = %request.url, attempt, "Circuit breaker open, giving up");
                    return Err(ClientError::Exhausted {
                        attempts: attempt,
                        reason: "circuit breaker is open".to_string(),
                    });
                }
                Err(BreakerError::Inner(e)) if attempt >= max_attempts => {
                    warn!(url = %request.url, attempt, error = %e, "Outbound call failed, retries exhausted");
                    return Err(ClientError::Exhausted {
                        attempts: attempt,
                        reason: e.to_string(),
                    });
                }
                Err(BreakerError::Inner(e)) => {
                    let delay = backoff.next_backoff().unwrap_or(self.retry.max_interval);
                    warn!(
                        url = %request.url,
                        attempt,
                        error = %e,
                        "Outbound call failed. Retrying in {:?}",
                        delay
                    );
                    sleep(delay).await;
                }
            }
        }
    }
}

fn classify(response: OutboundResponse) -> Result<OutboundResponse, AttemptError> {
    let status = response.status;
    if status.is_client_error() {
        return Err(AttemptError::ClientStatus(status.as_u16()));
    }
    if status.is_server_error() {
        return Err(AttemptError::ServerStatus(status.as_u16()));
    }
    Ok(response)
}
