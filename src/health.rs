use serde::{Deserialize, Serialize};
use std::time::Instant;

use crate::client::{CircuitState, ResilientClient};
use crate::services::TransactionProcessor;

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub uptime_seconds: u64,
    pub circuit_breaker: String,
    pub in_flight: usize,
}

pub fn check_health(
    client: &ResilientClient,
    processor: &TransactionProcessor,
    start_time: Instant,
) -> HealthResponse {
    let breaker = client.circuit_state();

    HealthResponse {
        status: determine_overall_status(breaker).to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_seconds: start_time.elapsed().as_secs(),
        circuit_breaker: breaker.to_string(),
        in_flight: processor.in_flight(),
    }
}

// The service still accepts requests while the breaker is open, but dispatches fail fast.
fn determine_overall_status(breaker: CircuitState) -> &'static str {
    match breaker {
        CircuitState::Closed => "healthy",
        CircuitState::Open | CircuitState::HalfOpen => "degraded",
    }
}
