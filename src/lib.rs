pub mod adapters;
pub mod client;
pub mod codec;
pub mod config;
pub mod domain;
pub mod error;
pub mod gateway;
pub mod handlers;
pub mod health;
pub mod middleware;
pub mod ports;
pub mod services;
pub mod utils;
pub mod validation;

use axum::{
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use std::time::Instant;

use crate::adapters::MemoryTransactionRepository;
use crate::client::{ReqwestTransport, ResilientClient};
use crate::config::Config;
use crate::gateway::{GatewayAdapter, GatewayRegistry, GATEWAY_A, GATEWAY_B};
use crate::ports::TransactionRepository;
use crate::services::{CallbackIngestor, TransactionProcessor};

#[derive(Clone)]
pub struct AppState {
    pub processor: TransactionProcessor,
    pub callbacks: CallbackIngestor,
    pub client: Arc<ResilientClient>,
    pub start_time: Instant,
}

impl AppState {
    /// Wires both gateways onto one shared resilient client and an in-memory store.
    pub fn from_config(config: &Config) -> Self {
        let client = Arc::new(ResilientClient::new(
            "gateways",
            Arc::new(ReqwestTransport::new(config.http_timeout())),
            config.breaker_settings(),
            config.retry_policy(),
        ));

        let gateways = GatewayRegistry::builder()
            .register(GATEWAY_A, Arc::new(GatewayAdapter::json(&config.gateway_a_url, client.clone())))
            .register(GATEWAY_B, Arc::new(GatewayAdapter::xml(&config.gateway_b_url, client.clone())))
            .build();

        let repository: Arc<dyn TransactionRepository> = Arc::new(MemoryTransactionRepository::new());

        Self {
            processor: TransactionProcessor::new(gateways, repository.clone(), config.processor_settings()),
            callbacks: CallbackIngestor::new(repository),
            client,
            start_time: Instant::now(),
        }
    }
}

pub fn create_app(state: AppState) -> Router {
    Router::new()
        .route("/health", get(handlers::health))
        .route("/deposit", post(handlers::transactions::deposit))
        .route("/withdrawal", post(handlers::transactions::withdrawal))
        .route("/callback", post(handlers::callback::callback))
        .route("/transactions/:id", get(handlers::transactions::get_transaction))
        .layer(axum::middleware::from_fn(
            middleware::request_logger::request_logger_middleware,
        ))
        .with_state(state)
}
