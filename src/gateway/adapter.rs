use async_trait::async_trait;
use reqwest::StatusCode;
use std::sync::Arc;
use thiserror::Error;
use tracing::debug;

use crate::client::{ClientError, OutboundRequest, ResilientClient};
use crate::codec::{self, CodecError, MimeType};
use crate::domain::{GatewayRequest, GatewayResponse, Transaction};

#[derive(Error, Debug)]
pub enum GatewayError {
    #[error("failed to encode gateway request: {0}")]
    Encode(CodecError),

    #[error("failed to send gateway request: {0}")]
    Client(#[from] ClientError),

    #[error("gateway returned non-200 status code: {0}")]
    UnexpectedStatus(u16),

    #[error("failed to decode gateway response: {0}")]
    Decode(CodecError),
}

/// A payment provider that can take a transaction and report its outcome.
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    async fn process_transaction(&self, tx: &Transaction) -> Result<GatewayResponse, GatewayError>;
}

/// How strictly a gateway's HTTP status is checked once the call went through.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusPolicy {
    /// Any status is accepted; the decoded body decides the outcome.
    AnyStatus,
    /// Anything other than 200 is a hard failure, whatever the body says.
    RequireOk,
}

/// HTTP gateway speaking one wire format through a shared `ResilientClient`.
pub struct GatewayAdapter {
    name: String,
    endpoint: String,
    format: MimeType,
    status_policy: StatusPolicy,
    client: Arc<ResilientClient>,
}

impl GatewayAdapter {
    pub fn new(
        name: impl Into<String>,
        endpoint: impl Into<String>,
        format: MimeType,
        status_policy: StatusPolicy,
        client: Arc<ResilientClient>,
    ) -> Self {
        Self {
            name: name.into(),
            endpoint: endpoint.into(),
            format,
            status_policy,
            client,
        }
    }

    /// Gateway A: JSON, trusts the response body.
    pub fn json(endpoint: impl Into<String>, client: Arc<ResilientClient>) -> Self {
        Self::new("gatewayA", endpoint, MimeType::Json, StatusPolicy::AnyStatus, client)
    }

    /// Gateway B: XML, requires HTTP 200.
    pub fn xml(endpoint: impl Into<String>, client: Arc<ResilientClient>) -> Self {
        Self::new("gatewayB", endpoint, MimeType::Xml, StatusPolicy::RequireOk, client)
    }

    fn process_url(&self) -> String {
        format!("{}/process", self.endpoint.trim_end_matches('/'))
    }
}

#[async_trait]
impl PaymentGateway for GatewayAdapter {
    async fn process_transaction(&self, tx: &Transaction) -> Result<GatewayResponse, GatewayError> {
        let body = codec::encode(self.format, &GatewayRequest::from(tx)).map_err(GatewayError::Encode)?;
        let request = OutboundRequest::post(self.process_url(), body).with_content_type(self.format.as_str());

        debug!(gateway = %self.name, transaction_id = %tx.id, format = %self.format, "Sending transaction to gateway");
        let response = self.client.send(request).await?;

        if self.status_policy == StatusPolicy::RequireOk && response.status != StatusCode::OK {
            return Err(GatewayError::UnexpectedStatus(response.status.as_u16()));
        }

        codec::decode(self.format, &response.body).map_err(GatewayError::Decode)
    }
}
