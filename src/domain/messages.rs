//! Request and response shapes exchanged with API callers and payment gateways.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use super::transaction::{
    CardDetails, GatewayDetails, Money, Transaction, TransactionStatus, TransactionType,
};

/// Body of a deposit or withdrawal request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BaseRequest {
    pub amount: Money,
    pub card_details: CardDetails,
    pub gateway_details: GatewayDetails,
}

pub type DepositRequest = BaseRequest;
pub type WithdrawalRequest = BaseRequest;

/// Canonical request sent to every gateway, whatever its wire format.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GatewayRequest {
    pub order_id: String,
    pub amount: Money,
    pub card_details: CardDetails,
    #[serde(default)]
    pub callback_url: String,
    #[serde(rename = "type")]
    pub transaction_type: TransactionType,
}

impl From<&Transaction> for GatewayRequest {
    fn from(tx: &Transaction) -> Self {
        Self {
            order_id: tx.id.clone(),
            amount: tx.amount.clone(),
            card_details: tx.card_details.clone(),
            callback_url: tx.gateway_details.callback_url.clone(),
            transaction_type: tx.transaction_type,
        }
    }
}

/// A gateway's reply to a `GatewayRequest`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GatewayResponse {
    pub transaction_id: String,
    pub status: TransactionStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub processed_at: Option<DateTime<Utc>>,
}

/// Out-of-band status update posted by a gateway to `/callback`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionStatusUpdate {
    #[serde(default)]
    pub id: String,
    /// External (gateway-assigned) transaction id.
    pub transaction_id: String,
    pub status: TransactionStatus,
    #[serde(default)]
    pub received_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub details: HashMap<String, String>,
}

/// Answer to a deposit or withdrawal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionResponse {
    pub transaction_id: String,
    pub status: TransactionStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub processed_at: Option<DateTime<Utc>>,
}

impl From<&Transaction> for TransactionResponse {
    fn from(tx: &Transaction) -> Self {
        Self {
            transaction_id: tx.id.clone(),
            status: tx.status,
            message: None,
            processed_at: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub code: u16,
    pub message: String,
}
