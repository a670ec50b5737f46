use axum::{
    body::Bytes,
    extract::{Path, State},
    http::{header, HeaderMap, StatusCode},
    response::Response,
};

use crate::codec::{self, MimeType};
use crate::domain::{BaseRequest, TransactionType};
use crate::error::AppError;
use crate::handlers::negotiated;
use crate::validation;
use crate::AppState;

pub async fn deposit(State(state): State<AppState>, headers: HeaderMap, body: Bytes) -> Response {
    let format = MimeType::from_headers(&headers);
    submit(&state, format, &body, TransactionType::Deposit)
        .await
        .unwrap_or_else(|e| e.into_response_as(format))
}

pub async fn withdrawal(State(state): State<AppState>, headers: HeaderMap, body: Bytes) -> Response {
    let format = MimeType::from_headers(&headers);
    submit(&state, format, &body, TransactionType::Withdrawal)
        .await
        .unwrap_or_else(|e| e.into_response_as(format))
}

async fn submit(
    state: &AppState,
    format: MimeType,
    body: &[u8],
    transaction_type: TransactionType,
) -> Result<Response, AppError> {
    let request: BaseRequest = codec::decode(format, body).map_err(|e| {
        tracing::debug!(error = %e, %format, "Failed to decode transaction request");
        AppError::from(e)
    })?;
    validation::validate_base_request(&request)?;

    let response = match transaction_type {
        TransactionType::Deposit => state.processor.deposit(request).await,
        TransactionType::Withdrawal => state.processor.withdrawal(request).await,
    }
    .map_err(|e| {
        tracing::warn!(error = %e, %transaction_type, "Transaction request failed");
        AppError::from(e)
    })?;

    Ok(negotiated(format, StatusCode::OK, &response))
}

/// Returns the stored record in the format named by `Accept` (JSON unless XML is asked for).
pub async fn get_transaction(
    State(state): State<AppState>,
    Path(id): Path<String>,
    headers: HeaderMap,
) -> Response {
    let format = MimeType::from_content_type(headers.get(header::ACCEPT).and_then(|v| v.to_str().ok()));

    match state.processor.get_by_id(&id).await {
        Ok(tx) => negotiated(format, StatusCode::OK, &tx),
        Err(e) => AppError::from(e).into_response_as(format),
    }
}
