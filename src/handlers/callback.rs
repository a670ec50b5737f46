use axum::{
    body::Bytes,
    extract::State,
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
};

use crate::codec::{self, MimeType};
use crate::domain::TransactionStatusUpdate;
use crate::error::AppError;
use crate::validation;
use crate::AppState;

/// Gateways report later status changes here. Answers 200 with an empty body.
pub async fn callback(State(state): State<AppState>, headers: HeaderMap, body: Bytes) -> Response {
    let format = MimeType::from_headers(&headers);

    match apply(&state, format, &body).await {
        Ok(()) => StatusCode::OK.into_response(),
        Err(e) => e.into_response_as(format),
    }
}

async fn apply(state: &AppState, format: MimeType, body: &[u8]) -> Result<(), AppError> {
    let update: TransactionStatusUpdate = codec::decode(format, body)?;
    validation::validate_status_update(&update)?;

    state.callbacks.apply_update(&update).await.map_err(|e| {
        tracing::warn!(external_id = %update.transaction_id, error = %e, "Callback rejected");
        AppError::from(e)
    })?;

    Ok(())
}
