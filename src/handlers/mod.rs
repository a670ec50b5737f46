pub mod callback;
pub mod transactions;

use axum::{
    extract::State,
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

use crate::codec::{self, MimeType};
use crate::health::check_health;
use crate::AppState;

/// Encodes `value` in `format` and sets the matching `Content-Type`.
pub fn negotiated<T: Serialize>(format: MimeType, status: StatusCode, value: &T) -> Response {
    match codec::encode(format, value) {
        Ok(body) => (status, [(header::CONTENT_TYPE, format.as_str())], body).into_response(),
        Err(e) => {
            tracing::error!(error = %e, %format, "Failed to encode response body");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

pub async fn health(State(state): State<AppState>) -> impl IntoResponse {
    Json(check_health(&state.client, &state.processor, state.start_time))
}
