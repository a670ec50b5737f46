use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;

use crate::codec::{CodecError, MimeType};
use crate::domain::ErrorResponse;
use crate::handlers::negotiated;
use crate::ports::RepositoryError;
use crate::services::{CallbackError, ProcessorError};
use crate::validation::ValidationError;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Unsupported gateway: {0}")]
    UnsupportedGateway(String),

    #[error("Dispatch failed: {0}")]
    Dispatch(String),

    #[error("Internal server error: {0}")]
    Internal(String),
}

impl AppError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::Validation(_) | AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::UnsupportedGateway(_) => StatusCode::UNPROCESSABLE_ENTITY,
            AppError::Dispatch(_) | AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Renders the error body in the caller's format.
    pub fn into_response_as(self, format: MimeType) -> Response {
        let status = self.status_code();
        let body = ErrorResponse {
            code: status.as_u16(),
            message: self.to_string(),
        };

        negotiated(format, status, &body)
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        self.into_response_as(MimeType::Json)
    }
}

impl From<CodecError> for AppError {
    fn from(err: CodecError) -> Self {
        AppError::BadRequest(err.to_string())
    }
}

impl From<RepositoryError> for AppError {
    fn from(err: RepositoryError) -> Self {
        match err {
            RepositoryError::NotFound(_) | RepositoryError::ExternalIdNotFound(_) => {
                AppError::NotFound(err.to_string())
            }
            RepositoryError::AlreadyExists(_) => AppError::Internal(err.to_string()),
        }
    }
}

impl From<ProcessorError> for AppError {
    fn from(err: ProcessorError) -> Self {
        match err {
            ProcessorError::GatewayUnsupported(id) => AppError::UnsupportedGateway(id),
            ProcessorError::Repository(e) => e.into(),
            ProcessorError::Dispatch(e) => AppError::Dispatch(e.to_string()),
            ProcessorError::GatewayNotRegistered(_)
            | ProcessorError::Join(_)
            | ProcessorError::CapacityClosed => {
                AppError::Internal(err.to_string())
            }
        }
    }
}

impl From<CallbackError> for AppError {
    fn from(err: CallbackError) -> Self {
        match err {
            CallbackError::NotFound(_) => AppError::NotFound(err.to_string()),
            CallbackError::Repository(e) => e.into(),
        }
    }
}
