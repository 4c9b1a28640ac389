//! Request-level errors and their HTTP rendering.
//!
//! Bodies are plain text, like successful answers.
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use thiserror::Error;
use tracing::error;

use crate::chain::ChainError;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("missing form field: {0}")]
    MissingField(&'static str),

    #[error("failed to generate an answer")]
    Chain(#[from] ChainError),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self {
            ApiError::MissingField(_) => StatusCode::BAD_REQUEST,
            ApiError::Chain(e) => {
                error!("Chat request failed: {e}");
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };
        (status, self.to_string()).into_response()
    }
}
