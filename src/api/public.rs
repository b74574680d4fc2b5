//! Public API types

use axum::Json;
use axum::response::{IntoResponse, Response};
use http::StatusCode;
use serde::Serialize;

use crate::core::SessionError;

// Errors

#[derive(Serialize)]
pub struct ErrorResponse {
    pub error: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub missing: Vec<String>,
}

pub struct ApiError(anyhow::Error);

impl ApiError {
    fn status(&self) -> StatusCode {
        match self.0.downcast_ref::<SessionError>() {
            Some(SessionError::ConfigIncomplete { .. }) => StatusCode::PRECONDITION_FAILED,
            Some(SessionError::ResourceConstructionFailed(_)) => StatusCode::BAD_GATEWAY,
            Some(SessionError::InvalidRequest(_)) => StatusCode::BAD_REQUEST,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

/// Convert `ApiError` into an Axum compatible response.
impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!("{:#}", self.0);
        } else {
            tracing::warn!("{:#}", self.0);
        }

        let missing = match self.0.downcast_ref::<SessionError>() {
            Some(SessionError::ConfigIncomplete { missing }) => missing.iter().cloned().collect(),
            _ => vec![],
        };
        let body = ErrorResponse {
            error: format!("{:#}", self.0),
            missing,
        };
        (status, Json(body)).into_response()
    }
}

/// Enables using `?` on functions that return `Result<_,
/// anyhow::Error>` to turn them into `Result<_, ApiError>`
impl<E> From<E> for ApiError
where
    E: Into<anyhow::Error>,
{
    fn from(err: E) -> Self {
        Self(err.into())
    }
}

// Re-export public types from each route

pub mod session {
    pub use crate::api::routes::session::public::*;
}
