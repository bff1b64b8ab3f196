//! Error-to-HTTP response conversion.
//!
//! Implements `IntoResponse` for [`stitch_core::Error`] so that route handlers
//! can return `Result<T, AppError>` directly.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;

/// Wrapper so we can implement `IntoResponse` for an external type.
#[derive(Debug)]
pub struct AppError {
    inner: stitch_core::Error,
}

impl AppError {
    pub fn new(inner: stitch_core::Error) -> Self {
        Self { inner }
    }

    pub fn status(&self) -> StatusCode {
        StatusCode::from_u16(self.inner.http_status()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
    }
}

impl From<stitch_core::Error> for AppError {
    fn from(e: stitch_core::Error) -> Self {
        Self::new(e)
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();

        if status.is_server_error() {
            tracing::error!(
                status = %status,
                error = %self.inner,
                "Server error in API handler"
            );
        }

        let mut body = json!({
            "error": self.inner.to_string(),
            "code": self.inner.code(),
        });
        if let stitch_core::Error::Concatenation { diagnostics, .. } = &self.inner {
            if !diagnostics.is_empty() {
                body["details"] = json!(diagnostics);
            }
        }

        (status, axum::Json(body)).into_response()
    }
}
