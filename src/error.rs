//! Central error type for the proxy core.
//!
//! Every variant maps to HTTP 500 at the front-end; richer reporting belongs
//! in logs, not in the response body. The `tracing::error!` call happens
//! once, at the `IntoResponse` boundary, so call sites can propagate with
//! `?` without duplicating log lines.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

#[derive(Debug, thiserror::Error)]
pub enum SxmError {
    #[error("unknown channel: {0}")]
    UnknownChannel(String),

    #[error("authentication failed")]
    AuthFailed,

    #[error("session retry budget exhausted")]
    SessionRetryExhausted,

    #[error("segment retry budget exhausted")]
    SegmentRetryExhausted,

    #[error("upstream error {code}: {message}")]
    UpstreamError { code: i64, message: String },

    #[error("failed to parse upstream response: {0}")]
    Parse(String),

    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),
}

pub type Result<T> = std::result::Result<T, SxmError>;

impl IntoResponse for SxmError {
    fn into_response(self) -> Response {
        tracing::error!(error = %self, "request failed");
        StatusCode::INTERNAL_SERVER_ERROR.into_response()
    }
}
