//! Error types for the daemon: wraps the signal-path library's error enum
//! and adds the I/O-adjacent failure modes that only exist once there are
//! real devices, sockets, and files involved.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    /// Errors bubbling up from the DSP/RDS core.
    #[error(transparent)]
    Core(#[from] mpxrds_core::Error),

    /// Audio device enumeration, configuration, or stream-build failures.
    #[error("audio device error: {0}")]
    Audio(String),

    /// Bootstrap configuration errors (missing/unparsable TOML, bad overrides).
    #[error("configuration error: {0}")]
    Config(String),

    /// Control-plane HTTP server errors.
    #[error("HTTP server error: {0}")]
    Http(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub type Result<T> = std::result::Result<T, Error>;

/// Lets handlers return `Result<_, Error>` directly. A core `InvalidInput`
/// or an out-of-range control value is the caller's mistake (400); anything
/// else is ours (500).
impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let status = match &self {
            Error::Core(mpxrds_core::Error::InvalidInput(_)) => StatusCode::BAD_REQUEST,
            Error::Core(mpxrds_core::Error::Rds(_)) => StatusCode::BAD_REQUEST,
            Error::Core(mpxrds_core::Error::Control) => StatusCode::BAD_REQUEST,
            Error::Core(mpxrds_core::Error::Rtp(_)) => StatusCode::CONFLICT,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        let body = json!({ "error": self.to_string() });
        (status, axum::Json(body)).into_response()
    }
}
