//! The error taxonomy every internal crate returns (spec §7).
//!
//! `api::error::ApiError` is the only place this gets turned into an HTTP
//! status code; everywhere else it is just propagated with `?`.

use thiserror::Error;

/// Library-wide error type for the admission controller and its collaborators.
#[derive(Debug, Error)]
pub enum GatewayError {
    /// Bad input from the caller: unknown alias, missing/unparseable body.
    #[error("{0}")]
    ClientError(String),

    /// The upstream engine answered with a non-2xx status for a forwarded request.
    #[error("engine returned {status}: {body}")]
    UpstreamError { status: u16, body: String },

    /// Container runtime, network resolution, download, or health-probe failure.
    #[error("{0}")]
    OrchestrationFailure(String),

    /// A stale resource (typically a container) could not be cleared before
    /// creating its replacement. Distinct from `OrchestrationFailure` because
    /// callers must not retry a create of the same name.
    #[error("{0}")]
    Inconsistency(String),

    /// Network/transport failure talking to the engine or an external API.
    #[error("{0}")]
    TransportError(String),

    /// Anything else; should be rare outside of bugs.
    #[error("{0}")]
    Internal(String),
}

impl From<std::io::Error> for GatewayError {
    fn from(err: std::io::Error) -> Self {
        GatewayError::OrchestrationFailure(err.to_string())
    }
}

impl From<serde_json::Error> for GatewayError {
    fn from(err: serde_json::Error) -> Self {
        GatewayError::ClientError(format!("invalid JSON: {err}"))
    }
}

pub type Result<T> = std::result::Result<T, GatewayError>;
