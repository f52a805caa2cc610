use common::GatewayError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RuntimeError {
    #[error("docker error: {0}")]
    Docker(#[from] bollard::errors::Error),

    #[error("container {0} not found")]
    NotFound(String),

    #[error("container {0} has no address on network {1}")]
    NoNetworkAddress(String, String),

    #[error("failed to query gpu telemetry: {0}")]
    Telemetry(String),

    #[error("{0}")]
    Io(#[from] std::io::Error),
}

impl From<RuntimeError> for GatewayError {
    fn from(err: RuntimeError) -> Self {
        GatewayError::OrchestrationFailure(err.to_string())
    }
}
