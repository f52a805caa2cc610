use common::GatewayError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum MetadataError {
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid repo id: {0}")]
    InvalidRepoId(String),

    #[error("unsafe file path: {0}")]
    UnsafePath(String),

    #[error("no gguf file found in {0}")]
    NoGgufFile(String),

    #[error("http {status} while {action}")]
    UpstreamStatus { status: u16, action: String },
}

impl From<MetadataError> for GatewayError {
    fn from(err: MetadataError) -> Self {
        match err {
            MetadataError::InvalidRepoId(_) | MetadataError::UnsafePath(_) => {
                GatewayError::ClientError(err.to_string())
            }
            _ => GatewayError::OrchestrationFailure(err.to_string()),
        }
    }
}
