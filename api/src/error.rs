//! The HTTP-boundary error type: the only place `GatewayError` turns into a
//! status code and a response body (spec §7).

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use common::GatewayError;
use serde::Serialize;

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error(transparent)]
    Gateway(#[from] GatewayError),
}

/// RFC 7807-shaped body for everything except upstream passthrough errors.
#[derive(Serialize)]
struct ProblemDetails {
    title: String,
    status: u16,
    detail: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let ApiError::Gateway(err) = self;
        match err {
            // Engine errors are passed through with the engine's own status,
            // in the flat shape spec §4.6 names explicitly, not as a
            // problem-details document — this is the engine's failure, not
            // the gateway's.
            GatewayError::UpstreamError { status, body } => {
                let status = StatusCode::from_u16(status).unwrap_or(StatusCode::BAD_GATEWAY);
                (status, Json(serde_json::json!({ "error": "upstream_error", "details": body }))).into_response()
            }
            GatewayError::ClientError(detail) => problem(StatusCode::BAD_REQUEST, "client error", detail),
            GatewayError::TransportError(detail) => problem(StatusCode::SERVICE_UNAVAILABLE, "transport error", detail),
            GatewayError::OrchestrationFailure(detail) => {
                problem(StatusCode::INTERNAL_SERVER_ERROR, "orchestration failure", detail)
            }
            GatewayError::Inconsistency(detail) => problem(StatusCode::INTERNAL_SERVER_ERROR, "inconsistent state", detail),
            GatewayError::Internal(detail) => problem(StatusCode::INTERNAL_SERVER_ERROR, "internal error", detail),
        }
    }
}

fn problem(status: StatusCode, title: &str, detail: String) -> Response {
    (status, Json(ProblemDetails { title: title.to_string(), status: status.as_u16(), detail })).into_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::to_bytes;

    #[tokio::test]
    async fn client_error_maps_to_400() {
        let response = ApiError::from(GatewayError::ClientError("model not allowed".into())).into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn upstream_error_keeps_engine_status_and_shape() {
        let response =
            ApiError::from(GatewayError::UpstreamError { status: 422, body: "bad request".into() }).into_response();
        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["details"], "bad request");
    }

    #[tokio::test]
    async fn transport_error_maps_to_503() {
        let response = ApiError::from(GatewayError::TransportError("connection refused".into())).into_response();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    }
}
