//! Request forwarding: body rewrite, header passthrough, unary vs streaming
//! response (spec §4.6 "Forwarding").

use std::sync::Arc;
use std::time::Duration;

use axum::body::{to_bytes, Body};
use axum::extract::{Request, State};
use axum::http::{HeaderMap, HeaderName, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use common::GatewayError;
use futures::StreamExt;

use crate::error::ApiError;
use crate::state::AppState;

const MAX_PROXY_BODY_BYTES: usize = 16 * 1024 * 1024;
const UNARY_TIMEOUT: Duration = Duration::from_secs(300);

const HOP_BY_HOP: [&str; 4] = ["host", "connection", "content-length", "transfer-encoding"];

fn is_hop_by_hop(name: &HeaderName) -> bool {
    HOP_BY_HOP.contains(&name.as_str())
}

/// The catch-all route: forwards any method/path not matched by a more
/// specific route to the admitted instance.
pub async fn proxy(State(state): State<Arc<AppState>>, request: Request) -> Result<Response, ApiError> {
    let (parts, body) = request.into_parts();

    let body_bytes = to_bytes(body, MAX_PROXY_BODY_BYTES)
        .await
        .map_err(|e| ApiError::from(GatewayError::ClientError(format!("invalid request body: {e}"))))?;

    let mut payload: serde_json::Value = serde_json::from_slice(&body_bytes)
        .map_err(|_| ApiError::from(GatewayError::ClientError("request body must be JSON with a model key".into())))?;

    let alias = payload
        .get("model")
        .and_then(|v| v.as_str())
        .ok_or_else(|| ApiError::from(GatewayError::ClientError("request body missing model key".into())))?
        .to_string();

    let instance = state.controller.admit(&alias).await?;
    state.controller.registry().touch(&instance.model_id);

    // The engine has no notion of aliases (spec §4.6 "Rewrite body['model']
    // to the canonical id").
    payload["model"] = serde_json::Value::String(instance.model_id.clone());
    let is_stream = payload.get("stream").and_then(|v| v.as_bool()).unwrap_or(false);
    let outgoing_body = serde_json::to_vec(&payload).map_err(|e| ApiError::from(GatewayError::from(e)))?;

    let query = parts.uri.query().map(|q| format!("?{q}")).unwrap_or_default();
    let url = format!("http://{}{}{}", instance.endpoint, parts.uri.path(), query);

    let mut builder = state.http.request(parts.method.clone(), &url);
    for (name, value) in parts.headers.iter() {
        if !is_hop_by_hop(name) {
            builder = builder.header(name, value);
        }
    }
    builder = builder.body(outgoing_body);
    if !is_stream {
        builder = builder.timeout(UNARY_TIMEOUT);
    }

    let upstream = builder
        .send()
        .await
        .map_err(|e| ApiError::from(GatewayError::TransportError(e.to_string())))?;

    if is_stream {
        streamed_response(upstream)
    } else {
        unary_response(upstream).await
    }
}

fn streamed_response(upstream: reqwest::Response) -> Result<Response, ApiError> {
    let status = StatusCode::from_u16(upstream.status().as_u16()).unwrap_or(StatusCode::BAD_GATEWAY);
    let mut headers = passthrough_headers(upstream.headers());
    if !headers.contains_key(axum::http::header::CONTENT_TYPE) {
        headers.insert(axum::http::header::CONTENT_TYPE, "text/event-stream".parse().unwrap());
    }

    let stream = upstream.bytes_stream().map(|chunk| chunk.map_err(std::io::Error::other));
    let mut response = Response::new(Body::from_stream(stream));
    *response.status_mut() = status;
    *response.headers_mut() = headers;
    Ok(response)
}

async fn unary_response(upstream: reqwest::Response) -> Result<Response, ApiError> {
    let status = upstream.status().as_u16();
    if !upstream.status().is_success() {
        let body = upstream.text().await.unwrap_or_default();
        return Err(ApiError::from(GatewayError::UpstreamError { status, body }));
    }

    let value: serde_json::Value = upstream
        .json()
        .await
        .map_err(|e| ApiError::from(GatewayError::TransportError(e.to_string())))?;

    let mut response = Json(value).into_response();
    *response.status_mut() = StatusCode::from_u16(status).unwrap_or(StatusCode::OK);
    Ok(response)
}

fn passthrough_headers(source: &reqwest::header::HeaderMap) -> HeaderMap {
    let mut headers = HeaderMap::new();
    for (name, value) in source.iter() {
        let Ok(name) = HeaderName::from_bytes(name.as_str().as_bytes()) else { continue };
        if is_hop_by_hop(&name) {
            continue;
        }
        if let Ok(value) = axum::http::HeaderValue::from_bytes(value.as_bytes()) {
            headers.insert(name, value);
        }
    }
    headers
}
