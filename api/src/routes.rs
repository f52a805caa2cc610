//! `GET /v1/models` and `GET /gateway/status` (spec §6).

use std::sync::Arc;

use axum::extract::State;
use axum::Json;
use serde_json::{json, Value};

use crate::state::AppState;

pub async fn list_models(State(state): State<Arc<AppState>>) -> Json<Value> {
    let data: Vec<Value> = state
        .controller
        .config()
        .allowed_models
        .keys()
        .map(|alias| json!({ "id": alias }))
        .collect();

    Json(json!({ "object": "list", "data": data }))
}

pub async fn gateway_status(State(state): State<Arc<AppState>>) -> Json<Value> {
    let controller = &state.controller;
    let prefix = &controller.config().container_prefix;

    let active_containers: serde_json::Map<String, Value> = controller
        .registry()
        .snapshot()
        .into_iter()
        .map(|instance| {
            let name = registry::Instance::container_name(prefix, instance.slot_index);
            let (ip, port) = instance.endpoint.rsplit_once(':').unwrap_or((instance.endpoint.as_str(), ""));
            (
                name,
                json!({
                    "model_id": instance.model_id,
                    "ip": ip,
                    "port": port,
                    "last_request_at": instance.last_used_at,
                }),
            )
        })
        .collect();

    Json(json!({
        "total_gpu_vram_mib": controller.total_vram_mib(),
        "known_footprints_mib": controller.known_footprints().await,
        "active_containers": Value::Object(active_containers),
    }))
}
