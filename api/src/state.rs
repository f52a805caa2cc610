//! Axum `State` payload: the admission controller plus a dedicated HTTP
//! client used only for proxying to engine instances (separate from the
//! clients `admission`/`metadata` use for HuggingFace and health probes).

use std::sync::Arc;
use std::time::Duration;

use admission::Controller;

pub struct AppState {
    pub controller: Arc<Controller>,
    pub http: reqwest::Client,
}

impl AppState {
    pub fn new(controller: Arc<Controller>) -> Self {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(300))
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());
        Self { controller, http }
    }
}
