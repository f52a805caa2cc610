use runtime::ContainerHandle;
use std::time::{SystemTime, UNIX_EPOCH};

/// One live engine container serving exactly one model (spec §3).
#[derive(Debug, Clone)]
pub struct Instance {
    pub model_id: String,
    pub slot_index: u32,
    pub endpoint: String,
    pub last_used_at: u64,
    pub vram_mib: u64,
    pub handle: ContainerHandle,
}

impl Instance {
    pub fn new(model_id: impl Into<String>, slot_index: u32, endpoint: impl Into<String>, handle: ContainerHandle) -> Self {
        Self {
            model_id: model_id.into(),
            slot_index,
            endpoint: endpoint.into(),
            last_used_at: now(),
            vram_mib: 0,
            handle,
        }
    }

    pub fn container_name(prefix: &str, slot_index: u32) -> String {
        format!("{prefix}_{slot_index}")
    }
}

pub(crate) fn now() -> u64 {
    SystemTime::now().duration_since(UNIX_EPOCH).map(|d| d.as_secs()).unwrap_or(0)
}
