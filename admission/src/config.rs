//! Startup configuration consumed by the launcher and controller (spec §4.1,
//! §6 "Environment variables recognised"). Parsing CLI/env/file sources into
//! this shape is the `server` crate's job (C1); this crate only defines what
//! the result looks like and what it means to the launch path.

use std::collections::HashMap;

/// Engine knobs passed verbatim to the launcher (spec §4.1, §4.4).
#[derive(Debug, Clone)]
pub struct EngineKnobs {
    /// `--gpu-memory-utilization`, a string fraction (e.g. `"0.9"`).
    pub gpu_memory_utilization: String,
    /// `--swap-space <GiB>`; 0 disables.
    pub swap_space_gib: u32,
    /// Global max context length cap; 0 disables.
    pub global_max_model_len: u32,
    /// `--max-num-seqs`; 0 omits the flag.
    pub max_num_seqs: u32,
    /// `--tensor-parallel-size`; 0 omits the flag.
    pub tensor_parallel_size: u32,
    /// Canonical model ids whose prefix requires `--async-scheduling`.
    pub async_scheduling_prefixes: Vec<String>,
}

/// Everything C4/C5 need at runtime (spec §4.1).
#[derive(Debug, Clone)]
pub struct AdmissionConfig {
    /// `alias -> canonical_model_id`. Empty is allowed.
    pub allowed_models: HashMap<String, String>,
    pub knobs: EngineKnobs,
    /// Network name for the container runtime, already resolved against the
    /// gateway's own container attachments (spec §4.1).
    pub network_name: String,
    /// Seconds; `<= 0` disables the idle reaper.
    pub idle_timeout_secs: i64,
    pub container_prefix: String,
    pub engine_image: String,
    pub host_cache_dir: String,
    pub hf_token: Option<String>,
    /// Port the engine listens on inside its container.
    pub engine_port: u16,
}

impl AdmissionConfig {
    /// Canonical model id for `alias`, or `None` if it isn't allowed (spec
    /// §4.1 "A request naming an alias outside allowed_models MUST fail").
    pub fn resolve_alias(&self, alias: &str) -> Option<&str> {
        self.allowed_models.get(alias).map(String::as_str)
    }

    /// Whether `model_id` requires `--async-scheduling` (spec §4.4).
    pub fn needs_async_scheduling(&self, model_id: &str) -> bool {
        self.knobs.async_scheduling_prefixes.iter().any(|prefix| model_id.starts_with(prefix.as_str()))
    }
}
