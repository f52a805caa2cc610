//! C2 — Footprint Store: the durable `{model_id -> vram_mib}` map (spec §3, §4.2).

use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// Write-through JSON-backed map. Callers hold the model's StartLock while
/// calling `put`, so this type adds no locking of its own (spec §4.2).
pub struct FootprintStore {
    path: PathBuf,
    map: HashMap<String, u64>,
}

impl FootprintStore {
    /// Parse the JSON file at `path`. On I/O or parse failure, start with
    /// an empty map and log a warning rather than fail startup.
    pub fn load(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let map = std::fs::read_to_string(&path)
            .ok()
            .and_then(|contents| serde_json::from_str(&contents).ok())
            .unwrap_or_else(|| {
                tracing::warn!(path = %path.display(), "footprint store missing or unparseable, starting empty");
                HashMap::new()
            });
        Self { path, map }
    }

    pub fn get(&self, model_id: &str) -> Option<u64> {
        self.map.get(model_id).copied()
    }

    /// The whole map, for the status endpoint (spec §4.6 "Status endpoint").
    pub fn snapshot(&self) -> HashMap<String, u64> {
        self.map.clone()
    }

    /// Write-through insert: updates the in-memory map immediately, then
    /// rewrites the whole file. A write failure is logged and swallowed —
    /// the in-memory value is authoritative for the rest of this process's
    /// life (spec §4.2).
    pub fn put(&mut self, model_id: &str, vram_mib: u64) {
        self.map.insert(model_id.to_string(), vram_mib);
        if let Err(err) = self.persist() {
            tracing::warn!(model_id, error = %err, "failed to persist footprint store");
        }
    }

    fn persist(&self) -> std::io::Result<()> {
        let json = serde_json::to_string_pretty(&self.map)?;
        write_atomic(&self.path, &json)
    }
}

fn write_atomic(path: &Path, contents: &str) -> std::io::Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let tmp_path = path.with_extension("tmp");
    std::fs::write(&tmp_path, contents)?;
    std::fs::rename(&tmp_path, path)
}
