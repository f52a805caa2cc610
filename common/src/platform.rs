//! Cross-platform filesystem defaults.

use std::path::PathBuf;

/// Default location for the gateway's own state (footprint store, etc.)
/// when not overridden by configuration.
///
/// - Linux: `$XDG_DATA_HOME/vram-gateway` or `~/.local/share/vram-gateway`.
/// - macOS: `~/Library/Application Support/vram-gateway`.
/// - Windows: `%APPDATA%\vram-gateway`.
pub fn default_state_dir() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("vram-gateway")
}

/// Default host-side HuggingFace cache directory, bind-mounted read-write
/// into every launched engine container (spec §6).
pub fn default_hf_cache_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".cache")
        .join("huggingface")
}

/// Ensure a directory exists, creating it (and parents) if necessary.
pub fn ensure_dir(path: &std::path::Path) -> std::io::Result<()> {
    if !path.exists() {
        std::fs::create_dir_all(path)?;
    }
    Ok(())
}
