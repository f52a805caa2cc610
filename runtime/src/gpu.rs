//! GPU telemetry via `nvidia-smi`.
//!
//! Shelling out is the same approach the reference implementation's own
//! discovery routine uses (it spins up a throwaway `nvidia/cuda` container
//! to run `nvidia-smi` from inside the Docker network); here the gateway
//! runs the host's `nvidia-smi` directly since nothing requires the
//! container-network vantage point for a simple memory query.

use crate::error::RuntimeError;
use tokio::process::Command;

/// `total_vram_mib()` / `used_vram_mib()` as required by spec §1.
///
/// Implemented against a single physical GPU (index 0); multi-GPU tensor
/// parallelism is out of scope (the spec's `tensor-parallel-size` knob is
/// passed straight through to the engine, which owns device placement).
#[derive(Debug, Clone, Default)]
pub struct GpuTelemetry;

impl GpuTelemetry {
    pub fn new() -> Self {
        Self
    }

    /// Total VRAM in MiB reported by the driver. Returns 0 (accounting
    /// disabled, spec §4.1/§3) if no NVIDIA GPU is present or `nvidia-smi`
    /// is not installed.
    pub async fn total_vram_mib(&self) -> u64 {
        self.query("memory.total").await.unwrap_or(0)
    }

    /// Currently-used VRAM in MiB across all processes on the GPU.
    pub async fn used_vram_mib(&self) -> u64 {
        self.query("memory.used").await.unwrap_or(0)
    }

    async fn query(&self, field: &str) -> Result<u64, RuntimeError> {
        let output = Command::new("nvidia-smi")
            .args([
                &format!("--query-gpu={field}"),
                "--format=csv,noheader,nounits",
                "--id=0",
            ])
            .output()
            .await
            .map_err(|e| RuntimeError::Telemetry(e.to_string()))?;

        if !output.status.success() {
            return Err(RuntimeError::Telemetry(format!(
                "nvidia-smi exited with {}",
                output.status
            )));
        }

        String::from_utf8_lossy(&output.stdout)
            .lines()
            .next()
            .and_then(|line| line.trim().parse::<u64>().ok())
            .ok_or_else(|| RuntimeError::Telemetry("unparseable nvidia-smi output".into()))
    }
}
