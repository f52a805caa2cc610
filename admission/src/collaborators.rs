//! Trait seams the controller admits requests through, so its branch logic
//! can be exercised against fakes instead of a real Docker daemon and GPU
//! (spec §4.5's three branches plus the idle reaper).
//!
//! Mirrors the teacher's own `AppStateProvider` shape in `api/src/traits.rs`:
//! an `async_trait` over the collaborator, implemented once for the real
//! type and once per fake in tests.

use async_trait::async_trait;
use common::GatewayError;
use registry::Instance;
use runtime::{ContainerHandle, ContainerRuntime, GpuTelemetry, RuntimeError};

use crate::config::AdmissionConfig;
use crate::launcher::EngineLauncher;

/// Stop/remove a running container (spec §4.5 teardown, §4.6 idle reaper).
#[async_trait]
pub trait ContainerLifecycle: Send + Sync {
    async fn stop(&self, handle: &ContainerHandle, timeout_secs: i64) -> Result<(), RuntimeError>;
    async fn remove(&self, handle: &ContainerHandle) -> Result<(), RuntimeError>;
}

#[async_trait]
impl ContainerLifecycle for ContainerRuntime {
    async fn stop(&self, handle: &ContainerHandle, timeout_secs: i64) -> Result<(), RuntimeError> {
        ContainerRuntime::stop(self, handle, timeout_secs).await
    }

    async fn remove(&self, handle: &ContainerHandle) -> Result<(), RuntimeError> {
        ContainerRuntime::remove(self, handle).await
    }
}

/// GPU VRAM readings (spec §4.5 Branch A discovery sampling, §3 startup
/// budget sampling).
#[async_trait]
pub trait Telemetry: Send + Sync {
    async fn total_vram_mib(&self) -> u64;
    async fn used_vram_mib(&self) -> u64;
}

#[async_trait]
impl Telemetry for GpuTelemetry {
    async fn total_vram_mib(&self) -> u64 {
        GpuTelemetry::total_vram_mib(self).await
    }

    async fn used_vram_mib(&self) -> u64 {
        GpuTelemetry::used_vram_mib(self).await
    }
}

/// Turn `(model_id, slot_index)` into a live `Instance` (spec §4.4).
#[async_trait]
pub trait Launch: Send + Sync {
    async fn launch(&self, model_id: &str, slot_index: u32, config: &AdmissionConfig) -> Result<Instance, GatewayError>;
}

#[async_trait]
impl Launch for EngineLauncher {
    async fn launch(&self, model_id: &str, slot_index: u32, config: &AdmissionConfig) -> Result<Instance, GatewayError> {
        EngineLauncher::launch(self, model_id, slot_index, config).await
    }
}
