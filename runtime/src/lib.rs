//! External collaborators the admission controller treats as opaque:
//! the container runtime and GPU telemetry (spec §1 "out of scope").
//!
//! Neither depends on `registry` or `admission` — this crate only knows how
//! to talk to Docker and `nvidia-smi`.

pub mod docker;
pub mod error;
pub mod gpu;

pub use docker::{ContainerHandle, ContainerInfo, ContainerRuntime, ContainerSpec};
pub use error::RuntimeError;
pub use gpu::GpuTelemetry;
