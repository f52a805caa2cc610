//! C4 (Engine Launcher) and C5 (Admission Controller) — the heart of the
//! gateway (spec §4.4, §4.5).

pub mod collaborators;
pub mod config;
pub mod controller;
pub mod launcher;

pub use collaborators::{ContainerLifecycle, Launch, Telemetry};
pub use config::{AdmissionConfig, EngineKnobs};
pub use controller::Controller;
pub use launcher::EngineLauncher;
