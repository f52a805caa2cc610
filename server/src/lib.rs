//! C1 (Config & Allowlist) plus the process entry point that wires the rest
//! of the gateway together.

pub mod config;

pub use config::{load, CliArgs, ServerSettings};
