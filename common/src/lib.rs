//! Shared types used across the gateway's crates.
//!
//! Sits at the bottom of the dependency graph: no dependency on any other
//! workspace crate, so every other crate can depend on it without cycles.

pub mod error;
pub mod logging;
pub mod platform;

pub use error::{GatewayError, Result};
