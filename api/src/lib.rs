//! C6 — HTTP surface: request forwarding (unary/streaming), the status and
//! model-listing endpoints, and the HTTP-boundary error mapping (spec §4.6,
//! §6, §7).

pub mod error;
pub mod proxy;
pub mod reaper;
pub mod router;
pub mod routes;
pub mod state;

pub use error::ApiError;
pub use reaper::spawn_idle_reaper;
pub use router::build_router;
pub use state::AppState;
