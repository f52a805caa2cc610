//! Tracing setup, shared by the server binary.

use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

/// Initialise the global tracing subscriber.
///
/// `RUST_LOG` always wins if set; otherwise falls back to `default_level`
/// for this crate's own targets and `info` for dependencies.
pub fn init_tracing(default_level: &str) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("vram_gateway={default_level},tower_http=info")));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer())
        .init();
}
