//! The idle reaper background task (spec §4.6 "Idle Reaper").

use std::sync::Arc;
use std::time::Duration;

use admission::Controller;
use tokio::task::JoinHandle;

const REAP_INTERVAL: Duration = Duration::from_secs(60);

/// Spawn the single background task that sweeps idle instances every 60s.
/// Failures inside a sweep are logged and swallowed by `Controller::reap_idle`
/// itself; the loop here never exits early (spec §7 "Idle-reaper failures
/// are logged and swallowed").
pub fn spawn_idle_reaper(controller: Arc<Controller>) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(REAP_INTERVAL);
        loop {
            interval.tick().await;
            controller.reap_idle().await;
        }
    })
}
