//! Idle session reaper.
//!
//! Periodically evicts sessions that have not run a command within the
//! configured idle window, so abandoned dumps do not pin debugger processes
//! for the lifetime of the server.

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use super::SessionRegistry;

/// Upper bound on the interval between idle sweeps.
const MAX_POLL_INTERVAL: Duration = Duration::from_secs(60);

/// Sweep interval for a given idle window: a quarter of the window, capped
/// at [`MAX_POLL_INTERVAL`].
#[must_use]
pub fn poll_interval(max_idle: Duration) -> Duration {
    (max_idle / 4).clamp(Duration::from_millis(10), MAX_POLL_INTERVAL)
}

/// Spawn a background task that evicts sessions idle for `max_idle`.
///
/// The task polls at [`poll_interval`] until the `CancellationToken` fires.
#[must_use]
pub fn spawn_idle_reaper(
    registry: Arc<SessionRegistry>,
    max_idle: Duration,
    cancel: CancellationToken,
) -> tokio::task::JoinHandle<()> {
    let interval = poll_interval(max_idle);
    tokio::spawn(async move {
        info!(?max_idle, ?interval, "idle session reaper started");
        loop {
            tokio::select! {
                () = cancel.cancelled() => {
                    info!("idle session reaper shutting down");
                    break;
                }
                () = tokio::time::sleep(interval) => {}
            }

            let evicted = registry.evict_idle(max_idle).await;
            if !evicted.is_empty() {
                debug!(count = evicted.len(), "idle sweep evicted sessions");
            }
        }
    })
}
