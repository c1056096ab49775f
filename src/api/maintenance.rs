//! Periodic housekeeping: sweep expired sessions, drop idle rate-limit buckets and purge
//! empty-search markers. One failing job does not stop the others.

use super::AppState;
use std::time::{Duration, Instant};
use tokio::sync::watch;
use tracing::{debug, info, info_span, warn, Instrument};

pub const DEFAULT_MAINTENANCE_INTERVAL_SECONDS: u64 = 300;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct MaintenanceReport {
    pub swept_sessions: u64,
    pub pruned_buckets: usize,
    pub purged_markers: usize,
}

/// Run every job once. Buckets idle for at least `idle` (never less than the refill
/// window) are dropped.
pub async fn run_pass(state: &AppState, idle: Duration) -> MaintenanceReport {
    let mut report = MaintenanceReport::default();

    match state.tokens.sweep().await {
        Ok(swept) => report.swept_sessions = swept,
        Err(err) => warn!("session sweep failed: {err}"),
    }

    let idle = idle.max(state.limiter.config().refill_window());
    report.pruned_buckets = state.limiter.prune_idle(Instant::now(), idle);

    match state.resolver.purge_empty_markers().await {
        Ok(purged) => report.purged_markers = purged,
        Err(err) => warn!("empty search marker purge failed: {err}"),
    }

    debug!(?report, "maintenance pass finished");
    report
}

/// Run [`run_pass`] every `interval` until `shutdown` flips.
pub fn spawn(
    state: AppState,
    interval: Duration,
    mut shutdown: watch::Receiver<bool>,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        // the first tick completes immediately
        ticker.tick().await;

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    run_pass(&state, interval)
                        .instrument(info_span!("maintenance"))
                        .await;
                }
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        info!("Maintenance task stopped");
                        break;
                    }
                }
            }
        }
    })
}
