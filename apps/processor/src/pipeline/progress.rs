//! Progress projection and the elapsed-time ticker.
//!
//! Neither gates the pipeline; both only feed the published snapshot.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};

use crate::pipeline::snapshot::{RunPhase, RunSnapshot};

/// `index / total * 100`. Zero stages count as done.
pub fn percentage(index: usize, total: usize) -> f64 {
    if total == 0 {
        return 100.0;
    }
    index.min(total) as f64 / total as f64 * 100.0
}

/// Increments `elapsed_seconds` once per `period` until the run completes or
/// a newer generation replaces it.
pub(crate) fn spawn_ticker(
    state: Arc<watch::Sender<RunSnapshot>>,
    generation: u64,
    period: Duration,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticks = interval_at(Instant::now() + period, period);
        ticks.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            ticks.tick().await;
            let still_running = state.send_if_modified(|snapshot| {
                if snapshot.generation != generation || snapshot.phase == RunPhase::Completed {
                    return false;
                }
                snapshot.elapsed_seconds += 1;
                true
            });
            if !still_running {
                break;
            }
        }
    })
}
