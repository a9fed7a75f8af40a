//! Periodic removal of entries past the retention age.

use std::time::Duration;

use chrono::TimeDelta;
use housecup_db::LedgerStore;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{info, warn};

use crate::scoreboard::Scoreboard;

/// Spawn a task that purges entries older than `max_age` every `every`.
///
/// The first sweep runs immediately. Failures are logged and the task
/// keeps going.
pub fn spawn_retention_sweeper<S: LedgerStore + 'static>(
    scoreboard: Scoreboard<S>,
    max_age: TimeDelta,
    every: Duration,
) -> JoinHandle<()> {
    info!(
        max_age_days = max_age.num_days(),
        every_secs = every.as_secs(),
        "Retention sweeper started"
    );
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(every.max(Duration::from_secs(1)));
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        loop {
            ticker.tick().await;
            if let Err(e) = scoreboard.purge_expired(max_age).await {
                warn!(error = %e, "Retention sweep failed");
            }
        }
    })
}
