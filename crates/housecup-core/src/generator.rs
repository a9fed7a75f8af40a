//! Synthetic load generator.
//!
//! Produces plausible ledger entries on a timer, in paced bulk batches, or
//! as a fixed backdated scenario that populates every leaderboard window.
//! Every produced entry goes through the [`Scoreboard`] write path and is
//! published to the [`ChangeFeed`] as it lands.
//!
//! Start/stop transitions are serialized behind a mutex. Generation itself
//! runs outside that lock on its own task, so a slow store never blocks a
//! control call.

use std::ops::RangeInclusive;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use chrono::{TimeDelta, Utc};
use housecup_db::LedgerStore;
use housecup_types::{Entry, GeneratorStatus, House, NewEntry};
use rand::Rng;
use rand::seq::IndexedRandom;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use crate::error::LedgerError;
use crate::feed::{ChangeFeed, ChangeSource};
use crate::scoreboard::Scoreboard;

/// Shortest accepted timer period.
pub const MIN_PERIOD: Duration = Duration::from_millis(100);

// ---------------------------------------------------------------------------
// Synthesis
// ---------------------------------------------------------------------------

/// A weighted bucket of outcomes sharing a point range and reason pool.
struct OutcomeClass {
    weight: u32,
    points: RangeInclusive<i64>,
    reasons: &'static [&'static str],
}

static COMMENDATION: OutcomeClass = OutcomeClass {
    weight: 8,
    points: 10..=59,
    reasons: &[
        "Outstanding classroom performance",
        "Helping a fellow student",
        "Exceptional spell work",
        "Leadership qualities",
        "Creative problem solving",
        "Defending a classmate",
        "Academic excellence",
        "Displaying house values",
    ],
};

static REPRIMAND: OutcomeClass = OutcomeClass {
    weight: 5,
    points: -34..=-5,
    reasons: &[
        "Late to class",
        "Talking during lesson",
        "Incomplete homework",
        "Disrupting class",
        "Minor mischief",
    ],
};

/// Draw one synthetic entry: a uniform house and a delta from one of the
/// two weighted outcome classes.
pub fn synthesize<R: Rng + ?Sized>(rng: &mut R) -> NewEntry {
    let total = COMMENDATION.weight.saturating_add(REPRIMAND.weight);
    let class = if rng.random_ratio(COMMENDATION.weight, total) {
        &COMMENDATION
    } else {
        &REPRIMAND
    };

    let house = House::ALL
        .choose(rng)
        .copied()
        .unwrap_or(House::Gryffindor);
    let points = rng.random_range(class.points.clone());
    let reason = class.reasons.choose(rng).copied().unwrap_or_default();

    NewEntry::new(house, points, reason)
}

/// The fixed scenario: house, points, reason, minutes in the past.
const SCENARIO: [(House, i64, &str, i64); 6] = [
    (House::Gryffindor, 25, "Recent: Brave deed", 2),
    (House::Slytherin, -15, "Recent: Caught cheating", 1),
    (House::Ravenclaw, 40, "Hour ago: Brilliant answer", 30),
    (House::Hufflepuff, 20, "Hour ago: Helping others", 45),
    (House::Gryffindor, 35, "Day ago: Excellent essay", 120),
    (House::Slytherin, 30, "Day ago: Perfect potion", 180),
];

// ---------------------------------------------------------------------------
// Generator
// ---------------------------------------------------------------------------

/// The write side shared between control calls and the timer task.
struct Producer<S> {
    scoreboard: Scoreboard<S>,
    feed: ChangeFeed,
}

impl<S> Clone for Producer<S> {
    fn clone(&self) -> Self {
        Self {
            scoreboard: self.scoreboard.clone(),
            feed: self.feed.clone(),
        }
    }
}

impl<S: LedgerStore> Producer<S> {
    async fn generate_one(&self) -> Result<Entry, LedgerError> {
        let entry = synthesize(&mut rand::rng());
        let stored = self.scoreboard.record_entry(&entry).await?;
        self.feed.publish(stored.clone(), ChangeSource::Generated);
        Ok(stored)
    }
}

struct ActiveRun {
    task: JoinHandle<()>,
    cancelled: Arc<AtomicBool>,
    period: Duration,
}

#[derive(Default)]
struct GeneratorControl {
    run: Option<ActiveRun>,
}

/// Timer-driven producer of synthetic ledger entries.
///
/// Independent instances share nothing but what they are constructed with.
pub struct Generator<S> {
    producer: Producer<S>,
    pacing: Duration,
    control: Mutex<GeneratorControl>,
}

impl<S: LedgerStore + 'static> Generator<S> {
    /// Create a stopped generator.
    ///
    /// `pacing` is the delay between iterations of [`Self::generate_bulk`].
    pub fn new(scoreboard: Scoreboard<S>, feed: ChangeFeed, pacing: Duration) -> Self {
        Self {
            producer: Producer { scoreboard, feed },
            pacing,
            control: Mutex::new(GeneratorControl::default()),
        }
    }

    /// Start generating one entry every `period`, beginning immediately.
    ///
    /// Returns `false` without changing anything if already running. The
    /// period is raised to [`MIN_PERIOD`] if shorter.
    pub async fn start(&self, period: Duration) -> bool {
        let mut control = self.control.lock().await;
        if control.run.is_some() {
            debug!("Generator already running");
            return false;
        }

        let period = period.max(MIN_PERIOD);
        let cancelled = Arc::new(AtomicBool::new(false));
        let task = tokio::spawn(run_timer(
            self.producer.clone(),
            period,
            Arc::clone(&cancelled),
        ));

        control.run = Some(ActiveRun {
            task,
            cancelled,
            period,
        });
        info!(period_ms = period.as_millis(), "Generator started");
        true
    }

    /// Stop the timer. Returns `false` if it was not running.
    ///
    /// No new generation begins after this returns. A store call already
    /// in flight is aborted with the task.
    pub async fn stop(&self) -> bool {
        let mut control = self.control.lock().await;
        let Some(run) = control.run.take() else {
            debug!("Generator already stopped");
            return false;
        };

        run.cancelled.store(true, Ordering::Release);
        run.task.abort();
        info!(period_ms = run.period.as_millis(), "Generator stopped");
        true
    }

    /// Generate and store a single entry.
    pub async fn generate_one(&self) -> Result<Entry, LedgerError> {
        self.producer.generate_one().await
    }

    /// Generate `count` entries in sequence with the pacing delay between
    /// them. Failed iterations are logged and skipped.
    pub async fn generate_bulk(&self, count: u32) -> Vec<Entry> {
        let mut created = Vec::with_capacity(usize::try_from(count).unwrap_or_default());
        for i in 0..count {
            if i > 0 {
                tokio::time::sleep(self.pacing).await;
            }
            match self.producer.generate_one().await {
                Ok(entry) => created.push(entry),
                Err(e) => warn!(iteration = i, error = %e, "Bulk generation step failed"),
            }
        }
        info!(requested = count, created = created.len(), "Bulk generation finished");
        created
    }

    /// Seed the fixed, backdated scenario covering every window.
    ///
    /// Entries are published to the change feed once backdated. The first
    /// store failure aborts the scenario.
    pub async fn generate_scenario(&self) -> Result<Vec<Entry>, LedgerError> {
        let store = self.producer.scoreboard.store();
        let mut created = Vec::with_capacity(SCENARIO.len());

        for (house, points, reason, minutes_ago) in SCENARIO {
            let draft = NewEntry::new(house, points, reason);
            let stored = self.producer.scoreboard.record_entry(&draft).await?;
            let occurred_at = Utc::now()
                .checked_sub_signed(TimeDelta::minutes(minutes_ago))
                .unwrap_or(stored.occurred_at);
            let backdated = store.backdate(stored.id, occurred_at).await?;
            self.producer
                .feed
                .publish(backdated.clone(), ChangeSource::Scenario);
            created.push(backdated);
        }

        info!(count = created.len(), "Test scenario seeded");
        Ok(created)
    }

    /// Current state snapshot.
    pub async fn status(&self) -> GeneratorStatus {
        let control = self.control.lock().await;
        let listeners = self.producer.feed.listener_count();
        GeneratorStatus {
            running: control.run.is_some(),
            timer_active: control
                .run
                .as_ref()
                .is_some_and(|run| !run.task.is_finished()),
            listener_count: u32::try_from(listeners).unwrap_or(u32::MAX),
        }
    }
}

async fn run_timer<S: LedgerStore>(
    producer: Producer<S>,
    period: Duration,
    cancelled: Arc<AtomicBool>,
) {
    let mut ticker = tokio::time::interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        ticker.tick().await;
        if cancelled.load(Ordering::Acquire) {
            break;
        }
        match producer.generate_one().await {
            Ok(entry) => debug!(
                id = %entry.id,
                house = %entry.house,
                points = entry.points,
                "Generated entry"
            ),
            Err(e) => warn!(error = %e, "Scheduled generation failed"),
        }
    }
}
