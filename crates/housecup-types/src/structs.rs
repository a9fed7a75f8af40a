//! Core record types: ledger entries and the views derived from them.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::enums::House;
use crate::ids::EntryId;

// ---------------------------------------------------------------------------
// Ledger entries
// ---------------------------------------------------------------------------

/// An immutable point award or deduction recorded against a house.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct Entry {
    /// Store-assigned identifier.
    pub id: EntryId,
    /// House the points were awarded to (or taken from).
    pub house: House,
    /// Signed point delta.
    pub points: i64,
    /// Human-readable reason, if one was given.
    pub reason: Option<String>,
    /// When the entry took effect.
    pub occurred_at: DateTime<Utc>,
}

/// Longest accepted entry reason, in characters. Matches the width of the
/// `entries.reason` column.
pub const MAX_REASON_CHARS: usize = 255;

/// An entry as submitted by a producer, before the store assigns its id
/// and timestamp.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct NewEntry {
    /// Target house.
    pub house: House,
    /// Signed point delta.
    pub points: i64,
    /// Optional reason.
    pub reason: Option<String>,
}

impl NewEntry {
    /// Build a new entry with a reason.
    pub fn new(house: House, points: i64, reason: impl Into<String>) -> Self {
        Self {
            house,
            points,
            reason: Some(reason.into()),
        }
    }
}

// ---------------------------------------------------------------------------
// Aggregates
// ---------------------------------------------------------------------------

/// Grouped totals for one house within a window, as returned by the store.
///
/// Only houses with at least one entry in the window produce a row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HouseTotals {
    /// The house.
    pub house: House,
    /// Exact sum of point deltas.
    pub total_points: i64,
    /// Number of entries.
    pub entry_count: u64,
    /// Timestamp of the newest entry.
    pub last_activity: Option<DateTime<Utc>>,
}

/// One ranked row of the leaderboard.
///
/// Rows are ordered by `total_points` descending, ties broken by house name
/// ascending. `rank` is the 1-based position in that order and is dense
/// even when totals tie.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct LeaderboardRow {
    /// The house.
    pub house: House,
    /// House display color.
    pub color: String,
    /// Exact sum of point deltas in the window.
    pub total_points: i64,
    /// Number of entries in the window.
    pub entry_count: u64,
    /// Newest entry in the window, `None` if the house had no activity.
    pub last_activity: Option<DateTime<Utc>>,
    /// Dense 1-based rank.
    pub rank: u32,
}

/// All-time statistics for a single house with at least one entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct HouseStats {
    /// The house.
    pub house: House,
    /// Number of entries.
    pub entry_count: u64,
    /// Sum of all deltas.
    pub total_points: i64,
    /// Mean delta, rounded to two decimal places.
    #[ts(as = "String")]
    pub avg_points: Decimal,
    /// Largest single delta.
    pub max_points: i64,
    /// Smallest single delta.
    pub min_points: i64,
    /// Sum of positive deltas.
    pub positive_points: i64,
    /// Sum of negative deltas (zero or less).
    pub negative_points: i64,
}

// ---------------------------------------------------------------------------
// Generator
// ---------------------------------------------------------------------------

/// Point-in-time view of the synthetic entry generator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct GeneratorStatus {
    /// Whether the generator is in the running state.
    pub running: bool,
    /// Whether a recurring timer task is alive.
    pub timer_active: bool,
    /// Number of listeners attached to the change feed.
    pub listener_count: u32,
}
