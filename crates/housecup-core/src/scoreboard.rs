//! The aggregation engine: ranked leaderboards, house statistics, and the
//! validated write path.
//!
//! Rankings are recomputed from raw entries on every read. Nothing is
//! cached between writes, so a leaderboard is always exactly consistent
//! with the ledger at the moment of the read.

use std::sync::Arc;

use chrono::{TimeDelta, Utc};
use housecup_db::LedgerStore;
use housecup_types::{
    Entry, House, HouseStats, HouseTotals, LeaderboardRow, MAX_REASON_CHARS, NewEntry, Window,
};
use rust_decimal::Decimal;
use tracing::{debug, info};

use crate::error::LedgerError;

/// Bounds enforced before a call reaches the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LedgerLimits {
    /// Largest accepted absolute point delta.
    pub max_abs_points: i64,
    /// Recent-activity length when the caller gives none.
    pub default_activity_limit: u32,
    /// Upper clamp for recent-activity length.
    pub max_activity_limit: u32,
}

impl Default for LedgerLimits {
    fn default() -> Self {
        Self {
            max_abs_points: 100,
            default_activity_limit: 10,
            max_activity_limit: 100,
        }
    }
}

/// Read and write access to the ledger with ranking and validation on top.
pub struct Scoreboard<S> {
    store: Arc<S>,
    limits: LedgerLimits,
}

impl<S> Clone for Scoreboard<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            limits: self.limits,
        }
    }
}

impl<S: LedgerStore> Scoreboard<S> {
    /// Create a scoreboard over a shared store.
    pub const fn new(store: Arc<S>, limits: LedgerLimits) -> Self {
        Self { store, limits }
    }

    /// The underlying store.
    pub const fn store(&self) -> &Arc<S> {
        &self.store
    }

    /// The configured bounds.
    pub const fn limits(&self) -> LedgerLimits {
        self.limits
    }

    /// Ranked totals for every house within `window`.
    ///
    /// Always returns exactly one row per house, including houses with no
    /// entries in the window.
    pub async fn leaderboard(&self, window: Window) -> Result<Vec<LeaderboardRow>, LedgerError> {
        let totals = self.store.query_totals(window.minutes()).await?;
        Ok(rank_totals(&totals))
    }

    /// All-time statistics for `house`.
    ///
    /// A house with no entries is [`LedgerError::NotFound`], which is
    /// distinct from a house whose entries sum to zero.
    pub async fn house_stats(&self, house: House) -> Result<HouseStats, LedgerError> {
        let row = self
            .store
            .house_stats(house)
            .await?
            .ok_or_else(|| LedgerError::NotFound(format!("no entries for {house}")))?;

        Ok(HouseStats {
            house,
            entry_count: row.entry_count,
            total_points: row.total_points,
            avg_points: mean_points(row.total_points, row.entry_count),
            max_points: row.max_points,
            min_points: row.min_points,
            positive_points: row.positive_points,
            negative_points: row.negative_points,
        })
    }

    /// The newest entries, newest first.
    ///
    /// `None` uses the configured default; larger values are clamped to the
    /// configured maximum. Zero is rejected.
    pub async fn recent_activity(&self, limit: Option<u32>) -> Result<Vec<Entry>, LedgerError> {
        let limit = self.activity_limit(limit)?;
        Ok(self.store.recent(limit).await?)
    }

    /// Entries from the last `minutes` minutes, newest first.
    pub async fn entries_in_window(&self, minutes: i64) -> Result<Vec<Entry>, LedgerError> {
        if minutes <= 0 {
            return Err(LedgerError::InvalidArgument(format!(
                "minutes must be a positive number, got {minutes}"
            )));
        }
        let minutes = u32::try_from(minutes).unwrap_or(u32::MAX);
        Ok(self.store.query_window(Some(minutes)).await?)
    }

    /// Check an entry against the configured bounds without storing it.
    pub fn validate(&self, entry: &NewEntry) -> Result<(), LedgerError> {
        let bound = self.limits.max_abs_points;
        if entry.points < bound.saturating_neg() || entry.points > bound {
            return Err(LedgerError::InvalidArgument(format!(
                "points must be between -{bound} and {bound}, got {}",
                entry.points
            )));
        }
        if let Some(reason) = &entry.reason {
            let chars = reason.chars().count();
            if chars > MAX_REASON_CHARS {
                return Err(LedgerError::InvalidArgument(format!(
                    "reason must be at most {MAX_REASON_CHARS} characters, got {chars}"
                )));
            }
        }
        Ok(())
    }

    /// Validate and append an entry.
    ///
    /// Notifying observers is left to the caller, which knows where the
    /// entry came from.
    pub async fn record_entry(&self, entry: &NewEntry) -> Result<Entry, LedgerError> {
        self.validate(entry)?;
        let stored = self.store.append(entry).await?;
        debug!(
            id = %stored.id,
            house = %stored.house,
            points = stored.points,
            "Entry recorded"
        );
        Ok(stored)
    }

    /// Delete entries older than `max_age`. Returns the number removed.
    pub async fn purge_expired(&self, max_age: TimeDelta) -> Result<u64, LedgerError> {
        let cutoff = Utc::now()
            .checked_sub_signed(max_age)
            .ok_or_else(|| LedgerError::InvalidArgument(format!("max age {max_age} too large")))?;
        let removed = self.store.purge_before(cutoff).await?;
        if removed > 0 {
            info!(removed, %cutoff, "Purged expired entries");
        }
        Ok(removed)
    }

    /// Check that the store is reachable.
    pub async fn health(&self) -> Result<(), LedgerError> {
        Ok(self.store.ping().await?)
    }

    fn activity_limit(&self, limit: Option<u32>) -> Result<u32, LedgerError> {
        match limit {
            None => Ok(self.limits.default_activity_limit),
            Some(0) => Err(LedgerError::InvalidArgument(String::from(
                "limit must be a positive integer",
            ))),
            Some(n) => Ok(n.min(self.limits.max_activity_limit)),
        }
    }
}

/// Rank per-house totals into a complete leaderboard.
///
/// Houses missing from `totals` get a zero row. Rows are sorted by
/// `total_points` descending, then house name ascending, and ranked
/// densely from 1.
pub fn rank_totals(totals: &[HouseTotals]) -> Vec<LeaderboardRow> {
    let mut rows: Vec<LeaderboardRow> = House::ALL
        .into_iter()
        .map(|house| {
            let found = totals.iter().find(|t| t.house == house);
            LeaderboardRow {
                house,
                color: house.color().to_owned(),
                total_points: found.map_or(0, |t| t.total_points),
                entry_count: found.map_or(0, |t| t.entry_count),
                last_activity: found.and_then(|t| t.last_activity),
                rank: 0,
            }
        })
        .collect();

    rows.sort_by(|a, b| {
        b.total_points
            .cmp(&a.total_points)
            .then_with(|| a.house.name().cmp(b.house.name()))
    });

    for (rank, row) in (1_u32..).zip(rows.iter_mut()) {
        row.rank = rank;
    }
    rows
}

/// Exact mean of `count` deltas summing to `total`, rounded to two places
/// with trailing zeros dropped.
fn mean_points(total: i64, count: u64) -> Decimal {
    Decimal::from(total)
        .checked_div(Decimal::from(count))
        .unwrap_or(Decimal::ZERO)
        .round_dp(2)
        .normalize()
}

#[cfg(test)]
#[allow(
    clippy::unwrap_used,
    clippy::indexing_slicing,
    clippy::arithmetic_side_effects
)]
mod tests {
    use housecup_db::MemoryLedgerStore;

    use super::*;

    fn scoreboard() -> Scoreboard<MemoryLedgerStore> {
        Scoreboard::new(Arc::new(MemoryLedgerStore::new()), LedgerLimits::default())
    }

    async fn record(board: &Scoreboard<MemoryLedgerStore>, house: House, points: i64) -> Entry {
        board
            .record_entry(&NewEntry::new(house, points, "test"))
            .await
            .unwrap()
    }

    fn order(rows: &[LeaderboardRow]) -> Vec<(House, i64, u32)> {
        rows.iter().map(|r| (r.house, r.total_points, r.rank)).collect()
    }

    #[test]
    fn empty_totals_rank_alphabetically() {
        let rows = rank_totals(&[]);
        assert_eq!(
            order(&rows),
            vec![
                (House::Gryffindor, 0, 1),
                (House::Hufflepuff, 0, 2),
                (House::Ravenclaw, 0, 3),
                (House::Slytherin, 0, 4),
            ]
        );
        assert!(rows.iter().all(|r| r.entry_count == 0 && r.last_activity.is_none()));
    }

    #[test]
    fn ties_break_by_name_with_dense_ranks() {
        let totals = [
            HouseTotals {
                house: House::Slytherin,
                total_points: 20,
                entry_count: 1,
                last_activity: None,
            },
            HouseTotals {
                house: House::Ravenclaw,
                total_points: 20,
                entry_count: 2,
                last_activity: None,
            },
        ];
        let rows = rank_totals(&totals);
        assert_eq!(
            order(&rows),
            vec![
                (House::Ravenclaw, 20, 1),
                (House::Slytherin, 20, 2),
                (House::Gryffindor, 0, 3),
                (House::Hufflepuff, 0, 4),
            ]
        );
    }

    #[test]
    fn rows_carry_house_colors() {
        for row in rank_totals(&[]) {
            assert_eq!(row.color, row.house.color());
        }
    }

    #[test]
    fn mean_is_exact() {
        assert_eq!(mean_points(40, 3), Decimal::new(1333, 2));
        assert_eq!(mean_points(-10, 4), Decimal::new(-250, 2));
        assert_eq!(mean_points(0, 0), Decimal::ZERO);
        assert_eq!(mean_points(20, 2).to_string(), "10");
    }

    #[tokio::test]
    async fn seeded_ledger_ranks_by_total() {
        let board = scoreboard();
        record(&board, House::Gryffindor, 50).await;
        record(&board, House::Slytherin, 30).await;
        record(&board, House::Ravenclaw, 40).await;
        record(&board, House::Hufflepuff, 35).await;
        record(&board, House::Gryffindor, -20).await;
        record(&board, House::Slytherin, 25).await;

        let rows = board.leaderboard(Window::AllTime).await.unwrap();
        assert_eq!(
            order(&rows),
            vec![
                (House::Slytherin, 55, 1),
                (House::Ravenclaw, 40, 2),
                (House::Hufflepuff, 35, 3),
                (House::Gryffindor, 30, 4),
            ]
        );
        assert_eq!(rows[0].entry_count, 2);
        assert!(rows[0].last_activity.is_some());
    }

    #[tokio::test]
    async fn appended_entry_is_visible_everywhere() {
        let board = scoreboard();
        let entry = record(&board, House::Hufflepuff, 17).await;

        let window = board.entries_in_window(5).await.unwrap();
        assert_eq!(window, vec![entry.clone()]);

        let rows = board.leaderboard(Window::AllTime).await.unwrap();
        let row = rows.iter().find(|r| r.house == House::Hufflepuff).unwrap();
        assert_eq!(row.total_points, 17);
        assert_eq!(row.last_activity, Some(entry.occurred_at));
    }

    #[tokio::test]
    async fn stats_not_found_for_idle_house() {
        let board = scoreboard();
        record(&board, House::Gryffindor, 10).await;
        let result = board.house_stats(House::Ravenclaw).await;
        assert!(matches!(result, Err(LedgerError::NotFound(_))));
    }

    #[tokio::test]
    async fn stats_found_for_zero_sum_house() {
        let board = scoreboard();
        record(&board, House::Ravenclaw, 10).await;
        record(&board, House::Ravenclaw, -10).await;

        let stats = board.house_stats(House::Ravenclaw).await.unwrap();
        assert_eq!(stats.entry_count, 2);
        assert_eq!(stats.total_points, 0);
        assert_eq!(stats.avg_points, Decimal::ZERO);
        assert_eq!(stats.positive_points, 10);
        assert_eq!(stats.negative_points, -10);
    }

    #[tokio::test]
    async fn out_of_range_points_have_no_side_effects() {
        let board = scoreboard();
        let result = board
            .record_entry(&NewEntry::new(House::Slytherin, 101, "too generous"))
            .await;
        assert!(matches!(result, Err(LedgerError::InvalidArgument(_))));
        let result = board
            .record_entry(&NewEntry::new(House::Slytherin, -101, "too harsh"))
            .await;
        assert!(matches!(result, Err(LedgerError::InvalidArgument(_))));
        assert!(board.store().is_empty().await);

        record(&board, House::Slytherin, 100).await;
        record(&board, House::Slytherin, -100).await;
    }

    #[tokio::test]
    async fn overlong_reason_rejected_before_store() {
        let board = scoreboard();
        let reason = "x".repeat(MAX_REASON_CHARS + 1);
        let result = board
            .record_entry(&NewEntry::new(House::Hufflepuff, 5, reason))
            .await;
        assert!(matches!(result, Err(LedgerError::InvalidArgument(_))));
        assert!(board.store().is_empty().await);

        let longest = "é".repeat(MAX_REASON_CHARS);
        let stored = board
            .record_entry(&NewEntry::new(House::Hufflepuff, 5, longest.clone()))
            .await
            .unwrap();
        assert_eq!(stored.reason, Some(longest));
    }

    #[tokio::test]
    async fn non_positive_minutes_rejected() {
        let board = scoreboard();
        assert!(matches!(
            board.entries_in_window(0).await,
            Err(LedgerError::InvalidArgument(_))
        ));
        assert!(matches!(
            board.entries_in_window(-5).await,
            Err(LedgerError::InvalidArgument(_))
        ));
    }

    #[tokio::test]
    async fn activity_limit_defaults_and_clamps() {
        let limits = LedgerLimits {
            max_abs_points: 100,
            default_activity_limit: 2,
            max_activity_limit: 3,
        };
        let board = Scoreboard::new(Arc::new(MemoryLedgerStore::new()), limits);
        for points in 1..=5 {
            record(&board, House::Gryffindor, points).await;
        }

        assert_eq!(board.recent_activity(None).await.unwrap().len(), 2);
        assert_eq!(board.recent_activity(Some(50)).await.unwrap().len(), 3);
        assert!(matches!(
            board.recent_activity(Some(0)).await,
            Err(LedgerError::InvalidArgument(_))
        ));

        let newest = board.recent_activity(Some(1)).await.unwrap();
        assert_eq!(newest[0].points, 5);
    }

    #[tokio::test]
    async fn purge_expired_keeps_fresh_entries() {
        let board = scoreboard();
        record(&board, House::Gryffindor, 5).await;
        assert_eq!(board.purge_expired(TimeDelta::days(30)).await.unwrap(), 0);
        assert_eq!(board.leaderboard(Window::AllTime).await.unwrap()[0].total_points, 5);
    }
}
