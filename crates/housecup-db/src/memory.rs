//! Process-local ledger store.
//!
//! Holds entries in a `Vec` behind a [`tokio::sync::RwLock`]. Semantics
//! match the `PostgreSQL` store exactly: monotonically increasing ids,
//! `occurred_at` stamped on append, newest-first ordering with id as the
//! tiebreak. Used when no database is configured and throughout the test
//! suites.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use housecup_types::{Entry, EntryId, House, HouseTotals, NewEntry};
use tokio::sync::RwLock;

use crate::error::DbError;
use crate::store::{HouseStatsRow, LedgerStore, window_cutoff};

#[derive(Debug)]
struct MemoryLedger {
    entries: Vec<Entry>,
    next_id: i64,
}

/// In-memory implementation of [`LedgerStore`].
#[derive(Debug)]
pub struct MemoryLedgerStore {
    inner: RwLock<MemoryLedger>,
}

impl MemoryLedgerStore {
    /// Create an empty store. The first appended entry receives id 1.
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(MemoryLedger {
                entries: Vec::new(),
                next_id: 1,
            }),
        }
    }

    /// Number of entries currently held.
    pub async fn len(&self) -> usize {
        self.inner.read().await.entries.len()
    }

    /// Whether the store holds no entries.
    pub async fn is_empty(&self) -> bool {
        self.inner.read().await.entries.is_empty()
    }
}

impl Default for MemoryLedgerStore {
    fn default() -> Self {
        Self::new()
    }
}

/// Newest first; equal timestamps fall back to the higher id.
fn newest_first(a: &Entry, b: &Entry) -> std::cmp::Ordering {
    b.occurred_at.cmp(&a.occurred_at).then(b.id.cmp(&a.id))
}

fn in_window(entry: &Entry, cutoff: Option<DateTime<Utc>>) -> bool {
    cutoff.is_none_or(|cutoff| entry.occurred_at >= cutoff)
}

impl LedgerStore for MemoryLedgerStore {
    async fn append(&self, entry: &NewEntry) -> Result<Entry, DbError> {
        let mut ledger = self.inner.write().await;
        let id = ledger.next_id;
        ledger.next_id = id
            .checked_add(1)
            .ok_or_else(|| DbError::Unavailable(String::from("entry id space exhausted")))?;

        let stored = Entry {
            id: EntryId(id),
            house: entry.house,
            points: entry.points,
            reason: entry.reason.clone(),
            occurred_at: Utc::now(),
        };
        ledger.entries.push(stored.clone());
        Ok(stored)
    }

    async fn query_window(&self, minutes: Option<u32>) -> Result<Vec<Entry>, DbError> {
        let cutoff = window_cutoff(Utc::now(), minutes);
        let ledger = self.inner.read().await;
        let mut rows: Vec<Entry> = ledger
            .entries
            .iter()
            .filter(|e| in_window(e, cutoff))
            .cloned()
            .collect();
        rows.sort_by(newest_first);
        Ok(rows)
    }

    async fn query_totals(&self, minutes: Option<u32>) -> Result<Vec<HouseTotals>, DbError> {
        let cutoff = window_cutoff(Utc::now(), minutes);
        let ledger = self.inner.read().await;

        let mut totals: BTreeMap<House, HouseTotals> = BTreeMap::new();
        for entry in ledger.entries.iter().filter(|e| in_window(e, cutoff)) {
            let row = totals.entry(entry.house).or_insert(HouseTotals {
                house: entry.house,
                total_points: 0,
                entry_count: 0,
                last_activity: None,
            });
            row.total_points = row.total_points.saturating_add(entry.points);
            row.entry_count = row.entry_count.saturating_add(1);
            row.last_activity = row.last_activity.max(Some(entry.occurred_at));
        }
        Ok(totals.into_values().collect())
    }

    async fn recent(&self, limit: u32) -> Result<Vec<Entry>, DbError> {
        let ledger = self.inner.read().await;
        let mut rows = ledger.entries.clone();
        rows.sort_by(newest_first);
        rows.truncate(usize::try_from(limit).unwrap_or(usize::MAX));
        Ok(rows)
    }

    async fn house_stats(&self, house: House) -> Result<Option<HouseStatsRow>, DbError> {
        let ledger = self.inner.read().await;
        let mut stats: Option<HouseStatsRow> = None;
        for points in ledger
            .entries
            .iter()
            .filter(|e| e.house == house)
            .map(|e| e.points)
        {
            let row = stats.get_or_insert(HouseStatsRow {
                entry_count: 0,
                total_points: 0,
                max_points: points,
                min_points: points,
                positive_points: 0,
                negative_points: 0,
            });
            row.entry_count = row.entry_count.saturating_add(1);
            row.total_points = row.total_points.saturating_add(points);
            row.max_points = row.max_points.max(points);
            row.min_points = row.min_points.min(points);
            if points > 0 {
                row.positive_points = row.positive_points.saturating_add(points);
            } else {
                row.negative_points = row.negative_points.saturating_add(points);
            }
        }
        Ok(stats)
    }

    async fn backdate(&self, id: EntryId, occurred_at: DateTime<Utc>) -> Result<Entry, DbError> {
        let mut ledger = self.inner.write().await;
        let entry = ledger
            .entries
            .iter_mut()
            .find(|e| e.id == id)
            .ok_or_else(|| DbError::NotFound(format!("entry {id}")))?;
        entry.occurred_at = occurred_at;
        Ok(entry.clone())
    }

    async fn purge_before(&self, cutoff: DateTime<Utc>) -> Result<u64, DbError> {
        let mut ledger = self.inner.write().await;
        let before = ledger.entries.len();
        ledger.entries.retain(|e| e.occurred_at >= cutoff);
        let removed = before.saturating_sub(ledger.entries.len());
        Ok(u64::try_from(removed).unwrap_or(u64::MAX))
    }

    async fn ping(&self) -> Result<(), DbError> {
        Ok(())
    }
}

#[cfg(test)]
#[allow(
    clippy::unwrap_used,
    clippy::indexing_slicing,
    clippy::arithmetic_side_effects
)]
mod tests {
    use chrono::TimeDelta;

    use super::*;

    async fn append(store: &MemoryLedgerStore, house: House, points: i64) -> Entry {
        store
            .append(&NewEntry::new(house, points, "test"))
            .await
            .unwrap()
    }

    async fn backdated(store: &MemoryLedgerStore, house: House, points: i64, minutes_ago: i64) -> Entry {
        let entry = append(store, house, points).await;
        let at = Utc::now() - TimeDelta::minutes(minutes_ago);
        store.backdate(entry.id, at).await.unwrap()
    }

    #[tokio::test]
    async fn ids_increase_monotonically() {
        let store = MemoryLedgerStore::new();
        let a = append(&store, House::Gryffindor, 5).await;
        let b = append(&store, House::Slytherin, 5).await;
        assert_eq!(a.id, EntryId(1));
        assert_eq!(b.id, EntryId(2));
    }

    #[tokio::test]
    async fn window_filters_and_orders_newest_first() {
        let store = MemoryLedgerStore::new();
        let old = backdated(&store, House::Ravenclaw, 40, 30).await;
        let recent = backdated(&store, House::Slytherin, -15, 1).await;
        let ancient = backdated(&store, House::Gryffindor, 35, 180).await;

        let five = store.query_window(Some(5)).await.unwrap();
        assert_eq!(five, vec![recent.clone()]);

        let hour = store.query_window(Some(60)).await.unwrap();
        assert_eq!(hour, vec![recent.clone(), old.clone()]);

        let all = store.query_window(None).await.unwrap();
        assert_eq!(all, vec![recent, old, ancient]);
    }

    #[tokio::test]
    async fn equal_timestamps_order_by_id() {
        let store = MemoryLedgerStore::new();
        let at = Utc::now();
        let a = append(&store, House::Gryffindor, 1).await;
        let b = append(&store, House::Gryffindor, 2).await;
        store.backdate(a.id, at).await.unwrap();
        store.backdate(b.id, at).await.unwrap();

        let rows = store.recent(10).await.unwrap();
        assert_eq!(rows[0].id, b.id);
        assert_eq!(rows[1].id, a.id);
    }

    #[tokio::test]
    async fn totals_group_by_house() {
        let store = MemoryLedgerStore::new();
        append(&store, House::Gryffindor, 50).await;
        append(&store, House::Gryffindor, -20).await;
        append(&store, House::Hufflepuff, 35).await;

        let totals = store.query_totals(None).await.unwrap();
        assert_eq!(totals.len(), 2);
        let gryffindor = totals.iter().find(|t| t.house == House::Gryffindor).unwrap();
        assert_eq!(gryffindor.total_points, 30);
        assert_eq!(gryffindor.entry_count, 2);
        assert!(gryffindor.last_activity.is_some());
    }

    #[tokio::test]
    async fn house_stats_none_without_entries() {
        let store = MemoryLedgerStore::new();
        append(&store, House::Gryffindor, 10).await;
        assert!(store.house_stats(House::Slytherin).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn house_stats_splits_positive_and_negative() {
        let store = MemoryLedgerStore::new();
        append(&store, House::Slytherin, 30).await;
        append(&store, House::Slytherin, -15).await;
        append(&store, House::Slytherin, 25).await;

        let stats = store.house_stats(House::Slytherin).await.unwrap().unwrap();
        assert_eq!(stats.entry_count, 3);
        assert_eq!(stats.total_points, 40);
        assert_eq!(stats.max_points, 30);
        assert_eq!(stats.min_points, -15);
        assert_eq!(stats.positive_points, 55);
        assert_eq!(stats.negative_points, -15);
    }

    #[tokio::test]
    async fn recent_respects_limit() {
        let store = MemoryLedgerStore::new();
        for i in 0..5 {
            append(&store, House::Ravenclaw, i).await;
        }
        assert_eq!(store.recent(3).await.unwrap().len(), 3);
    }

    #[tokio::test]
    async fn purge_removes_only_older_entries() {
        let store = MemoryLedgerStore::new();
        backdated(&store, House::Gryffindor, 10, 60 * 24 * 40).await;
        let kept = append(&store, House::Gryffindor, 20).await;

        let cutoff = Utc::now() - TimeDelta::days(30);
        assert_eq!(store.purge_before(cutoff).await.unwrap(), 1);
        assert_eq!(store.query_window(None).await.unwrap(), vec![kept]);
    }

    #[tokio::test]
    async fn backdate_unknown_entry_fails() {
        let store = MemoryLedgerStore::new();
        let result = store.backdate(EntryId(99), Utc::now()).await;
        assert!(matches!(result, Err(DbError::NotFound(_))));
    }
}
