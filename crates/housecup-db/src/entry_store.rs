//! `PostgreSQL` implementation of the ledger store.
//!
//! Entries live in the `entries` table, keyed by a `BIGSERIAL` id and
//! referencing the seeded `houses` table by name. Window filters are
//! evaluated against the database clock (`NOW()`), so every node agrees on
//! what "the last five minutes" means.

use chrono::{DateTime, Utc};
use housecup_types::{Entry, EntryId, House, HouseTotals, NewEntry};
use sqlx::PgPool;

use crate::error::DbError;
use crate::store::{HouseStatsRow, LedgerStore};

/// Columns selected for every entry query, in [`EntryRow`] order.
const ENTRY_COLUMNS: &str = "id, house, points, reason, occurred_at";

/// Operations on the `entries` table.
#[derive(Clone)]
pub struct PgLedgerStore {
    pool: PgPool,
}

impl PgLedgerStore {
    /// Create a new ledger store bound to a connection pool.
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

/// Bind value for an optional trailing window.
fn window_param(minutes: Option<u32>) -> Option<i32> {
    minutes.map(|m| i32::try_from(m).unwrap_or(i32::MAX))
}

impl LedgerStore for PgLedgerStore {
    async fn append(&self, entry: &NewEntry) -> Result<Entry, DbError> {
        let points = i32::try_from(entry.points)
            .map_err(|e| DbError::Decode(format!("points {} out of range: {e}", entry.points)))?;

        let row = sqlx::query_as::<_, EntryRow>(&format!(
            "INSERT INTO entries (house, points, reason) VALUES ($1, $2, $3) RETURNING {ENTRY_COLUMNS}"
        ))
        .bind(entry.house.name())
        .bind(points)
        .bind(entry.reason.as_deref())
        .fetch_one(&self.pool)
        .await?;

        tracing::debug!(id = row.id, house = %entry.house, points, "Inserted entry");
        Entry::try_from(row)
    }

    async fn query_window(&self, minutes: Option<u32>) -> Result<Vec<Entry>, DbError> {
        let rows = sqlx::query_as::<_, EntryRow>(&format!(
            "SELECT {ENTRY_COLUMNS}
               FROM entries
              WHERE ($1::INTEGER IS NULL OR occurred_at >= NOW() - make_interval(mins => $1::INTEGER))
              ORDER BY occurred_at DESC, id DESC"
        ))
        .bind(window_param(minutes))
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(Entry::try_from).collect()
    }

    async fn query_totals(&self, minutes: Option<u32>) -> Result<Vec<HouseTotals>, DbError> {
        let rows = sqlx::query_as::<_, TotalsRow>(
            r"SELECT house,
                     SUM(points)::BIGINT AS total_points,
                     COUNT(*) AS entry_count,
                     MAX(occurred_at) AS last_activity
                FROM entries
               WHERE ($1::INTEGER IS NULL OR occurred_at >= NOW() - make_interval(mins => $1::INTEGER))
               GROUP BY house",
        )
        .bind(window_param(minutes))
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(HouseTotals::try_from).collect()
    }

    async fn recent(&self, limit: u32) -> Result<Vec<Entry>, DbError> {
        let rows = sqlx::query_as::<_, EntryRow>(&format!(
            "SELECT {ENTRY_COLUMNS} FROM entries ORDER BY occurred_at DESC, id DESC LIMIT $1"
        ))
        .bind(i64::from(limit))
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(Entry::try_from).collect()
    }

    async fn house_stats(&self, house: House) -> Result<Option<HouseStatsRow>, DbError> {
        let row = sqlx::query_as::<_, StatsRow>(
            r"SELECT COUNT(*) AS entry_count,
                     COALESCE(SUM(points), 0)::BIGINT AS total_points,
                     COALESCE(MAX(points), 0)::BIGINT AS max_points,
                     COALESCE(MIN(points), 0)::BIGINT AS min_points,
                     COALESCE(SUM(CASE WHEN points > 0 THEN points ELSE 0 END), 0)::BIGINT AS positive_points,
                     COALESCE(SUM(CASE WHEN points < 0 THEN points ELSE 0 END), 0)::BIGINT AS negative_points
                FROM entries
               WHERE house = $1",
        )
        .bind(house.name())
        .fetch_one(&self.pool)
        .await?;

        if row.entry_count <= 0 {
            return Ok(None);
        }

        Ok(Some(HouseStatsRow {
            entry_count: u64::try_from(row.entry_count).unwrap_or(0),
            total_points: row.total_points,
            max_points: row.max_points,
            min_points: row.min_points,
            positive_points: row.positive_points,
            negative_points: row.negative_points,
        }))
    }

    async fn backdate(&self, id: EntryId, occurred_at: DateTime<Utc>) -> Result<Entry, DbError> {
        let row = sqlx::query_as::<_, EntryRow>(&format!(
            "UPDATE entries SET occurred_at = $2 WHERE id = $1 RETURNING {ENTRY_COLUMNS}"
        ))
        .bind(id.into_inner())
        .bind(occurred_at)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| DbError::NotFound(format!("entry {id}")))?;

        Entry::try_from(row)
    }

    async fn purge_before(&self, cutoff: DateTime<Utc>) -> Result<u64, DbError> {
        let result = sqlx::query("DELETE FROM entries WHERE occurred_at < $1")
            .bind(cutoff)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected())
    }

    async fn ping(&self) -> Result<(), DbError> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}

/// A row from the `entries` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct EntryRow {
    /// Auto-incremented entry id.
    pub id: i64,
    /// House name (foreign key into `houses`).
    pub house: String,
    /// Signed point delta.
    pub points: i32,
    /// Optional reason.
    pub reason: Option<String>,
    /// When the entry took effect.
    pub occurred_at: DateTime<Utc>,
}

impl TryFrom<EntryRow> for Entry {
    type Error = DbError;

    fn try_from(row: EntryRow) -> Result<Self, Self::Error> {
        let house = row
            .house
            .parse::<House>()
            .map_err(|e| DbError::Decode(format!("entry {}: {e}", row.id)))?;

        Ok(Self {
            id: EntryId(row.id),
            house,
            points: i64::from(row.points),
            reason: row.reason,
            occurred_at: row.occurred_at,
        })
    }
}

/// One grouped row of the totals query.
#[derive(Debug, Clone, sqlx::FromRow)]
struct TotalsRow {
    house: String,
    total_points: i64,
    entry_count: i64,
    last_activity: Option<DateTime<Utc>>,
}

impl TryFrom<TotalsRow> for HouseTotals {
    type Error = DbError;

    fn try_from(row: TotalsRow) -> Result<Self, Self::Error> {
        let house = row
            .house
            .parse::<House>()
            .map_err(|e| DbError::Decode(format!("totals row: {e}")))?;

        Ok(Self {
            house,
            total_points: row.total_points,
            entry_count: u64::try_from(row.entry_count).unwrap_or(0),
            last_activity: row.last_activity,
        })
    }
}

/// The single row of the per-house statistics query.
#[derive(Debug, Clone, sqlx::FromRow)]
struct StatsRow {
    entry_count: i64,
    total_points: i64,
    max_points: i64,
    min_points: i64,
    positive_points: i64,
    negative_points: i64,
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn row_maps_to_entry() {
        let now = Utc::now();
        let entry = Entry::try_from(EntryRow {
            id: 7,
            house: String::from("Hufflepuff"),
            points: -12,
            reason: Some(String::from("Minor mischief")),
            occurred_at: now,
        })
        .unwrap();
        assert_eq!(entry.id, EntryId(7));
        assert_eq!(entry.house, House::Hufflepuff);
        assert_eq!(entry.points, -12);
        assert_eq!(entry.occurred_at, now);
    }

    #[test]
    fn unknown_house_is_decode_error() {
        let result = Entry::try_from(EntryRow {
            id: 1,
            house: String::from("Durmstrang"),
            points: 1,
            reason: None,
            occurred_at: Utc::now(),
        });
        assert!(matches!(result, Err(DbError::Decode(_))));
    }

    #[test]
    fn window_param_saturates() {
        assert_eq!(window_param(None), None);
        assert_eq!(window_param(Some(60)), Some(60));
        assert_eq!(window_param(Some(u32::MAX)), Some(i32::MAX));
    }
}
