//! Ledger store for the House Cup ledger (`PostgreSQL` + in-memory).
//!
//! The store is the leaf of the system: it owns entry identity and
//! timestamps and answers window-filtered reads, but implements no ranking,
//! validation, or retry logic.
//!
//! # Architecture
//!
//! ```text
//! Scoreboard / Generator
//!     |
//!     +-- LedgerStore (trait)
//!         |-- PgLedgerStore      (entries table, PostgreSQL)
//!         +-- MemoryLedgerStore  (process-local, tests and dev)
//! ```
//!
//! # Modules
//!
//! - [`store`] -- The [`LedgerStore`] contract and the [`LedgerBackend`] dispatcher
//! - [`entry_store`] -- `PostgreSQL` implementation
//! - [`memory`] -- In-memory implementation
//! - [`postgres`] -- Connection pool and migrations
//! - [`error`] -- Shared error types

pub mod entry_store;
pub mod error;
pub mod memory;
pub mod postgres;
pub mod store;

// Re-export primary types for convenience.
pub use entry_store::{EntryRow, PgLedgerStore};
pub use error::DbError;
pub use memory::MemoryLedgerStore;
pub use postgres::{PostgresConfig, PostgresPool};
pub use store::{HouseStatsRow, LedgerBackend, LedgerStore, window_cutoff};
