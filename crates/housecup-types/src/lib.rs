//! Shared type definitions for the House Cup ledger.
//!
//! Every crate in the workspace speaks in these types. Types that cross the
//! API boundary derive `ts-rs` so the dashboard can import generated
//! `TypeScript` bindings.
//!
//! # Modules
//!
//! - [`ids`] -- Store-assigned entry identifiers
//! - [`enums`] -- Houses and time windows
//! - [`structs`] -- Entries, leaderboard rows, house statistics, generator status

pub mod enums;
pub mod ids;
pub mod structs;

// Re-export all public types at crate root for convenience.
pub use enums::{House, UnknownHouse, Window};
pub use ids::EntryId;
pub use structs::{
    Entry, GeneratorStatus, HouseStats, HouseTotals, LeaderboardRow, MAX_REASON_CHARS, NewEntry,
};
