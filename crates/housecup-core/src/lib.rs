//! Core logic for the House Cup ledger.
//!
//! - [`scoreboard`]: ranked leaderboards, house statistics, and the
//!   validated write path over any [`housecup_db::LedgerStore`].
//! - [`generator`]: timer-driven, bulk, and scenario synthetic load.
//! - [`feed`]: the in-process broadcast of ledger appends.
//! - [`hub`]: per-subscriber fan-out of leaderboard updates.
//! - [`retention`]: periodic purge of old entries.
//! - [`config`]: YAML configuration with environment overrides.

pub mod config;
pub mod error;
pub mod feed;
pub mod generator;
pub mod hub;
pub mod retention;
pub mod scoreboard;

pub use config::{ConfigError, HouseCupConfig};
pub use error::LedgerError;
pub use feed::{ChangeFeed, ChangeSource, LedgerChange};
pub use generator::Generator;
pub use hub::{Hub, HubMessage, SubscriberId, Subscription};
pub use scoreboard::{LedgerLimits, Scoreboard};
