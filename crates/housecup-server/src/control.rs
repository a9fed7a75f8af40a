//! Generator control requests, shared by the REST endpoint and the
//! `control-generator` socket message.

use std::time::Duration;

use housecup_types::{Entry, GeneratorStatus};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::ApiError;
use crate::state::AppState;

/// What to do with the generator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GeneratorAction {
    /// Start the recurring timer.
    Start,
    /// Stop the recurring timer.
    Stop,
    /// Generate one entry now.
    Generate,
    /// Generate a paced batch.
    Bulk,
    /// Seed the backdated test scenario.
    Test,
}

/// Body of `POST /api/generator/control`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ControlRequest {
    /// The action.
    pub action: GeneratorAction,
    /// Timer period for `start`. Defaults to the configured interval.
    #[serde(default)]
    pub interval_minutes: Option<u32>,
    /// Batch size for `bulk`. Defaults to the configured bulk count.
    #[serde(default)]
    pub count: Option<u32>,
}

/// Result of a control request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ControlOutcome {
    /// The action that was applied.
    pub action: GeneratorAction,
    /// Whether the generator state or the ledger changed.
    pub changed: bool,
    /// Human-readable summary.
    pub message: String,
    /// Entries created by the action, if any.
    pub entries: Vec<Entry>,
    /// Generator state after the action.
    pub status: GeneratorStatus,
}

/// Apply a control request to the generator.
pub async fn apply(state: &AppState, request: &ControlRequest) -> Result<ControlOutcome, ApiError> {
    let config = &state.generator_config;
    let generator = &state.generator;

    let (changed, message, entries) = match request.action {
        GeneratorAction::Start => {
            let minutes = request.interval_minutes.unwrap_or(config.interval_minutes);
            if minutes == 0 {
                return Err(ApiError::InvalidArgument(String::from(
                    "intervalMinutes must be a positive integer",
                )));
            }
            let period = Duration::from_secs(u64::from(minutes).saturating_mul(60));
            let started = generator.start(period).await;
            let message = if started {
                format!("Generator started with a {minutes} minute interval")
            } else {
                String::from("Generator already running")
            };
            (started, message, Vec::new())
        }
        GeneratorAction::Stop => {
            let stopped = generator.stop().await;
            let message = if stopped {
                "Generator stopped"
            } else {
                "Generator was not running"
            };
            (stopped, message.to_owned(), Vec::new())
        }
        GeneratorAction::Generate => {
            let entry = generator.generate_one().await?;
            (true, String::from("Generated 1 entry"), vec![entry])
        }
        GeneratorAction::Bulk => {
            let count = request.count.unwrap_or(config.default_bulk_count);
            if count == 0 || count > config.max_bulk_count {
                return Err(ApiError::InvalidArgument(format!(
                    "count must be between 1 and {}",
                    config.max_bulk_count
                )));
            }
            let entries = generator.generate_bulk(count).await;
            let message = format!("Generated {} of {count} entries", entries.len());
            (!entries.is_empty(), message, entries)
        }
        GeneratorAction::Test => {
            let entries = generator.generate_scenario().await?;
            let message = format!("Seeded {} test entries", entries.len());
            (true, message, entries)
        }
    };

    info!(action = ?request.action, changed, "Generator control applied");

    Ok(ControlOutcome {
        action: request.action,
        changed,
        message,
        entries,
        status: generator.status().await,
    })
}
