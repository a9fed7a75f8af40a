//! Shared application state for the command surface.
//!
//! [`AppState`] owns one instance of each core component, all bound to
//! the same [`LedgerBackend`]. Handlers reach the ledger only through it.

use std::sync::Arc;

use housecup_core::config::{GeneratorConfig, HouseCupConfig};
use housecup_core::{ChangeFeed, ChangeSource, Generator, Hub, LedgerError, Scoreboard};
use housecup_db::LedgerBackend;
use housecup_types::{Entry, NewEntry};
use tokio::task::JoinHandle;

use crate::rate_limit::RateLimiter;

/// State shared by every HTTP and `WebSocket` handler.
pub struct AppState {
    /// Read and validated-write access to the ledger.
    pub scoreboard: Scoreboard<LedgerBackend>,
    /// Feed of ledger appends.
    pub feed: ChangeFeed,
    /// Live subscriber fan-out.
    pub hub: Arc<Hub<LedgerBackend>>,
    /// Synthetic entry generator.
    pub generator: Generator<LedgerBackend>,
    /// Generator defaults and bounds for control requests.
    pub generator_config: GeneratorConfig,
    /// Per-client limit on `/api` requests, when enabled.
    pub rate_limiter: Option<Arc<RateLimiter>>,
}

impl AppState {
    /// Wire the core components over `store`.
    pub fn new(store: LedgerBackend, config: &HouseCupConfig) -> Self {
        let scoreboard = Scoreboard::new(Arc::new(store), config.ledger.limits());
        let feed = ChangeFeed::new(config.hub.feed_capacity);
        let hub = Arc::new(Hub::new(scoreboard.clone(), config.hub.subscriber_buffer));
        let generator = Generator::new(
            scoreboard.clone(),
            feed.clone(),
            config.generator.bulk_pacing(),
        );

        Self {
            scoreboard,
            feed,
            hub,
            generator,
            generator_config: config.generator,
            rate_limiter: RateLimiter::from_config(&config.http.rate_limit).map(Arc::new),
        }
    }

    /// Start forwarding ledger changes to hub subscribers.
    pub fn start_fanout(&self) -> JoinHandle<()> {
        Arc::clone(&self.hub).listen(self.feed.subscribe())
    }

    /// Validate, append, and publish a client-submitted entry.
    pub async fn record_entry(&self, entry: &NewEntry) -> Result<Entry, LedgerError> {
        let stored = self.scoreboard.record_entry(entry).await?;
        self.feed.publish(stored.clone(), ChangeSource::Manual);
        Ok(stored)
    }

    /// Name of the active store backend.
    pub fn store_kind(&self) -> &'static str {
        self.scoreboard.store().kind()
    }
}
