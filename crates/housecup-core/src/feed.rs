//! In-process change feed.
//!
//! Every producer that appends to the ledger publishes the stored entry
//! here. The broadcast hub is the usual listener; any number of others
//! may attach.

use std::sync::Arc;

use housecup_types::Entry;
use serde::Serialize;
use tokio::sync::broadcast;

/// Where an entry came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum ChangeSource {
    /// Submitted by a client through the API or a live connection.
    Manual,
    /// Produced by the synthetic generator.
    Generated,
    /// Seeded by the fixed test scenario.
    Scenario,
}

/// A single ledger append as seen by listeners.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LedgerChange {
    /// The stored entry.
    pub entry: Entry,
    /// Its origin.
    pub source: ChangeSource,
}

/// Broadcast channel of [`LedgerChange`] notifications.
///
/// Publishing never blocks. A listener that falls behind by more than the
/// channel capacity observes a lag and skips the oldest notifications.
#[derive(Debug, Clone)]
pub struct ChangeFeed {
    tx: broadcast::Sender<Arc<LedgerChange>>,
}

impl ChangeFeed {
    /// Create a feed holding up to `capacity` undelivered changes per listener.
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    /// Publish a stored entry. Returns the number of listeners reached.
    pub fn publish(&self, entry: Entry, source: ChangeSource) -> usize {
        let change = Arc::new(LedgerChange { entry, source });
        // No listeners is not an error.
        self.tx.send(change).unwrap_or(0)
    }

    /// Attach a new listener.
    pub fn subscribe(&self) -> broadcast::Receiver<Arc<LedgerChange>> {
        self.tx.subscribe()
    }

    /// Number of attached listeners.
    pub fn listener_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use chrono::Utc;
    use housecup_types::{EntryId, House};

    use super::*;

    fn entry() -> Entry {
        Entry {
            id: EntryId(1),
            house: House::Ravenclaw,
            points: 12,
            reason: None,
            occurred_at: Utc::now(),
        }
    }

    #[test]
    fn publish_without_listeners_is_silent() {
        let feed = ChangeFeed::new(4);
        assert_eq!(feed.publish(entry(), ChangeSource::Manual), 0);
    }

    #[tokio::test]
    async fn listeners_receive_the_same_change() {
        let feed = ChangeFeed::new(4);
        let mut a = feed.subscribe();
        let mut b = feed.subscribe();
        assert_eq!(feed.listener_count(), 2);

        assert_eq!(feed.publish(entry(), ChangeSource::Generated), 2);
        let got_a = a.recv().await.unwrap();
        let got_b = b.recv().await.unwrap();
        assert!(Arc::ptr_eq(&got_a, &got_b));
        assert_eq!(got_a.source, ChangeSource::Generated);
    }

    #[test]
    fn source_serializes_kebab_case() {
        let json = serde_json::to_string(&ChangeSource::Generated).unwrap();
        assert_eq!(json, "\"generated\"");
    }
}
