//! Broadcast hub: pushes leaderboard state to live subscribers.
//!
//! Each subscriber owns a bounded [`mpsc`] queue. On every ledger change
//! the hub recomputes the all-time leaderboard once and pushes the same
//! shared payload to every subscriber. Delivery is best effort: a
//! subscriber whose queue is full misses that message, and a subscriber
//! whose receiver is gone is removed. Neither case reaches the producer
//! of the change.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{DateTime, Utc};
use housecup_db::LedgerStore;
use housecup_types::{Entry, LeaderboardRow, Window};
use serde::Serialize;
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{RwLock, broadcast, mpsc};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::feed::{ChangeSource, LedgerChange};
use crate::scoreboard::Scoreboard;

/// Opaque handle for a registered subscriber.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SubscriberId(u64);

impl fmt::Display for SubscriberId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Why a leaderboard snapshot was pushed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum UpdateKind {
    /// First snapshot after subscribing.
    Initial,
    /// Answer to an explicit window request.
    TimeWindow,
    /// A client-submitted or scenario entry landed.
    NewEntry,
    /// The generator produced an entry.
    AutoGenerated,
}

impl From<ChangeSource> for UpdateKind {
    fn from(source: ChangeSource) -> Self {
        match source {
            ChangeSource::Generated => Self::AutoGenerated,
            ChangeSource::Manual | ChangeSource::Scenario => Self::NewEntry,
        }
    }
}

/// A ranked leaderboard snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LeaderboardUpdate {
    /// Why it was sent.
    #[serde(rename = "type")]
    pub kind: UpdateKind,
    /// Window the rows were computed over.
    pub window: Window,
    /// The ranked rows.
    pub data: Vec<LeaderboardRow>,
    /// When the snapshot was computed.
    pub timestamp: DateTime<Utc>,
}

impl LeaderboardUpdate {
    fn new(kind: UpdateKind, window: Window, data: Vec<LeaderboardRow>) -> Self {
        Self {
            kind,
            window,
            data,
            timestamp: Utc::now(),
        }
    }
}

/// A new entry together with the leaderboard it produced.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LedgerChangeNotice {
    /// The entry that was appended.
    pub entry: Entry,
    /// Its origin.
    pub source: ChangeSource,
    /// The all-time leaderboard after the append.
    pub leaderboard: LeaderboardUpdate,
}

/// A message queued for one subscriber.
///
/// Payloads are reference counted so one notification is shared by every
/// subscriber rather than copied.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "event", content = "data", rename_all = "kebab-case")]
pub enum HubMessage {
    /// A leaderboard snapshot.
    LeaderboardUpdate(Arc<LeaderboardUpdate>),
    /// A ledger change and the resulting leaderboard.
    NewEntry(Arc<LedgerChangeNotice>),
    /// A request from this subscriber could not be served.
    Error {
        /// Human-readable cause.
        message: String,
    },
}

/// A registered subscriber's end of the hub.
#[derive(Debug)]
pub struct Subscription {
    /// Handle to pass back to [`Hub::unsubscribe`] and [`Hub::request_window`].
    pub id: SubscriberId,
    /// Queue of messages for this subscriber.
    pub receiver: mpsc::Receiver<HubMessage>,
}

/// Why a single push did not land.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DeliveryFailure {
    /// The subscriber's queue is full; the message was dropped.
    Full,
    /// The subscriber's receiver is gone.
    Closed,
}

fn try_deliver(tx: &mpsc::Sender<HubMessage>, message: HubMessage) -> Result<(), DeliveryFailure> {
    tx.try_send(message).map_err(|e| match e {
        TrySendError::Full(_) => DeliveryFailure::Full,
        TrySendError::Closed(_) => DeliveryFailure::Closed,
    })
}

/// Registry of live subscribers and the fan-out logic over it.
pub struct Hub<S> {
    scoreboard: Scoreboard<S>,
    subscribers: RwLock<BTreeMap<SubscriberId, mpsc::Sender<HubMessage>>>,
    next_id: AtomicU64,
    buffer: usize,
}

impl<S: LedgerStore + 'static> Hub<S> {
    /// Create an empty hub. `buffer` is the per-subscriber queue depth.
    pub fn new(scoreboard: Scoreboard<S>, buffer: usize) -> Self {
        Self {
            scoreboard,
            subscribers: RwLock::new(BTreeMap::new()),
            next_id: AtomicU64::new(1),
            buffer: buffer.max(1),
        }
    }

    /// Register a subscriber and queue its initial all-time snapshot.
    ///
    /// The snapshot is computed after the registry lock is released.
    pub async fn subscribe(&self) -> Subscription {
        let (tx, receiver) = mpsc::channel(self.buffer);
        let id = SubscriberId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.subscribers.write().await.insert(id, tx.clone());
        debug!(subscriber = %id, "Subscriber registered");

        let message = self.snapshot(UpdateKind::Initial, Window::AllTime).await;
        if let Err(failure) = try_deliver(&tx, message) {
            self.handle_failure(id, failure).await;
        }

        Subscription { id, receiver }
    }

    /// Remove a subscriber. Unknown ids are ignored.
    pub async fn unsubscribe(&self, id: SubscriberId) {
        if self.subscribers.write().await.remove(&id).is_some() {
            debug!(subscriber = %id, "Subscriber removed");
        }
    }

    /// Push the leaderboard for `window` to one subscriber.
    ///
    /// A store failure is reported to that subscriber as
    /// [`HubMessage::Error`]. Returns `false` if the subscriber is unknown
    /// or the message could not be queued.
    pub async fn request_window(&self, id: SubscriberId, window: Window) -> bool {
        let Some(tx) = self.subscribers.read().await.get(&id).cloned() else {
            return false;
        };

        let message = self.snapshot(UpdateKind::TimeWindow, window).await;
        match try_deliver(&tx, message) {
            Ok(()) => true,
            Err(failure) => {
                self.handle_failure(id, failure).await;
                false
            }
        }
    }

    /// Recompute the all-time leaderboard once and push it with the new
    /// entry to every current subscriber.
    ///
    /// Returns the number of subscribers the notice was queued for. If the
    /// leaderboard cannot be computed the notification is skipped.
    pub async fn on_ledger_change(&self, change: &LedgerChange) -> usize {
        let rows = match self.scoreboard.leaderboard(Window::AllTime).await {
            Ok(rows) => rows,
            Err(e) => {
                warn!(entry = %change.entry.id, error = %e, "Skipping notification, leaderboard unavailable");
                return 0;
            }
        };

        let notice = Arc::new(LedgerChangeNotice {
            entry: change.entry.clone(),
            source: change.source,
            leaderboard: LeaderboardUpdate::new(change.source.into(), Window::AllTime, rows),
        });

        let targets: Vec<(SubscriberId, mpsc::Sender<HubMessage>)> = self
            .subscribers
            .read()
            .await
            .iter()
            .map(|(id, tx)| (*id, tx.clone()))
            .collect();

        let mut delivered: usize = 0;
        let mut closed = Vec::new();
        for (id, tx) in &targets {
            match try_deliver(tx, HubMessage::NewEntry(Arc::clone(&notice))) {
                Ok(()) => delivered = delivered.saturating_add(1),
                Err(DeliveryFailure::Full) => {
                    warn!(subscriber = %id, "Subscriber queue full, dropping notice");
                }
                Err(DeliveryFailure::Closed) => closed.push(*id),
            }
        }

        if !closed.is_empty() {
            let mut registry = self.subscribers.write().await;
            for id in &closed {
                registry.remove(id);
            }
            debug!(reaped = closed.len(), "Removed disconnected subscribers");
        }

        delivered
    }

    /// Drain a change feed into [`Self::on_ledger_change`] on a background task.
    ///
    /// The task ends when every feed sender is dropped.
    pub fn listen(
        self: Arc<Self>,
        mut changes: broadcast::Receiver<Arc<LedgerChange>>,
    ) -> JoinHandle<()> {
        tokio::spawn(async move {
            loop {
                match changes.recv().await {
                    Ok(change) => {
                        self.on_ledger_change(&change).await;
                    }
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        warn!(skipped, "Hub lagged behind the change feed");
                    }
                    Err(broadcast::error::RecvError::Closed) => {
                        info!("Change feed closed, hub listener exiting");
                        return;
                    }
                }
            }
        })
    }

    /// Number of registered subscribers.
    pub async fn subscriber_count(&self) -> usize {
        self.subscribers.read().await.len()
    }

    async fn snapshot(&self, kind: UpdateKind, window: Window) -> HubMessage {
        match self.scoreboard.leaderboard(window).await {
            Ok(rows) => HubMessage::LeaderboardUpdate(Arc::new(LeaderboardUpdate::new(
                kind, window, rows,
            ))),
            Err(e) => HubMessage::Error {
                message: e.to_string(),
            },
        }
    }

    async fn handle_failure(&self, id: SubscriberId, failure: DeliveryFailure) {
        match failure {
            DeliveryFailure::Full => warn!(subscriber = %id, "Subscriber queue full, dropping message"),
            DeliveryFailure::Closed => self.unsubscribe(id).await,
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::indexing_slicing, clippy::panic)]
mod tests {
    use housecup_db::MemoryLedgerStore;
    use housecup_types::{House, NewEntry};

    use super::*;
    use crate::feed::ChangeFeed;
    use crate::scoreboard::LedgerLimits;

    fn hub(buffer: usize) -> (Arc<Hub<MemoryLedgerStore>>, Scoreboard<MemoryLedgerStore>) {
        let board = Scoreboard::new(Arc::new(MemoryLedgerStore::new()), LedgerLimits::default());
        (Arc::new(Hub::new(board.clone(), buffer)), board)
    }

    async fn change(board: &Scoreboard<MemoryLedgerStore>, house: House, points: i64) -> LedgerChange {
        let entry = board
            .record_entry(&NewEntry::new(house, points, "test"))
            .await
            .unwrap();
        LedgerChange {
            entry,
            source: ChangeSource::Manual,
        }
    }

    #[tokio::test]
    async fn subscribe_sends_initial_snapshot() {
        let (hub, _) = hub(8);
        let mut sub = hub.subscribe().await;
        match sub.receiver.recv().await.unwrap() {
            HubMessage::LeaderboardUpdate(update) => {
                assert_eq!(update.kind, UpdateKind::Initial);
                assert_eq!(update.window, Window::AllTime);
                assert_eq!(update.data.len(), 4);
            }
            other => panic!("unexpected message: {other:?}"),
        }
        assert_eq!(hub.subscriber_count().await, 1);
    }

    #[tokio::test]
    async fn every_subscriber_gets_the_same_payload() {
        let (hub, board) = hub(8);
        let mut subs = Vec::new();
        for _ in 0..4 {
            let mut sub = hub.subscribe().await;
            sub.receiver.recv().await.unwrap();
            subs.push(sub);
        }

        let change = change(&board, House::Gryffindor, 10).await;
        assert_eq!(hub.on_ledger_change(&change).await, 4);

        let mut notices = Vec::new();
        for sub in &mut subs {
            match sub.receiver.recv().await.unwrap() {
                HubMessage::NewEntry(notice) => notices.push(notice),
                other => panic!("unexpected message: {other:?}"),
            }
        }
        for notice in &notices[1..] {
            assert!(Arc::ptr_eq(&notices[0], notice));
        }
        let notice = &notices[0];
        assert_eq!(notice.entry, change.entry);
        assert_eq!(notice.leaderboard.kind, UpdateKind::NewEntry);
        assert_eq!(notice.leaderboard.data[0].house, House::Gryffindor);
        assert_eq!(notice.leaderboard.data[0].total_points, 10);
    }

    #[tokio::test]
    async fn dropped_subscriber_is_reaped() {
        let (hub, board) = hub(8);
        let mut keep = hub.subscribe().await;
        keep.receiver.recv().await.unwrap();
        let gone = hub.subscribe().await;
        drop(gone.receiver);

        let change = change(&board, House::Slytherin, 5).await;
        assert_eq!(hub.on_ledger_change(&change).await, 1);
        assert_eq!(hub.subscriber_count().await, 1);
        assert!(matches!(keep.receiver.recv().await.unwrap(), HubMessage::NewEntry(_)));
    }

    #[tokio::test]
    async fn full_subscriber_misses_message_but_stays() {
        let (hub, board) = hub(1);
        let mut slow = hub.subscribe().await;
        let mut fast = hub.subscribe().await;
        fast.receiver.recv().await.unwrap();

        let change = change(&board, House::Ravenclaw, 7).await;
        assert_eq!(hub.on_ledger_change(&change).await, 1);
        assert_eq!(hub.subscriber_count().await, 2);
        assert!(matches!(fast.receiver.recv().await.unwrap(), HubMessage::NewEntry(_)));
        assert!(matches!(
            slow.receiver.recv().await.unwrap(),
            HubMessage::LeaderboardUpdate(_)
        ));
    }

    #[tokio::test]
    async fn window_request_is_targeted() {
        let (hub, _) = hub(8);
        let mut asker = hub.subscribe().await;
        let mut other = hub.subscribe().await;
        asker.receiver.recv().await.unwrap();
        other.receiver.recv().await.unwrap();

        assert!(hub.request_window(asker.id, Window::OneHour).await);
        match asker.receiver.recv().await.unwrap() {
            HubMessage::LeaderboardUpdate(update) => {
                assert_eq!(update.kind, UpdateKind::TimeWindow);
                assert_eq!(update.window, Window::OneHour);
            }
            other => panic!("unexpected message: {other:?}"),
        }
        assert!(other.receiver.try_recv().is_err());
    }

    #[tokio::test]
    async fn unsubscribe_is_idempotent() {
        let (hub, _) = hub(8);
        let sub = hub.subscribe().await;
        hub.unsubscribe(sub.id).await;
        hub.unsubscribe(sub.id).await;
        assert_eq!(hub.subscriber_count().await, 0);
        assert!(!hub.request_window(sub.id, Window::AllTime).await);
    }

    #[tokio::test]
    async fn listener_forwards_feed_changes() {
        let (hub, board) = hub(8);
        let feed = ChangeFeed::new(8);
        let task = Arc::clone(&hub).listen(feed.subscribe());
        let mut sub = hub.subscribe().await;
        sub.receiver.recv().await.unwrap();

        let entry = board
            .record_entry(&NewEntry::new(House::Hufflepuff, 3, "test"))
            .await
            .unwrap();
        feed.publish(entry.clone(), ChangeSource::Generated);

        match sub.receiver.recv().await.unwrap() {
            HubMessage::NewEntry(notice) => {
                assert_eq!(notice.entry, entry);
                assert_eq!(notice.leaderboard.kind, UpdateKind::AutoGenerated);
            }
            other => panic!("unexpected message: {other:?}"),
        }

        drop(feed);
        task.await.unwrap();
    }

    #[test]
    fn messages_serialize_with_event_tag() {
        let message = HubMessage::Error {
            message: String::from("boom"),
        };
        let json = serde_json::to_value(&message).unwrap();
        assert_eq!(json["event"], "error");
        assert_eq!(json["data"]["message"], "boom");

        let update = HubMessage::LeaderboardUpdate(Arc::new(LeaderboardUpdate::new(
            UpdateKind::TimeWindow,
            Window::OneDay,
            Vec::new(),
        )));
        let json = serde_json::to_value(&update).unwrap();
        assert_eq!(json["event"], "leaderboard-update");
        assert_eq!(json["data"]["type"], "time-window");
        assert_eq!(json["data"]["window"], "24hours");
    }
}
