//! End-to-end tests of the write → feed → hub pipeline using the
//! in-memory ledger store.

#![allow(clippy::unwrap_used, clippy::indexing_slicing, clippy::panic)]

use std::sync::Arc;
use std::time::Duration;

use housecup_core::hub::UpdateKind;
use housecup_core::{
    ChangeFeed, ChangeSource, Generator, Hub, HubMessage, LedgerLimits, Scoreboard, Subscription,
};
use housecup_db::MemoryLedgerStore;
use housecup_types::{House, NewEntry, Window};

struct Pipeline {
    board: Scoreboard<MemoryLedgerStore>,
    feed: ChangeFeed,
    hub: Arc<Hub<MemoryLedgerStore>>,
}

fn pipeline() -> Pipeline {
    let board = Scoreboard::new(Arc::new(MemoryLedgerStore::new()), LedgerLimits::default());
    let feed = ChangeFeed::new(64);
    let hub = Arc::new(Hub::new(board.clone(), 16));
    Arc::clone(&hub).listen(feed.subscribe());
    Pipeline { board, feed, hub }
}

async fn subscribed(hub: &Hub<MemoryLedgerStore>) -> Subscription {
    let mut sub = hub.subscribe().await;
    match sub.receiver.recv().await.unwrap() {
        HubMessage::LeaderboardUpdate(update) => assert_eq!(update.kind, UpdateKind::Initial),
        other => panic!("expected initial snapshot, got {other:?}"),
    }
    sub
}

#[tokio::test]
async fn one_failed_subscriber_does_not_block_the_rest() {
    let p = pipeline();
    let mut live = Vec::new();
    for _ in 0..3 {
        live.push(subscribed(&p.hub).await);
    }
    let failing = subscribed(&p.hub).await;
    drop(failing.receiver);

    let entry = p
        .board
        .record_entry(&NewEntry::new(House::Ravenclaw, 40, "Brilliant answer"))
        .await
        .unwrap();
    p.feed.publish(entry.clone(), ChangeSource::Manual);

    let mut payloads = Vec::new();
    for sub in &mut live {
        let message = tokio::time::timeout(Duration::from_secs(5), sub.receiver.recv())
            .await
            .unwrap()
            .unwrap();
        match message {
            HubMessage::NewEntry(notice) => payloads.push(notice),
            other => panic!("expected new-entry, got {other:?}"),
        }
    }

    for payload in &payloads[1..] {
        assert!(Arc::ptr_eq(&payloads[0], payload));
    }
    assert_eq!(payloads[0].entry, entry);
    assert_eq!(payloads[0].leaderboard.data[0].house, House::Ravenclaw);
    assert_eq!(p.hub.subscriber_count().await, 3);
}

#[tokio::test]
async fn generated_entries_arrive_as_auto_generated() {
    let p = pipeline();
    let generator = Generator::new(p.board.clone(), p.feed.clone(), Duration::from_millis(1));
    let mut sub = subscribed(&p.hub).await;

    let created = generator.generate_bulk(3).await;
    assert_eq!(created.len(), 3);

    for expected in &created {
        match sub.receiver.recv().await.unwrap() {
            HubMessage::NewEntry(notice) => {
                assert_eq!(&notice.entry, expected);
                assert_eq!(notice.leaderboard.kind, UpdateKind::AutoGenerated);
            }
            other => panic!("expected new-entry, got {other:?}"),
        }
    }
    assert_eq!(generator.status().await.listener_count, 1);
}

#[tokio::test]
async fn every_window_is_complete_and_nested() {
    let p = pipeline();
    let generator = Generator::new(p.board.clone(), p.feed.clone(), Duration::from_millis(1));
    generator.generate_scenario().await.unwrap();
    generator.generate_bulk(5).await;

    let mut previous: Option<Vec<(House, u64)>> = None;
    for window in Window::ALL {
        let rows = p.board.leaderboard(window).await.unwrap();
        assert_eq!(rows.len(), House::ALL.len());
        for (expected, row) in (1_u32..).zip(&rows) {
            assert_eq!(row.rank, expected);
        }
        for pair in rows.windows(2) {
            let ordered = pair[0].total_points > pair[1].total_points
                || (pair[0].total_points == pair[1].total_points
                    && pair[0].house.name() < pair[1].house.name());
            assert!(ordered, "{window}: {pair:?}");
        }

        let mut counts: Vec<(House, u64)> = rows.iter().map(|r| (r.house, r.entry_count)).collect();
        counts.sort();
        if let Some(narrower) = &previous {
            for (wide, narrow) in counts.iter().zip(narrower) {
                assert!(wide.1 >= narrow.1, "{window} lost entries for {}", wide.0);
            }
        }
        previous = Some(counts);
    }
}
