use std::{
    collections::HashMap,
    sync::{
        atomic::{AtomicBool, AtomicUsize, Ordering},
        mpsc, Arc, Mutex,
    },
};

use futures::channel::mpsc::{unbounded, UnboundedReceiver, UnboundedSender};
use zbus::zvariant::{OwnedValue, Value};

use super::*;
use crate::{hub::SnapshotHub, info::PlaybackState, session::SessionState};

/// In-memory stand-in for the D-Bus facility
struct FakeSource {
    subscriptions: Arc<AtomicUsize>,
    unavailable: Arc<AtomicBool>,
    events: Mutex<Option<UnboundedReceiver<SessionEvent>>>,
}

#[async_trait]
impl SessionSource for FakeSource {
    type Events = UnboundedReceiver<SessionEvent>;

    async fn subscribe(&self) -> Result<Self::Events, BridgeError> {
        self.subscriptions.fetch_add(1, Ordering::SeqCst);
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(BridgeError::Unavailable("no session bus".to_owned()));
        }
        self.events
            .lock()
            .unwrap()
            .take()
            .ok_or_else(|| BridgeError::Unavailable("already subscribed".to_owned()))
    }
}

struct Harness {
    bridge: NotificationBridge<FakeSource, Collector>,
    os: UnboundedSender<SessionEvent>,
    delivered: mpsc::Receiver<NowPlayingInfo>,
    subscriptions: Arc<AtomicUsize>,
    unavailable: Arc<AtomicBool>,
}

struct Collector(mpsc::Sender<NowPlayingInfo>);

impl SnapshotHandler for Collector {
    fn deliver(&mut self, snapshot: NowPlayingInfo) {
        self.0.send(snapshot).unwrap();
    }
}

fn harness() -> Harness {
    let (os, events) = unbounded();
    let (tx, delivered) = mpsc::channel();
    let subscriptions = Arc::new(AtomicUsize::new(0));
    let unavailable = Arc::new(AtomicBool::new(false));
    let source = FakeSource {
        subscriptions: Arc::clone(&subscriptions),
        unavailable: Arc::clone(&unavailable),
        events: Mutex::new(Some(events)),
    };
    Harness {
        bridge: NotificationBridge::new(source, Collector(tx))
            .with_builder(StateSnapshotBuilder::new().with_clock(|| 1_000)),
        os,
        delivered,
        subscriptions,
        unavailable,
    }
}

fn track(status: &str, title: &str, artist: &str, elapsed_secs: i64, store_id: u64) -> SessionEvent {
    let metadata: HashMap<String, OwnedValue> = [
        ("xesam:title", Value::from(title)),
        ("xesam:artist", Value::from(vec![artist])),
        ("mpris:trackid", Value::from(store_id)),
    ]
    .into_iter()
    .map(|(k, v)| (k.to_owned(), v.try_into().unwrap()))
    .collect();
    SessionEvent::Active(SessionState {
        metadata,
        status: Some(status.to_owned()),
        position: Some(elapsed_secs * 1_000_000),
    })
}

fn malformed() -> SessionEvent {
    SessionEvent::Active(SessionState {
        status: Some("Rewinding".to_owned()),
        ..SessionState::default()
    })
}

#[tokio::test]
async fn setup_is_idempotent() {
    let mut h = harness();
    h.bridge.setup().await.unwrap();
    h.bridge.setup().await.unwrap();
    assert_eq!(h.subscriptions.load(Ordering::SeqCst), 1);
    assert!(h.bridge.is_registered());
}

#[tokio::test]
async fn failed_setup_is_retried_fresh() {
    let mut h = harness();
    h.unavailable.store(true, Ordering::SeqCst);
    assert!(matches!(
        h.bridge.setup().await,
        Err(BridgeError::Unavailable(_))
    ));
    assert!(!h.bridge.is_registered());

    // No deliveries without a subscription
    assert!(!h.bridge.on_event(SessionEvent::NoSession));
    assert!(matches!(h.bridge.run().await, Err(BridgeError::NotRegistered)));
    assert!(h.delivered.try_recv().is_err());

    h.unavailable.store(false, Ordering::SeqCst);
    h.bridge.setup().await.unwrap();
    assert!(h.bridge.is_registered());
    assert_eq!(h.subscriptions.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn play_then_pause() {
    let mut h = harness();
    h.bridge.setup().await.unwrap();

    h.os.unbounded_send(track("Playing", "Song A", "Artist A", 12, 555))
        .unwrap();
    h.os.unbounded_send(track("Paused", "Song A", "Artist A", 45, 555))
        .unwrap();
    h.os.close_channel();
    h.bridge.run().await.unwrap();

    let first = h.delivered.try_recv().unwrap();
    let second = h.delivered.try_recv().unwrap();
    assert!(h.delivered.try_recv().is_err());

    assert_eq!(first.playback_state(), PlaybackState::Playing);
    assert_eq!(first.elapsed_time(), 12);
    assert_eq!(first.title(), Some("Song A"));
    assert_eq!(first.artist(), Some("Artist A"));
    assert_eq!(first.store_identifier(), 555);
    assert_eq!(second.playback_state(), PlaybackState::Paused);
    assert_eq!(second.elapsed_time(), 45);
    assert!(second.updated_at() > first.updated_at());
}

#[tokio::test]
async fn deliveries_are_ordered_and_monotonic() {
    let mut h = harness();
    h.bridge.setup().await.unwrap();

    for i in 0..20 {
        h.os.unbounded_send(track("Playing", "Song", "Artist", i, 0))
            .unwrap();
    }
    h.os.close_channel();
    h.bridge.run().await.unwrap();

    let snapshots: Vec<_> = h.delivered.try_iter().collect();
    assert_eq!(snapshots.len(), 20);
    for (i, snapshot) in snapshots.iter().enumerate() {
        assert_eq!(snapshot.elapsed_time(), i32::try_from(i).unwrap());
    }
    assert!(snapshots
        .windows(2)
        .all(|w| w[0].updated_at() < w[1].updated_at()));
}

#[tokio::test]
async fn malformed_event_is_skipped() {
    let mut h = harness();
    h.bridge.setup().await.unwrap();

    assert!(h.bridge.on_event(track("Playing", "Song", "Artist", 1, 0)));
    assert!(!h.bridge.on_event(malformed()));
    assert!(h.bridge.is_registered());
    assert!(h.bridge.on_event(track("Playing", "Song", "Artist", 2, 0)));

    let first = h.delivered.try_recv().unwrap();
    let second = h.delivered.try_recv().unwrap();
    assert!(h.delivered.try_recv().is_err());
    assert_eq!(second.updated_at(), first.updated_at() + 1);
}

#[tokio::test]
async fn no_session_event() {
    let mut h = harness();
    h.bridge.setup().await.unwrap();
    assert!(h.bridge.on_event(SessionEvent::NoSession));

    let snapshot = h.delivered.try_recv().unwrap();
    assert!(snapshot.is_no_session());
}

#[tokio::test]
async fn releasing_one_snapshot_leaves_others_intact() {
    let mut h = harness();
    h.bridge.setup().await.unwrap();
    h.bridge.on_event(track("Playing", "Song A", "Artist A", 1, 1));
    h.bridge.on_event(track("Playing", "Song B", "Artist B", 2, 2));

    let a = h.delivered.try_recv().unwrap();
    let b = h.delivered.try_recv().unwrap();
    a.release();
    assert_eq!(b.title(), Some("Song B"));
    assert_eq!(b.artist(), Some("Artist B"));
    assert_eq!(b.store_identifier(), 2);
    b.release();
}

#[tokio::test]
async fn closure_handler() {
    let (os, events) = unbounded();
    let source = FakeSource {
        subscriptions: Arc::default(),
        unavailable: Arc::default(),
        events: Mutex::new(Some(events)),
    };
    let mut titles = Vec::new();
    {
        let mut bridge = NotificationBridge::new(source, |s: NowPlayingInfo| {
            titles.push(s.title().map(str::to_owned));
        });
        bridge.setup().await.unwrap();
        os.unbounded_send(SessionEvent::NoSession).unwrap();
        os.unbounded_send(track("Playing", "Song A", "Artist A", 0, 0))
            .unwrap();
        os.close_channel();
        bridge.run().await.unwrap();
    }
    assert_eq!(titles, vec![None, Some("Song A".to_owned())]);
}

#[tokio::test]
async fn hub_shares_deliveries() {
    let (os, events) = unbounded();
    let source = FakeSource {
        subscriptions: Arc::default(),
        unavailable: Arc::default(),
        events: Mutex::new(Some(events)),
    };
    let hub = SnapshotHub::new();
    let mut early = hub.watch(true);
    let mut bridge = NotificationBridge::new(source, hub.clone())
        .with_builder(StateSnapshotBuilder::new().with_clock(|| 1_000));
    bridge.setup().await.unwrap();

    os.unbounded_send(track("Playing", "Song A", "Artist A", 3, 7))
        .unwrap();
    os.unbounded_send(track("Paused", "Song A", "Artist A", 4, 7))
        .unwrap();
    os.close_channel();
    bridge.run().await.unwrap();

    let current = hub.current().unwrap();
    assert_eq!(current.playback_state(), PlaybackState::Paused);
    assert_eq!(current.updated_at(), 1_001);

    assert_eq!(early.recv().await.unwrap().elapsed_time(), 3);
    assert_eq!(early.recv().await.unwrap().elapsed_time(), 4);

    // A late watcher starts from the current state
    let mut late = hub.watch(true);
    assert_eq!(late.recv().await.unwrap(), current);
}
