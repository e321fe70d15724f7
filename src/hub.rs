//! Share delivered snapshots with any number of watchers

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver, UnboundedSender};

use crate::{bridge::SnapshotHandler, info::NowPlayingInfo};

/// Keeps the latest delivered snapshot and forwards every delivery to its watchers.
///
/// Clones share the same state: hand one clone to the bridge as its handler and keep
/// another to query [`Self::current`] or [`Self::watch`].
#[derive(Clone, Default)]
pub struct SnapshotHub {
    shared: Arc<Mutex<Shared>>,
}

#[derive(Default)]
struct Shared {
    current: Option<NowPlayingInfo>,
    watchers: Vec<UnboundedSender<NowPlayingInfo>>,
}

impl SnapshotHub {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Copy of the latest delivered snapshot, `None` before the first delivery
    #[must_use]
    pub fn current(&self) -> Option<NowPlayingInfo> {
        self.lock().current.clone()
    }

    /// Receive a copy of every snapshot delivered from now on.
    ///
    /// With `immediate`, the current snapshot (if any) is received first. Dropping the
    /// receiver ends the watch.
    pub fn watch(&self, immediate: bool) -> UnboundedReceiver<NowPlayingInfo> {
        let (tx, rx) = unbounded_channel();
        let mut shared = self.lock();
        if let Some(current) = shared.current.as_ref().filter(|_| immediate) {
            // The receiver is still held here
            _ = tx.send(current.clone());
        }
        shared.watchers.push(tx);
        rx
    }

    /// Number of watchers whose receiver is still alive
    #[must_use]
    pub fn watcher_count(&self) -> usize {
        let mut shared = self.lock();
        shared.watchers.retain(|watcher| !watcher.is_closed());
        shared.watchers.len()
    }

    fn lock(&self) -> MutexGuard<'_, Shared> {
        self.shared.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl SnapshotHandler for SnapshotHub {
    fn deliver(&mut self, snapshot: NowPlayingInfo) {
        let mut shared = self.lock();
        shared
            .watchers
            .retain(|watcher| watcher.send(snapshot.clone()).is_ok());
        tracing::trace!(watchers = shared.watchers.len(), "Snapshot shared");
        if let Some(previous) = shared.current.replace(snapshot) {
            previous.release();
        }
    }
}
