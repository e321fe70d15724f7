//! Subscription lifecycle and snapshot delivery

#[cfg(test)]
mod tests;

use async_trait::async_trait;
use futures_lite::{stream::Fuse, Stream, StreamExt as _};
use tracing::instrument;

use crate::{
    error::BridgeError,
    info::NowPlayingInfo,
    session::SessionEvent,
    snapshot::StateSnapshotBuilder,
};

/// A media session notification facility the bridge can subscribe to
#[async_trait]
pub trait SessionSource: Send + Sync {
    type Events: Stream<Item = SessionEvent> + Unpin + Send;

    /// Register for change notifications.
    ///
    /// # Errors
    ///
    /// Returns an error if the facility is unavailable.
    async fn subscribe(&self) -> Result<Self::Events, BridgeError>;
}

/// Receives each delivered snapshot. The handler owns the snapshot from then on and releases
/// it by dropping it (or calling [`NowPlayingInfo::release`]).
///
/// Runs on the event path, so it must not block for long.
pub trait SnapshotHandler: Send {
    fn deliver(&mut self, snapshot: NowPlayingInfo);
}

impl<F: FnMut(NowPlayingInfo) + Send> SnapshotHandler for F {
    fn deliver(&mut self, snapshot: NowPlayingInfo) {
        self(snapshot);
    }
}

/// Forwards media session changes to a [`SnapshotHandler`], one snapshot per event.
///
/// The subscription lives until the bridge is dropped; there is no unsubscribe.
pub struct NotificationBridge<S: SessionSource, H> {
    source: S,
    handler: H,
    builder: StateSnapshotBuilder,
    events: Option<Fuse<S::Events>>,
}

impl<S: SessionSource, H: SnapshotHandler> NotificationBridge<S, H> {
    pub fn new(source: S, handler: H) -> Self {
        Self {
            source,
            handler,
            builder: StateSnapshotBuilder::new(),
            events: None,
        }
    }

    #[must_use]
    pub fn with_builder(mut self, builder: StateSnapshotBuilder) -> Self {
        self.builder = builder;
        self
    }

    /// Register with the media session facility. Does nothing if already registered.
    ///
    /// # Errors
    ///
    /// Returns an error if registration fails. A later call makes a fresh attempt.
    #[instrument(skip_all)]
    pub async fn setup(&mut self) -> Result<(), BridgeError> {
        if self.events.is_some() {
            tracing::debug!("Already registered, skipping");
            return Ok(());
        }
        let events = self
            .source
            .subscribe()
            .await
            .inspect_err(|e| tracing::error!(%e, "Failed to register for media session changes"))?;
        tracing::info!("Registered for media session changes");
        self.events = Some(events.fuse());
        Ok(())
    }

    #[must_use]
    pub fn is_registered(&self) -> bool {
        self.events.is_some()
    }

    /// Build a snapshot from `event` and hand it to the handler.
    ///
    /// Returns whether a snapshot was delivered. Malformed events are logged and skipped.
    pub fn on_event(&mut self, event: SessionEvent) -> bool {
        if !self.is_registered() {
            tracing::warn!("Dropping media session event received before registration");
            return false;
        }
        match self.builder.build(&event) {
            Ok(snapshot) => {
                tracing::debug!(?snapshot, "Delivering snapshot");
                self.handler.deliver(snapshot);
                true
            }
            Err(e) => {
                tracing::warn!(%e, ?event, "Skipping malformed media session event");
                false
            }
        }
    }

    /// Deliver snapshots until the facility stops sending events.
    ///
    /// # Errors
    ///
    /// Returns [`BridgeError::NotRegistered`] if [`Self::setup`] has not succeeded yet.
    pub async fn run(&mut self) -> Result<(), BridgeError> {
        if !self.is_registered() {
            return Err(BridgeError::NotRegistered);
        }
        while let Some(event) = self.next_event().await {
            self.on_event(event);
        }
        tracing::warn!("Media session event stream closed");
        Ok(())
    }

    async fn next_event(&mut self) -> Option<SessionEvent> {
        self.events.as_mut()?.next().await
    }
}
