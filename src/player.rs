use std::collections::HashMap;

use anyhow::{Context as _, Result};
use futures_lite::{stream::Fuse, StreamExt as _};
use tokio::{
    select,
    time::{interval_at, Duration, Instant, Interval, MissedTickBehavior},
};
use tracing::instrument;
use zbus::{names::OwnedBusName, proxy::PropertyStream, zvariant::OwnedValue, Connection};

use crate::{
    dbus::player::{PlayerProxy, SeekedStream},
    session::SessionState,
};

const MIN_REFRESH_INTERVAL: Duration = Duration::from_millis(100);

/// Why an attached player's state needs to be read again
#[derive(Debug, Eq, PartialEq)]
pub enum PlayerChange {
    Metadata,
    Status,
    Seeked,
    Refresh,
}

/// Bus name and proxy of a MPRIS player
#[derive(Clone)]
pub struct PlayerHandle {
    pub bus: OwnedBusName,
    player: PlayerProxy<'static>,
}

/// A MPRIS player the watcher is attached to, with its change notifications
pub struct PlayerSession {
    pub handle: PlayerHandle,
    metadata_stream: Fuse<PropertyStream<'static, HashMap<String, OwnedValue>>>,
    status_stream: Fuse<PropertyStream<'static, String>>,
    seeked: SeekedStream,
    refresh_stream: Interval,
}

impl PlayerSession {
    #[instrument(skip_all, fields(%bus))]
    pub async fn attach(
        conn: &Connection,
        bus: OwnedBusName,
        refresh_interval: Duration,
    ) -> Result<Self> {
        let player = PlayerProxy::builder(conn)
            .destination(bus.clone())?
            .build()
            .await
            .context("Failed to create MPRIS player proxy")?;
        let period = refresh_interval.max(MIN_REFRESH_INTERVAL);
        let mut refresh_stream = interval_at(Instant::now() + period, period);
        refresh_stream.set_missed_tick_behavior(MissedTickBehavior::Skip);
        tracing::info!("Attached to player");
        Ok(Self {
            metadata_stream: player.receive_metadata_changed().await.fuse(),
            status_stream: player.receive_playback_status_changed().await.fuse(),
            seeked: player
                .receive_seeked()
                .await
                .context("Failed to receive seek signal")?,
            refresh_stream,
            handle: PlayerHandle { bus, player },
        })
    }

    /// Wait for the next change worth a new snapshot.
    ///
    /// # Errors
    ///
    /// Returns an error once the player's signal streams have closed.
    pub async fn changed(&mut self) -> Result<PlayerChange> {
        select! {
            metadata = self.metadata_stream.next() => {
                metadata.context("Metadata update stream closed").map(|_| PlayerChange::Metadata)
            },
            status = self.status_stream.next() => {
                status.context("Status update stream closed").map(|_| PlayerChange::Status)
            },
            seek = self.seeked.next() => {
                seek.context("Seek signal stream closed").map(|_| PlayerChange::Seeked)
            },
            _ = self.refresh_stream.tick() => Ok(PlayerChange::Refresh),
        }
    }
}

impl PlayerHandle {
    /// Read the player's current state. Properties that cannot be read are left empty.
    pub async fn read_state(&self) -> SessionState {
        SessionState {
            metadata: self
                .player
                .metadata()
                .await
                .inspect_err(|e| tracing::warn!(bus = %self.bus, ?e, "Failed to get player metadata"))
                .ok()
                .unwrap_or_default(),
            status: self
                .player
                .playback_status()
                .await
                .inspect_err(|e| {
                    tracing::warn!(bus = %self.bus, ?e, "Failed to get player playback status");
                })
                .ok(),
            position: self
                .player
                .position()
                .await
                .inspect_err(|e| tracing::debug!(bus = %self.bus, ?e, "Failed to get player position"))
                .ok(),
        }
    }
}
