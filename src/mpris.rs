//! MPRIS players on the D-Bus session bus as a media session facility

use anyhow::Result;
use async_trait::async_trait;
use futures_lite::{
    stream::{unfold, Boxed},
    StreamExt as _,
};
use tokio::{select, time::Duration};
use zbus::{fdo::DBusProxy, names::OwnedBusName, Connection};

use crate::{
    bridge::SessionSource,
    dbus::{list_players, player_buses, BusActivity, BusChange},
    error::BridgeError,
    player::{PlayerChange, PlayerHandle, PlayerSession},
    session::{SessionEvent, SessionState},
};


/// Watches the session bus and follows one MPRIS player at a time
pub struct MprisSource {
    allowed_players: Vec<String>,
    refresh_interval: Duration,
}

impl MprisSource {
    #[must_use]
    pub const fn new(allowed_players: Vec<String>, refresh_interval: Duration) -> Self {
        Self {
            allowed_players,
            refresh_interval,
        }
    }
}

#[async_trait]
impl SessionSource for MprisSource {
    type Events = Boxed<SessionEvent>;

    async fn subscribe(&self) -> Result<Self::Events, BridgeError> {
        let conn = Connection::session().await?;
        let dbus = DBusProxy::new(&conn).await?;
        // Watch before listing so no player slips in between
        let buses = player_buses(&dbus).await?.boxed();
        let existing = list_players(&dbus).await?;

        let attacher = Attacher {
            conn,
            allowed_players: self.allowed_players.clone(),
            refresh_interval: self.refresh_interval,
        };
        let current = attacher.attach_first(existing).await;
        if current.is_none() {
            tracing::info!("No player on the bus yet");
        }
        let mut watcher = SessionWatcher {
            attacher,
            dbus,
            buses,
            current,
            pending: None,
            last: None,
        };
        let handle = watcher.current_handle();
        watcher.pending = Some(read_event(handle).await);

        Ok(unfold(watcher, |mut watcher| async move {
            let event = watcher.next_event().await?;
            Some((event, watcher))
        })
        .boxed())
    }
}

/// Connects to players that pass the allow-list
struct Attacher {
    conn: Connection,
    allowed_players: Vec<String>,
    refresh_interval: Duration,
}

impl Attacher {
    async fn attach_first(&self, players: Vec<BusChange>) -> Option<PlayerSession> {
        for change in players {
            if !change.matches_players(&self.allowed_players) {
                continue;
            }
            if let Some(session) = self.attach(change.name).await {
                return Some(session);
            }
        }
        None
    }

    async fn attach(&self, bus: OwnedBusName) -> Option<PlayerSession> {
        PlayerSession::attach(&self.conn, bus, self.refresh_interval)
            .await
            .inspect_err(|e| tracing::error!(?e, "Failed to attach to player"))
            .ok()
    }
}

enum Wake {
    Bus(Option<BusChange>),
    Player(Result<PlayerChange>),
}

struct SessionWatcher {
    attacher: Attacher,
    dbus: DBusProxy<'static>,
    buses: Boxed<BusChange>,
    current: Option<PlayerSession>,
    /// Event to emit before waiting for the bus again
    pending: Option<SessionEvent>,
    /// Player state carried by the last emitted event
    last: Option<SessionState>,
}

impl SessionWatcher {
    async fn next_event(&mut self) -> Option<SessionEvent> {
        loop {
            if let Some(event) = self.pending.take() {
                return Some(self.emit(event));
            }

            let wake = match self.current.as_mut() {
                None => Wake::Bus(self.buses.next().await),
                Some(session) => select! {
                    change = self.buses.next() => Wake::Bus(change),
                    update = session.changed() => Wake::Player(update),
                },
            };

            match wake {
                Wake::Bus(None) => {
                    tracing::error!("DBus NameOwnerChanged stream closed");
                    return None;
                }
                Wake::Bus(Some(change)) => self.pending = self.handle_bus_change(change).await,
                Wake::Player(Ok(reason)) => {
                    let handle = self.current_handle();
                    let event = read_event(handle).await;
                    // Property streams also yield the value they start with
                    let forced = matches!(reason, PlayerChange::Seeked | PlayerChange::Refresh);
                    if !forced && self.is_unchanged(&event) {
                        tracing::trace!(?reason, "Player state unchanged, skipping");
                        continue;
                    }
                    tracing::debug!(?reason, "Player state changed");
                    return Some(self.emit(event));
                }
                Wake::Player(Err(e)) => {
                    tracing::warn!(?e, "Lost connection to the attached player");
                    self.current = None;
                    self.pending = Some(self.reattach().await);
                }
            }
        }
    }

    fn emit(&mut self, event: SessionEvent) -> SessionEvent {
        self.last = match &event {
            SessionEvent::Active(state) => Some(state.clone()),
            SessionEvent::NoSession => None,
        };
        event
    }

    fn is_unchanged(&self, event: &SessionEvent) -> bool {
        match (event, &self.last) {
            (SessionEvent::Active(state), Some(last)) => state.same_playback(last),
            _ => false,
        }
    }

    fn current_handle(&self) -> Option<PlayerHandle> {
        self.current.as_ref().map(|session| session.handle.clone())
    }

    async fn handle_bus_change(&mut self, change: BusChange) -> Option<SessionEvent> {
        if !change.matches_players(&self.attacher.allowed_players) {
            tracing::debug!(bus = %change.name, "Player not in allowed list, skipping");
            return None;
        }
        match change.activity {
            BusActivity::Created => {
                if let Some(current) = &self.current {
                    tracing::debug!(bus = %change.name, current = %current.handle.bus, "Already attached, ignoring new player");
                    return None;
                }
                self.current = Some(self.attacher.attach(change.name).await?);
                let handle = self.current_handle();
                Some(read_event(handle).await)
            }
            BusActivity::Destroyed => {
                if self.current.as_ref()?.handle.bus != change.name {
                    return None;
                }
                tracing::info!(bus = %change.name, "Attached player left the bus");
                self.current = None;
                Some(self.reattach().await)
            }
        }
    }

    /// Attach to another player already on the bus, if any
    async fn reattach(&mut self) -> SessionEvent {
        let existing = list_players(&self.dbus)
            .await
            .inspect_err(|e| tracing::warn!(?e, "Failed to list players on the bus"))
            .unwrap_or_default();
        self.current = self.attacher.attach_first(existing).await;
        let handle = self.current_handle();
        read_event(handle).await
    }
}

async fn read_event(handle: Option<PlayerHandle>) -> SessionEvent {
    match handle {
        Some(handle) => SessionEvent::Active(handle.read_state().await),
        None => SessionEvent::NoSession,
    }
}
