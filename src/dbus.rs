use futures_lite::{Stream, StreamExt as _};
use zbus::{fdo::DBusProxy, names::OwnedBusName};

pub mod player;

const MPRIS_PREFIX: &str = "org.mpris.MediaPlayer2.";

pub enum BusActivity {
    Created,
    Destroyed,
}

/// D-Bus's activity parsed from `NameOwnerChanged` signal
pub struct BusChange {
    pub name: OwnedBusName,
    pub activity: BusActivity,
}
impl BusChange {
    pub const fn new(name: OwnedBusName, activity: BusActivity) -> Self {
        Self { name, activity }
    }
    pub const fn new_existing(name: OwnedBusName) -> Self {
        Self {
            name,
            activity: BusActivity::Created,
        }
    }
    pub fn is_mpris(&self) -> bool {
        self.name.starts_with(MPRIS_PREFIX)
    }
    /// Whether this player is in `allowed_players` (`all` matches every player)
    pub fn matches_players(&self, allowed_players: &[String]) -> bool {
        let Some(player) = self.name.strip_prefix(MPRIS_PREFIX) else {
            return false;
        };
        allowed_players.iter().any(|allowed| {
            allowed == "all"
                || player == allowed
                || player
                    .strip_prefix(allowed.as_str())
                    .is_some_and(|rest| rest.starts_with('.'))
        })
    }
}

/// List the MPRIS players currently owning a name on the bus
///
/// # Errors
///
/// Returns an error if the bus daemon cannot be queried.
pub async fn list_players(proxy: &DBusProxy<'_>) -> zbus::Result<Vec<BusChange>> {
    Ok(proxy
        .list_names()
        .await?
        .into_iter()
        .map(BusChange::new_existing)
        .filter(BusChange::is_mpris)
        .collect())
}

/// Return a stream of MPRIS players appearing on or leaving the bus
///
/// # Errors
///
/// Returns an error if the `NameOwnerChanged` signal cannot be watched.
pub async fn player_buses(
    proxy: &DBusProxy<'_>,
) -> zbus::Result<impl Stream<Item = BusChange> + Send + 'static> {
    let activities = proxy.receive_name_owner_changed().await?.filter_map(|s| {
        let args = s
            .args()
            .inspect_err(|e| tracing::warn!(?e, "Failed to parse NameOwnerChanged argument"))
            .ok()?;
        let change = match (args.new_owner.is_some(), args.old_owner.is_some()) {
            (true, false) => BusActivity::Created,
            (false, true) => BusActivity::Destroyed,
            _ => return None,
        };
        Some(BusChange::new(args.name.into(), change))
    });

    Ok(activities.filter(BusChange::is_mpris))
}
