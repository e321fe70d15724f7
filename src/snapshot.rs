//! Conversion of raw media session events into [`NowPlayingInfo`] snapshots


use std::{collections::HashMap, ops::Deref, str::FromStr};

use zbus::zvariant::{OwnedValue, Value};

use crate::{
    error::MalformedEvent,
    info::{NowPlayingInfo, PlaybackState},
    session::{SessionEvent, SessionState},
    utils::{now_millis, text_of},
};

pub const DEFAULT_STORE_ID_KEY: &str = "mpris:trackid";

const TITLE_KEY: &str = "xesam:title";
const ARTIST_KEY: &str = "xesam:artist";
const ALBUM_KEY: &str = "xesam:album";

/// Playback status as reported by a MPRIS-compliant player
#[derive(Eq, PartialEq, Debug)]
enum PlayerStatus {
    Playing,
    Paused,
    Stopped,
}
impl FromStr for PlayerStatus {
    type Err = MalformedEvent;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_ref() {
            "playing" => Ok(Self::Playing),
            "paused" => Ok(Self::Paused),
            "stopped" => Ok(Self::Stopped),
            _ => Err(MalformedEvent::UnknownStatus(s.to_owned())),
        }
    }
}

pub type Clock = Box<dyn Fn() -> u64 + Send>;

/// Builds snapshots for a single subscription, keeping their timestamps strictly increasing
pub struct StateSnapshotBuilder {
    store_id_key: String,
    clock: Clock,
    last_updated_at: Option<u64>,
}

impl Default for StateSnapshotBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl StateSnapshotBuilder {
    #[must_use]
    pub fn new() -> Self {
        Self {
            store_id_key: DEFAULT_STORE_ID_KEY.to_owned(),
            clock: Box::new(now_millis),
            last_updated_at: None,
        }
    }

    /// Read the store identifier from `key` instead of [`DEFAULT_STORE_ID_KEY`]
    #[must_use]
    pub fn with_store_id_key(mut self, key: impl Into<String>) -> Self {
        self.store_id_key = key.into();
        self
    }

    /// Replace the wall clock (milliseconds since the Unix epoch)
    #[must_use]
    pub fn with_clock(mut self, clock: impl Fn() -> u64 + Send + 'static) -> Self {
        self.clock = Box::new(clock);
        self
    }

    /// Convert `event` into a newly allocated snapshot.
    ///
    /// # Errors
    ///
    /// Returns [`MalformedEvent`] if the event cannot be interpreted. No timestamp is consumed
    /// in that case.
    pub fn build(&mut self, event: &SessionEvent) -> Result<NowPlayingInfo, MalformedEvent> {
        let fields = match event {
            SessionEvent::NoSession => None,
            SessionEvent::Active(state) => self.parse(state)?,
        };
        let updated_at = self.next_timestamp();
        Ok(match fields {
            None => NowPlayingInfo::no_session(updated_at),
            Some(f) => NowPlayingInfo::new(
                f.title,
                f.artist,
                f.album,
                f.playback_state,
                f.elapsed_time,
                f.store_identifier,
                updated_at,
            ),
        })
    }

    /// Returns `None` when the player state amounts to "no active session"
    fn parse(&self, state: &SessionState) -> Result<Option<SnapshotFields>, MalformedEvent> {
        let status: PlayerStatus = state
            .status
            .as_deref()
            .ok_or(MalformedEvent::MissingStatus)?
            .parse()?;
        let playback_state = match status {
            PlayerStatus::Playing => PlaybackState::Playing,
            PlayerStatus::Paused => PlaybackState::Paused,
            PlayerStatus::Stopped => return Ok(None),
        };

        let position = state.position.unwrap_or_default();
        if position < 0 {
            tracing::debug!(position, "Negative position reported, treating as no session");
            return Ok(None);
        }
        let elapsed_time = i32::try_from(position / 1_000_000).unwrap_or(i32::MAX);

        Ok(Some(SnapshotFields {
            title: get_text(&state.metadata, TITLE_KEY)?,
            artist: get_text(&state.metadata, ARTIST_KEY)?,
            album: get_text(&state.metadata, ALBUM_KEY)?,
            playback_state,
            elapsed_time,
            store_identifier: get_store_identifier(&state.metadata, &self.store_id_key),
        }))
    }

    /// Stamps stop increasing once they reach `u64::MAX`
    fn next_timestamp(&mut self) -> u64 {
        let now = (self.clock)();
        let stamp = match self.last_updated_at {
            Some(last) if now <= last => last.saturating_add(1),
            _ => now,
        };
        self.last_updated_at = Some(stamp);
        stamp
    }
}

struct SnapshotFields {
    title: Option<String>,
    artist: Option<String>,
    album: Option<String>,
    playback_state: PlaybackState,
    elapsed_time: i32,
    store_identifier: u64,
}

fn unexpected_type(key: &str, value: &Value<'_>) -> MalformedEvent {
    MalformedEvent::UnexpectedType {
        key: key.to_owned(),
        signature: value.value_signature().to_string(),
    }
}

/// Read a text field, joining string arrays (e.g. multiple artists) with `", "`
fn get_text(
    metadata: &HashMap<String, OwnedValue>,
    key: &str,
) -> Result<Option<String>, MalformedEvent> {
    let Some(value) = metadata.get(key).map(Deref::deref) else {
        return Ok(None);
    };
    let text = match value {
        Value::Str(s) => s.as_str().to_owned(),
        Value::Array(arr) => arr
            .iter()
            .map(|v| text_of(v).ok_or_else(|| unexpected_type(key, value)))
            .collect::<Result<Vec<_>, _>>()?
            .into_iter()
            .filter(|s| !s.is_empty())
            .collect::<Vec<_>>()
            .join(", "),
        _ => return Err(unexpected_type(key, value)),
    };
    Ok(Some(text).filter(|t| !t.is_empty()))
}

/// Extract a catalog identifier. Anything that isn't a non-negative integer (or a path ending
/// in one) maps to 0.
fn get_store_identifier(metadata: &HashMap<String, OwnedValue>, key: &str) -> u64 {
    let parse_tail = |s: &str| {
        s.rsplit('/')
            .next()
            .and_then(|tail| tail.parse::<u64>().ok())
    };
    let id = metadata.get(key).and_then(|value| match value.deref() {
        Value::U64(n) => Some(*n),
        Value::U32(n) => Some(u64::from(*n)),
        Value::I64(n) => u64::try_from(*n).ok(),
        Value::I32(n) => u64::try_from(*n).ok(),
        Value::Str(s) => parse_tail(s.as_str()),
        Value::ObjectPath(o) => parse_tail(o.as_str()),
        _ => None,
    });
    id.unwrap_or_default()
}
