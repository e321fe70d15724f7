//! Point-in-time snapshot of the now-playing state

use std::time::Duration;

use serde::{Serialize, Serializer};

/// Playback state carried by a snapshot. There is no "stopped" state: a stopped player
/// is reported as a paused snapshot with no session data.
#[repr(u8)]
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum PlaybackState {
    #[default]
    Paused = 0,
    Playing = 1,
}

impl Serialize for PlaybackState {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u8(*self as u8)
    }
}

/// Immutable now-playing record handed to exactly one consumer.
///
/// Field order matches the boundary layout: title, artist, album, playback state,
/// elapsed time, store identifier, update timestamp.
#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NowPlayingInfo {
    #[serde(skip_serializing_if = "Option::is_none")]
    title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    artist: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    album: Option<String>,
    playback_state: PlaybackState,
    elapsed_time: i32,
    store_identifier: u64,
    updated_at: u64,
}

impl NowPlayingInfo {
    #[must_use]
    pub const fn new(
        title: Option<String>,
        artist: Option<String>,
        album: Option<String>,
        playback_state: PlaybackState,
        elapsed_time: i32,
        store_identifier: u64,
        updated_at: u64,
    ) -> Self {
        Self {
            title,
            artist,
            album,
            playback_state,
            elapsed_time,
            store_identifier,
            updated_at,
        }
    }

    /// Snapshot for "no active media session"
    #[must_use]
    pub const fn no_session(updated_at: u64) -> Self {
        Self::new(None, None, None, PlaybackState::Paused, 0, 0, updated_at)
    }

    #[must_use]
    pub fn title(&self) -> Option<&str> {
        self.title.as_deref()
    }
    #[must_use]
    pub fn artist(&self) -> Option<&str> {
        self.artist.as_deref()
    }
    #[must_use]
    pub fn album(&self) -> Option<&str> {
        self.album.as_deref()
    }
    #[must_use]
    pub const fn playback_state(&self) -> PlaybackState {
        self.playback_state
    }
    /// Seconds since the start of the track, as of [`Self::updated_at`]
    #[must_use]
    pub const fn elapsed_time(&self) -> i32 {
        self.elapsed_time
    }
    /// Catalog identifier, 0 when the item is not associated with a catalog entry
    #[must_use]
    pub const fn store_identifier(&self) -> u64 {
        self.store_identifier
    }
    /// Milliseconds since the Unix epoch at which this snapshot was produced
    #[must_use]
    pub const fn updated_at(&self) -> u64 {
        self.updated_at
    }

    /// Whether this snapshot carries the "no active media session" fields.
    ///
    /// The record has no dedicated flag, so a real session that is paused at 0s with no
    /// metadata and no store identifier looks the same and also returns `true`.
    #[must_use]
    pub fn is_no_session(&self) -> bool {
        self.playback_state == PlaybackState::Paused
            && self.elapsed_time == 0
            && self.store_identifier == 0
            && self.title.is_none()
            && self.artist.is_none()
            && self.album.is_none()
    }

    /// Estimate the live playback position at `now` (milliseconds since the Unix epoch).
    ///
    /// A paused snapshot stays at its elapsed time. A playing one keeps advancing from the
    /// moment it was produced.
    #[must_use]
    pub fn playback_position(&self, now: u64) -> Duration {
        let elapsed = Duration::from_secs(u64::try_from(self.elapsed_time).unwrap_or_default());
        match self.playback_state {
            PlaybackState::Paused => elapsed,
            PlaybackState::Playing => {
                elapsed + Duration::from_millis(now.saturating_sub(self.updated_at))
            }
        }
    }

    /// Release a delivered snapshot and everything it owns
    pub fn release(self) {
        tracing::trace!(updated_at = self.updated_at, "Snapshot released");
    }
}
