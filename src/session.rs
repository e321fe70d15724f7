use std::collections::HashMap;

use zbus::zvariant::OwnedValue;

/// Raw state of an attached media player, as read from the bus
#[derive(Clone, Debug, Default, PartialEq)]
pub struct SessionState {
    /// MPRIS metadata map (`xesam:*`, `mpris:*` keys)
    pub metadata: HashMap<String, OwnedValue>,
    /// Raw `PlaybackStatus` property
    pub status: Option<String>,
    /// Raw `Position` property in microseconds
    pub position: Option<i64>,
}

impl SessionState {
    /// Same track and playback status, whatever the position
    #[must_use]
    pub fn same_playback(&self, other: &Self) -> bool {
        self.status == other.status && self.metadata == other.metadata
    }
}

/// One change notification from the media session facility
#[derive(Debug)]
pub enum SessionEvent {
    NoSession,
    Active(SessionState),
}

#[cfg(test)]
mod tests {
    use zbus::zvariant::Value;

    use super::*;

    fn state(title: &str, status: &str, position: i64) -> SessionState {
        SessionState {
            metadata: HashMap::from([(
                "xesam:title".to_owned(),
                Value::from(title).try_into().unwrap(),
            )]),
            status: Some(status.to_owned()),
            position: Some(position),
        }
    }

    #[test]
    fn same_playback_ignores_position() {
        let a = state("Song A", "Playing", 1_000_000);
        assert!(a.same_playback(&state("Song A", "Playing", 9_000_000)));
        assert!(!a.same_playback(&state("Song A", "Paused", 1_000_000)));
        assert!(!a.same_playback(&state("Song B", "Playing", 1_000_000)));
    }
}
