use thiserror::Error;

/// Failures surfaced by [`crate::bridge::NotificationBridge`]
#[derive(Debug, Error)]
pub enum BridgeError {
    #[error("Failed to register for media session notifications: {0}")]
    Registration(#[from] zbus::Error),

    #[error("Media session facility unavailable: {0}")]
    Unavailable(String),

    #[error("Bridge is not registered with the media session facility")]
    NotRegistered,
}

/// A media session event that cannot be turned into a snapshot
#[derive(Debug, Error, PartialEq, Eq)]
pub enum MalformedEvent {
    #[error("Player reported no playback status")]
    MissingStatus,

    #[error("Unknown playback status {0:?}")]
    UnknownStatus(String),

    #[error("Metadata field {key} has unexpected type {signature}")]
    UnexpectedType { key: String, signature: String },
}
