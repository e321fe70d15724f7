//! Bridge the desktop's "now playing" media state to a consumer.
//!
//! A [`bridge::NotificationBridge`] subscribes to a [`bridge::SessionSource`] (MPRIS players on
//! the D-Bus session bus by default), turns every change into an immutable
//! [`info::NowPlayingInfo`] snapshot and hands it to a [`bridge::SnapshotHandler`], which owns
//! it from then on.

pub mod args;
pub mod bridge;
pub mod dbus;
pub mod error;
pub mod hub;
pub mod info;
pub mod mpris;
pub mod out;
pub mod player;
pub mod session;
pub mod snapshot;
mod utils;
