use clap::ValueEnum;
use std::io::{self, Write};

use crate::{
    bridge::SnapshotHandler,
    info::{NowPlayingInfo, PlaybackState},
    utils::now_millis,
};

/// How delivered snapshots are written out
#[derive(Clone, Copy, Debug, Default, ValueEnum, PartialEq, Eq)]
pub enum OutputFormat {
    /// One JSON object per line
    #[default]
    Json,
    /// One human-readable line per snapshot
    Text,
}

/// Writes every delivered snapshot to stdout
pub struct SnapshotPrinter {
    format: OutputFormat,
}

impl SnapshotPrinter {
    #[must_use]
    pub const fn new(format: OutputFormat) -> Self {
        Self { format }
    }

    /// Format the snapshot and write it to the given writer.
    ///
    /// # Errors
    ///
    /// This function will return an error if writing to the given writer fails.
    pub fn format<T: Write>(
        &self,
        snapshot: &NowPlayingInfo,
        now: u64,
        mut f: &mut T,
    ) -> io::Result<()> {
        match self.format {
            OutputFormat::Json => serde_json::to_writer(&mut f, snapshot)?,
            OutputFormat::Text => f.write_all(Self::describe(snapshot, now).as_bytes())?,
        }
        f.write_all(b"\n")?;
        Ok(())
    }

    fn describe(snapshot: &NowPlayingInfo, now: u64) -> String {
        if snapshot.is_no_session() {
            return "(nothing playing)".to_owned();
        }
        let icon = match snapshot.playback_state() {
            PlaybackState::Playing => '▶',
            PlaybackState::Paused => '⏸',
        };
        let position = snapshot.playback_position(now).as_secs();
        let track = match (snapshot.artist(), snapshot.title()) {
            (Some(artist), Some(title)) => format!("{artist} - {title}"),
            (None, Some(name)) | (Some(name), None) => name.to_owned(),
            (None, None) => "Unknown track".to_owned(),
        };
        format!("{icon} {track} [{:02}:{:02}]", position / 60, position % 60)
    }
}

impl SnapshotHandler for SnapshotPrinter {
    fn deliver(&mut self, snapshot: NowPlayingInfo) {
        if let Err(e) = self.format(&snapshot, now_millis(), &mut io::stdout().lock()) {
            tracing::error!(?e, "Failed to write snapshot to stdout");
        }
        snapshot.release();
    }
}
