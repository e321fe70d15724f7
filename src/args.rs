use std::{fs::OpenOptions, io, sync::Mutex};

use anyhow::{Context as _, Result};
use clap::Parser;
use tracing_subscriber::EnvFilter;

use crate::{out::OutputFormat, snapshot::DEFAULT_STORE_ID_KEY};

/// Command line arguments
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Force a D-Bus sync of the attached player every X seconds
    #[clap(long, short, default_value_t = 3600.0)]
    pub refresh_every: f64,
    /// File to write the log to. If not specified, logs will be written to stderr.
    #[clap(long, short)]
    log_file: Option<String>,
    /// Player names to follow. If not specified, follows any available player.
    #[clap(long, short, default_values_t = ["all".to_string()])]
    pub player: Vec<String>,
    /// Metadata key holding the store identifier of the playing item.
    /// Check `<https://www.freedesktop.org/wiki/Specifications/mpris-spec/metadata/>`
    /// for a list of common fields.
    #[clap(long, default_value_t = DEFAULT_STORE_ID_KEY.to_string())]
    pub store_id_key: String,
    /// How snapshots are printed to stdout
    #[clap(long, short, value_enum, default_value_t = OutputFormat::Json)]
    pub format: OutputFormat,
}

impl Args {
    /// Install the global tracing subscriber. Filtering follows `RUST_LOG`; output goes to
    /// stderr unless `--log-file` is given.
    ///
    /// # Errors
    ///
    /// Returns an error if the log file cannot be opened for appending.
    pub fn init_tracing_subscriber(&self) -> Result<()> {
        let subscriber = tracing_subscriber::fmt()
            .pretty()
            .with_env_filter(EnvFilter::from_default_env());
        let Some(path) = self.log_file.as_deref() else {
            subscriber.with_writer(io::stderr).init();
            return Ok(());
        };
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .with_context(|| format!("Failed to open log file {path}"))?;
        subscriber.with_ansi(false).with_writer(Mutex::new(file)).init();
        Ok(())
    }
}
