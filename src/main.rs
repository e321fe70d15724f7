use std::time::Duration;

use anyhow::{ensure, Context as _, Result};
use clap::Parser as _;
use nowplaying_bridge::{
    args::Args, bridge::NotificationBridge, mpris::MprisSource, out::SnapshotPrinter,
    snapshot::StateSnapshotBuilder,
};

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let args = Args::parse();
    args.init_tracing_subscriber()?;
    let refresh_interval =
        Duration::try_from_secs_f64(args.refresh_every).context("Invalid --refresh-every")?;
    ensure!(
        !refresh_interval.is_zero(),
        "--refresh-every must be a positive number of seconds"
    );

    let source = MprisSource::new(args.player.clone(), refresh_interval);
    let builder = StateSnapshotBuilder::new().with_store_id_key(args.store_id_key.clone());
    let mut bridge =
        NotificationBridge::new(source, SnapshotPrinter::new(args.format)).with_builder(builder);

    bridge.setup().await?;
    bridge.run().await?;
    Ok(())
}
