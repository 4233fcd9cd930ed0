//! The `probe` command: one-shot sink health check.

use anyhow::{Result, bail};
use postrelay_transport::HttpSink;
use postrelay_transport::manager::DEFAULT_DISCOVERY_PORT;

/// Arguments for the probe command.
#[derive(clap::Args)]
pub struct ProbeArgs {
    /// Daemon port to probe.
    #[arg(long, default_value_t = DEFAULT_DISCOVERY_PORT)]
    pub port: u16,
}

/// Runs the probe command.
pub async fn run(args: &ProbeArgs) -> Result<()> {
    let sink = HttpSink::new()?;
    if sink.probe(args.port).await {
        println!("sink alive on port {}", args.port);
        Ok(())
    } else {
        bail!("sink not reachable on port {}", args.port);
    }
}
