//! The `extract` command: offline normalization of a captured payload.

use anyhow::{Context, Result};
use std::path::PathBuf;

/// Arguments for the extract command.
#[derive(clap::Args)]
pub struct ExtractArgs {
    /// Endpoint name the payload was captured under.
    pub endpoint: String,

    /// Path to a JSON payload file.
    pub file: PathBuf,

    /// Pretty-print the output.
    #[arg(long)]
    pub pretty: bool,
}

/// Runs the extract command.
pub fn run(args: &ExtractArgs) -> Result<()> {
    let content = std::fs::read_to_string(&args.file)
        .with_context(|| format!("reading {}", args.file.display()))?;
    let payload: serde_json::Value =
        serde_json::from_str(&content).context("payload is not valid JSON")?;

    let mut posts = postrelay_extract::extract(&args.endpoint, &payload);
    for post in &mut posts {
        post.source_endpoint = Some(args.endpoint.clone());
    }

    let output = if args.pretty {
        serde_json::to_string_pretty(&posts)?
    } else {
        serde_json::to_string(&posts)?
    };
    println!("{output}");
    eprintln!("{} post(s) extracted", posts.len());
    Ok(())
}
