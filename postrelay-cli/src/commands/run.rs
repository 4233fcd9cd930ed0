//! The `run` command: drive the agent over stdin/stdout.
//!
//! Commands arrive as one JSON object per stdin line; replies (when a
//! command produces one) leave as one JSON object per stdout line. Closing
//! stdin shuts the agent down after a final best-effort flush.

use anyhow::Result;
use postrelay_agent::{Agent, Command, DiagnosticBuffer};
use postrelay_store::{StateStore, default_state_path};
use postrelay_transport::{HttpSink, NativeHost, TransportManager, native};
use serde_json::json;
use std::path::PathBuf;
use tokio::io::AsyncBufReadExt;
use tracing::{info, warn};

/// Depth of the command channel between stdin and the agent task.
const COMMAND_CHANNEL_CAPACITY: usize = 64;

/// Arguments for the run command.
#[derive(clap::Args, Default)]
pub struct RunArgs {
    /// State file path (defaults to the platform config directory).
    #[arg(long)]
    pub state_file: Option<PathBuf>,

    /// Companion host binary (defaults to `postrelay-host` on PATH).
    #[arg(long)]
    pub host_program: Option<PathBuf>,
}

/// Runs the capture agent.
pub async fn run(args: &RunArgs, diagnostics: DiagnosticBuffer) -> Result<()> {
    let state_path = args
        .state_file
        .clone()
        .unwrap_or_else(default_state_path);
    info!(path = %state_path.display(), "Loading state");
    let store = StateStore::load(state_path).await;

    let http = HttpSink::new()?;
    let host = match &args.host_program {
        Some(path) => NativeHost::new(path),
        None => NativeHost::locate().unwrap_or_else(|| {
            warn!("Companion host not found on PATH, fallback will be unavailable");
            NativeHost::new(native::DEFAULT_HOST_PROGRAM)
        }),
    };

    let transport =
        TransportManager::new(Box::new(http), Box::new(host), Box::new(store.clone()));
    let mut agent = Agent::new(store, transport, diagnostics).await;
    agent.init().await;

    let (handle, requests) = Agent::channel(COMMAND_CHANNEL_CAPACITY);
    let agent_task = tokio::spawn(agent.run(requests));

    let stdin = tokio::io::BufReader::new(tokio::io::stdin());
    let mut lines = stdin.lines();
    while let Some(line) = lines.next_line().await? {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        match serde_json::from_str::<Command>(line) {
            Ok(command) => {
                if let Some(reply) = handle.request(command).await {
                    println!("{}", serde_json::to_string(&reply)?);
                }
            }
            Err(e) => {
                println!("{}", json!({ "error": format!("invalid command: {e}") }));
            }
        }
    }

    // Stdin closed: drop the handle so the agent drains and exits.
    drop(handle);
    agent_task.await?;
    Ok(())
}
