//! The persisted agent state.

use async_trait::async_trait;
use postrelay_transport::{CredentialCache, Credentials};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::warn;

use crate::error::StoreError;
use crate::persistence::{load_json_or_default, save_json};

// ============================================================================
// Persisted State
// ============================================================================

/// Everything that survives a restart.
///
/// Session counters, buffers, and in-flight timers are deliberately absent:
/// they are volatile and reset with the process.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PersistedState {
    /// Snapshot of the dedup set, oldest first, already bounded by the
    /// dedup ceiling.
    pub seen_ids: Vec<String>,

    /// Posts accepted across all sessions.
    pub all_time_count: u64,

    /// Whether capture is enabled.
    pub capture_enabled: bool,

    /// Sink output directory ("" = sink default).
    pub output_dir: String,

    /// Whether debug log buffering is enabled.
    pub debug_logging: bool,

    /// Whether verbose payload diagnostics are enabled.
    pub verbose_logging: bool,

    /// Whether secondary-transport fallback is permitted.
    pub allow_native_fallback: bool,

    /// Verbose mode: dump every payload captured under this endpoint.
    pub verbose_dump_endpoint: Option<String>,

    /// Verbose mode: dump payloads containing any of these post ids.
    pub verbose_dump_ids: Vec<String>,

    /// Cached transport bearer token.
    pub http_token: Option<String>,

    /// Cached transport port.
    pub http_port: Option<u16>,
}

impl Default for PersistedState {
    fn default() -> Self {
        Self {
            seen_ids: Vec::new(),
            all_time_count: 0,
            capture_enabled: true,
            output_dir: String::new(),
            debug_logging: false,
            verbose_logging: false,
            allow_native_fallback: true,
            verbose_dump_endpoint: None,
            verbose_dump_ids: Vec::new(),
            http_token: None,
            http_port: None,
        }
    }
}

// ============================================================================
// State Store
// ============================================================================

/// Handle to the persisted state file.
///
/// Cheap to clone; clones share the same in-memory state. Mutations go
/// through [`StateStore::update`], which persists the new state before
/// returning.
#[derive(Clone)]
pub struct StateStore {
    path: PathBuf,
    inner: Arc<RwLock<PersistedState>>,
}

impl StateStore {
    /// Loads the store from the given path, starting from defaults when the
    /// file is missing or unreadable.
    pub async fn load(path: PathBuf) -> Self {
        let state = load_json_or_default(&path).await;
        Self {
            path,
            inner: Arc::new(RwLock::new(state)),
        }
    }

    /// Returns a copy of the current state.
    pub async fn state(&self) -> PersistedState {
        self.inner.read().await.clone()
    }

    /// Applies a mutation and persists the result.
    pub async fn update<F>(&self, mutate: F) -> Result<(), StoreError>
    where
        F: FnOnce(&mut PersistedState),
    {
        let snapshot = {
            let mut state = self.inner.write().await;
            mutate(&mut state);
            state.clone()
        };
        save_json(&self.path, &snapshot).await
    }
}

#[async_trait]
impl CredentialCache for StateStore {
    async fn load(&self) -> Option<Credentials> {
        let state = self.inner.read().await;
        match (&state.http_token, state.http_port) {
            (Some(token), Some(port)) => Some(Credentials::new(token.clone(), port)),
            _ => None,
        }
    }

    async fn save(&self, credentials: &Credentials) {
        let result = self
            .update(|state| {
                state.http_token = Some(credentials.token.clone());
                state.http_port = Some(credentials.port);
            })
            .await;
        if let Err(e) = result {
            // An unsaved pair only costs one extra bootstrap next start.
            warn!(error = %e, "Failed to persist transport credentials");
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
