//! Bootstrap credentials and their persistence seam.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// The credential pair granting access to the HTTP sink daemon.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credentials {
    /// Bearer token.
    pub token: String,
    /// Port the daemon listens on.
    pub port: u16,
}

impl Credentials {
    /// Creates a credential pair.
    pub fn new(token: impl Into<String>, port: u16) -> Self {
        Self {
            token: token.into(),
            port,
        }
    }
}

/// Persistence seam for the verified credential pair.
///
/// The manager calls `save` after every verified bootstrap so a restart can
/// take the fast path (probe the cached pair, skip the bootstrap round
/// trip). Implementations log their own failures; an unsaved pair only
/// costs one extra bootstrap on the next start.
#[async_trait]
pub trait CredentialCache: Send + Sync {
    /// Loads the cached pair, if one was persisted.
    async fn load(&self) -> Option<Credentials>;

    /// Persists a verified pair.
    async fn save(&self, credentials: &Credentials);
}

/// A cache that never stores anything. Every start pays a full bootstrap.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullCredentialCache;

#[async_trait]
impl CredentialCache for NullCredentialCache {
    async fn load(&self) -> Option<Credentials> {
        None
    }

    async fn save(&self, _credentials: &Credentials) {}
}
