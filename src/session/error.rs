// ABOUTME: Error types for server sessions, workspace lookups and pending-change queries
// Every variant names the failing operation or the input that caused it

use crate::registry::RegistryError;
use crate::transport::TransportError;
use std::path::PathBuf;
use thiserror::Error;
use url::Url;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum SessionError {
    #[error(transparent)]
    Registry(#[from] RegistryError),

    #[error("Authentication to {server} failed: {source}")]
    Authentication {
        server: Url,
        #[source]
        source: TransportError,
    },

    #[error("Server {server} is unreachable: {source}")]
    UnreachableServer {
        server: Url,
        #[source]
        source: TransportError,
    },

    #[error("Workspace {name};{owner} not found on {server}")]
    WorkspaceNotFound {
        server: Url,
        name: String,
        owner: String,
    },

    #[error("Workspace {workspace} is not owned by any of: {}", owners.join(", "))]
    WorkspaceMismatch {
        workspace: String,
        owners: Vec<String>,
    },

    #[error("{} is mapped on {actual}, not on session server {expected}", path.display())]
    WrongServer {
        path: PathBuf,
        expected: Url,
        actual: Url,
    },

    #[error("{operation} failed for {input}: {source}")]
    Transport {
        operation: &'static str,
        input: String,
        #[source]
        source: TransportError,
    },

    #[error("Session to {server} is closed")]
    Closed { server: Url },

    #[error("Session not found: {0}")]
    UnknownSession(Uuid),

    #[error("Invalid query: {0}")]
    InvalidQuery(String),
}

impl SessionError {
    pub fn is_not_mapped(&self) -> bool {
        matches!(self, Self::Registry(RegistryError::NotMapped { .. }))
    }

    /// Failures a caller may retry as a whole (after backoff or with fresh credentials).
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Authentication { .. } | Self::UnreachableServer { .. } | Self::Transport { .. }
        )
    }
}
