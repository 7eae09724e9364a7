// ABOUTME: Server RPC surface consumed by sessions: authenticate, fetch workspaces, page pending sets
// A Connector opens one physical connection; sessions pool the connections it hands out

pub mod error;
pub mod http;

pub use error::TransportError;
pub use http::{HttpConnector, HttpTransport};

use crate::models::{
    Credentials, PendingSetPage, RecursionType, ServerPath, WorkspaceDefinition,
};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use url::Url;

/// Opaque token issued by the server after authentication.
#[derive(Clone, PartialEq, Eq)]
pub struct SessionToken(String);

impl SessionToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for SessionToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SessionToken(<redacted>)")
    }
}

/// A server item and the recursion applied to it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ItemSpec {
    pub item: ServerPath,
    pub recursion: RecursionType,
}

/// Arguments of a `QueryPendingSets` call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PendingSetQuery {
    pub workspace_names: Vec<String>,
    pub owners: Vec<String>,
    pub item_specs: Vec<ItemSpec>,
    pub include_deleted: bool,
    pub page_size: u32,
}

/// One physical connection to a project collection.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Transport: Send + Sync {
    async fn authenticate(&self, credentials: &Credentials) -> Result<SessionToken, TransportError>;

    /// `Ok(None)` when the server has no such workspace for that owner.
    async fn get_workspace(
        &self,
        token: &SessionToken,
        name: &str,
        owner: &str,
    ) -> Result<Option<WorkspaceDefinition>, TransportError>;

    /// Fetch one page; `continuation` is the token from the previous page.
    async fn query_pending_sets(
        &self,
        token: &SessionToken,
        query: &PendingSetQuery,
        continuation: Option<String>,
    ) -> Result<PendingSetPage, TransportError>;
}

/// Opens connections to a server.
pub trait Connector: Send + Sync {
    fn connect(&self, server: &Url) -> Result<Arc<dyn Transport>, TransportError>;
}

impl<F> Connector for F
where
    F: Fn(&Url) -> Result<Arc<dyn Transport>, TransportError> + Send + Sync,
{
    fn connect(&self, server: &Url) -> Result<Arc<dyn Transport>, TransportError> {
        self(server)
    }
}
