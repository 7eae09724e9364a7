// ABOUTME: High-level client bound to the workspace of one local directory
// Wraps session lookup and the query engine for the common "status of this tree" use

use crate::config::ClientConfig;
use crate::models::{ChangeSummary, Credentials, PendingChange, RecursionType, WorkspaceHandle};
use crate::query::{query_pending_changes, PendingChangeQuery, PendingChangeStream, QueryPath};
use crate::session::{ServerSession, SessionError, SessionManager};
use std::path::Path;
use std::sync::Arc;
use tracing::info;

pub struct TfvcClient {
    manager: Arc<SessionManager>,
    session: Arc<ServerSession>,
    workspace: WorkspaceHandle,
}

impl TfvcClient {
    /// Open the workspace mapping `path`, using the HTTP transport and the configured cache.
    pub async fn open(
        path: &Path,
        credentials: Credentials,
        config: &ClientConfig,
    ) -> Result<Self, SessionError> {
        let manager = Arc::new(SessionManager::from_config(config)?);
        Self::open_with(path, credentials, manager).await
    }

    pub async fn open_with(
        path: &Path,
        credentials: Credentials,
        manager: Arc<SessionManager>,
    ) -> Result<Self, SessionError> {
        let (session, workspace) = manager.open_workspace(path, credentials).await?;
        info!(
            "Opened workspace {};{} on {}",
            workspace.name(),
            workspace.owner(),
            workspace.server_uri()
        );
        Ok(Self {
            manager,
            session,
            workspace,
        })
    }

    pub fn workspace(&self) -> &WorkspaceHandle {
        &self.workspace
    }

    pub fn workspace_name(&self) -> &str {
        self.workspace.name()
    }

    pub fn workspace_owner(&self) -> &str {
        self.workspace.owner()
    }

    pub fn session(&self) -> &Arc<ServerSession> {
        &self.session
    }

    /// Stream this workspace's pending changes under `paths`.
    pub async fn pending_changes<P: Into<QueryPath>>(
        &self,
        paths: impl IntoIterator<Item = P>,
        recursion: RecursionType,
    ) -> Result<PendingChangeStream, SessionError> {
        let query = PendingChangeQuery::for_workspace(&self.workspace, paths, recursion);
        query_pending_changes(&self.session, query).await
    }

    /// All pending changes under `path`, recursively, excluding deleted items.
    pub async fn status(&self, path: &Path) -> Result<Vec<PendingChange>, SessionError> {
        self.pending_changes([path], RecursionType::Full)
            .await?
            .try_collect_all()
            .await
    }

    pub async fn summary(&self, path: &Path) -> Result<ChangeSummary, SessionError> {
        Ok(ChangeSummary::from_changes(&self.status(path).await?))
    }

    /// Disconnect the underlying session; other clients sharing it are closed too.
    pub async fn close(self) -> Result<(), SessionError> {
        self.manager.disconnect(self.session.id()).await
    }
}

impl std::fmt::Debug for TfvcClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TfvcClient")
            .field("session", &self.session)
            .field("workspace", &self.workspace)
            .finish_non_exhaustive()
    }
}
