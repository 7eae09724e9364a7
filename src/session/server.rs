// ABOUTME: Authenticated session against one project collection
// Resolves workspaces (through the local registry when auto-detecting) and pages pending sets

use super::error::SessionError;
use super::pool::{AcquireError, ConnectionPool, PoolStats, PooledConnection};
use crate::config::ClientConfig;
use crate::models::{
    same_server, Credentials, PendingSetPage, WorkspaceDefinition, WorkspaceHandle, WorkspaceKey,
};
use crate::registry::{LocalWorkspaceRegistry, RegistryError};
use crate::transport::{Connector, PendingSetQuery, SessionToken, TransportError};
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info};
use url::Url;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Connected,
    Closed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionSettings {
    pub max_connections: usize,
    pub page_size: u32,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self::from(&ClientConfig::default())
    }
}

impl From<&ClientConfig> for SessionSettings {
    fn from(config: &ClientConfig) -> Self {
        Self {
            max_connections: config.transport.max_connections,
            page_size: config.query.page_size,
        }
    }
}

pub struct ServerSession {
    id: Uuid,
    server_uri: Url,
    credentials: Credentials,
    token: SessionToken,
    pool: ConnectionPool,
    registry: Arc<LocalWorkspaceRegistry>,
    workspaces: RwLock<HashMap<WorkspaceKey, Arc<WorkspaceDefinition>>>,
    settings: SessionSettings,
}

impl std::fmt::Debug for ServerSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServerSession")
            .field("id", &self.id)
            .field("server_uri", &self.server_uri.as_str())
            .field("credentials", &self.credentials)
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}

impl ServerSession {
    /// Authenticate against `server_uri`. No session exists if this fails.
    pub async fn connect(
        server_uri: Url,
        credentials: Credentials,
        registry: Arc<LocalWorkspaceRegistry>,
        connector: Arc<dyn Connector>,
        settings: SessionSettings,
    ) -> Result<Arc<Self>, SessionError> {
        info!(
            "Connecting to {} with {} credentials",
            server_uri,
            credentials.kind()
        );

        let pool = ConnectionPool::new(server_uri.clone(), connector, settings.max_connections);
        let lease = pool.acquire().await.map_err(|e| match e {
            AcquireError::Closed => SessionError::Closed {
                server: server_uri.clone(),
            },
            AcquireError::Connect(source) => connect_error(&server_uri, source),
        })?;

        let token = lease
            .transport()
            .authenticate(&credentials)
            .await
            .map_err(|source| connect_error(&server_uri, source))?;
        lease.release();

        let session = Self {
            id: Uuid::new_v4(),
            server_uri,
            credentials,
            token,
            pool,
            registry,
            workspaces: RwLock::new(HashMap::new()),
            settings,
        };
        info!("Session {} connected to {}", session.id, session.server_uri);
        Ok(Arc::new(session))
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn server_uri(&self) -> &Url {
        &self.server_uri
    }

    pub fn credentials(&self) -> &Credentials {
        &self.credentials
    }

    pub fn settings(&self) -> SessionSettings {
        self.settings
    }

    pub fn registry(&self) -> &Arc<LocalWorkspaceRegistry> {
        &self.registry
    }

    pub fn state(&self) -> ConnectionState {
        if self.pool.is_closed() {
            ConnectionState::Closed
        } else {
            ConnectionState::Connected
        }
    }

    pub fn pool_stats(&self) -> PoolStats {
        self.pool.stats()
    }

    pub(crate) fn ensure_open(&self) -> Result<(), SessionError> {
        match self.state() {
            ConnectionState::Connected => Ok(()),
            ConnectionState::Closed => Err(SessionError::Closed {
                server: self.server_uri.clone(),
            }),
        }
    }

    /// Find the workspace for `local_path`.
    ///
    /// With `auto_detect` the local registry names the workspace and the server
    /// supplies its definition. Without it, only workspaces this session has
    /// already fetched are considered. A missing mapping is an error in both
    /// cases; workspaces are never created implicitly.
    pub async fn get_workspace(
        &self,
        local_path: &Path,
        auto_detect: bool,
    ) -> Result<WorkspaceHandle, SessionError> {
        self.ensure_open()?;

        if auto_detect {
            let info = self.registry.resolve(local_path)?;
            if !same_server(&info.server_uri, &self.server_uri) {
                return Err(SessionError::WrongServer {
                    path: local_path.to_path_buf(),
                    expected: self.server_uri.clone(),
                    actual: info.server_uri,
                });
            }
            return self.workspace(&info.workspace_name, &info.owner_name).await;
        }

        if !local_path.is_absolute() {
            return Err(RegistryError::RelativePath {
                path: local_path.to_path_buf(),
            }
            .into());
        }

        let known = self.workspaces.read().await;
        let found = known
            .values()
            .filter(|definition| definition.maps_local_path(local_path))
            .filter_map(|definition| {
                definition
                    .mapping_depth(local_path)
                    .map(|depth| (depth, definition))
            })
            .max_by_key(|(depth, _)| *depth)
            .map(|(_, definition)| self.handle(definition.clone()));
        found.ok_or_else(|| {
            RegistryError::NotMapped {
                path: local_path.to_path_buf(),
            }
            .into()
        })
    }

    /// Fetch a workspace by identity.
    pub async fn workspace(&self, name: &str, owner: &str) -> Result<WorkspaceHandle, SessionError> {
        match self.definition(name, owner).await? {
            Some(definition) => Ok(self.handle(definition)),
            None => Err(SessionError::WorkspaceNotFound {
                server: self.server_uri.clone(),
                name: name.to_string(),
                owner: owner.to_string(),
            }),
        }
    }

    /// Cached workspace definition, fetched from the server on first use.
    pub(crate) async fn definition(
        &self,
        name: &str,
        owner: &str,
    ) -> Result<Option<Arc<WorkspaceDefinition>>, SessionError> {
        self.ensure_open()?;

        let key = WorkspaceKey::new(name, owner);
        if let Some(definition) = self.workspaces.read().await.get(&key) {
            debug!("Workspace {};{} served from session cache", name, owner);
            return Ok(Some(definition.clone()));
        }

        let input = format!("{name};{owner}");
        let lease = self.lease("get_workspace", &input).await?;
        let fetched = lease
            .transport()
            .get_workspace(&self.token, name, owner)
            .await
            .map_err(|source| SessionError::Transport {
                operation: "get_workspace",
                input,
                source,
            })?;
        lease.release();

        let Some(definition) = fetched else {
            debug!("Server has no workspace {};{}", name, owner);
            return Ok(None);
        };

        let definition = Arc::new(definition);
        self.workspaces
            .write()
            .await
            .insert(key, definition.clone());
        info!(
            "Fetched workspace {};{} with {} working folders",
            definition.name,
            definition.owner,
            definition.folders.len()
        );
        Ok(Some(definition))
    }

    /// Fetch one page of pending sets. `input` names the queried item in errors.
    pub(crate) async fn fetch_page(
        &self,
        query: &PendingSetQuery,
        continuation: Option<String>,
        input: &str,
    ) -> Result<PendingSetPage, SessionError> {
        self.ensure_open()?;

        let lease = self.lease("query_pending_sets", input).await?;
        let page = lease
            .transport()
            .query_pending_sets(&self.token, query, continuation)
            .await
            .map_err(|source| SessionError::Transport {
                operation: "query_pending_sets",
                input: input.to_string(),
                source,
            })?;
        lease.release();

        debug!(
            "Fetched page for {} with {} pending sets (more: {})",
            input,
            page.pending_sets.len(),
            page.continuation_token.is_some()
        );
        Ok(page)
    }

    /// Tear down the connection pool; later operations fail with `Closed`.
    pub async fn disconnect(&self) {
        self.pool.close();
        self.workspaces.write().await.clear();
        info!("Session {} to {} disconnected", self.id, self.server_uri);
    }

    fn handle(&self, definition: Arc<WorkspaceDefinition>) -> WorkspaceHandle {
        WorkspaceHandle::new(self.id, self.server_uri.clone(), definition)
    }

    async fn lease(
        &self,
        operation: &'static str,
        input: &str,
    ) -> Result<PooledConnection, SessionError> {
        self.pool.acquire().await.map_err(|e| match e {
            AcquireError::Closed => SessionError::Closed {
                server: self.server_uri.clone(),
            },
            AcquireError::Connect(source) => SessionError::Transport {
                operation,
                input: input.to_string(),
                source,
            },
        })
    }
}

fn connect_error(server: &Url, source: TransportError) -> SessionError {
    if source.is_unauthorized() {
        SessionError::Authentication {
            server: server.clone(),
            source,
        }
    } else {
        SessionError::UnreachableServer {
            server: server.clone(),
            source,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{LocalWorkspaceInfo, ServerPath, WorkingFolder};
    use crate::transport::{MockTransport, Transport};
    use std::path::PathBuf;

    fn server() -> Url {
        Url::parse("https://tfs.example.com/tfs/DefaultCollection").unwrap()
    }

    fn registry() -> Arc<LocalWorkspaceRegistry> {
        Arc::new(LocalWorkspaceRegistry::from_entries(vec![
            LocalWorkspaceInfo::new("/repo", server(), "W1", "alice"),
            LocalWorkspaceInfo::new(
                "/foreign",
                Url::parse("https://other.example.com/tfs").unwrap(),
                "W9",
                "alice",
            ),
        ]))
    }

    fn definition() -> WorkspaceDefinition {
        WorkspaceDefinition {
            name: "W1".to_string(),
            owner: "alice".to_string(),
            computer: Some("DEVBOX".to_string()),
            comment: None,
            folders: vec![WorkingFolder::map(
                ServerPath::parse("$/Project").unwrap(),
                "/repo",
            )],
        }
    }

    fn connector(mock: MockTransport) -> Arc<dyn Connector> {
        let transport: Arc<dyn Transport> = Arc::new(mock);
        Arc::new(move |_: &Url| -> Result<Arc<dyn Transport>, TransportError> {
            Ok(transport.clone())
        })
    }

    async fn connect(mock: MockTransport) -> Result<Arc<ServerSession>, SessionError> {
        ServerSession::connect(
            server(),
            Credentials::username_password("alice", "secret"),
            registry(),
            connector(mock),
            SessionSettings::default(),
        )
        .await
    }

    fn authenticating_mock() -> MockTransport {
        let mut mock = MockTransport::new();
        mock.expect_authenticate()
            .returning(|_| Ok(SessionToken::new("token")));
        mock
    }

    #[tokio::test]
    async fn test_rejected_credentials_fail_with_authentication_error() {
        let mut mock = MockTransport::new();
        mock.expect_authenticate()
            .times(1)
            .returning(|_| Err(TransportError::Unauthorized("401".to_string())));

        let err = connect(mock).await.unwrap_err();
        assert!(matches!(err, SessionError::Authentication { .. }));
        assert!(err.is_retryable());
    }

    #[tokio::test]
    async fn test_transport_failure_fails_with_unreachable_server() {
        let mut mock = MockTransport::new();
        mock.expect_authenticate()
            .returning(|_| Err(TransportError::Unreachable("connection refused".to_string())));

        let err = connect(mock).await.unwrap_err();
        assert!(matches!(err, SessionError::UnreachableServer { .. }));
    }

    #[tokio::test]
    async fn test_connector_failure_fails_with_unreachable_server() {
        let connector: Arc<dyn Connector> =
            Arc::new(|_: &Url| -> Result<Arc<dyn Transport>, TransportError> {
                Err(TransportError::Protocol("bad uri".to_string()))
            });
        let err = ServerSession::connect(
            server(),
            Credentials::AnonymousDefault,
            registry(),
            connector,
            SessionSettings::default(),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, SessionError::UnreachableServer { .. }));
    }

    #[tokio::test]
    async fn test_get_workspace_auto_detect_fetches_once() {
        let mut mock = authenticating_mock();
        mock.expect_get_workspace()
            .withf(|_, name, owner| name.eq_ignore_ascii_case("W1") && owner.eq_ignore_ascii_case("alice"))
            .times(1)
            .returning(|_, _, _| Ok(Some(definition())));

        let session = connect(mock).await.unwrap();
        let handle = session
            .get_workspace(Path::new("/repo/src/a.txt"), true)
            .await
            .unwrap();
        assert_eq!(handle.name(), "W1");
        assert_eq!(handle.owner(), "alice");
        assert_eq!(handle.session_id(), session.id());

        // Second lookup is served from the session cache
        let again = session.workspace("w1", "ALICE").await.unwrap();
        assert_eq!(again.mappings().len(), 1);
    }

    #[tokio::test]
    async fn test_get_workspace_missing_on_server() {
        let mut mock = authenticating_mock();
        mock.expect_get_workspace().returning(|_, _, _| Ok(None));

        let session = connect(mock).await.unwrap();
        let err = session
            .get_workspace(Path::new("/repo"), true)
            .await
            .unwrap_err();
        assert!(matches!(err, SessionError::WorkspaceNotFound { .. }));
    }

    #[tokio::test]
    async fn test_get_workspace_unmapped_and_foreign_paths() {
        let session = connect(authenticating_mock()).await.unwrap();

        let err = session
            .get_workspace(Path::new("/unrelated"), true)
            .await
            .unwrap_err();
        assert!(err.is_not_mapped());

        let err = session
            .get_workspace(Path::new("/foreign/a.txt"), true)
            .await
            .unwrap_err();
        assert!(matches!(err, SessionError::WrongServer { .. }));
    }

    #[tokio::test]
    async fn test_get_workspace_without_auto_detect_uses_known_workspaces() {
        let mut mock = authenticating_mock();
        mock.expect_get_workspace()
            .times(1)
            .returning(|_, _, _| Ok(Some(definition())));
        let session = connect(mock).await.unwrap();

        let err = session
            .get_workspace(Path::new("/repo/src"), false)
            .await
            .unwrap_err();
        assert!(err.is_not_mapped());

        session.workspace("W1", "alice").await.unwrap();
        let handle = session
            .get_workspace(Path::new("/repo/src"), false)
            .await
            .unwrap();
        assert_eq!(
            handle.server_path_for_local(&PathBuf::from("/repo/src")),
            Some(ServerPath::parse("$/Project/src").unwrap())
        );
    }

    #[tokio::test]
    async fn test_disconnect_closes_session() {
        let session = connect(authenticating_mock()).await.unwrap();
        assert_eq!(session.state(), ConnectionState::Connected);

        session.disconnect().await;
        assert_eq!(session.state(), ConnectionState::Closed);

        let err = session.workspace("W1", "alice").await.unwrap_err();
        assert!(matches!(err, SessionError::Closed { .. }));
    }
}
