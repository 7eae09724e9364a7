// ABOUTME: Registry of live server sessions keyed by session id
// Workspace handles refer to sessions by id; the manager resolves them and tears sessions down

use super::error::SessionError;
use super::server::{ConnectionState, ServerSession, SessionSettings};
use crate::config::ClientConfig;
use crate::models::{same_server, Credentials, WorkspaceHandle};
use crate::registry::LocalWorkspaceRegistry;
use crate::transport::{Connector, HttpConnector};
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::info;
use url::Url;
use uuid::Uuid;

pub struct SessionManager {
    sessions: RwLock<HashMap<Uuid, Arc<ServerSession>>>,
    registry: Arc<LocalWorkspaceRegistry>,
    connector: Arc<dyn Connector>,
    settings: SessionSettings,
}

impl SessionManager {
    pub fn new(
        registry: Arc<LocalWorkspaceRegistry>,
        connector: Arc<dyn Connector>,
        settings: SessionSettings,
    ) -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            registry,
            connector,
            settings,
        }
    }

    /// Build a manager that talks HTTP and reads the configured workspace cache.
    pub fn from_config(config: &ClientConfig) -> Result<Self, SessionError> {
        let registry = LocalWorkspaceRegistry::load(&config.cache_file_path())?;
        let connector = HttpConnector::new(config.transport.clone());
        Ok(Self::new(
            Arc::new(registry),
            Arc::new(connector),
            SessionSettings::from(config),
        ))
    }

    pub fn registry(&self) -> &Arc<LocalWorkspaceRegistry> {
        &self.registry
    }

    /// Connect to `server_uri`, reusing a live session opened with the same credentials.
    pub async fn connect(
        &self,
        server_uri: &Url,
        credentials: Credentials,
    ) -> Result<Arc<ServerSession>, SessionError> {
        let reusable = Self::find_live(&*self.sessions.read().await, server_uri, &credentials);
        if let Some(session) = reusable {
            info!("Reusing session {} for {}", session.id(), server_uri);
            return Ok(session);
        }

        // Authenticate without holding the map: other servers' sessions stay reachable
        let session = ServerSession::connect(
            server_uri.clone(),
            credentials,
            self.registry.clone(),
            self.connector.clone(),
            self.settings,
        )
        .await?;

        let mut sessions = self.sessions.write().await;
        if let Some(existing) = Self::find_live(&sessions, server_uri, session.credentials()) {
            drop(sessions);
            info!(
                "Session {} for {} was opened concurrently, dropping {}",
                existing.id(),
                server_uri,
                session.id()
            );
            session.disconnect().await;
            return Ok(existing);
        }
        sessions.insert(session.id(), session.clone());
        Ok(session)
    }

    fn find_live(
        sessions: &HashMap<Uuid, Arc<ServerSession>>,
        server_uri: &Url,
        credentials: &Credentials,
    ) -> Option<Arc<ServerSession>> {
        sessions
            .values()
            .find(|session| {
                session.state() == ConnectionState::Connected
                    && same_server(session.server_uri(), server_uri)
                    && session.credentials() == credentials
            })
            .cloned()
    }

    /// Resolve `path` through the registry, connect to its server and fetch its workspace.
    pub async fn open_workspace(
        &self,
        path: &Path,
        credentials: Credentials,
    ) -> Result<(Arc<ServerSession>, WorkspaceHandle), SessionError> {
        let info = self.registry.resolve(path)?;
        let session = self.connect(&info.server_uri, credentials).await?;
        let workspace = session.get_workspace(path, true).await?;
        Ok((session, workspace))
    }

    pub async fn get_session(&self, session_id: Uuid) -> Option<Arc<ServerSession>> {
        self.sessions.read().await.get(&session_id).cloned()
    }

    pub async fn get_sessions(&self) -> Vec<Arc<ServerSession>> {
        self.sessions.read().await.values().cloned().collect()
    }

    /// The live session behind a workspace handle.
    pub async fn session_for(
        &self,
        workspace: &WorkspaceHandle,
    ) -> Result<Arc<ServerSession>, SessionError> {
        let session = self
            .get_session(workspace.session_id())
            .await
            .ok_or(SessionError::UnknownSession(workspace.session_id()))?;
        session.ensure_open()?;
        Ok(session)
    }

    pub async fn disconnect(&self, session_id: Uuid) -> Result<(), SessionError> {
        let session = self
            .sessions
            .write()
            .await
            .remove(&session_id)
            .ok_or(SessionError::UnknownSession(session_id))?;
        session.disconnect().await;
        Ok(())
    }

    pub async fn disconnect_all(&self) {
        let sessions: Vec<_> = self.sessions.write().await.drain().map(|(_, s)| s).collect();
        for session in sessions {
            session.disconnect().await;
        }
    }
}
