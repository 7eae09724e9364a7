// ABOUTME: In-memory project collection used by the integration tests
// Serves workspaces and paged pending sets, with switches for rejected logins and failing, stalled or out-of-order pages

#![allow(dead_code)]

use async_trait::async_trait;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tfvc_client::models::{
    ChangeType, ItemType, LocalWorkspaceInfo, PendingChange, PendingSet, PendingSetPage,
    WorkingFolder, WorkspaceDefinition,
};
use tfvc_client::session::SessionSettings;
use tfvc_client::transport::{PendingSetQuery, SessionToken};
use tfvc_client::{
    Connector, Credentials, LocalWorkspaceRegistry, ServerPath, SessionManager, Transport,
    TransportError,
};
use url::Url;

pub const REJECTED_PASSWORD: &str = "wrong";

pub fn server_uri() -> Url {
    Url::parse("https://tfs.example.com/tfs/DefaultCollection").unwrap()
}

pub fn path(raw: &str) -> ServerPath {
    ServerPath::parse(raw).unwrap()
}

pub fn change(item: &str, local: &str, change_type: ChangeType) -> PendingChange {
    PendingChange::new(path(item), local, change_type, ItemType::File)
}

pub fn workspace(name: &str, owner: &str, mappings: &[(&str, &str)]) -> WorkspaceDefinition {
    WorkspaceDefinition {
        name: name.to_string(),
        owner: owner.to_string(),
        computer: Some("DEVBOX".to_string()),
        comment: None,
        folders: mappings
            .iter()
            .map(|(server, local)| WorkingFolder::map(path(server), *local))
            .collect(),
    }
}

#[derive(Default)]
pub struct FakeServer {
    workspaces: Mutex<Vec<WorkspaceDefinition>>,
    changes: Mutex<Vec<(String, String, PendingChange)>>,
    fail_on_page: Mutex<Option<usize>>,
    stall_on_page: Mutex<Option<usize>>,
    descending_pages: AtomicBool,
    pages_served: AtomicUsize,
    connections: AtomicUsize,
}

impl FakeServer {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn add_workspace(&self, definition: WorkspaceDefinition) {
        self.workspaces.lock().unwrap().push(definition);
    }

    pub fn add_change(&self, workspace: &str, owner: &str, change: PendingChange) {
        self.changes
            .lock()
            .unwrap()
            .push((workspace.to_string(), owner.to_string(), change));
    }

    /// Fail the `n`th page request (1-based) with an unreachable-server error.
    pub fn fail_on_page(&self, n: usize) {
        *self.fail_on_page.lock().unwrap() = Some(n);
    }

    /// Never answer the `n`th page request (1-based).
    pub fn stall_on_page(&self, n: usize) {
        *self.stall_on_page.lock().unwrap() = Some(n);
    }

    /// Serve pages in descending item order, as a misbehaving server would.
    pub fn serve_descending_pages(&self) {
        self.descending_pages.store(true, Ordering::SeqCst);
    }

    pub fn pages_served(&self) -> usize {
        self.pages_served.load(Ordering::SeqCst)
    }

    pub fn connections(&self) -> usize {
        self.connections.load(Ordering::SeqCst)
    }

    pub fn connector(self: &Arc<Self>) -> Arc<dyn Connector> {
        let server = self.clone();
        Arc::new(move |_: &Url| -> Result<Arc<dyn Transport>, TransportError> {
            server.connections.fetch_add(1, Ordering::SeqCst);
            let transport: Arc<dyn Transport> = server.clone();
            Ok(transport)
        })
    }
}

#[async_trait]
impl Transport for FakeServer {
    async fn authenticate(&self, credentials: &Credentials) -> Result<SessionToken, TransportError> {
        match credentials {
            Credentials::UsernamePassword { password, .. } if password == REJECTED_PASSWORD => {
                Err(TransportError::Unauthorized("TF30063: not authorized".to_string()))
            }
            _ => Ok(SessionToken::new("fake-token")),
        }
    }

    async fn get_workspace(
        &self,
        _token: &SessionToken,
        name: &str,
        owner: &str,
    ) -> Result<Option<WorkspaceDefinition>, TransportError> {
        Ok(self
            .workspaces
            .lock()
            .unwrap()
            .iter()
            .find(|w| w.is_named(name, owner))
            .cloned())
    }

    async fn query_pending_sets(
        &self,
        _token: &SessionToken,
        query: &PendingSetQuery,
        continuation: Option<String>,
    ) -> Result<PendingSetPage, TransportError> {
        let served = self.pages_served.fetch_add(1, Ordering::SeqCst) + 1;
        if *self.fail_on_page.lock().unwrap() == Some(served) {
            return Err(TransportError::Unreachable("connection reset".to_string()));
        }
        let stall = *self.stall_on_page.lock().unwrap() == Some(served);
        if stall {
            std::future::pending::<()>().await;
        }

        let mut matching: Vec<(String, String, PendingChange)> = self
            .changes
            .lock()
            .unwrap()
            .iter()
            .filter(|(workspace, owner, _)| {
                query
                    .workspace_names
                    .iter()
                    .any(|n| n.eq_ignore_ascii_case(workspace))
                    && query.owners.iter().any(|o| o.eq_ignore_ascii_case(owner))
            })
            .filter(|(_, _, change)| {
                query
                    .item_specs
                    .iter()
                    .any(|spec| spec.recursion.includes(&spec.item, &change.server_item))
            })
            .filter(|(_, _, change)| query.include_deleted || !change.is_deleted_item())
            .cloned()
            .collect();
        matching.sort_by(|a, b| a.2.sort_key().cmp(&b.2.sort_key()));
        if self.descending_pages.load(Ordering::SeqCst) {
            matching.reverse();
        }

        let offset: usize = continuation
            .map(|token| token.parse())
            .transpose()
            .map_err(|_| TransportError::Protocol("bad continuation token".to_string()))?
            .unwrap_or(0);
        let page_size = query.page_size.max(1) as usize;
        let end = (offset + page_size).min(matching.len());

        let mut pending_sets: Vec<PendingSet> = Vec::new();
        for (workspace, owner, change) in matching[offset.min(end)..end].iter().cloned() {
            match pending_sets
                .iter_mut()
                .find(|set| set.name == workspace && set.owner == owner)
            {
                Some(set) => set.pending_changes.push(change),
                None => pending_sets.push(PendingSet {
                    name: workspace,
                    owner,
                    computer: Some("DEVBOX".to_string()),
                    pending_changes: vec![change],
                }),
            }
        }

        Ok(PendingSetPage {
            pending_sets,
            continuation_token: (end < matching.len()).then(|| end.to_string()),
        })
    }
}

/// `/repo` maps `$/Project` in workspace W1 owned by alice.
pub fn standard_server() -> Arc<FakeServer> {
    let server = FakeServer::new();
    server.add_workspace(workspace("W1", "alice", &[("$/Project", "/repo")]));
    server
}

pub fn standard_registry() -> LocalWorkspaceRegistry {
    LocalWorkspaceRegistry::from_entries(vec![LocalWorkspaceInfo::new(
        PathBuf::from("/repo"),
        server_uri(),
        "W1",
        "alice",
    )])
}

pub fn manager(server: &Arc<FakeServer>, page_size: u32) -> Arc<SessionManager> {
    manager_with(
        server,
        SessionSettings {
            max_connections: 2,
            page_size,
        },
    )
}

pub fn manager_with(server: &Arc<FakeServer>, settings: SessionSettings) -> Arc<SessionManager> {
    Arc::new(SessionManager::new(
        Arc::new(standard_registry()),
        server.connector(),
        settings,
    ))
}
