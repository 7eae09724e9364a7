// ABOUTME: Workspace data models: cached local workspace info, server-side definitions and handles
// Translates between local paths and server items through the workspace's working folders

use super::item_path::ServerPath;
use serde::{Deserialize, Serialize};
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;
use url::Url;
use uuid::Uuid;

/// Lexically normalizes a local path: `.` is dropped and `..` pops a component.
/// The filesystem is never touched.
pub fn normalize_local_path(path: &Path) -> PathBuf {
    let mut normalized = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => match normalized.components().next_back() {
                Some(Component::Normal(_)) => {
                    normalized.pop();
                }
                Some(Component::RootDir | Component::Prefix(_)) => {}
                _ => normalized.push(component),
            },
            other => normalized.push(other),
        }
    }
    normalized
}

/// Compares server URIs ignoring a trailing slash.
pub fn same_server(a: &Url, b: &Url) -> bool {
    a.as_str().trim_end_matches('/') == b.as_str().trim_end_matches('/')
}

/// An entry of the machine-local workspace cache.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LocalWorkspaceInfo {
    pub local_path: PathBuf,
    pub server_uri: Url,
    pub workspace_name: String,
    pub owner_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub computer: Option<String>,
}

impl LocalWorkspaceInfo {
    pub fn new(
        local_path: impl Into<PathBuf>,
        server_uri: Url,
        workspace_name: impl Into<String>,
        owner_name: impl Into<String>,
    ) -> Self {
        Self {
            local_path: local_path.into(),
            server_uri,
            workspace_name: workspace_name.into(),
            owner_name: owner_name.into(),
            computer: None,
        }
    }

    pub fn key(&self) -> WorkspaceKey {
        WorkspaceKey::new(&self.workspace_name, &self.owner_name)
    }
}

/// Case-insensitive `(name, owner)` identity of a workspace on one server.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct WorkspaceKey {
    name: String,
    owner: String,
}

impl WorkspaceKey {
    pub fn new(name: &str, owner: &str) -> Self {
        Self {
            name: name.to_lowercase(),
            owner: owner.to_lowercase(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum WorkingFolderKind {
    #[default]
    Map,
    Cloak,
}

/// One `(server item, local item)` mapping of a workspace.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkingFolder {
    pub server_item: ServerPath,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub local_item: Option<PathBuf>,
    #[serde(default)]
    pub kind: WorkingFolderKind,
}

impl WorkingFolder {
    pub fn map(server_item: ServerPath, local_item: impl Into<PathBuf>) -> Self {
        Self {
            server_item,
            local_item: Some(local_item.into()),
            kind: WorkingFolderKind::Map,
        }
    }

    pub fn cloak(server_item: ServerPath) -> Self {
        Self {
            server_item,
            local_item: None,
            kind: WorkingFolderKind::Cloak,
        }
    }

    fn mapped_local(&self) -> Option<&Path> {
        match self.kind {
            WorkingFolderKind::Map => self.local_item.as_deref(),
            WorkingFolderKind::Cloak => None,
        }
    }
}

/// The authoritative, server-side definition of a workspace.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkspaceDefinition {
    pub name: String,
    pub owner: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub computer: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
    #[serde(default)]
    pub folders: Vec<WorkingFolder>,
}

impl WorkspaceDefinition {
    pub fn key(&self) -> WorkspaceKey {
        WorkspaceKey::new(&self.name, &self.owner)
    }

    pub fn is_named(&self, name: &str, owner: &str) -> bool {
        self.key() == WorkspaceKey::new(name, owner)
    }

    pub fn is_cloaked(&self, server_item: &ServerPath) -> bool {
        self.folders.iter().any(|folder| {
            folder.kind == WorkingFolderKind::Cloak
                && (server_item.same_item(&folder.server_item)
                    || server_item.is_descendant_of(&folder.server_item))
        })
    }

    /// Server item for a local path; the deepest mapped local folder wins.
    pub fn server_path_for_local(&self, local_path: &Path) -> Option<ServerPath> {
        let local_path = normalize_local_path(local_path);

        let (folder, local_root) = self
            .folders
            .iter()
            .filter_map(|folder| folder.mapped_local().map(|local| (folder, local)))
            .filter(|(_, local)| local_path.starts_with(local))
            .max_by_key(|(_, local)| local.components().count())?;

        let relative = local_path
            .strip_prefix(local_root)
            .ok()?
            .components()
            .map(|c| c.as_os_str().to_string_lossy().into_owned())
            .collect::<Vec<_>>()
            .join("/");

        let server_item = if relative.is_empty() {
            folder.server_item.clone()
        } else {
            folder.server_item.join(&relative).ok()?
        };

        if self.is_cloaked(&server_item) {
            return None;
        }
        Some(server_item)
    }

    /// Local path for a server item; the deepest mapped server folder wins.
    pub fn local_path_for_server(&self, server_item: &ServerPath) -> Option<PathBuf> {
        if self.is_cloaked(server_item) {
            return None;
        }

        let (folder, local_root) = self
            .folders
            .iter()
            .filter_map(|folder| folder.mapped_local().map(|local| (folder, local)))
            .filter(|(folder, _)| {
                server_item.same_item(&folder.server_item)
                    || server_item.is_descendant_of(&folder.server_item)
            })
            .max_by_key(|(folder, _)| folder.server_item.depth())?;

        let relative = server_item.relative_to(&folder.server_item)?;
        let mut local = local_root.to_path_buf();
        for segment in relative.split('/').filter(|s| !s.is_empty()) {
            local.push(segment);
        }
        Some(local)
    }

    /// True when `local_path` lies under a mapped, non-cloaked working folder.
    pub fn maps_local_path(&self, local_path: &Path) -> bool {
        self.server_path_for_local(local_path).is_some()
    }

    /// Depth of the deepest mapped local folder containing `local_path`.
    pub(crate) fn mapping_depth(&self, local_path: &Path) -> Option<usize> {
        let local_path = normalize_local_path(local_path);
        self.folders
            .iter()
            .filter_map(WorkingFolder::mapped_local)
            .filter(|local| local_path.starts_with(local))
            .map(|local| local.components().count())
            .max()
    }
}

/// A workspace bound to the session that fetched it.
///
/// The handle refers to its session by id; the `SessionManager` resolves it.
#[derive(Debug, Clone)]
pub struct WorkspaceHandle {
    session_id: Uuid,
    server_uri: Url,
    definition: Arc<WorkspaceDefinition>,
}

impl WorkspaceHandle {
    pub(crate) fn new(session_id: Uuid, server_uri: Url, definition: Arc<WorkspaceDefinition>) -> Self {
        Self {
            session_id,
            server_uri,
            definition,
        }
    }

    pub fn session_id(&self) -> Uuid {
        self.session_id
    }

    pub fn server_uri(&self) -> &Url {
        &self.server_uri
    }

    pub fn name(&self) -> &str {
        &self.definition.name
    }

    pub fn owner(&self) -> &str {
        &self.definition.owner
    }

    pub fn mappings(&self) -> &[WorkingFolder] {
        &self.definition.folders
    }

    pub fn definition(&self) -> &WorkspaceDefinition {
        &self.definition
    }

    pub fn server_path_for_local(&self, local_path: &Path) -> Option<ServerPath> {
        self.definition.server_path_for_local(local_path)
    }

    pub fn local_path_for_server(&self, server_item: &ServerPath) -> Option<PathBuf> {
        self.definition.local_path_for_server(server_item)
    }
}
