// ABOUTME: Pending-change query arguments: workspaces, owners, paths and recursion

use crate::models::{is_server_item, RecursionType, ServerPath, ServerPathError, WorkspaceHandle};
use std::collections::BTreeSet;
use std::fmt;
use std::path::{Path, PathBuf};

/// A queried item: a server item or a local path mapped by one of the workspaces.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueryPath {
    Server(ServerPath),
    Local(PathBuf),
}

impl QueryPath {
    /// Parse `$/...` as a server item, anything else as a local path.
    pub fn parse(raw: &str) -> Result<Self, ServerPathError> {
        if is_server_item(raw) {
            ServerPath::parse(raw).map(Self::Server)
        } else {
            Ok(Self::Local(PathBuf::from(raw)))
        }
    }
}

impl fmt::Display for QueryPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Server(path) => write!(f, "{path}"),
            Self::Local(path) => write!(f, "{}", path.display()),
        }
    }
}

impl From<ServerPath> for QueryPath {
    fn from(path: ServerPath) -> Self {
        Self::Server(path)
    }
}

impl From<PathBuf> for QueryPath {
    fn from(path: PathBuf) -> Self {
        Self::Local(path)
    }
}

impl From<&Path> for QueryPath {
    fn from(path: &Path) -> Self {
        Self::Local(path.to_path_buf())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingChangeQuery {
    pub workspace_names: BTreeSet<String>,
    pub owners: BTreeSet<String>,
    pub paths: Vec<QueryPath>,
    pub recursion: RecursionType,
    pub include_deleted: bool,
}

impl PendingChangeQuery {
    pub fn new<N, O, P>(
        workspace_names: impl IntoIterator<Item = N>,
        owners: impl IntoIterator<Item = O>,
        paths: impl IntoIterator<Item = P>,
        recursion: RecursionType,
    ) -> Self
    where
        N: Into<String>,
        O: Into<String>,
        P: Into<QueryPath>,
    {
        Self {
            workspace_names: workspace_names.into_iter().map(Into::into).collect(),
            owners: owners.into_iter().map(Into::into).collect(),
            paths: paths.into_iter().map(Into::into).collect(),
            recursion,
            include_deleted: false,
        }
    }

    /// Query scoped to a single workspace handle.
    pub fn for_workspace<P: Into<QueryPath>>(
        workspace: &WorkspaceHandle,
        paths: impl IntoIterator<Item = P>,
        recursion: RecursionType,
    ) -> Self {
        Self::new([workspace.name()], [workspace.owner()], paths, recursion)
    }

    pub fn include_deleted(mut self, include_deleted: bool) -> Self {
        self.include_deleted = include_deleted;
        self
    }
}
