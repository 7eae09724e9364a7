// ABOUTME: Core data models for workspaces, server item paths, credentials and pending changes

pub mod credentials;
pub mod item_path;
pub mod pending_change;
pub mod workspace;

pub use credentials::Credentials;
pub use item_path::{is_server_item, RecursionType, ServerPath, ServerPathError};
pub use pending_change::{
    ChangeSummary, ChangeType, ItemType, LockLevel, PendingChange, PendingSet, PendingSetPage,
};
pub use workspace::{
    normalize_local_path, same_server, LocalWorkspaceInfo, WorkingFolder, WorkingFolderKind,
    WorkspaceDefinition, WorkspaceHandle, WorkspaceKey,
};
