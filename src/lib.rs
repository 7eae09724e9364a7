// ABOUTME: Library crate for a TFVC client core: local workspace registry, server sessions,
// workspace handles and the pending-change query engine

pub mod client;
pub mod config;
pub mod logging;
pub mod models;
pub mod query;
pub mod registry;
pub mod session;
pub mod transport;

pub use client::TfvcClient;
pub use config::ClientConfig;
pub use models::{
    ChangeType, Credentials, PendingChange, RecursionType, ServerPath, WorkspaceHandle,
};
pub use query::{query_pending_changes, PendingChangeQuery, PendingChangeStream, QueryPath};
pub use registry::{LocalWorkspaceRegistry, RegistryError};
pub use session::{ServerSession, SessionError, SessionManager};
pub use transport::{Connector, Transport, TransportError};
