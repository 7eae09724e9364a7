// ABOUTME: Machine-local workspace registry
// Resolves filesystem paths to the workspaces cached for this computer

pub mod cache;
pub mod error;

pub use cache::{LocalWorkspaceRegistry, PathGrouping};
pub use error::RegistryError;
