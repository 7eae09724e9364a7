// ABOUTME: Error types for local workspace cache lookups

use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("No workspace mapping covers {}", path.display())]
    NotMapped { path: PathBuf },

    #[error("Workspace lookup requires an absolute path: {}", path.display())]
    RelativePath { path: PathBuf },

    #[error("Failed to read workspace cache {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse workspace cache {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}
