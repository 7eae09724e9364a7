// ABOUTME: Local workspace cache loaded from disk and queried by filesystem path
// Lookups walk from a path up through its ancestors; the deepest cached entry wins

use super::error::RegistryError;
use crate::models::{normalize_local_path, same_server, LocalWorkspaceInfo, WorkspaceKey};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};
use url::Url;

#[derive(Debug, Default, Serialize, Deserialize)]
struct CacheFile {
    #[serde(default)]
    workspaces: Vec<LocalWorkspaceInfo>,
}

/// Local paths grouped by the workspace that maps them.
#[derive(Debug, Default)]
pub struct PathGrouping {
    pub by_workspace: Vec<(LocalWorkspaceInfo, Vec<PathBuf>)>,
    /// Absolute paths no cached workspace maps.
    pub not_found: Vec<PathBuf>,
    /// Relative paths, which cannot be resolved at all.
    pub invalid: Vec<PathBuf>,
}

/// Read-only view over the machine-local workspace cache.
#[derive(Debug, Clone, Default)]
pub struct LocalWorkspaceRegistry {
    source: Option<PathBuf>,
    entries: BTreeMap<PathBuf, LocalWorkspaceInfo>,
}

impl LocalWorkspaceRegistry {
    /// Load the cache file. A missing file yields an empty registry.
    pub fn load(cache_file: &Path) -> Result<Self, RegistryError> {
        if !cache_file.exists() {
            info!(
                "Workspace cache {} does not exist, starting empty",
                cache_file.display()
            );
            return Ok(Self {
                source: Some(cache_file.to_path_buf()),
                entries: BTreeMap::new(),
            });
        }

        let content = fs::read_to_string(cache_file).map_err(|source| RegistryError::Io {
            path: cache_file.to_path_buf(),
            source,
        })?;
        let parsed: CacheFile =
            serde_json::from_str(&content).map_err(|source| RegistryError::Parse {
                path: cache_file.to_path_buf(),
                source,
            })?;

        let mut registry = Self::from_entries(parsed.workspaces);
        registry.source = Some(cache_file.to_path_buf());

        info!(
            "Loaded {} cached workspace mappings from {}",
            registry.entries.len(),
            cache_file.display()
        );
        Ok(registry)
    }

    pub fn from_entries(entries: impl IntoIterator<Item = LocalWorkspaceInfo>) -> Self {
        let mut map = BTreeMap::new();

        for mut entry in entries {
            if !entry.local_path.is_absolute() {
                warn!(
                    "Skipping cached workspace {} with relative path {}",
                    entry.workspace_name,
                    entry.local_path.display()
                );
                continue;
            }
            entry.local_path = normalize_local_path(&entry.local_path);

            if let Some(previous) = map.insert(entry.local_path.clone(), entry) {
                warn!(
                    "Duplicate cache entry for {}, dropping workspace {}",
                    previous.local_path.display(),
                    previous.workspace_name
                );
            }
        }

        Self {
            source: None,
            entries: map,
        }
    }

    pub fn source(&self) -> Option<&Path> {
        self.source.as_deref()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn workspaces(&self) -> impl Iterator<Item = &LocalWorkspaceInfo> {
        self.entries.values()
    }

    pub fn workspaces_for_server<'a>(
        &'a self,
        server_uri: &'a Url,
    ) -> impl Iterator<Item = &'a LocalWorkspaceInfo> + 'a {
        self.entries
            .values()
            .filter(move |info| same_server(&info.server_uri, server_uri))
    }

    /// Resolve the workspace whose cached path is the deepest ancestor of `path`.
    pub fn resolve(&self, path: &Path) -> Result<LocalWorkspaceInfo, RegistryError> {
        if !path.is_absolute() {
            return Err(RegistryError::RelativePath {
                path: path.to_path_buf(),
            });
        }

        let normalized = normalize_local_path(path);
        for ancestor in normalized.ancestors() {
            if let Some(info) = self.entries.get(ancestor) {
                debug!(
                    "Resolved {} to workspace {};{} at {}",
                    path.display(),
                    info.workspace_name,
                    info.owner_name,
                    ancestor.display()
                );
                return Ok(info.clone());
            }
        }

        Err(RegistryError::NotMapped {
            path: path.to_path_buf(),
        })
    }

    /// Group `paths` by resolved workspace; unmapped and relative paths are collected, not failed.
    pub fn group_by_workspace<P: AsRef<Path>>(
        &self,
        paths: impl IntoIterator<Item = P>,
    ) -> PathGrouping {
        let mut grouping = PathGrouping::default();
        let mut keys: Vec<(WorkspaceKey, Url)> = Vec::new();

        for path in paths {
            let path = path.as_ref();
            match self.resolve(path) {
                Ok(info) => {
                    let key = info.key();
                    let position = keys.iter().position(|(existing, server)| {
                        *existing == key && same_server(server, &info.server_uri)
                    });
                    match position {
                        Some(index) => grouping.by_workspace[index].1.push(path.to_path_buf()),
                        None => {
                            keys.push((key, info.server_uri.clone()));
                            grouping.by_workspace.push((info, vec![path.to_path_buf()]));
                        }
                    }
                }
                Err(RegistryError::RelativePath { .. }) => {
                    grouping.invalid.push(path.to_path_buf());
                }
                Err(_) => grouping.not_found.push(path.to_path_buf()),
            }
        }

        grouping
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    fn server() -> Url {
        Url::parse("https://tfs.example.com/tfs/DefaultCollection").unwrap()
    }

    fn registry() -> LocalWorkspaceRegistry {
        LocalWorkspaceRegistry::from_entries(vec![
            LocalWorkspaceInfo::new("/repo", server(), "W1", "alice"),
            LocalWorkspaceInfo::new("/repo/nested", server(), "W2", "alice"),
            LocalWorkspaceInfo::new("/other", server(), "W3", "bob"),
        ])
    }

    #[test]
    fn test_resolve_walks_up_to_cached_ancestor() {
        let info = registry().resolve(Path::new("/repo/src/deep/a.txt")).unwrap();
        assert_eq!(info.workspace_name, "W1");
    }

    #[test]
    fn test_resolve_prefers_longest_prefix() {
        let registry = registry();
        let info = registry.resolve(Path::new("/repo/nested/src")).unwrap();
        assert_eq!(info.workspace_name, "W2");

        let info = registry.resolve(Path::new("/repo/nested")).unwrap();
        assert_eq!(info.workspace_name, "W2");
    }

    #[test]
    fn test_resolve_normalizes_dot_segments() {
        let info = registry()
            .resolve(Path::new("/repo/nested/../src/./a.txt"))
            .unwrap();
        assert_eq!(info.workspace_name, "W1");
    }

    #[test]
    fn test_resolve_unmapped_path_fails() {
        let err = registry().resolve(Path::new("/unrelated")).unwrap_err();
        assert!(matches!(err, RegistryError::NotMapped { .. }));

        // Sibling with a shared string prefix is not an ancestor match
        let err = registry().resolve(Path::new("/repository/a.txt")).unwrap_err();
        assert!(matches!(err, RegistryError::NotMapped { .. }));
    }

    #[test]
    fn test_resolve_rejects_relative_paths() {
        let err = registry().resolve(Path::new("repo/src")).unwrap_err();
        assert!(matches!(err, RegistryError::RelativePath { .. }));
    }

    #[test]
    fn test_load_missing_file_is_empty() {
        let temp_dir = TempDir::new().unwrap();
        let registry = LocalWorkspaceRegistry::load(&temp_dir.path().join("missing.json")).unwrap();
        assert!(registry.is_empty());
    }

    #[test]
    fn test_load_reads_cache_file() {
        let temp_dir = TempDir::new().unwrap();
        let cache_file = temp_dir.path().join("workspaces.json");
        fs::write(
            &cache_file,
            r#"{
                "workspaces": [
                    {
                        "localPath": "/repo",
                        "serverUri": "https://tfs.example.com/tfs/DefaultCollection",
                        "workspaceName": "W1",
                        "ownerName": "alice",
                        "computer": "DEVBOX"
                    },
                    {
                        "localPath": "relative/path",
                        "serverUri": "https://tfs.example.com/tfs/DefaultCollection",
                        "workspaceName": "Broken",
                        "ownerName": "alice"
                    }
                ]
            }"#,
        )
        .unwrap();

        let registry = LocalWorkspaceRegistry::load(&cache_file).unwrap();
        assert_eq!(registry.workspaces().count(), 1);
        assert_eq!(registry.source(), Some(cache_file.as_path()));

        let info = registry.resolve(Path::new("/repo/src")).unwrap();
        assert_eq!(info.computer.as_deref(), Some("DEVBOX"));
    }

    #[test]
    fn test_load_malformed_file_fails() {
        let temp_dir = TempDir::new().unwrap();
        let cache_file = temp_dir.path().join("workspaces.json");
        fs::write(&cache_file, "{ not json").unwrap();

        let err = LocalWorkspaceRegistry::load(&cache_file).unwrap_err();
        assert!(matches!(err, RegistryError::Parse { .. }));
    }

    #[test]
    fn test_group_by_workspace() {
        let grouping = registry().group_by_workspace([
            "/repo/a.txt",
            "/other/b.txt",
            "/repo/c.txt",
            "/unrelated/d.txt",
        ]);

        assert_eq!(grouping.by_workspace.len(), 2);
        assert_eq!(grouping.by_workspace[0].0.workspace_name, "W1");
        assert_eq!(
            grouping.by_workspace[0].1,
            vec![PathBuf::from("/repo/a.txt"), PathBuf::from("/repo/c.txt")]
        );
        assert_eq!(grouping.by_workspace[1].0.workspace_name, "W3");
        assert_eq!(grouping.not_found, vec![PathBuf::from("/unrelated/d.txt")]);
        assert!(grouping.invalid.is_empty());
    }

    #[test]
    fn test_group_by_workspace_keeps_relative_paths_apart() {
        let grouping = registry().group_by_workspace(["repo/a.txt", "/unrelated/d.txt"]);

        assert!(grouping.by_workspace.is_empty());
        assert_eq!(grouping.not_found, vec![PathBuf::from("/unrelated/d.txt")]);
        assert_eq!(grouping.invalid, vec![PathBuf::from("repo/a.txt")]);
    }

    #[test]
    fn test_workspaces_for_server() {
        let registry = registry();
        let other = Url::parse("https://elsewhere.example.com/").unwrap();
        assert_eq!(registry.workspaces_for_server(&server()).count(), 3);
        assert_eq!(registry.workspaces_for_server(&other).count(), 0);
    }
}
