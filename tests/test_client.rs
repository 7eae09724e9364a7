// ABOUTME: Integration tests for the client facade and session setup through the session manager

mod common;

use common::{change, manager, standard_server, REJECTED_PASSWORD};
use std::path::Path;
use std::sync::Arc;
use tempfile::TempDir;
use tfvc_client::config::{ClientConfig, CACHE_FILE_ENV};
use tfvc_client::session::{ConnectionState, SessionSettings};
use tfvc_client::{
    ChangeType, Credentials, LocalWorkspaceRegistry, SessionError, SessionManager, TfvcClient,
};

#[tokio::test]
async fn test_client_status_and_summary() {
    let server = standard_server();
    server.add_change("W1", "alice", change("$/Project/b.txt", "/repo/b.txt", ChangeType::Add));
    server.add_change("W1", "alice", change("$/Project/a.txt", "/repo/a.txt", ChangeType::Edit));
    server.add_change("W1", "alice", change("$/Project/src/c.rs", "/repo/src/c.rs", ChangeType::Edit));

    let client = TfvcClient::open_with(
        Path::new("/repo/src"),
        Credentials::username_password("alice", "secret"),
        manager(&server, 2),
    )
    .await
    .unwrap();

    assert_eq!(client.workspace_name(), "W1");
    assert_eq!(client.workspace_owner(), "alice");

    let status = client.status(Path::new("/repo")).await.unwrap();
    let names: Vec<_> = status.iter().map(|c| c.server_item.to_string()).collect();
    assert_eq!(
        names,
        vec!["$/Project/a.txt", "$/Project/b.txt", "$/Project/src/c.rs"]
    );

    let src_only = client.status(Path::new("/repo/src")).await.unwrap();
    assert_eq!(src_only.len(), 1);

    let summary = client.summary(Path::new("/repo")).await.unwrap();
    assert_eq!(summary.format(), "+1 ~2 -0 >0 ^0");

    let session = client.session().clone();
    client.close().await.unwrap();
    assert_eq!(session.state(), ConnectionState::Closed);
}

#[tokio::test]
async fn test_rejected_credentials_leave_no_session() {
    let server = standard_server();
    let manager = manager(&server, 100);

    let err = TfvcClient::open_with(
        Path::new("/repo"),
        Credentials::username_password("alice", REJECTED_PASSWORD),
        manager.clone(),
    )
    .await
    .unwrap_err();

    assert!(matches!(err, SessionError::Authentication { .. }));
    assert!(manager.get_sessions().await.is_empty());
}

#[tokio::test]
async fn test_unmapped_directory_does_not_connect() {
    let server = standard_server();
    let err = TfvcClient::open_with(
        Path::new("/unrelated"),
        Credentials::AnonymousDefault,
        manager(&server, 100),
    )
    .await
    .unwrap_err();

    assert!(err.is_not_mapped());
    assert_eq!(server.connections(), 0);
}

#[tokio::test]
async fn test_missing_workspace_on_server() {
    let server = common::FakeServer::new();
    let err = TfvcClient::open_with(
        Path::new("/repo"),
        Credentials::AnonymousDefault,
        manager(&server, 100),
    )
    .await
    .unwrap_err();

    assert!(matches!(err, SessionError::WorkspaceNotFound { .. }));
}

#[tokio::test]
async fn test_clients_share_one_session_per_server_and_credentials() {
    let server = standard_server();
    let manager = manager(&server, 100);

    let first = TfvcClient::open_with(Path::new("/repo"), Credentials::AnonymousDefault, manager.clone())
        .await
        .unwrap();
    let second = TfvcClient::open_with(Path::new("/repo/src"), Credentials::AnonymousDefault, manager.clone())
        .await
        .unwrap();

    assert_eq!(first.session().id(), second.session().id());
    assert_eq!(manager.get_sessions().await.len(), 1);
}

#[tokio::test]
async fn test_manager_reads_cache_file() {
    let temp = TempDir::new().unwrap();
    let cache_file = temp.path().join("workspaces.json");
    std::fs::write(
        &cache_file,
        r#"{
  "workspaces": [
    {
      "localPath": "/repo",
      "serverUri": "https://tfs.example.com/tfs/DefaultCollection",
      "workspaceName": "W1",
      "ownerName": "alice"
    }
  ]
}"#,
    )
    .unwrap();

    let registry = LocalWorkspaceRegistry::load(&cache_file).unwrap();
    assert_eq!(registry.source(), Some(cache_file.as_path()));

    let server = standard_server();
    let manager = Arc::new(SessionManager::new(
        Arc::new(registry),
        server.connector(),
        SessionSettings::default(),
    ));
    let client = TfvcClient::open_with(Path::new("/repo/a.txt"), Credentials::AnonymousDefault, manager)
        .await
        .unwrap();
    assert_eq!(client.workspace_name(), "W1");
}

#[test]
fn test_config_points_at_cache_file() {
    let temp = TempDir::new().unwrap();
    let config_path = temp.path().join("config.toml");
    std::fs::write(
        &config_path,
        "cache_file = \"/tmp/tfvc/workspaces.json\"\n\n[query]\npage_size = 50\n",
    )
    .unwrap();

    let config = ClientConfig::load_from(&config_path).unwrap();
    assert_eq!(
        config.cache_file_path(),
        std::path::PathBuf::from("/tmp/tfvc/workspaces.json")
    );
    assert_eq!(config.query.page_size, 50);
    assert_eq!(SessionSettings::from(&config).page_size, 50);
    assert_eq!(CACHE_FILE_ENV, "TFVC_CACHE_FILE");
}
