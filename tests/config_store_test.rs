//! Tests for configuration loading and the file session store.

use std::fs;

use escape_room::{ClientConfig, FileSessionStore};
use escape_room_session::{KeyValueStore, PersistedSession, SESSION_KEY, User, UserId};
use tempfile::TempDir;

#[test]
fn test_config_from_file_applies_defaults() {
    let dir = TempDir::new().expect("Failed to create temp dir");
    let path = dir.path().join("client.toml");
    fs::write(&path, "api_url = \"http://rooms.example:9000\"\n").expect("Write failed");

    let config = ClientConfig::from_file(&path).expect("Load failed");
    assert_eq!(config.api_url(), "http://rooms.example:9000");
    assert_eq!(*config.timeout_secs(), 30);
    assert_eq!(
        config.session_file(),
        &std::path::PathBuf::from("escape_room_session.json")
    );
}

#[test]
fn test_config_from_file_reads_all_fields() {
    let dir = TempDir::new().expect("Failed to create temp dir");
    let path = dir.path().join("client.toml");
    fs::write(
        &path,
        r#"api_url = "https://rooms.example"
timeout_secs = 5
session_file = "/tmp/session.json"
"#,
    )
    .expect("Write failed");

    let config = ClientConfig::from_file(&path).expect("Load failed");
    assert_eq!(*config.timeout_secs(), 5);
    assert_eq!(
        config.session_file(),
        &std::path::PathBuf::from("/tmp/session.json")
    );
}

#[test]
fn test_config_missing_file_fails() {
    let result = ClientConfig::from_file("/this/path/does/not/exist/client.toml");
    assert!(result.is_err());
}

#[test]
fn test_config_invalid_toml_fails() {
    let dir = TempDir::new().expect("Failed to create temp dir");
    let path = dir.path().join("client.toml");
    fs::write(&path, "timeout_secs = \"soon\"").expect("Write failed");

    let err = ClientConfig::from_file(&path).unwrap_err();
    assert!(err.message.contains("Failed to parse config"));

    let boxed: Box<dyn std::error::Error> = Box::new(err);
    assert!(boxed.to_string().starts_with("Config error: Failed to parse config"));
}

#[test]
fn test_url_override() {
    let config = ClientConfig::default()
        .override_api_url(Some(" https://other.example ".into()))
        .expect("Override failed");
    assert_eq!(config.api_url(), "https://other.example");

    let unchanged = ClientConfig::default()
        .override_api_url(Some(String::new()))
        .expect("Override failed");
    assert_eq!(unchanged.api_url(), "http://localhost:8000");

    assert!(
        ClientConfig::default()
            .override_api_url(Some("ftp://nope".into()))
            .is_err()
    );
}

#[test]
fn test_store_missing_file_reads_empty() {
    let dir = TempDir::new().expect("Failed to create temp dir");
    let store = FileSessionStore::new(dir.path().join("session.json"));
    assert!(store.get(SESSION_KEY).expect("Get failed").is_none());
    store.remove(SESSION_KEY).expect("Remove of missing key failed");
}

#[test]
fn test_store_creates_parent_dirs_and_persists_session() {
    let dir = TempDir::new().expect("Failed to create temp dir");
    let path = dir.path().join("nested").join("session.json");
    let user = User::new(UserId(7), "a".into(), "a@x.com".into());

    {
        let store = FileSessionStore::new(&path);
        PersistedSession::new(Some(user.clone()))
            .save(&store)
            .expect("Save failed");
    }

    let reopened = FileSessionStore::new(&path);
    let loaded = PersistedSession::load(&reopened).expect("Load failed");
    assert_eq!(loaded.user(), &Some(user));
}

#[test]
fn test_store_keeps_other_keys() {
    let dir = TempDir::new().expect("Failed to create temp dir");
    let store = FileSessionStore::new(dir.path().join("session.json"));
    store.set("theme", "space").expect("Set failed");
    store.set(SESSION_KEY, "{}").expect("Set failed");
    store.remove(SESSION_KEY).expect("Remove failed");

    assert_eq!(store.get("theme").expect("Get failed").as_deref(), Some("space"));
    assert!(store.get(SESSION_KEY).expect("Get failed").is_none());
}

#[test]
fn test_store_corrupt_file_reads_empty_and_is_replaced() {
    let dir = TempDir::new().expect("Failed to create temp dir");
    let path = dir.path().join("session.json");
    fs::write(&path, "{truncated").expect("Write failed");

    let store = FileSessionStore::new(&path);
    let loaded = PersistedSession::load(&store).expect("Load failed");
    assert!(loaded.user().is_none());

    let user = User::new(UserId(7), "a".into(), "a@x.com".into());
    PersistedSession::new(Some(user.clone()))
        .save(&store)
        .expect("Save failed");

    let reloaded = PersistedSession::load(&FileSessionStore::new(&path)).expect("Reload failed");
    assert_eq!(reloaded.user(), &Some(user));
}
