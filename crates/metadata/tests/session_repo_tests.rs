mod common;

use coffer_core::config::SessionConfig;
use coffer_metadata::{JsonSessionRepo, MetadataError, SessionRepo};
use coffer_storage::Op;
use common::spy_store;

fn repo_with_ttl(ttl_secs: u64) -> JsonSessionRepo {
    let config = SessionConfig {
        ttl_secs,
        ..SessionConfig::default()
    };
    JsonSessionRepo::new(spy_store("sessions.json"), &config)
}

#[tokio::test]
async fn test_start_then_check() {
    let repo = repo_with_ttl(1800);
    let session = repo.start_at("alice", 100).await.unwrap();

    assert_eq!(session.expires, 1900);
    assert_eq!(session.hash.len(), 64);
    assert!(repo.check_at("alice", &session.hash, 101).await.unwrap());
    assert!(!repo.check_at("alice", "wrong", 101).await.unwrap());
    assert!(!repo.check_at("bob", &session.hash, 101).await.unwrap());
}

#[tokio::test]
async fn test_expiry_boundary() {
    let repo = repo_with_ttl(900);
    let session = repo.start_at("alice", 100).await.unwrap();
    assert_eq!(session.expires, 1000);

    assert!(repo.check_at("alice", &session.hash, 999).await.unwrap());
    assert!(!repo.check_at("alice", &session.hash, 1000).await.unwrap());
    // Expired sessions are still stored until cleaned up
    assert_eq!(repo.get("alice").await.unwrap(), session);
}

#[tokio::test]
async fn test_restart_replaces_old_token() {
    let repo = repo_with_ttl(1800);
    let first = repo.start_at("alice", 100).await.unwrap();
    let second = repo.start_at("alice", 200).await.unwrap();

    assert_ne!(first.hash, second.hash);
    assert!(!repo.check_at("alice", &first.hash, 201).await.unwrap());
    assert!(repo.check_at("alice", &second.hash, 201).await.unwrap());
}

#[tokio::test]
async fn test_end() {
    let repo = repo_with_ttl(1800);
    let session = repo.start_at("alice", 100).await.unwrap();

    assert!(repo.end("alice").await.unwrap());
    assert!(!repo.end("alice").await.unwrap());
    assert!(!repo.check_at("alice", &session.hash, 101).await.unwrap());
    assert!(matches!(
        repo.get("alice").await,
        Err(MetadataError::NotFound(_))
    ));
}

#[tokio::test]
async fn test_clean_up_is_idempotent() {
    let store = spy_store("sessions.json");
    let config = SessionConfig {
        ttl_secs: 100,
        ..SessionConfig::default()
    };
    let repo = JsonSessionRepo::new(store.clone(), &config);
    repo.start_at("old", 0).await.unwrap();
    repo.start_at("older", 10).await.unwrap();
    let fresh = repo.start_at("fresh", 500).await.unwrap();

    assert_eq!(repo.clean_up_at(300).await.unwrap(), 2);
    store.reset();
    assert_eq!(repo.clean_up_at(300).await.unwrap(), 0);
    assert_eq!(store.calls(Op::WriteLocked), 0);
    assert_eq!(store.calls(Op::Unlock), 1);

    assert!(repo.check_at("fresh", &fresh.hash, 301).await.unwrap());
}
