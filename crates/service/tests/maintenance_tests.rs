mod common;

use coffer_service::{ServiceError, SweepReport};
use common::harness;

#[tokio::test]
async fn test_csrf_issue_and_verify() {
    let h = harness();
    let token = h.services.csrf.issue("10.0.0.1").await.unwrap();

    h.services.csrf.verify("10.0.0.1", &token).await.unwrap();
    // Tokens survive verification
    h.services.csrf.verify("10.0.0.1", &token).await.unwrap();
    assert!(matches!(
        h.services.csrf.verify("10.0.0.2", &token).await,
        Err(ServiceError::AccessDenied(_))
    ));
    assert!(h.services.csrf.verify("10.0.0.1", "").await.is_err());
}

#[tokio::test]
async fn test_sweep_removes_expired_entries() {
    let h = harness();
    h.repos.sessions.start_at("old", 0).await.unwrap();
    let now = coffer_core::unix_now();
    h.repos.sessions.start_at("fresh", now).await.unwrap();
    h.repos.csrf.add("ip", "stale", 1).await.unwrap();
    h.repos.csrf.add("ip", "live", now + 600).await.unwrap();

    let report = h.services.maintenance.sweep_at(now).await.unwrap();
    assert_eq!(
        report,
        SweepReport {
            sessions_removed: 1,
            csrf_removed: 1
        }
    );
    assert_eq!(
        h.services.maintenance.sweep_at(now).await.unwrap(),
        SweepReport::default()
    );
}

#[tokio::test]
async fn test_sweep_reports_busy_store() {
    use coffer_storage::BlobStore;

    let h = harness();
    h.stores.sessions.lock().await.unwrap();
    let err = h.services.maintenance.sweep().await.unwrap_err();
    assert!(err.is_lock_timeout());
    h.stores.sessions.unlock().await.unwrap();
    h.services.maintenance.sweep().await.unwrap();
}
