mod common;

use coffer_core::config::AdminConfig;
use coffer_service::{AdminBootstrap, NewUser, ServiceError};
use common::{STRONG, harness, labels};

fn alice() -> NewUser {
    NewUser {
        name: "alice".into(),
        email: "alice@example.com".into(),
        password: STRONG.into(),
        is_admin: false,
        access: labels(&["foo", " bar", "foo"]),
    }
}

#[tokio::test]
async fn test_create_user_normalizes_and_hides_hash() {
    let h = harness();
    let info = h.services.users.create_user(alice()).await.unwrap();
    assert_eq!(info.access, labels(&["foo", "bar"]));

    let stored = h.repos.users.get("alice").await.unwrap();
    assert_eq!(stored.password, format!("plain:{STRONG}"));
}

#[tokio::test]
async fn test_create_user_rejections() {
    let h = harness();
    let weak = NewUser {
        password: "short".into(),
        ..alice()
    };
    assert!(matches!(
        h.services.users.create_user(weak).await,
        Err(ServiceError::WeakPassword(_))
    ));

    let bad_name = NewUser {
        name: "../alice".into(),
        ..alice()
    };
    assert!(matches!(
        h.services.users.create_user(bad_name).await,
        Err(ServiceError::InvalidArgument(_))
    ));

    h.services.users.create_user(alice()).await.unwrap();
    let err = h.services.users.create_user(alice()).await.unwrap_err();
    assert!(err.is_already_exists());
}

#[tokio::test]
async fn test_login_and_authenticate() {
    let h = harness();
    h.services.users.create_user(alice()).await.unwrap();

    let session = h.services.users.login("alice", STRONG).await.unwrap();
    let me = h
        .services
        .users
        .authenticate("alice", &session.token)
        .await
        .unwrap();
    assert_eq!(me.name, "alice");

    assert!(matches!(
        h.services.users.authenticate("alice", "nope").await,
        Err(ServiceError::InvalidCredentials)
    ));
}

#[tokio::test]
async fn test_login_failures_are_indistinguishable() {
    let h = harness();
    h.services.users.create_user(alice()).await.unwrap();

    let wrong = h.services.users.login("alice", "wrong").await.unwrap_err();
    let unknown = h.services.users.login("mallory", STRONG).await.unwrap_err();
    assert!(matches!(wrong, ServiceError::InvalidCredentials));
    assert!(matches!(unknown, ServiceError::InvalidCredentials));
}

#[tokio::test]
async fn test_second_login_invalidates_first() {
    let h = harness();
    h.services.users.create_user(alice()).await.unwrap();

    let first = h.services.users.login("alice", STRONG).await.unwrap();
    let second = h.services.users.login("alice", STRONG).await.unwrap();
    assert!(h.services.users.authenticate("alice", &first.token).await.is_err());
    assert!(h.services.users.authenticate("alice", &second.token).await.is_ok());

    assert!(h.services.users.logout("alice").await.unwrap());
    assert!(h.services.users.authenticate("alice", &second.token).await.is_err());
}

#[tokio::test]
async fn test_change_password_requires_old() {
    let h = harness();
    h.services.users.create_user(alice()).await.unwrap();
    let new = "another-Long-passphrase-7";

    assert!(matches!(
        h.services.users.change_password("alice", "wrong", new).await,
        Err(ServiceError::InvalidCredentials)
    ));
    h.services
        .users
        .change_password("alice", STRONG, new)
        .await
        .unwrap();
    assert!(h.services.users.login("alice", STRONG).await.is_err());
    assert!(h.services.users.login("alice", new).await.is_ok());
}

#[tokio::test]
async fn test_delete_user_ends_session() {
    let h = harness();
    h.services.users.create_user(alice()).await.unwrap();
    let session = h.services.users.login("alice", STRONG).await.unwrap();

    h.services.users.delete_user("alice").await.unwrap();
    assert!(h.services.users.get_user("alice").await.unwrap_err().is_not_found());
    assert!(!h
        .repos
        .sessions
        .check("alice", &session.token)
        .await
        .unwrap());
}

#[tokio::test]
async fn test_ensure_admin() {
    let h = harness();
    let admin = AdminConfig {
        name: "root".into(),
        email: String::new(),
        password_hash: "plain:bootstrap".into(),
    };

    assert_eq!(
        h.services.users.ensure_admin(&admin).await.unwrap(),
        AdminBootstrap::Created
    );
    assert_eq!(
        h.services.users.ensure_admin(&admin).await.unwrap(),
        AdminBootstrap::Unchanged
    );
    h.services.users.demote("root").await.unwrap();
    assert_eq!(
        h.services.users.ensure_admin(&admin).await.unwrap(),
        AdminBootstrap::Promoted
    );
    assert!(h.services.users.login("root", "bootstrap").await.is_ok());
}

#[tokio::test]
async fn test_update_access_and_email() {
    let h = harness();
    h.services.users.create_user(alice()).await.unwrap();

    let access = h
        .services
        .users
        .update_access("alice", &labels(&["ops", "ops", "dev"]))
        .await
        .unwrap();
    assert_eq!(access, labels(&["ops", "dev"]));
    assert!(h
        .services
        .users
        .update_email("alice", "not-an-email")
        .await
        .is_err());
    h.services
        .users
        .update_email("alice", "a@example.org")
        .await
        .unwrap();

    let info = h.services.users.get_user("alice").await.unwrap();
    assert_eq!(info.email, "a@example.org");
    assert_eq!(info.access, labels(&["ops", "dev"]));
}
