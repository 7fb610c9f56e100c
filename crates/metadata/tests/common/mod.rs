use coffer_metadata::UserModel;
use coffer_storage::{LockPolicy, MemoryBlobStore, SpyBlobStore};
use std::sync::Arc;
use std::time::Duration;

pub fn fast_policy() -> LockPolicy {
    LockPolicy::new(5, Duration::from_millis(5))
}

/// A memory store wrapped in a spy.
pub fn spy_store(name: &str) -> Arc<SpyBlobStore> {
    Arc::new(SpyBlobStore::new(Arc::new(MemoryBlobStore::new(
        name,
        fast_policy(),
    ))))
}

#[allow(dead_code)]
pub fn user(name: &str, access: &[&str]) -> UserModel {
    UserModel {
        name: name.to_string(),
        email: format!("{name}@example.com"),
        password: "$argon2id$v=19$m=19456,t=2,p=1$c2FsdA$aGFzaA".to_string(),
        is_admin: false,
        access: access.iter().map(|s| s.to_string()).collect(),
    }
}

#[allow(dead_code)]
pub fn labels(v: &[&str]) -> Vec<String> {
    v.iter().map(|s| s.to_string()).collect()
}
