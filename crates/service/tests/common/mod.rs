use coffer_core::{AppConfig, PasswordHasher, PasswordPolicy};
use coffer_metadata::Repositories;
use coffer_service::Services;
use coffer_storage::{LockPolicy, StoreSet};
use std::sync::Arc;
use std::time::Duration;

/// Reversible hasher so tests do not pay for Argon2.
pub struct PlainHasher;

impl PasswordHasher for PlainHasher {
    fn hash(&self, password: &str) -> coffer_core::Result<String> {
        Ok(format!("plain:{password}"))
    }

    fn check(&self, password: &str, hash: &str) -> coffer_core::Result<()> {
        if hash.strip_prefix("plain:") == Some(password) {
            Ok(())
        } else {
            Err(coffer_core::Error::PasswordMismatch)
        }
    }
}

#[allow(dead_code)]
pub struct Harness {
    pub services: Services,
    pub repos: Repositories,
    pub stores: StoreSet,
}

pub fn harness() -> Harness {
    let config = AppConfig::for_testing();
    let stores = StoreSet::in_memory(LockPolicy::new(5, Duration::from_millis(5)));
    let repos = Repositories::new(&stores, &config);
    let services = Services::new(
        &repos,
        stores.content.clone(),
        Arc::new(PlainHasher),
        Arc::new(PasswordPolicy::from_config(&config.password)),
    );
    Harness {
        services,
        repos,
        stores,
    }
}

#[allow(dead_code)]
pub fn labels(v: &[&str]) -> Vec<String> {
    v.iter().map(|s| s.to_string()).collect()
}

#[allow(dead_code)]
pub const STRONG: &str = "correct-Horse-battery-9";
