//! Entity repositories for coffer.
//!
//! This crate maps each blob store to a typed, keyed map:
//! - Users, keyed by name
//! - Login sessions, keyed by user name
//! - File access lists, keyed by file name
//! - CSRF tokens, grouped by client IP
//!
//! Each repository reads the whole blob on every call and writes it back
//! under the store's writer lock. There is no cache and no cross-store
//! transaction.

pub mod document;
pub mod error;
pub mod models;
pub mod repos;

pub use document::{Change, JsonDocument};
pub use error::{MetadataError, MetadataResult};
pub use models::{CsrfModel, FileModel, SessionModel, UserModel};
pub use repos::{
    CsrfRepo, FileRepo, JsonCsrfRepo, JsonFileRepo, JsonSessionRepo, JsonUserRepo, SessionRepo,
    UserRepo,
};

use coffer_core::AppConfig;
use coffer_storage::StoreSet;
use std::sync::Arc;

/// The four repositories, built once by the composition root.
#[derive(Clone)]
pub struct Repositories {
    pub users: Arc<dyn UserRepo>,
    pub sessions: Arc<dyn SessionRepo>,
    pub files: Arc<dyn FileRepo>,
    pub csrf: Arc<dyn CsrfRepo>,
}

impl Repositories {
    /// Wire the JSON repositories onto already-open stores.
    pub fn new(stores: &StoreSet, config: &AppConfig) -> Self {
        Self {
            users: Arc::new(JsonUserRepo::new(stores.users.clone())),
            sessions: Arc::new(JsonSessionRepo::new(
                stores.sessions.clone(),
                &config.session,
            )),
            files: Arc::new(JsonFileRepo::new(stores.files.clone())),
            csrf: Arc::new(JsonCsrfRepo::new(stores.csrf.clone(), &config.csrf)),
        }
    }

    /// Open the configured stores and wire the repositories onto them.
    ///
    /// The store set is returned too so callers can reach the content store
    /// and inspect locks.
    pub async fn from_config(config: &AppConfig) -> MetadataResult<(Self, StoreSet)> {
        let stores = StoreSet::open(&config.storage, &config.lock)
            .await
            .map_err(MetadataError::storage("open stores"))?;
        Ok((Self::new(&stores, config), stores))
    }
}
