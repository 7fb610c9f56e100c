//! Domain services for coffer.
//!
//! Services combine repositories with password handling and access checks.
//! They never touch a blob store directly, and nothing here spans stores
//! transactionally: a login that verifies the user and then starts a session
//! is two independent writes.

pub mod csrf;
pub mod error;
pub mod files;
pub mod maintenance;
pub mod users;

pub use csrf::CsrfService;
pub use error::{ServiceError, ServiceResult};
pub use files::FileService;
pub use maintenance::{Maintenance, SweepReport};
pub use users::{AdminBootstrap, LoginSession, NewUser, UserInfo, UserService};

use coffer_core::{AppConfig, Argon2Hasher, PasswordChecker, PasswordHasher, PasswordPolicy};
use coffer_metadata::Repositories;
use coffer_storage::{ContentStore, StoreSet};
use std::sync::Arc;

/// Every service, sharing one set of repositories.
#[derive(Clone)]
pub struct Services {
    pub users: UserService,
    pub files: FileService,
    pub csrf: CsrfService,
    pub maintenance: Maintenance,
}

impl Services {
    pub fn new(
        repos: &Repositories,
        content: Arc<dyn ContentStore>,
        hasher: Arc<dyn PasswordHasher>,
        checker: Arc<dyn PasswordChecker>,
    ) -> Self {
        Self {
            users: UserService::new(repos.users.clone(), repos.sessions.clone(), hasher, checker),
            files: FileService::new(repos.files.clone(), content),
            csrf: CsrfService::new(repos.csrf.clone()),
            maintenance: Maintenance::new(repos.sessions.clone(), repos.csrf.clone()),
        }
    }

    /// Open the configured stores and build every service with Argon2 and
    /// the configured password policy.
    pub async fn from_config(config: &AppConfig) -> ServiceResult<(Self, StoreSet)> {
        let (repos, stores) = Repositories::from_config(config).await?;
        let services = Self::new(
            &repos,
            stores.content.clone(),
            Arc::new(Argon2Hasher),
            Arc::new(PasswordPolicy::from_config(&config.password)),
        );
        Ok((services, stores))
    }
}
