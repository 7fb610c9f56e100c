//! User management and login.

use crate::error::{ServiceError, ServiceResult};
use coffer_core::config::AdminConfig;
use coffer_core::{PasswordChecker, PasswordHasher, access, names};
use coffer_metadata::{MetadataError, SessionRepo, UserModel, UserRepo};
use serde::Serialize;
use std::sync::Arc;
use tracing::instrument;

/// A user as seen by callers. Never carries the password hash.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct UserInfo {
    pub name: String,
    pub email: String,
    pub is_admin: bool,
    pub access: Vec<String>,
}

impl From<UserModel> for UserInfo {
    fn from(user: UserModel) -> Self {
        Self {
            name: user.name,
            email: user.email,
            is_admin: user.is_admin,
            access: user.access,
        }
    }
}

/// Input for [`UserService::create_user`].
#[derive(Clone, Debug, Default)]
pub struct NewUser {
    pub name: String,
    pub email: String,
    pub password: String,
    pub is_admin: bool,
    pub access: Vec<String>,
}

/// A freshly started login session.
#[derive(Clone, Debug, Serialize)]
pub struct LoginSession {
    pub name: String,
    pub token: String,
    pub expires: i64,
}

impl LoginSession {
    /// The `name:token` credential accepted by the HTTP layer.
    pub fn credential(&self) -> String {
        format!("{}:{}", self.name, self.token)
    }
}

/// What [`UserService::ensure_admin`] had to do.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AdminBootstrap {
    Created,
    Promoted,
    Unchanged,
}

/// Orchestrates the user and session repositories with password handling.
#[derive(Clone)]
pub struct UserService {
    users: Arc<dyn UserRepo>,
    sessions: Arc<dyn SessionRepo>,
    hasher: Arc<dyn PasswordHasher>,
    checker: Arc<dyn PasswordChecker>,
}

impl UserService {
    pub fn new(
        users: Arc<dyn UserRepo>,
        sessions: Arc<dyn SessionRepo>,
        hasher: Arc<dyn PasswordHasher>,
        checker: Arc<dyn PasswordChecker>,
    ) -> Self {
        Self {
            users,
            sessions,
            hasher,
            checker,
        }
    }

    #[instrument(skip(self, new), fields(user = %new.name))]
    pub async fn create_user(&self, new: NewUser) -> ServiceResult<UserInfo> {
        names::validate_user_name(&new.name)?;
        validate_email(&new.email)?;
        let access = access::normalize(&new.access)?;
        let password = self.hash_new_password(new.password).await?;

        let user = UserModel {
            name: new.name,
            email: new.email,
            password,
            is_admin: new.is_admin,
            access,
        };
        self.users.create(user.clone()).await?;
        tracing::info!(admin = user.is_admin, "user created");
        Ok(user.into())
    }

    /// Verify a password and start a session, replacing any previous one.
    #[instrument(skip(self, password))]
    pub async fn login(&self, name: &str, password: &str) -> ServiceResult<LoginSession> {
        let user = match self.users.get(name).await {
            Ok(user) => user,
            Err(MetadataError::NotFound(_)) => return Err(ServiceError::InvalidCredentials),
            Err(e) => return Err(e.into()),
        };
        self.verify_password(password, user.password).await?;

        let session = self.sessions.start(name).await?;
        Ok(LoginSession {
            name: name.to_string(),
            token: session.hash,
            expires: session.expires,
        })
    }

    /// End the user's session. Returns whether one existed.
    pub async fn logout(&self, name: &str) -> ServiceResult<bool> {
        Ok(self.sessions.end(name).await?)
    }

    /// Resolve a session credential to its user.
    pub async fn authenticate(&self, name: &str, token: &str) -> ServiceResult<UserInfo> {
        if !self.sessions.check(name, token).await? {
            return Err(ServiceError::InvalidCredentials);
        }
        match self.users.get(name).await {
            Ok(user) => Ok(user.into()),
            Err(MetadataError::NotFound(_)) => Err(ServiceError::InvalidCredentials),
            Err(e) => Err(e.into()),
        }
    }

    /// Change a password after re-checking the current one.
    #[instrument(skip(self, old, new))]
    pub async fn change_password(&self, name: &str, old: &str, new: &str) -> ServiceResult<()> {
        let user = self.users.get(name).await?;
        self.verify_password(old, user.password).await?;
        let hash = self.hash_new_password(new.to_string()).await?;
        self.users.update_password(name, hash).await?;
        Ok(())
    }

    /// Replace a password without knowing the old one.
    #[instrument(skip(self, new))]
    pub async fn set_password(&self, name: &str, new: &str) -> ServiceResult<()> {
        let hash = self.hash_new_password(new.to_string()).await?;
        self.users.update_password(name, hash).await?;
        Ok(())
    }

    pub async fn promote(&self, name: &str) -> ServiceResult<()> {
        Ok(self.users.promote(name).await?)
    }

    pub async fn demote(&self, name: &str) -> ServiceResult<()> {
        Ok(self.users.demote(name).await?)
    }

    pub async fn update_access(&self, name: &str, labels: &[String]) -> ServiceResult<Vec<String>> {
        let labels = access::normalize(labels)?;
        self.users.update_access(name, labels.clone()).await?;
        Ok(labels)
    }

    pub async fn update_email(&self, name: &str, email: &str) -> ServiceResult<()> {
        validate_email(email)?;
        Ok(self.users.update_email(name, email.to_string()).await?)
    }

    /// Delete a user and end their session.
    #[instrument(skip(self))]
    pub async fn delete_user(&self, name: &str) -> ServiceResult<()> {
        self.users.delete(name).await?;
        self.sessions.end(name).await?;
        tracing::info!("user deleted");
        Ok(())
    }

    pub async fn get_user(&self, name: &str) -> ServiceResult<UserInfo> {
        Ok(self.users.get(name).await?.into())
    }

    pub async fn list_users(&self) -> ServiceResult<Vec<UserInfo>> {
        Ok(self
            .users
            .list()
            .await?
            .into_iter()
            .map(UserInfo::from)
            .collect())
    }

    /// Create the configured administrator, or promote an existing user of
    /// that name. An existing password is left alone.
    #[instrument(skip(self, admin), fields(user = %admin.name))]
    pub async fn ensure_admin(&self, admin: &AdminConfig) -> ServiceResult<AdminBootstrap> {
        match self.users.get(&admin.name).await {
            Ok(user) if user.is_admin => Ok(AdminBootstrap::Unchanged),
            Ok(_) => {
                self.users.promote(&admin.name).await?;
                Ok(AdminBootstrap::Promoted)
            }
            Err(MetadataError::NotFound(_)) => {
                names::validate_user_name(&admin.name)?;
                let user = UserModel {
                    name: admin.name.clone(),
                    email: admin.email.clone(),
                    password: admin.password_hash.clone(),
                    is_admin: true,
                    access: Vec::new(),
                };
                match self.users.create(user).await {
                    Ok(()) => Ok(AdminBootstrap::Created),
                    // Another instance bootstrapped it first
                    Err(MetadataError::AlreadyExists(_)) => {
                        self.users.promote(&admin.name).await?;
                        Ok(AdminBootstrap::Promoted)
                    }
                    Err(e) => Err(e.into()),
                }
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn hash_new_password(&self, password: String) -> ServiceResult<String> {
        self.checker.is_ok(&password)?;
        let hasher = self.hasher.clone();
        blocking(move || hasher.hash(&password)).await
    }

    async fn verify_password(&self, password: &str, hash: String) -> ServiceResult<()> {
        let hasher = self.hasher.clone();
        let password = password.to_string();
        blocking(move || hasher.check(&password, &hash)).await
    }
}

/// Run CPU-heavy password work off the async executor.
async fn blocking<T, F>(f: F) -> ServiceResult<T>
where
    F: FnOnce() -> coffer_core::Result<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| ServiceError::Hashing(format!("password task failed: {e}")))?
        .map_err(ServiceError::from)
}

fn validate_email(email: &str) -> ServiceResult<()> {
    if email.is_empty() {
        return Ok(());
    }
    let valid = match email.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty()
                && !domain.is_empty()
                && !domain.contains('@')
                && !email.chars().any(char::is_whitespace)
        }
        None => false,
    };
    if valid {
        Ok(())
    } else {
        Err(ServiceError::InvalidArgument(format!(
            "invalid email address: {email:?}"
        )))
    }
}
