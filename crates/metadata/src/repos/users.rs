//! User repository.

use crate::document::{Change, JsonDocument};
use crate::error::{MetadataError, MetadataResult};
use crate::models::UserModel;
use async_trait::async_trait;
use coffer_storage::BlobStore;
use std::sync::Arc;

/// Repository for user records.
#[async_trait]
pub trait UserRepo: Send + Sync {
    /// Insert a new user. Fails with `AlreadyExists` if the name is taken.
    async fn create(&self, user: UserModel) -> MetadataResult<()>;

    /// Get a user by name.
    async fn get(&self, name: &str) -> MetadataResult<UserModel>;

    /// All users, ordered by name.
    async fn list(&self) -> MetadataResult<Vec<UserModel>>;

    async fn exists(&self, name: &str) -> MetadataResult<bool>;

    async fn delete(&self, name: &str) -> MetadataResult<()>;

    /// Grant admin rights. Idempotent.
    async fn promote(&self, name: &str) -> MetadataResult<()>;

    /// Revoke admin rights. Idempotent.
    async fn demote(&self, name: &str) -> MetadataResult<()>;

    /// Replace the user's capability labels.
    async fn update_access(&self, name: &str, access: Vec<String>) -> MetadataResult<()>;

    /// Replace the stored password hash.
    async fn update_password(&self, name: &str, password_hash: String) -> MetadataResult<()>;

    async fn update_email(&self, name: &str, email: String) -> MetadataResult<()>;
}

/// [`UserRepo`] over a JSON blob store.
pub struct JsonUserRepo {
    doc: JsonDocument<UserModel>,
}

impl JsonUserRepo {
    pub fn new(store: Arc<dyn BlobStore>) -> Self {
        Self {
            doc: JsonDocument::new(store),
        }
    }

    /// Apply `edit` to one existing user, writing back only on change.
    async fn modify<F>(&self, op: &'static str, name: &str, edit: F) -> MetadataResult<()>
    where
        F: FnOnce(&mut UserModel) -> bool + Send,
    {
        self.doc
            .update(op, |users| {
                let user = users
                    .get_mut(name)
                    .ok_or_else(|| MetadataError::NotFound(format!("user {name}")))?;
                Ok(if edit(user) {
                    Change::Modified(())
                } else {
                    Change::Unchanged(())
                })
            })
            .await
    }
}

#[async_trait]
impl UserRepo for JsonUserRepo {
    async fn create(&self, user: UserModel) -> MetadataResult<()> {
        self.doc
            .update("users.create", |users| {
                if users.contains_key(&user.name) {
                    return Err(MetadataError::AlreadyExists(format!("user {}", user.name)));
                }
                users.insert(user.name.clone(), user);
                Ok(Change::Modified(()))
            })
            .await
    }

    async fn get(&self, name: &str) -> MetadataResult<UserModel> {
        self.doc
            .load("users.get")
            .await?
            .remove(name)
            .ok_or_else(|| MetadataError::NotFound(format!("user {name}")))
    }

    async fn list(&self) -> MetadataResult<Vec<UserModel>> {
        Ok(self.doc.load("users.list").await?.into_values().collect())
    }

    async fn exists(&self, name: &str) -> MetadataResult<bool> {
        Ok(self.doc.load("users.exists").await?.contains_key(name))
    }

    async fn delete(&self, name: &str) -> MetadataResult<()> {
        self.doc
            .update("users.delete", |users| match users.remove(name) {
                Some(_) => Ok(Change::Modified(())),
                None => Err(MetadataError::NotFound(format!("user {name}"))),
            })
            .await
    }

    async fn promote(&self, name: &str) -> MetadataResult<()> {
        self.modify("users.promote", name, |user| {
            !std::mem::replace(&mut user.is_admin, true)
        })
        .await
    }

    async fn demote(&self, name: &str) -> MetadataResult<()> {
        self.modify("users.demote", name, |user| {
            std::mem::replace(&mut user.is_admin, false)
        })
        .await
    }

    async fn update_access(&self, name: &str, access: Vec<String>) -> MetadataResult<()> {
        self.modify("users.update_access", name, |user| {
            if user.access == access {
                return false;
            }
            user.access = access;
            true
        })
        .await
    }

    async fn update_password(&self, name: &str, password_hash: String) -> MetadataResult<()> {
        self.modify("users.update_password", name, |user| {
            user.password = password_hash;
            true
        })
        .await
    }

    async fn update_email(&self, name: &str, email: String) -> MetadataResult<()> {
        self.modify("users.update_email", name, |user| {
            if user.email == email {
                return false;
            }
            user.email = email;
            true
        })
        .await
    }
}
