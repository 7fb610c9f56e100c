//! Session repository.
//!
//! One session per user name. Starting a session replaces any previous one,
//! so the old token stops working immediately.

use crate::document::{Change, JsonDocument};
use crate::error::{MetadataError, MetadataResult};
use crate::models::SessionModel;
use async_trait::async_trait;
use coffer_core::config::SessionConfig;
use coffer_core::token;
use coffer_storage::BlobStore;
use std::sync::Arc;

/// Repository for login sessions.
#[async_trait]
pub trait SessionRepo: Send + Sync {
    /// Start (or replace) the session for `name` at time `now`.
    async fn start_at(&self, name: &str, now: i64) -> MetadataResult<SessionModel>;

    /// True only if a session exists for `name`, its token equals `hash`, and
    /// it has not expired at `now`. Absence is not an error.
    async fn check_at(&self, name: &str, hash: &str, now: i64) -> MetadataResult<bool>;

    /// Get the stored session for `name`, expired or not.
    async fn get(&self, name: &str) -> MetadataResult<SessionModel>;

    /// End the session for `name`. Returns whether one existed.
    async fn end(&self, name: &str) -> MetadataResult<bool>;

    /// Remove every session expired at `now`. Returns how many were removed.
    async fn clean_up_at(&self, now: i64) -> MetadataResult<usize>;

    async fn start(&self, name: &str) -> MetadataResult<SessionModel> {
        self.start_at(name, coffer_core::unix_now()).await
    }

    async fn check(&self, name: &str, hash: &str) -> MetadataResult<bool> {
        self.check_at(name, hash, coffer_core::unix_now()).await
    }

    async fn clean_up(&self) -> MetadataResult<usize> {
        self.clean_up_at(coffer_core::unix_now()).await
    }
}

/// [`SessionRepo`] over a JSON blob store.
pub struct JsonSessionRepo {
    doc: JsonDocument<SessionModel>,
    ttl: i64,
    token_bytes: usize,
}

impl JsonSessionRepo {
    pub fn new(store: Arc<dyn BlobStore>, config: &SessionConfig) -> Self {
        Self {
            doc: JsonDocument::new(store),
            ttl: config.ttl(),
            token_bytes: config.token_bytes,
        }
    }
}

#[async_trait]
impl SessionRepo for JsonSessionRepo {
    async fn start_at(&self, name: &str, now: i64) -> MetadataResult<SessionModel> {
        let session = SessionModel {
            hash: token::random_hex(self.token_bytes)?,
            expires: now.saturating_add(self.ttl),
        };
        self.doc
            .update("sessions.start", |sessions| {
                sessions.insert(name.to_string(), session.clone());
                Ok(Change::Modified(session))
            })
            .await
    }

    async fn check_at(&self, name: &str, hash: &str, now: i64) -> MetadataResult<bool> {
        let sessions = self.doc.load("sessions.check").await?;
        Ok(sessions
            .get(name)
            .is_some_and(|s| token::tokens_match(&s.hash, hash) && s.is_live(now)))
    }

    async fn get(&self, name: &str) -> MetadataResult<SessionModel> {
        self.doc
            .load("sessions.get")
            .await?
            .remove(name)
            .ok_or_else(|| MetadataError::NotFound(format!("session {name}")))
    }

    async fn end(&self, name: &str) -> MetadataResult<bool> {
        self.doc
            .update("sessions.end", |sessions| {
                Ok(match sessions.remove(name) {
                    Some(_) => Change::Modified(true),
                    None => Change::Unchanged(false),
                })
            })
            .await
    }

    async fn clean_up_at(&self, now: i64) -> MetadataResult<usize> {
        self.doc
            .update("sessions.clean_up", |sessions| {
                let before = sessions.len();
                sessions.retain(|_, s| s.is_live(now));
                let removed = before - sessions.len();
                Ok(if removed > 0 {
                    Change::Modified(removed)
                } else {
                    Change::Unchanged(0)
                })
            })
            .await
    }
}
