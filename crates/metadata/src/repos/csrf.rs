//! CSRF token repository.
//!
//! Tokens are grouped by client IP. Adding a token appends to the IP's list,
//! so several tokens can be valid at once (one per rendered form). Expired
//! tokens are ignored by `exists` and removed by `clean_up`.

use crate::document::{Change, JsonDocument};
use crate::error::MetadataResult;
use crate::models::CsrfModel;
use async_trait::async_trait;
use coffer_core::config::CsrfConfig;
use coffer_core::token::{random_hex, tokens_match};
use coffer_storage::BlobStore;
use std::sync::Arc;

/// Repository for CSRF tokens.
#[async_trait]
pub trait CsrfRepo: Send + Sync {
    /// Append a token for `ip`.
    async fn add(&self, ip: &str, token: &str, expires: i64) -> MetadataResult<()>;

    /// Generate and store a fresh token for `ip`, valid from `now`.
    async fn issue_at(&self, ip: &str, now: i64) -> MetadataResult<CsrfModel>;

    /// True if `token` is recorded for `ip` and not expired at `now`.
    async fn exists_at(&self, ip: &str, token: &str, now: i64) -> MetadataResult<bool>;

    /// Drop tokens expired at `now`, and IPs left with none.
    async fn clean_up_at(&self, now: i64) -> MetadataResult<usize>;

    async fn issue(&self, ip: &str) -> MetadataResult<CsrfModel> {
        self.issue_at(ip, coffer_core::unix_now()).await
    }

    async fn exists(&self, ip: &str, token: &str) -> MetadataResult<bool> {
        self.exists_at(ip, token, coffer_core::unix_now()).await
    }

    async fn clean_up(&self) -> MetadataResult<usize> {
        self.clean_up_at(coffer_core::unix_now()).await
    }
}

/// [`CsrfRepo`] over a JSON blob store.
pub struct JsonCsrfRepo {
    doc: JsonDocument<Vec<CsrfModel>>,
    ttl: i64,
    token_bytes: usize,
}

impl JsonCsrfRepo {
    pub fn new(store: Arc<dyn BlobStore>, config: &CsrfConfig) -> Self {
        Self {
            doc: JsonDocument::new(store),
            ttl: config.ttl(),
            token_bytes: config.token_bytes,
        }
    }
}

#[async_trait]
impl CsrfRepo for JsonCsrfRepo {
    async fn add(&self, ip: &str, token: &str, expires: i64) -> MetadataResult<()> {
        let record = CsrfModel {
            token: token.to_string(),
            expires,
        };
        self.doc
            .update("csrf.add", |by_ip| {
                by_ip.entry(ip.to_string()).or_default().push(record);
                Ok(Change::Modified(()))
            })
            .await
    }

    async fn issue_at(&self, ip: &str, now: i64) -> MetadataResult<CsrfModel> {
        let record = CsrfModel {
            token: random_hex(self.token_bytes)?,
            expires: now.saturating_add(self.ttl),
        };
        self.add(ip, &record.token, record.expires).await?;
        Ok(record)
    }

    async fn exists_at(&self, ip: &str, token: &str, now: i64) -> MetadataResult<bool> {
        let by_ip = self.doc.load("csrf.exists").await?;
        Ok(by_ip.get(ip).is_some_and(|tokens| {
            tokens
                .iter()
                .any(|t| tokens_match(&t.token, token) && t.is_live(now))
        }))
    }

    async fn clean_up_at(&self, now: i64) -> MetadataResult<usize> {
        self.doc
            .update("csrf.clean_up", |by_ip| {
                let mut removed = 0;
                by_ip.retain(|_, tokens| {
                    let before = tokens.len();
                    tokens.retain(|t| t.is_live(now));
                    removed += before - tokens.len();
                    !tokens.is_empty()
                });
                Ok(if removed > 0 {
                    Change::Modified(removed)
                } else {
                    Change::Unchanged(0)
                })
            })
            .await
    }
}
