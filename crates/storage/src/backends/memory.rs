//! In-process memory backend.
//!
//! The writer lock is a single flag in a tokio `watch` channel. Acquiring it
//! is one compare-and-set, so `is_locked` never disagrees with the holder.
//! Waiting is bounded by the lock policy budget, so a lock that is never
//! released surfaces as `LockTimeout` just like a stale lock file on disk.

use super::validate_key;
use crate::error::{StorageError, StorageResult};
use crate::lock::LockPolicy;
use crate::traits::{BlobStore, ContentStore};
use async_trait::async_trait;
use bytes::Bytes;
use std::collections::HashMap;
use tokio::sync::{RwLock, watch};
use tracing::instrument;

/// Memory-backed blob store.
pub struct MemoryBlobStore {
    name: String,
    policy: LockPolicy,
    locked: watch::Sender<bool>,
    data: RwLock<Bytes>,
}

impl MemoryBlobStore {
    pub fn new(name: impl Into<String>, policy: LockPolicy) -> Self {
        Self {
            name: name.into(),
            policy,
            locked: watch::Sender::new(false),
            data: RwLock::new(Bytes::new()),
        }
    }
}

impl std::fmt::Debug for MemoryBlobStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryBlobStore")
            .field("name", &self.name)
            .field("policy", &self.policy)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl BlobStore for MemoryBlobStore {
    fn name(&self) -> &str {
        &self.name
    }

    fn backend_name(&self) -> &'static str {
        "memory"
    }

    #[instrument(skip(self), fields(backend = "memory", store = %self.name))]
    async fn wait_unlocked(&self) -> StorageResult<()> {
        let mut rx = self.locked.subscribe();
        match tokio::time::timeout(self.policy.budget(), rx.wait_for(|locked| !*locked)).await {
            Ok(_) => Ok(()),
            Err(_) => Err(self.policy.timeout(&self.name)),
        }
    }

    #[instrument(skip(self), fields(backend = "memory", store = %self.name))]
    async fn lock(&self) -> StorageResult<()> {
        let deadline = tokio::time::Instant::now() + self.policy.budget();
        let mut rx = self.locked.subscribe();
        loop {
            let acquired = self.locked.send_if_modified(|locked| {
                if *locked {
                    false
                } else {
                    *locked = true;
                    true
                }
            });
            if acquired {
                return Ok(());
            }
            if tokio::time::timeout_at(deadline, rx.wait_for(|locked| !*locked))
                .await
                .is_err()
            {
                return Err(self.policy.timeout(&self.name));
            }
        }
    }

    #[instrument(skip(self), fields(backend = "memory", store = %self.name))]
    async fn unlock(&self) -> StorageResult<()> {
        let released = self.locked.send_if_modified(|locked| std::mem::replace(locked, false));
        if released {
            Ok(())
        } else {
            Err(StorageError::LockNotHeld(self.name.clone()))
        }
    }

    async fn is_locked(&self) -> StorageResult<bool> {
        Ok(*self.locked.borrow())
    }

    async fn load(&self) -> StorageResult<Bytes> {
        Ok(self.data.read().await.clone())
    }

    async fn store(&self, data: Bytes) -> StorageResult<()> {
        *self.data.write().await = data;
        Ok(())
    }
}

/// Memory-backed content store.
#[derive(Debug, Default)]
pub struct MemoryContentStore {
    objects: RwLock<HashMap<String, Bytes>>,
}

impl MemoryContentStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ContentStore for MemoryContentStore {
    async fn write(&self, name: &str, data: Bytes) -> StorageResult<()> {
        validate_key(name)?;
        self.objects.write().await.insert(name.to_string(), data);
        Ok(())
    }

    async fn read(&self, name: &str) -> StorageResult<Bytes> {
        self.objects
            .read()
            .await
            .get(name)
            .cloned()
            .ok_or_else(|| StorageError::NotFound(name.to_string()))
    }

    async fn delete(&self, name: &str) -> StorageResult<()> {
        self.objects
            .write()
            .await
            .remove(name)
            .map(|_| ())
            .ok_or_else(|| StorageError::NotFound(name.to_string()))
    }

    async fn exists(&self, name: &str) -> StorageResult<bool> {
        Ok(self.objects.read().await.contains_key(name))
    }

    fn backend_name(&self) -> &'static str {
        "memory"
    }
}
