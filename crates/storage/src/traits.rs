//! Storage trait definitions.

use crate::error::{StorageError, StorageResult};
use async_trait::async_trait;
use bytes::Bytes;

/// A single lock-coordinated byte blob.
///
/// Each instance guards one logical store (for example `users.json`). At most
/// one writer lock exists per store at any time. Backends implement the
/// primitives; the read/write protocol is provided on top of them:
///
/// - [`read`](BlobStore::read) waits for any outstanding lock, then reads
/// - [`read_for_write`](BlobStore::read_for_write) acquires the lock, then reads
/// - [`write_locked`](BlobStore::write_locked) writes while the lock is held
/// - [`unlock`](BlobStore::unlock) releases the lock
/// - [`write`](BlobStore::write) does acquire, write and release in one call
///
/// A blob that was never written reads as an empty byte string.
#[async_trait]
pub trait BlobStore: Send + Sync + 'static {
    /// Logical store name, e.g. `users.json`.
    fn name(&self) -> &str;

    /// Get the backend name for logging/debugging.
    fn backend_name(&self) -> &'static str;

    /// Wait until no lock is held, failing with `LockTimeout` on exhaustion.
    async fn wait_unlocked(&self) -> StorageResult<()>;

    /// Wait for and acquire the writer lock.
    ///
    /// Acquisition is create-if-absent, so losing a race to another writer
    /// counts as one more wait attempt.
    async fn lock(&self) -> StorageResult<()>;

    /// Release the writer lock. Fails with `LockNotHeld` if there is none.
    async fn unlock(&self) -> StorageResult<()>;

    /// Whether a writer lock currently exists.
    async fn is_locked(&self) -> StorageResult<bool>;

    /// Read the raw blob without consulting the lock.
    async fn load(&self) -> StorageResult<Bytes>;

    /// Replace the raw blob without consulting the lock.
    async fn store(&self, data: Bytes) -> StorageResult<()>;

    /// Check that the backend is reachable.
    async fn health_check(&self) -> StorageResult<()> {
        Ok(())
    }

    /// Read the current blob once no writer holds the lock.
    async fn read(&self) -> StorageResult<Bytes> {
        self.wait_unlocked().await?;
        self.load().await
    }

    /// Acquire the writer lock and read the current blob.
    ///
    /// The lock is released again if the read fails, so on error the caller
    /// holds nothing.
    async fn read_for_write(&self) -> StorageResult<Bytes> {
        self.lock().await?;
        match self.load().await {
            Ok(data) => Ok(data),
            Err(err) => {
                if let Err(unlock_err) = self.unlock().await {
                    tracing::warn!(
                        store = %self.name(),
                        error = %unlock_err,
                        "Failed to release lock after read failure"
                    );
                }
                Err(err)
            }
        }
    }

    /// Write the blob while holding the lock. Does not release it.
    async fn write_locked(&self, data: Bytes) -> StorageResult<()> {
        if !self.is_locked().await? {
            return Err(StorageError::LockNotHeld(self.name().to_string()));
        }
        self.store(data).await
    }

    /// Acquire, write and release in one step.
    async fn write(&self, data: Bytes) -> StorageResult<()> {
        self.lock().await?;
        let written = self.write_locked(data).await;
        let released = self.unlock().await;
        match (written, released) {
            (Err(err), Err(unlock_err)) => {
                tracing::warn!(
                    store = %self.name(),
                    error = %unlock_err,
                    "Failed to release lock after write failure"
                );
                Err(err)
            }
            (Err(err), Ok(())) | (Ok(()), Err(err)) => Err(err),
            (Ok(()), Ok(())) => Ok(()),
        }
    }
}

/// Named byte content for uploaded files.
#[async_trait]
pub trait ContentStore: Send + Sync + 'static {
    /// Store `data` under `name`, replacing any previous content.
    async fn write(&self, name: &str, data: Bytes) -> StorageResult<()>;

    /// Read content. Fails with `NotFound` when absent.
    async fn read(&self, name: &str) -> StorageResult<Bytes>;

    /// Delete content. Fails with `NotFound` when absent.
    async fn delete(&self, name: &str) -> StorageResult<()>;

    /// Check if content exists.
    async fn exists(&self, name: &str) -> StorageResult<bool>;

    /// Get the backend name for logging/debugging.
    fn backend_name(&self) -> &'static str;
}
