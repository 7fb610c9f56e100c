//! Call-counting, fault-injecting wrapper for tests.
//!
//! [`SpyBlobStore`] forwards every call to an inner store, counts calls per
//! protocol operation, and can be told to fail the next N calls of an
//! operation with an injected I/O error.

use crate::error::{StorageError, StorageResult};
use crate::traits::BlobStore;
use async_trait::async_trait;
use bytes::Bytes;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Protocol operations the spy tracks.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Op {
    Read,
    ReadForWrite,
    WriteLocked,
    Unlock,
    Write,
}

impl Op {
    const ALL: [Op; 5] = [
        Op::Read,
        Op::ReadForWrite,
        Op::WriteLocked,
        Op::Unlock,
        Op::Write,
    ];

    fn index(self) -> usize {
        self as usize
    }
}

/// Blob store wrapper for fault injection.
pub struct SpyBlobStore {
    inner: Arc<dyn BlobStore>,
    calls: [AtomicUsize; 5],
    fail_next: [AtomicUsize; 5],
}

impl SpyBlobStore {
    pub fn new(inner: Arc<dyn BlobStore>) -> Self {
        Self {
            inner,
            calls: Default::default(),
            fail_next: Default::default(),
        }
    }

    /// Number of times `op` has been called.
    pub fn calls(&self, op: Op) -> usize {
        self.calls[op.index()].load(Ordering::SeqCst)
    }

    /// Make the next `times` calls of `op` fail without reaching the inner store.
    pub fn fail_next(&self, op: Op, times: usize) {
        self.fail_next[op.index()].store(times, Ordering::SeqCst);
    }

    /// Reset all counters and pending failures.
    pub fn reset(&self) {
        for op in Op::ALL {
            self.calls[op.index()].store(0, Ordering::SeqCst);
            self.fail_next[op.index()].store(0, Ordering::SeqCst);
        }
    }

    /// Count the call and decide whether to inject a failure.
    fn enter(&self, op: Op) -> StorageResult<()> {
        self.calls[op.index()].fetch_add(1, Ordering::SeqCst);
        let injected = self.fail_next[op.index()]
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if injected {
            return Err(StorageError::Io(std::io::Error::other(format!(
                "injected {op:?} failure"
            ))));
        }
        Ok(())
    }
}

#[async_trait]
impl BlobStore for SpyBlobStore {
    fn name(&self) -> &str {
        self.inner.name()
    }

    fn backend_name(&self) -> &'static str {
        "spy"
    }

    async fn wait_unlocked(&self) -> StorageResult<()> {
        self.inner.wait_unlocked().await
    }

    async fn lock(&self) -> StorageResult<()> {
        self.inner.lock().await
    }

    async fn unlock(&self) -> StorageResult<()> {
        self.enter(Op::Unlock)?;
        self.inner.unlock().await
    }

    async fn is_locked(&self) -> StorageResult<bool> {
        self.inner.is_locked().await
    }

    async fn load(&self) -> StorageResult<Bytes> {
        self.inner.load().await
    }

    async fn store(&self, data: Bytes) -> StorageResult<()> {
        self.inner.store(data).await
    }

    async fn health_check(&self) -> StorageResult<()> {
        self.inner.health_check().await
    }

    async fn read(&self) -> StorageResult<Bytes> {
        self.enter(Op::Read)?;
        self.inner.read().await
    }

    async fn read_for_write(&self) -> StorageResult<Bytes> {
        self.enter(Op::ReadForWrite)?;
        self.inner.read_for_write().await
    }

    async fn write_locked(&self, data: Bytes) -> StorageResult<()> {
        self.enter(Op::WriteLocked)?;
        self.inner.write_locked(data).await
    }

    async fn write(&self, data: Bytes) -> StorageResult<()> {
        self.enter(Op::Write)?;
        self.inner.write(data).await
    }
}
