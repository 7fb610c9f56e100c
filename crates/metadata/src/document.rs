//! Typed JSON map over a single blob store.
//!
//! Every operation re-reads and re-decodes the whole blob; nothing is cached
//! between calls. Writes re-encode the whole map.
//!
//! Read-modify-write runs as `read_for_write`, decode, mutate, encode,
//! `write_locked`, then `unlock`. The unlock happens exactly once whatever
//! failed in between, so a decode or write error never leaves the store
//! locked.

use crate::error::{MetadataError, MetadataResult};
use bytes::Bytes;
use coffer_storage::BlobStore;
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::collections::BTreeMap;
use std::marker::PhantomData;
use std::sync::Arc;
use tokio::sync::Mutex;

/// Decoded store contents.
pub type Map<V> = BTreeMap<String, V>;

/// Outcome of a mutation closure.
#[derive(Debug)]
pub enum Change<R> {
    /// The map changed and must be written back.
    Modified(R),
    /// Nothing changed; the write is skipped.
    Unchanged(R),
}

/// A `String -> V` JSON object persisted in one blob store.
pub struct JsonDocument<V> {
    store: Arc<dyn BlobStore>,
    guard: Mutex<()>,
    _value: PhantomData<fn() -> V>,
}

impl<V> JsonDocument<V>
where
    V: Serialize + DeserializeOwned,
{
    pub fn new(store: Arc<dyn BlobStore>) -> Self {
        Self {
            store,
            guard: Mutex::new(()),
            _value: PhantomData,
        }
    }

    /// The underlying blob store.
    pub fn store(&self) -> &Arc<dyn BlobStore> {
        &self.store
    }

    /// Decode a blob. Empty or whitespace-only blobs decode as an empty map.
    pub fn decode(&self, data: &[u8]) -> MetadataResult<Map<V>> {
        if data.iter().all(u8::is_ascii_whitespace) {
            return Ok(Map::new());
        }
        serde_json::from_slice(data).map_err(|source| MetadataError::Decode {
            store: self.store.name().to_string(),
            source,
        })
    }

    pub fn encode(&self, map: &Map<V>) -> MetadataResult<Bytes> {
        serde_json::to_vec(map)
            .map(Bytes::from)
            .map_err(|source| MetadataError::Encode {
                store: self.store.name().to_string(),
                source,
            })
    }

    /// Read-only access: wait for writers, read, decode.
    pub async fn load(&self, op: &'static str) -> MetadataResult<Map<V>> {
        let _guard = self.guard.lock().await;
        let data = self
            .store
            .read()
            .await
            .map_err(MetadataError::storage(op))?;
        self.decode(&data)
    }

    /// Read-modify-write under the store's writer lock.
    ///
    /// `mutate` decides whether the map is written back. On every path after
    /// a successful `read_for_write` the lock is released exactly once. If
    /// both the operation and the unlock fail, the operation's error wins and
    /// the unlock failure is logged.
    pub async fn update<R, F>(&self, op: &'static str, mutate: F) -> MetadataResult<R>
    where
        F: FnOnce(&mut Map<V>) -> MetadataResult<Change<R>>,
    {
        let _guard = self.guard.lock().await;
        let data = self
            .store
            .read_for_write()
            .await
            .map_err(MetadataError::storage(op))?;

        let outcome = self.apply(op, &data, mutate).await;
        let released = self
            .store
            .unlock()
            .await
            .map_err(MetadataError::storage(op));

        match (outcome, released) {
            (Ok(value), Ok(())) => Ok(value),
            (Ok(_), Err(err)) => Err(err),
            (Err(err), Ok(())) => Err(err),
            (Err(err), Err(unlock_err)) => {
                tracing::warn!(
                    op,
                    store = %self.store.name(),
                    error = %unlock_err,
                    "Failed to release lock after failed update"
                );
                Err(err)
            }
        }
    }

    async fn apply<R, F>(&self, op: &'static str, data: &[u8], mutate: F) -> MetadataResult<R>
    where
        F: FnOnce(&mut Map<V>) -> MetadataResult<Change<R>>,
    {
        let mut map = self.decode(data)?;
        match mutate(&mut map)? {
            Change::Unchanged(value) => Ok(value),
            Change::Modified(value) => {
                let encoded = self.encode(&map)?;
                self.store
                    .write_locked(encoded)
                    .await
                    .map_err(MetadataError::storage(op))?;
                Ok(value)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use coffer_storage::{LockPolicy, MemoryBlobStore, Op, SpyBlobStore};
    use std::time::Duration;

    fn spy() -> Arc<SpyBlobStore> {
        Arc::new(SpyBlobStore::new(Arc::new(MemoryBlobStore::new(
            "test.json",
            LockPolicy::new(3, Duration::from_millis(5)),
        ))))
    }

    #[tokio::test]
    async fn test_whitespace_blob_is_empty_map() {
        let store = spy();
        store.write(Bytes::from_static(b"  \n")).await.unwrap();
        let doc: JsonDocument<u32> = JsonDocument::new(store);
        assert!(doc.load("test.load").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_unchanged_skips_write_but_unlocks() {
        let store = spy();
        let doc: JsonDocument<u32> = JsonDocument::new(store.clone());

        doc.update("test.noop", |_| Ok(Change::Unchanged(())))
            .await
            .unwrap();
        assert_eq!(store.calls(Op::ReadForWrite), 1);
        assert_eq!(store.calls(Op::WriteLocked), 0);
        assert_eq!(store.calls(Op::Unlock), 1);
    }

    #[tokio::test]
    async fn test_mutation_error_unlocks() {
        let store = spy();
        let doc: JsonDocument<u32> = JsonDocument::new(store.clone());

        let err = doc
            .update("test.fail", |_| -> MetadataResult<Change<()>> {
                Err(MetadataError::NotFound("x".to_string()))
            })
            .await
            .unwrap_err();
        assert!(matches!(err, MetadataError::NotFound(_)));
        assert_eq!(store.calls(Op::Unlock), 1);
        assert!(!store.is_locked().await.unwrap());
    }

    #[tokio::test]
    async fn test_operation_error_wins_over_unlock_error() {
        let store = spy();
        let doc: JsonDocument<u32> = JsonDocument::new(store.clone());
        store.fail_next(Op::WriteLocked, 1);
        store.fail_next(Op::Unlock, 1);

        let err = doc
            .update("test.write", |map| {
                map.insert("a".to_string(), 1);
                Ok(Change::Modified(()))
            })
            .await
            .unwrap_err();
        match err {
            MetadataError::Storage { op, source } => {
                assert_eq!(op, "test.write");
                assert!(source.to_string().contains("WriteLocked"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }
}
