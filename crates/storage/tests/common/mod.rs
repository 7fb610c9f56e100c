use coffer_storage::{BlobStore, FilesystemBlobStore, LockPolicy, MemoryBlobStore};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

/// Short lock budget so timeout paths finish quickly.
pub fn fast_policy() -> LockPolicy {
    LockPolicy::new(10, Duration::from_millis(10))
}

pub fn memory_store(name: &str) -> Arc<dyn BlobStore> {
    Arc::new(MemoryBlobStore::new(name, fast_policy()))
}

pub async fn filesystem_store(root: &Path, name: &str) -> Arc<dyn BlobStore> {
    Arc::new(
        FilesystemBlobStore::new(root, name, fast_policy(), 0o600)
            .await
            .unwrap(),
    )
}
