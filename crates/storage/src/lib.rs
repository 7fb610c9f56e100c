//! Lock-coordinated blob storage and file content storage for coffer.
//!
//! This crate provides:
//! - [`BlobStore`]: one JSON blob per logical store, guarded by a writer lock
//! - [`ContentStore`]: named byte content for uploaded files
//! - Backends: in-process memory, local filesystem and S3-compatible
//! - [`SpyBlobStore`]: a call-counting, fault-injecting wrapper for tests

pub mod backends;
pub mod error;
pub mod lock;
pub mod spy;
pub mod traits;

pub use backends::{
    filesystem::{FilesystemBlobStore, FilesystemContentStore},
    memory::{MemoryBlobStore, MemoryContentStore},
    s3::{S3BlobStore, S3Bucket, S3ContentStore},
};
pub use error::{StorageError, StorageResult};
pub use lock::LockPolicy;
pub use spy::{Op, SpyBlobStore};
pub use traits::{BlobStore, ContentStore};

use coffer_core::config::{LockConfig, StorageConfig};
use std::sync::Arc;

/// Store holding user records.
pub const USERS_STORE: &str = "users.json";
/// Store holding login sessions.
pub const SESSIONS_STORE: &str = "sessions.json";
/// Store holding file access lists.
pub const FILES_STORE: &str = "files.json";
/// Store holding CSRF tokens.
pub const CSRF_STORE: &str = "csrf.json";
/// Directory (or key prefix) holding uploaded file content.
pub const CONTENT_DIR: &str = "content";

/// Every logical blob store, in a stable order.
pub const STORE_NAMES: [&str; 4] = [USERS_STORE, SESSIONS_STORE, FILES_STORE, CSRF_STORE];

/// The four blob stores plus the content store.
#[derive(Clone)]
pub struct StoreSet {
    pub users: Arc<dyn BlobStore>,
    pub sessions: Arc<dyn BlobStore>,
    pub files: Arc<dyn BlobStore>,
    pub csrf: Arc<dyn BlobStore>,
    pub content: Arc<dyn ContentStore>,
}

impl StoreSet {
    /// Open every store from configuration.
    pub async fn open(storage: &StorageConfig, lock: &LockConfig) -> StorageResult<Self> {
        storage.validate().map_err(StorageError::Config)?;
        let policy = LockPolicy::from_config(lock);

        match storage {
            StorageConfig::Memory => Ok(Self::in_memory(policy)),
            StorageConfig::Filesystem { path, file_mode } => {
                let open = |name: &'static str| {
                    FilesystemBlobStore::new(path, name, policy, *file_mode)
                };
                Ok(Self {
                    users: Arc::new(open(USERS_STORE).await?),
                    sessions: Arc::new(open(SESSIONS_STORE).await?),
                    files: Arc::new(open(FILES_STORE).await?),
                    csrf: Arc::new(open(CSRF_STORE).await?),
                    content: Arc::new(
                        FilesystemContentStore::new(path.join(CONTENT_DIR), *file_mode).await?,
                    ),
                })
            }
            StorageConfig::S3 { .. } => {
                let bucket = Arc::new(connect_s3(storage).await?);
                let open = |name: &str| S3BlobStore::new(bucket.clone(), name, policy);
                Ok(Self {
                    users: Arc::new(open(USERS_STORE)?),
                    sessions: Arc::new(open(SESSIONS_STORE)?),
                    files: Arc::new(open(FILES_STORE)?),
                    csrf: Arc::new(open(CSRF_STORE)?),
                    content: Arc::new(S3ContentStore::new(bucket.clone(), CONTENT_DIR)),
                })
            }
        }
    }

    /// Fresh in-memory stores.
    pub fn in_memory(policy: LockPolicy) -> Self {
        Self {
            users: Arc::new(MemoryBlobStore::new(USERS_STORE, policy)),
            sessions: Arc::new(MemoryBlobStore::new(SESSIONS_STORE, policy)),
            files: Arc::new(MemoryBlobStore::new(FILES_STORE, policy)),
            csrf: Arc::new(MemoryBlobStore::new(CSRF_STORE, policy)),
            content: Arc::new(MemoryContentStore::new()),
        }
    }

    /// Look up a blob store by its logical name.
    pub fn by_name(&self, name: &str) -> Option<&Arc<dyn BlobStore>> {
        match name {
            USERS_STORE => Some(&self.users),
            SESSIONS_STORE => Some(&self.sessions),
            FILES_STORE => Some(&self.files),
            CSRF_STORE => Some(&self.csrf),
            _ => None,
        }
    }

    /// All blob stores, in [`STORE_NAMES`] order.
    pub fn blobs(&self) -> [&Arc<dyn BlobStore>; 4] {
        [&self.users, &self.sessions, &self.files, &self.csrf]
    }
}

/// Open a single blob store from configuration.
///
/// Each call builds an independent instance. For memory storage that means an
/// empty blob with its own lock.
pub async fn open_blob_store(
    storage: &StorageConfig,
    lock: &LockConfig,
    name: &str,
) -> StorageResult<Arc<dyn BlobStore>> {
    storage.validate().map_err(StorageError::Config)?;
    let policy = LockPolicy::from_config(lock);

    match storage {
        StorageConfig::Memory => Ok(Arc::new(MemoryBlobStore::new(name, policy))),
        StorageConfig::Filesystem { path, file_mode } => Ok(Arc::new(
            FilesystemBlobStore::new(path, name, policy, *file_mode).await?,
        )),
        StorageConfig::S3 { .. } => {
            let bucket = Arc::new(connect_s3(storage).await?);
            Ok(Arc::new(S3BlobStore::new(bucket, name, policy)?))
        }
    }
}

/// Open the content store from configuration.
pub async fn open_content_store(storage: &StorageConfig) -> StorageResult<Arc<dyn ContentStore>> {
    storage.validate().map_err(StorageError::Config)?;

    match storage {
        StorageConfig::Memory => Ok(Arc::new(MemoryContentStore::new())),
        StorageConfig::Filesystem { path, file_mode } => Ok(Arc::new(
            FilesystemContentStore::new(path.join(CONTENT_DIR), *file_mode).await?,
        )),
        StorageConfig::S3 { .. } => {
            let bucket = Arc::new(connect_s3(storage).await?);
            Ok(Arc::new(S3ContentStore::new(bucket, CONTENT_DIR)))
        }
    }
}

async fn connect_s3(storage: &StorageConfig) -> StorageResult<S3Bucket> {
    match storage {
        StorageConfig::S3 {
            bucket,
            endpoint,
            region,
            prefix,
            access_key_id,
            secret_access_key,
            force_path_style,
        } => {
            S3Bucket::connect(
                bucket,
                endpoint.clone(),
                region.clone(),
                prefix.clone(),
                access_key_id.clone(),
                secret_access_key.clone(),
                *force_path_style,
            )
            .await
        }
        other => Err(StorageError::Config(format!(
            "expected s3 storage, got {}",
            other.kind()
        ))),
    }
}
