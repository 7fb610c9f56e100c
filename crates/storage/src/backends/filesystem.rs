//! Local filesystem backend.
//!
//! A blob lives at `<root>/<name>`; its writer lock is the sibling file
//! `<root>/<name>.lock`, created with exclusive-create semantics. The lock
//! file's contents are never read, only its existence matters.

use super::validate_key;
use crate::error::{StorageError, StorageResult};
use crate::lock::LockPolicy;
use crate::traits::{BlobStore, ContentStore};
use async_trait::async_trait;
use bytes::Bytes;
use std::path::{Component, Path, PathBuf};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::instrument;
use uuid::Uuid;

/// Default permission bits for blobs, lock files and content.
pub const DEFAULT_FILE_MODE: u32 = 0o600;

/// Resolve `key` under `root`, rejecting anything that could escape it.
///
/// Keys must be a single normal path component. Existing paths are
/// canonicalized so a symlink planted inside the root cannot point outside.
fn resolve_key_sync(root: &Path, key: &str) -> StorageResult<PathBuf> {
    validate_key(key)?;

    let mut components = Path::new(key).components();
    match (components.next(), components.next()) {
        (Some(Component::Normal(_)), None) => {}
        _ => {
            return Err(StorageError::InvalidKey(format!(
                "contains unsafe path component: {key}"
            )));
        }
    }

    let path = root.join(key);
    let root_canonical = root.canonicalize().map_err(|e| {
        StorageError::Io(std::io::Error::new(
            e.kind(),
            format!("failed to canonicalize root: {e}"),
        ))
    })?;

    match std::fs::symlink_metadata(&path) {
        Ok(meta) => {
            let canonical = path.canonicalize().map_err(|e| {
                if meta.file_type().is_symlink() {
                    StorageError::InvalidKey(format!("symlink target missing or invalid: {key}"))
                } else {
                    StorageError::Io(std::io::Error::new(
                        e.kind(),
                        format!("failed to canonicalize path: {e}"),
                    ))
                }
            })?;
            if !canonical.starts_with(&root_canonical) {
                return Err(StorageError::InvalidKey(format!(
                    "resolved path escapes storage root: {key}"
                )));
            }
            Ok(path)
        }
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(path),
        Err(err) => Err(StorageError::Io(std::io::Error::new(
            err.kind(),
            format!("failed to stat path: {err}"),
        ))),
    }
}

async fn resolve_key(root: &Path, key: &str) -> StorageResult<PathBuf> {
    let root = root.to_path_buf();
    let key = key.to_string();
    tokio::task::spawn_blocking(move || resolve_key_sync(&root, &key))
        .await
        .map_err(|e| StorageError::Io(std::io::Error::other(format!("spawn_blocking failed: {e}"))))?
}

fn open_options(mode: u32) -> fs::OpenOptions {
    let mut options = fs::OpenOptions::new();
    options.write(true);
    #[cfg(unix)]
    options.mode(mode);
    #[cfg(not(unix))]
    let _ = mode;
    options
}

/// Write `data` to `path` via a unique temp file, fsync, then rename.
async fn write_atomic(path: &Path, data: &[u8], mode: u32) -> StorageResult<()> {
    let temp_name = format!(".tmp.{}", Uuid::new_v4());
    let temp_path = path.with_file_name(
        path.file_name()
            .map(|n| format!(".{}{}", n.to_string_lossy(), temp_name))
            .unwrap_or_else(|| temp_name.clone()),
    );

    let written = async {
        let mut file = open_options(mode)
            .create_new(true)
            .open(&temp_path)
            .await?;
        file.write_all(data).await?;
        file.sync_all().await?;
        fs::rename(&temp_path, path).await
    }
    .await;

    if let Err(err) = written {
        let _ = fs::remove_file(&temp_path).await;
        return Err(StorageError::Io(err));
    }
    Ok(())
}

fn not_found_as(key: &str) -> impl FnOnce(std::io::Error) -> StorageError + '_ {
    move |e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            StorageError::NotFound(key.to_string())
        } else {
            StorageError::Io(e)
        }
    }
}

/// Filesystem blob store with a sibling lock file.
#[derive(Debug)]
pub struct FilesystemBlobStore {
    name: String,
    blob_path: PathBuf,
    lock_path: PathBuf,
    root: PathBuf,
    policy: LockPolicy,
    file_mode: u32,
}

impl FilesystemBlobStore {
    /// Open the store `name` under `root`, creating the directory if needed.
    pub async fn new(
        root: impl AsRef<Path>,
        name: &str,
        policy: LockPolicy,
        file_mode: u32,
    ) -> StorageResult<Self> {
        let root = root.as_ref().to_path_buf();
        fs::create_dir_all(&root).await?;
        let blob_path = resolve_key(&root, name).await?;
        let lock_path = resolve_key(&root, &format!("{name}.lock")).await?;
        Ok(Self {
            name: name.to_string(),
            blob_path,
            lock_path,
            root,
            policy,
            file_mode,
        })
    }

    /// Path of the sibling lock file.
    pub fn lock_path(&self) -> &Path {
        &self.lock_path
    }

    /// One exclusive-create attempt. `Ok(false)` means another writer holds it.
    async fn try_acquire(&self) -> StorageResult<bool> {
        match open_options(self.file_mode)
            .create_new(true)
            .open(&self.lock_path)
            .await
        {
            Ok(_) => Ok(true),
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => Ok(false),
            Err(e) => Err(StorageError::Io(e)),
        }
    }
}

#[async_trait]
impl BlobStore for FilesystemBlobStore {
    fn name(&self) -> &str {
        &self.name
    }

    fn backend_name(&self) -> &'static str {
        "filesystem"
    }

    #[instrument(skip(self), fields(backend = "filesystem", store = %self.name))]
    async fn wait_unlocked(&self) -> StorageResult<()> {
        self.policy
            .retry(&self.name, || async {
                fs::try_exists(&self.lock_path)
                    .await
                    .map(|locked| !locked)
                    .map_err(StorageError::Io)
            })
            .await
    }

    #[instrument(skip(self), fields(backend = "filesystem", store = %self.name))]
    async fn lock(&self) -> StorageResult<()> {
        self.policy
            .retry(&self.name, || self.try_acquire())
            .await
    }

    #[instrument(skip(self), fields(backend = "filesystem", store = %self.name))]
    async fn unlock(&self) -> StorageResult<()> {
        fs::remove_file(&self.lock_path).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                StorageError::LockNotHeld(self.name.clone())
            } else {
                StorageError::Io(e)
            }
        })
    }

    async fn is_locked(&self) -> StorageResult<bool> {
        Ok(fs::try_exists(&self.lock_path).await?)
    }

    #[instrument(skip(self), fields(backend = "filesystem", store = %self.name))]
    async fn load(&self) -> StorageResult<Bytes> {
        match fs::read(&self.blob_path).await {
            Ok(data) => Ok(Bytes::from(data)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Bytes::new()),
            Err(e) => Err(StorageError::Io(e)),
        }
    }

    #[instrument(skip(self, data), fields(backend = "filesystem", store = %self.name, size = data.len()))]
    async fn store(&self, data: Bytes) -> StorageResult<()> {
        write_atomic(&self.blob_path, &data, self.file_mode).await
    }

    async fn health_check(&self) -> StorageResult<()> {
        let meta = fs::metadata(&self.root).await?;
        if !meta.is_dir() {
            return Err(StorageError::Config(format!(
                "storage root is not a directory: {}",
                self.root.display()
            )));
        }
        Ok(())
    }
}

/// Filesystem content store. One file per name under a single directory.
#[derive(Debug)]
pub struct FilesystemContentStore {
    root: PathBuf,
    file_mode: u32,
}

impl FilesystemContentStore {
    pub async fn new(root: impl AsRef<Path>, file_mode: u32) -> StorageResult<Self> {
        let root = root.as_ref().to_path_buf();
        fs::create_dir_all(&root).await?;
        Ok(Self { root, file_mode })
    }
}

#[async_trait]
impl ContentStore for FilesystemContentStore {
    #[instrument(skip(self, data), fields(backend = "filesystem", size = data.len()))]
    async fn write(&self, name: &str, data: Bytes) -> StorageResult<()> {
        let path = resolve_key(&self.root, name).await?;
        write_atomic(&path, &data, self.file_mode).await
    }

    #[instrument(skip(self), fields(backend = "filesystem"))]
    async fn read(&self, name: &str) -> StorageResult<Bytes> {
        let path = resolve_key(&self.root, name).await?;
        let data = fs::read(&path).await.map_err(not_found_as(name))?;
        Ok(Bytes::from(data))
    }

    #[instrument(skip(self), fields(backend = "filesystem"))]
    async fn delete(&self, name: &str) -> StorageResult<()> {
        let path = resolve_key(&self.root, name).await?;
        fs::remove_file(&path).await.map_err(not_found_as(name))
    }

    #[instrument(skip(self), fields(backend = "filesystem"))]
    async fn exists(&self, name: &str) -> StorageResult<bool> {
        let path = resolve_key(&self.root, name).await?;
        fs::try_exists(&path).await.map_err(StorageError::Io)
    }

    fn backend_name(&self) -> &'static str {
        "filesystem"
    }
}
