//! File access-list repository. Content bytes live in the content store.

use crate::document::{Change, JsonDocument};
use crate::error::{MetadataError, MetadataResult};
use crate::models::FileModel;
use async_trait::async_trait;
use coffer_storage::BlobStore;
use std::sync::Arc;

/// Repository for file records.
#[async_trait]
pub trait FileRepo: Send + Sync {
    /// Insert a new record. Fails with `AlreadyExists` if the name is taken.
    async fn create(&self, file: FileModel) -> MetadataResult<()>;

    /// Insert or replace a record.
    async fn put(&self, file: FileModel) -> MetadataResult<()>;

    async fn get(&self, name: &str) -> MetadataResult<FileModel>;

    /// All records, ordered by name.
    async fn list(&self) -> MetadataResult<Vec<FileModel>>;

    async fn exists(&self, name: &str) -> MetadataResult<bool>;

    async fn delete(&self, name: &str) -> MetadataResult<()>;

    /// Replace a record's capability labels.
    async fn update_access(&self, name: &str, access: Vec<String>) -> MetadataResult<()>;
}

/// [`FileRepo`] over a JSON blob store.
pub struct JsonFileRepo {
    doc: JsonDocument<FileModel>,
}

impl JsonFileRepo {
    pub fn new(store: Arc<dyn BlobStore>) -> Self {
        Self {
            doc: JsonDocument::new(store),
        }
    }
}

#[async_trait]
impl FileRepo for JsonFileRepo {
    async fn create(&self, file: FileModel) -> MetadataResult<()> {
        self.doc
            .update("files.create", |files| {
                if files.contains_key(&file.name) {
                    return Err(MetadataError::AlreadyExists(format!("file {}", file.name)));
                }
                files.insert(file.name.clone(), file);
                Ok(Change::Modified(()))
            })
            .await
    }

    async fn put(&self, file: FileModel) -> MetadataResult<()> {
        self.doc
            .update("files.put", |files| {
                if files.get(&file.name) == Some(&file) {
                    return Ok(Change::Unchanged(()));
                }
                files.insert(file.name.clone(), file);
                Ok(Change::Modified(()))
            })
            .await
    }

    async fn get(&self, name: &str) -> MetadataResult<FileModel> {
        self.doc
            .load("files.get")
            .await?
            .remove(name)
            .ok_or_else(|| MetadataError::NotFound(format!("file {name}")))
    }

    async fn list(&self) -> MetadataResult<Vec<FileModel>> {
        Ok(self.doc.load("files.list").await?.into_values().collect())
    }

    async fn exists(&self, name: &str) -> MetadataResult<bool> {
        Ok(self.doc.load("files.exists").await?.contains_key(name))
    }

    async fn delete(&self, name: &str) -> MetadataResult<()> {
        self.doc
            .update("files.delete", |files| match files.remove(name) {
                Some(_) => Ok(Change::Modified(())),
                None => Err(MetadataError::NotFound(format!("file {name}"))),
            })
            .await
    }

    async fn update_access(&self, name: &str, access: Vec<String>) -> MetadataResult<()> {
        self.doc
            .update("files.update_access", |files| {
                let file = files
                    .get_mut(name)
                    .ok_or_else(|| MetadataError::NotFound(format!("file {name}")))?;
                if file.access == access {
                    return Ok(Change::Unchanged(()));
                }
                file.access = access;
                Ok(Change::Modified(()))
            })
            .await
    }
}
