//! File upload and retrieval with access checks.
//!
//! Content bytes live in the [`ContentStore`]; the file repository only
//! records each file's access list. The two are separate stores, so replacing
//! a file narrows its access list to the labels allowed to read both the old
//! and the new bytes before touching content. A failure at any step leaves a
//! record whose readers are entitled to whatever bytes are stored.

use crate::error::{ServiceError, ServiceResult};
use bytes::Bytes;
use coffer_core::{access, names};
use coffer_metadata::{FileModel, FileRepo, MetadataError};
use coffer_storage::{ContentStore, StorageError};
use std::sync::Arc;
use tracing::instrument;

#[derive(Clone)]
pub struct FileService {
    files: Arc<dyn FileRepo>,
    content: Arc<dyn ContentStore>,
}

impl FileService {
    pub fn new(files: Arc<dyn FileRepo>, content: Arc<dyn ContentStore>) -> Self {
        Self { files, content }
    }

    /// Store `data` under `name`, replacing any existing file and its
    /// access list.
    ///
    /// If the final record write fails after new content is stored, the
    /// file stays readable only by labels in both the old and new lists.
    #[instrument(skip(self, data, labels), fields(size = data.len()))]
    pub async fn upload(
        &self,
        name: &str,
        data: Bytes,
        labels: &[String],
    ) -> ServiceResult<FileModel> {
        names::validate_file_name(name)?;
        let file = FileModel {
            name: name.to_string(),
            access: access::normalize(labels)?,
        };

        let previous = match self.files.get(name).await {
            Ok(previous) => Some(previous),
            Err(MetadataError::NotFound(_)) => None,
            Err(e) => return Err(e.into()),
        };
        if let Some(previous) = &previous {
            let narrowed = narrow_access(&previous.access, &file.access);
            self.files.update_access(name, narrowed).await?;
        }

        if let Err(e) = self.content.write(name, data).await {
            if let Some(previous) = previous
                && let Err(restore) = self.files.update_access(name, previous.access).await
            {
                tracing::warn!(error = %restore, "access list left narrowed");
            }
            return Err(e.into());
        }

        if let Err(e) = self.files.put(file.clone()).await {
            tracing::warn!(error = %e, "file record not updated after content write");
            if previous.is_none()
                && let Err(cleanup) = self.content.delete(name).await
            {
                tracing::warn!(error = %cleanup, "orphaned content left behind");
            }
            return Err(e.into());
        }
        tracing::info!(backend = self.content.backend_name(), "file uploaded");
        Ok(file)
    }

    /// Read a file for a caller holding `granted` labels.
    ///
    /// Fails with [`ServiceError::AccessDenied`] unless the caller's labels
    /// intersect the file's access list.
    pub async fn retrieve(&self, name: &str, granted: &[String]) -> ServiceResult<Bytes> {
        let file = self.files.get(name).await?;
        if !access::intersects(granted, &file.access) {
            return Err(ServiceError::AccessDenied(format!("file {name}")));
        }
        Ok(self.content.read(name).await?)
    }

    /// Read a file without an access check.
    pub async fn read(&self, name: &str) -> ServiceResult<Bytes> {
        self.files.get(name).await?;
        Ok(self.content.read(name).await?)
    }

    pub async fn get(&self, name: &str) -> ServiceResult<FileModel> {
        Ok(self.files.get(name).await?)
    }

    pub async fn list(&self) -> ServiceResult<Vec<FileModel>> {
        Ok(self.files.list().await?)
    }

    /// Files whose access list intersects `granted`.
    pub async fn list_visible(&self, granted: &[String]) -> ServiceResult<Vec<FileModel>> {
        let mut files = self.files.list().await?;
        files.retain(|f| access::intersects(granted, &f.access));
        Ok(files)
    }

    /// Remove the record, then the content.
    #[instrument(skip(self))]
    pub async fn delete(&self, name: &str) -> ServiceResult<()> {
        self.files.delete(name).await?;
        match self.content.delete(name).await {
            Ok(()) => Ok(()),
            Err(StorageError::NotFound(_)) => {
                tracing::warn!("file record had no content");
                Ok(())
            }
            Err(e) => Err(e.into()),
        }
    }

    pub async fn update_access(&self, name: &str, labels: &[String]) -> ServiceResult<Vec<String>> {
        let labels = access::normalize(labels)?;
        self.files.update_access(name, labels.clone()).await?;
        Ok(labels)
    }
}

/// Labels present in both lists, in `old` order.
fn narrow_access(old: &[String], new: &[String]) -> Vec<String> {
    old.iter().filter(|l| new.contains(l)).cloned().collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn labels(v: &[&str]) -> Vec<String> {
        v.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_narrow_access() {
        assert_eq!(
            narrow_access(&labels(&["a", "b", "c"]), &labels(&["c", "a"])),
            labels(&["a", "c"])
        );
        assert!(narrow_access(&labels(&["public"]), &labels(&["secret"])).is_empty());
    }
}
