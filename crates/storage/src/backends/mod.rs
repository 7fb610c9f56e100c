//! Storage backend implementations.

pub mod filesystem;
pub mod memory;
pub mod s3;

use crate::error::{StorageError, StorageResult};

/// Content keys are flat: one non-empty segment with no separators and no
/// `..`. Every backend applies the same rule.
pub(crate) fn validate_key(key: &str) -> StorageResult<()> {
    if key.is_empty() || key == "." || key.contains("..") || key.contains('/') || key.contains('\\')
    {
        return Err(StorageError::InvalidKey(format!(
            "path traversal not allowed: {key}"
        )));
    }
    Ok(())
}
