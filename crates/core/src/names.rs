//! Validation for user and file names.
//!
//! Names double as map keys in the JSON stores and as object keys in the
//! content store, so they must never contain path separators or traversal
//! segments.

/// Maximum length of a user name.
pub const MAX_USER_NAME_LEN: usize = 64;

/// Maximum length of a file name.
pub const MAX_FILE_NAME_LEN: usize = 255;

/// Validate a user name: `[A-Za-z0-9_.-]`, not starting with a dot.
pub fn validate_user_name(name: &str) -> crate::Result<()> {
    if name.is_empty() || name.len() > MAX_USER_NAME_LEN {
        return Err(crate::Error::InvalidName(format!(
            "user name must be 1..={MAX_USER_NAME_LEN} characters"
        )));
    }
    if name.starts_with('.')
        || !name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.'))
    {
        return Err(crate::Error::InvalidName(format!(
            "user name contains unsupported characters: {name:?}"
        )));
    }
    Ok(())
}

/// Validate a file name: printable, no separators, no leading dot and no
/// `..` anywhere, matching what every content store accepts as a key.
pub fn validate_file_name(name: &str) -> crate::Result<()> {
    if name.is_empty() || name.len() > MAX_FILE_NAME_LEN {
        return Err(crate::Error::InvalidName(format!(
            "file name must be 1..={MAX_FILE_NAME_LEN} bytes"
        )));
    }
    if name.starts_with('.') {
        return Err(crate::Error::InvalidName(format!(
            "file name may not start with a dot: {name:?}"
        )));
    }
    if name.contains("..") {
        return Err(crate::Error::InvalidName(format!(
            "file name may not contain '..': {name:?}"
        )));
    }
    if name
        .chars()
        .any(|c| c == '/' || c == '\\' || c.is_control())
    {
        return Err(crate::Error::InvalidName(format!(
            "file name contains a separator or control character: {name:?}"
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_user_names() {
        assert!(validate_user_name("alice").is_ok());
        assert!(validate_user_name("bob.smith-2").is_ok());
        assert!(validate_user_name("").is_err());
        assert!(validate_user_name(".hidden").is_err());
        assert!(validate_user_name("a b").is_err());
        assert!(validate_user_name("a/b").is_err());
    }

    #[test]
    fn test_file_names() {
        assert!(validate_file_name("foo.txt").is_ok());
        assert!(validate_file_name("report 2024.pdf").is_ok());
        assert!(validate_file_name("..").is_err());
        assert!(validate_file_name("../etc/passwd").is_err());
        assert!(validate_file_name("dir/file").is_err());
        assert!(validate_file_name("a\\b").is_err());
        assert!(validate_file_name("bad\nname").is_err());
        assert!(validate_file_name("notes..txt").is_err());
        assert!(validate_file_name("notes.v2.txt").is_ok());
    }
}
