//! Capability labels and access lists.
//!
//! Users and files each carry a list of capability labels. A user may read a
//! file when the two lists share at least one label.

/// Maximum length of a single capability label.
pub const MAX_LABEL_LEN: usize = 64;

/// Check that a label is non-empty, short, and made of `[A-Za-z0-9_.:-]`.
pub fn validate_label(label: &str) -> crate::Result<()> {
    if label.is_empty() || label.len() > MAX_LABEL_LEN {
        return Err(crate::Error::InvalidCapability(format!(
            "label must be 1..={MAX_LABEL_LEN} characters: {label:?}"
        )));
    }
    if !label
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.' | ':'))
    {
        return Err(crate::Error::InvalidCapability(format!(
            "label contains unsupported characters: {label:?}"
        )));
    }
    Ok(())
}

/// Validate, trim and de-duplicate a list of labels, keeping first-seen order.
pub fn normalize<I, S>(labels: I) -> crate::Result<Vec<String>>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut out: Vec<String> = Vec::new();
    for label in labels {
        let label = label.as_ref().trim();
        if label.is_empty() {
            continue;
        }
        validate_label(label)?;
        if !out.iter().any(|l| l == label) {
            out.push(label.to_string());
        }
    }
    Ok(out)
}

/// Parse a comma-separated list such as `"foo, bar"`.
pub fn parse_list(raw: &str) -> crate::Result<Vec<String>> {
    normalize(raw.split(','))
}

/// True when the two lists share at least one label.
pub fn intersects(granted: &[String], required: &[String]) -> bool {
    granted.iter().any(|g| required.iter().any(|r| r == g))
}
