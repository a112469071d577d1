//! Storage key derivation: `{visibility}/{kind}/{clean-name}{.ext}`, or
//! `media/{clean-name}{.ext}` for user media files.
//!
//! Pure and deterministic. The same inputs always give the same key, which is
//! what lets PUBLIC uploads overwrite in place and PRIVATE uploads detect a
//! taken key.

use crate::models::{UploadKind, Visibility};
use serde::Serialize;
use std::fmt;

/// Longest logical name kept in a key, in characters.
pub const MAX_NAME_LEN: usize = 255;

/// Fallback stem when sanitizing leaves nothing behind.
const EMPTY_NAME: &str = "unnamed";

/// Path of an object inside the bucket.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct StorageKey(String);

impl StorageKey {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl fmt::Display for StorageKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for StorageKey {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct KeyNamingStrategy;

impl KeyNamingStrategy {
    pub const fn new() -> Self {
        Self
    }

    pub fn build_key(
        &self,
        visibility: Visibility,
        kind: UploadKind,
        logical_name: &str,
        extension: &str,
    ) -> StorageKey {
        let stem = clean_name(logical_name);
        let ext = clean_extension(extension);
        let prefix = match kind {
            UploadKind::Media => kind.as_str().to_string(),
            _ => format!("{}/{}", visibility.as_str(), kind.as_str()),
        };
        let key = if ext.is_empty() {
            format!("{prefix}/{stem}")
        } else {
            format!("{prefix}/{stem}.{ext}")
        };
        StorageKey(key)
    }
}

/// Reduce a caller-supplied name to one safe key segment.
///
/// Path separators split the name; empty, `.` and `..` segments are dropped
/// and the rest are joined with `-`. Inside a segment whitespace becomes `_`,
/// and anything other than alphanumerics, `-`, `_` and `.` is removed.
/// Leading dots are stripped so a segment can never read as `..`.
pub fn clean_name(name: &str) -> String {
    let segments: Vec<String> = name
        .split(['/', '\\'])
        .filter(|segment| !matches!(segment.trim(), "" | "." | ".."))
        .map(clean_segment)
        .filter(|segment| !segment.is_empty())
        .collect();

    let joined = segments.join("-");
    let truncated: String = joined.chars().take(MAX_NAME_LEN).collect();
    if truncated.is_empty() {
        EMPTY_NAME.to_string()
    } else {
        truncated
    }
}

fn clean_segment(segment: &str) -> String {
    let cleaned: String = segment
        .trim()
        .chars()
        .filter_map(|c| match c {
            c if c.is_whitespace() => Some('_'),
            c if c.is_alphanumeric() || matches!(c, '-' | '_' | '.') => Some(c),
            _ => None,
        })
        .collect();
    cleaned.trim_start_matches('.').to_string()
}

fn clean_extension(extension: &str) -> String {
    extension
        .trim()
        .trim_start_matches('.')
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || *c == '.')
        .collect::<String>()
        .to_ascii_lowercase()
}
