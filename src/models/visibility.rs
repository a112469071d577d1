//! Access classes, upload kinds and extension categories.

use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};

/// Access class of a stored object.
///
/// Fixed at creation. Moving an object between classes means copying it to a
/// new key and deleting the old one.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Hash, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(rename_all = "lowercase")]
pub enum Visibility {
    /// Private ACL, signed time-limited URLs, no overwrite.
    Private,
    /// Public-read ACL, permanent unsigned URLs, overwrite allowed.
    Public,
}

impl Visibility {
    pub const fn as_str(self) -> &'static str {
        match self {
            Visibility::Private => "private",
            Visibility::Public => "public",
        }
    }
}

/// What the caller is uploading. Selects the allow-list and the key segment.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Hash, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(rename_all = "lowercase")]
pub enum UploadKind {
    Image,
    Video,
    File,
    /// User files kept under `media/`; PRIVATE only.
    Media,
}

impl UploadKind {
    pub const fn as_str(self) -> &'static str {
        match self {
            UploadKind::Image => "image",
            UploadKind::Video => "video",
            UploadKind::File => "file",
            UploadKind::Media => "media",
        }
    }

    /// Whether uploads of this kind may use `visibility`.
    pub const fn allows(self, visibility: Visibility) -> bool {
        !matches!((self, visibility), (UploadKind::Media, Visibility::Public))
    }
}

/// Semantic grouping of a file, derived from its extension only.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Hash, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(rename_all = "lowercase")]
pub enum FileCategory {
    Image,
    Video,
    Archive,
    Document,
    Table,
    Unknown,
}

impl FileCategory {
    pub const fn as_str(self) -> &'static str {
        match self {
            FileCategory::Image => "image",
            FileCategory::Video => "video",
            FileCategory::Archive => "archive",
            FileCategory::Document => "document",
            FileCategory::Table => "table",
            FileCategory::Unknown => "unknown",
        }
    }
}

/// Error returned when parsing one of the enums from a path segment or query.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown {what} `{value}`")]
pub struct ParseEnumError {
    pub what: &'static str,
    pub value: String,
}

impl FromStr for Visibility {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "private" => Ok(Visibility::Private),
            "public" => Ok(Visibility::Public),
            _ => Err(ParseEnumError {
                what: "visibility",
                value: s.to_string(),
            }),
        }
    }
}

impl FromStr for UploadKind {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "image" => Ok(UploadKind::Image),
            "video" => Ok(UploadKind::Video),
            "file" => Ok(UploadKind::File),
            "media" => Ok(UploadKind::Media),
            _ => Err(ParseEnumError {
                what: "upload kind",
                value: s.to_string(),
            }),
        }
    }
}

impl fmt::Display for Visibility {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl fmt::Display for UploadKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl fmt::Display for FileCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_case_insensitively() {
        assert_eq!("PUBLIC".parse::<Visibility>(), Ok(Visibility::Public));
        assert_eq!("Image".parse::<UploadKind>(), Ok(UploadKind::Image));
        assert_eq!("media".parse::<UploadKind>(), Ok(UploadKind::Media));
    }

    #[test]
    fn media_is_private_only() {
        assert!(UploadKind::Media.allows(Visibility::Private));
        assert!(!UploadKind::Media.allows(Visibility::Public));
        assert!(UploadKind::File.allows(Visibility::Public));
    }

    #[test]
    fn rejects_unknown_values() {
        let err = "shared".parse::<Visibility>().unwrap_err();
        assert_eq!(err.to_string(), "unknown visibility `shared`");
    }

    #[test]
    fn serializes_lowercase() {
        let json = serde_json::to_string(&FileCategory::Archive).unwrap();
        assert_eq!(json, "\"archive\"");
    }
}
