//! Represents the logical record of an object stored in the bucket.

use super::visibility::{FileCategory, UploadKind, Visibility};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Bookkeeping row for one stored object.
///
/// The record is created only after the object upload is confirmed and is
/// always removed on delete, even when the remote object could not be.
#[derive(Serialize, Deserialize, Clone, FromRow, Debug, PartialEq)]
pub struct ObjectRecord {
    /// Internal UUID for DB indexing.
    pub id: Uuid,

    /// Logical name supplied by the caller (before sanitizing).
    pub name: String,

    /// Storage key inside the bucket, e.g. `public/image/logo.png`.
    pub key: String,

    /// Access class the object was created under.
    pub visibility: Visibility,

    /// Upload kind that selected the allow-list and key segment.
    pub kind: UploadKind,

    /// Semantic category derived from the extension.
    pub category: FileCategory,

    /// Content type the object was stored with.
    pub content_type: String,

    /// Payload size in bytes as received.
    pub size_bytes: i64,

    /// When the record was created.
    pub created_at: DateTime<Utc>,
}

/// Values needed to insert an `ObjectRecord`.
#[derive(Clone, Debug, PartialEq)]
pub struct NewObjectRecord {
    pub name: String,
    pub key: String,
    pub visibility: Visibility,
    pub kind: UploadKind,
    pub category: FileCategory,
    pub content_type: String,
    pub size_bytes: i64,
}
