//! Core data models for the media storage layer.
//!
//! Access classes, upload kinds and semantic categories are plain enums that
//! serialize as lowercase strings, both in JSON and in SQLite columns.
//! `ObjectRecord` maps to the `objects` table via `sqlx::FromRow`.

pub mod object;
pub mod upload;
pub mod visibility;

pub use object::{NewObjectRecord, ObjectRecord};
pub use upload::{Payload, UploadDescriptor};
pub use visibility::{FileCategory, UploadKind, Visibility};
