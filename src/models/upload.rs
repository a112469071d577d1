//! Transient upload request consumed by the lifecycle coordinator.

use super::visibility::{UploadKind, Visibility};
use bytes::Bytes;
use std::{fmt, io::Cursor};
use tokio::io::{AsyncRead, AsyncSeek};

/// Readable, rewindable upload body.
///
/// Anything tokio can read and seek qualifies: an open `tokio::fs::File`, or a
/// `std::io::Cursor` over buffered bytes.
pub trait Payload: AsyncRead + AsyncSeek + Send + Unpin {}

impl<T> Payload for T where T: AsyncRead + AsyncSeek + Send + Unpin + ?Sized {}

/// One upload request. Never persisted.
pub struct UploadDescriptor {
    /// Caller-chosen logical name; becomes the key stem after sanitizing.
    pub logical_name: String,
    /// Original client filename; only its extension is used.
    pub file_name: String,
    pub visibility: Visibility,
    pub kind: UploadKind,
    /// Size reported by the caller, checked against the upload limit.
    pub declared_size: u64,
    pub body: Box<dyn Payload>,
}

impl UploadDescriptor {
    pub fn new(
        logical_name: impl Into<String>,
        file_name: impl Into<String>,
        visibility: Visibility,
        kind: UploadKind,
        declared_size: u64,
        body: Box<dyn Payload>,
    ) -> Self {
        Self {
            logical_name: logical_name.into(),
            file_name: file_name.into(),
            visibility,
            kind,
            declared_size,
            body,
        }
    }

    /// Build a descriptor over an in-memory body; the declared size is its length.
    pub fn from_bytes(
        logical_name: impl Into<String>,
        file_name: impl Into<String>,
        visibility: Visibility,
        kind: UploadKind,
        data: impl Into<Bytes>,
    ) -> Self {
        let data: Bytes = data.into();
        let size = data.len() as u64;
        Self::new(
            logical_name,
            file_name,
            visibility,
            kind,
            size,
            Box::new(Cursor::new(data)),
        )
    }
}

impl fmt::Debug for UploadDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UploadDescriptor")
            .field("logical_name", &self.logical_name)
            .field("file_name", &self.file_name)
            .field("visibility", &self.visibility)
            .field("kind", &self.kind)
            .field("declared_size", &self.declared_size)
            .finish_non_exhaustive()
    }
}
