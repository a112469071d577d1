//! Backend seam between the object store and the S3 protocol client.
//!
//! `ObjectStore` only speaks this trait, so the transfer logic can be tested
//! against mocks and in-memory fakes. The production implementation lives in
//! `s3_backend`.

use async_trait::async_trait;
use bytes::Bytes;
use serde::Serialize;
use std::time::Duration;
use thiserror::Error;

/// Failure reported by the storage backend.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum BackendError {
    #[error("storage backend unreachable: {0}")]
    Unreachable(String),
    #[error("storage backend rejected credentials: {0}")]
    AuthRejected(String),
    #[error("storage backend error: {0}")]
    Other(String),
}

pub type BackendResult<T> = Result<T, BackendError>;

/// Canned ACL applied to new objects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum CannedAcl {
    #[serde(rename = "private")]
    Private,
    #[serde(rename = "public-read")]
    PublicRead,
}

impl CannedAcl {
    pub const fn as_str(self) -> &'static str {
        match self {
            CannedAcl::Private => "private",
            CannedAcl::PublicRead => "public-read",
        }
    }
}

/// Per-write object parameters.
///
/// Built fresh for every upload from the store's visibility defaults plus the
/// resolved content headers; never shared between calls.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ObjectParams {
    pub acl: CannedAcl,
    pub cache_control: String,
    pub content_type: String,
    pub content_encoding: Option<String>,
}

/// One finished part of a multipart upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompletedPart {
    pub part_number: i32,
    pub etag: Option<String>,
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ObjectBackend: Send + Sync {
    /// Write a whole object in one request.
    async fn put_object(&self, key: &str, body: Bytes, params: &ObjectParams) -> BackendResult<()>;

    /// Start a multipart upload and return its upload id.
    async fn create_multipart_upload(&self, key: &str, params: &ObjectParams)
    -> BackendResult<String>;

    async fn upload_part(
        &self,
        key: &str,
        upload_id: &str,
        part_number: i32,
        body: Bytes,
    ) -> BackendResult<CompletedPart>;

    /// Commit the parts. They must be in ascending part-number order.
    async fn complete_multipart_upload(
        &self,
        key: &str,
        upload_id: &str,
        parts: Vec<CompletedPart>,
    ) -> BackendResult<()>;

    /// Discard an unfinished multipart upload and its stored parts.
    async fn abort_multipart_upload(&self, key: &str, upload_id: &str) -> BackendResult<()>;

    /// `Ok(false)` only when the backend says the key is absent. Connectivity
    /// problems are errors, never `false`.
    async fn head_object(&self, key: &str) -> BackendResult<bool>;

    /// Remove an object. Removing a missing key succeeds.
    async fn delete_object(&self, key: &str) -> BackendResult<()>;

    /// Signed GET URL valid for `expires_in`.
    async fn presign_get(&self, key: &str, expires_in: Duration) -> BackendResult<String>;

    /// Stable unsigned URL.
    fn public_url(&self, key: &str) -> String;

    /// Cheap reachability probe against the configured bucket.
    async fn check_bucket(&self) -> BackendResult<()>;
}
