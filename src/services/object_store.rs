//! ObjectStore: one configured view of the bucket per visibility.
//!
//! PRIVATE and PUBLIC stores share the backend and transfer policy and differ
//! only in their `VisibilityProfile`: ACL, cache headers, URL signing and
//! overwrite behavior. Stores are immutable after construction and cheap to
//! clone; every upload builds its own `ObjectParams`.

use crate::{
    models::{Payload, Visibility},
    services::{
        backend::{BackendError, CannedAcl, CompletedPart, ObjectBackend, ObjectParams},
        content_type::ResolvedType,
        naming::StorageKey,
        transfer::{TransferPlan, TransferPolicy},
        validation::{self, ValidationError},
    },
};
use bytes::Bytes;
use flate2::{Compression, write::GzEncoder};
use futures::{StreamExt, TryStreamExt, stream};
use serde::Serialize;
use std::{
    io::{self, SeekFrom, Write},
    sync::Arc,
    time::Duration,
};
use thiserror::Error;
use tokio::io::{AsyncReadExt, AsyncSeekExt};
use tracing::{debug, error, info, warn};

/// Default lifetime of a signed URL, in seconds.
pub const DEFAULT_LINK_EXPIRATION: u64 = 300;
pub const PRIVATE_CACHE_CONTROL: &str = "max-age=86400";
pub const PUBLIC_CACHE_CONTROL: &str = "max-age=0";

/// Content types compressed before upload when gzip is enabled.
pub const GZIP_CONTENT_TYPES: [&str; 5] = [
    "text/css",
    "text/javascript",
    "application/javascript",
    "application/x-javascript",
    "image/svg+xml",
];

#[derive(Debug, Error)]
pub enum StoreError {
    #[error(transparent)]
    Backend(#[from] BackendError),
    #[error(transparent)]
    Rejected(#[from] ValidationError),
    #[error("object `{0}` already exists and this store does not overwrite")]
    KeyExists(String),
    #[error("failed to read upload body: {0}")]
    Io(#[from] io::Error),
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Per-visibility defaults.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VisibilityProfile {
    pub visibility: Visibility,
    pub acl: CannedAcl,
    pub cache_control: String,
    /// Signed, expiring URLs when true; stable unsigned URLs otherwise.
    pub signed_urls: bool,
    /// Whether an upload may replace an existing object under the same key.
    pub file_overwrite: bool,
    pub default_expire_secs: u64,
}

impl VisibilityProfile {
    pub fn private(cache_control: impl Into<String>, default_expire_secs: u64) -> Self {
        Self {
            visibility: Visibility::Private,
            acl: CannedAcl::Private,
            cache_control: cache_control.into(),
            signed_urls: true,
            file_overwrite: false,
            default_expire_secs,
        }
    }

    pub fn public(cache_control: impl Into<String>) -> Self {
        Self {
            visibility: Visibility::Public,
            acl: CannedAcl::PublicRead,
            cache_control: cache_control.into(),
            signed_urls: false,
            file_overwrite: true,
            default_expire_secs: DEFAULT_LINK_EXPIRATION,
        }
    }
}

impl Default for VisibilityProfile {
    fn default() -> Self {
        Self::private(PRIVATE_CACHE_CONTROL, DEFAULT_LINK_EXPIRATION)
    }
}

/// Optional in-memory gzip of compressible text payloads.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GzipPolicy {
    pub enabled: bool,
    pub content_types: Vec<String>,
}

impl GzipPolicy {
    pub fn enabled() -> Self {
        Self {
            enabled: true,
            ..Self::default()
        }
    }

    /// Compression applies to listed types that carry no encoding yet.
    pub fn applies(&self, resolved: &ResolvedType) -> bool {
        self.enabled
            && resolved.content_encoding.is_none()
            && self
                .content_types
                .iter()
                .any(|t| t.eq_ignore_ascii_case(resolved.essence()))
    }
}

impl Default for GzipPolicy {
    fn default() -> Self {
        Self {
            enabled: false,
            content_types: GZIP_CONTENT_TYPES.iter().map(|t| t.to_string()).collect(),
        }
    }
}

/// What an upload actually wrote.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UploadReceipt {
    pub key: String,
    /// Bytes read from the caller's payload.
    pub source_size: u64,
    /// Bytes sent to the backend (after compression, if any).
    pub size_bytes: u64,
    pub params: ObjectParams,
    /// Number of parts for multipart uploads, `None` for a single PUT.
    pub parts: Option<usize>,
}

#[derive(Clone)]
pub struct ObjectStore {
    backend: Arc<dyn ObjectBackend>,
    profile: VisibilityProfile,
    transfer: TransferPolicy,
    gzip: GzipPolicy,
}

impl ObjectStore {
    pub fn new(
        backend: Arc<dyn ObjectBackend>,
        profile: VisibilityProfile,
        transfer: TransferPolicy,
        gzip: GzipPolicy,
    ) -> Self {
        Self {
            backend,
            profile,
            transfer,
            gzip,
        }
    }

    pub fn visibility(&self) -> Visibility {
        self.profile.visibility
    }

    pub fn profile(&self) -> &VisibilityProfile {
        &self.profile
    }

    pub fn backend(&self) -> &Arc<dyn ObjectBackend> {
        &self.backend
    }

    /// Fresh parameter set for one write.
    pub fn object_params(&self, resolved: &ResolvedType) -> ObjectParams {
        ObjectParams {
            acl: self.profile.acl,
            cache_control: self.profile.cache_control.clone(),
            content_type: resolved.content_type.clone(),
            content_encoding: resolved.content_encoding.map(str::to_string),
        }
    }

    /// Upload a payload under `key`.
    ///
    /// - Rewinds the body first, so a retried call re-reads from the start.
    /// - Rejects payloads whose measured length exceeds the transfer limit,
    ///   whatever size the caller declared.
    /// - Refuses to replace an existing object when the profile forbids it.
    /// - Gzips compressible text types when enabled and no encoding is set.
    /// - Uses a single PUT below the multipart threshold; above it, uploads
    ///   fixed-size parts with bounded concurrency and aborts the whole upload
    ///   on the first failed part.
    ///
    /// Backend failures are returned as-is; nothing is retried here.
    pub async fn upload(
        &self,
        key: &StorageKey,
        body: &mut dyn Payload,
        resolved: &ResolvedType,
    ) -> StoreResult<UploadReceipt> {
        let key = key.as_str();
        let mut params = self.object_params(resolved);

        let source_size = rewind_and_measure(body).await?;
        validation::check_size(source_size, self.transfer.max_upload_size)?;

        if !self.profile.file_overwrite && self.backend.head_object(key).await? {
            warn!(key, visibility = %self.profile.visibility, "refusing to overwrite existing object");
            return Err(StoreError::KeyExists(key.to_string()));
        }

        let mut size = source_size;
        let mut compressed;
        let body: &mut dyn Payload = if self.gzip.applies(resolved) {
            let raw = read_all(body, size).await?;
            let data = gzip(&raw)?;
            debug!(key, before = raw.len(), after = data.len(), "gzip-compressed payload");
            params.content_encoding = Some("gzip".to_string());
            size = data.len() as u64;
            compressed = io::Cursor::new(data);
            &mut compressed
        } else {
            body
        };

        let parts = match self.transfer.plan(size) {
            TransferPlan::Single => {
                debug!(key, size, "single-request upload");
                let data = read_all(body, size).await?;
                self.put_single(key, data, &params).await?;
                None
            }
            TransferPlan::Multipart {
                chunk_size,
                parts,
                concurrency,
            } => {
                debug!(key, size, chunk_size, parts, concurrency, "multipart upload");
                Some(
                    self.put_multipart(key, body, &params, chunk_size, concurrency)
                        .await?,
                )
            }
        };

        info!(
            key,
            size,
            acl = params.acl.as_str(),
            content_type = %params.content_type,
            "stored object"
        );
        Ok(UploadReceipt {
            key: key.to_string(),
            source_size,
            size_bytes: size,
            params,
            parts,
        })
    }

    async fn put_single(&self, key: &str, data: Bytes, params: &ObjectParams) -> StoreResult<()> {
        self.backend
            .put_object(key, data, params)
            .await
            .map_err(|err| {
                error!(key, error = %err, "upload failed");
                StoreError::Backend(err)
            })
    }

    async fn put_multipart(
        &self,
        key: &str,
        body: &mut dyn Payload,
        params: &ObjectParams,
        chunk_size: u64,
        concurrency: usize,
    ) -> StoreResult<usize> {
        let upload_id = self.backend.create_multipart_upload(key, params).await.map_err(|err| {
            error!(key, error = %err, "could not start multipart upload");
            StoreError::Backend(err)
        })?;

        let outcome = match self
            .upload_parts(key, &upload_id, body, chunk_size, concurrency)
            .await
        {
            Ok(parts) => {
                let count = parts.len();
                self.backend
                    .complete_multipart_upload(key, &upload_id, parts)
                    .await
                    .map(|_| count)
                    .map_err(StoreError::from)
            }
            Err(err) => Err(err),
        };

        if let Err(err) = &outcome {
            error!(key, upload_id = %upload_id, error = %err, "multipart upload failed, aborting");
            if let Err(abort_err) = self.backend.abort_multipart_upload(key, &upload_id).await {
                error!(key, upload_id = %upload_id, error = %abort_err, "failed to abort multipart upload");
            }
        }
        outcome
    }

    /// Read the body chunk by chunk and keep at most `concurrency` parts in
    /// flight. Parts come back in completion order and are sorted here.
    async fn upload_parts(
        &self,
        key: &str,
        upload_id: &str,
        body: &mut dyn Payload,
        chunk_size: u64,
        concurrency: usize,
    ) -> StoreResult<Vec<CompletedPart>> {
        let backend = &self.backend;
        let chunks = stream::try_unfold((body, 1i32), move |(body, part_number)| async move {
            read_chunk(&mut *body, chunk_size)
                .await
                .map(|chunk| chunk.map(|data| ((part_number, data), (body, part_number + 1))))
        })
        // Boxed so callers' `Send` checks see `dyn Stream + Send` instead of
        // the unfold closure, which rustc cannot prove `Send` for in general.
        .boxed();

        let mut parts: Vec<CompletedPart> = chunks
            .map_ok(move |(part_number, data)| async move {
                debug!(key, part_number, len = data.len(), "uploading part");
                backend
                    .upload_part(key, upload_id, part_number, data)
                    .await
                    .map_err(StoreError::from)
            })
            .try_buffer_unordered(concurrency.max(1))
            .try_collect()
            .await?;

        parts.sort_by_key(|part| part.part_number);
        Ok(parts)
    }

    /// Whether `key` exists. Backend trouble is an error, not `false`.
    pub async fn exists(&self, key: &str) -> StoreResult<bool> {
        Ok(self.backend.head_object(key).await?)
    }

    /// Delete `key`. Deleting a missing key succeeds.
    pub async fn delete(&self, key: &str) -> StoreResult<()> {
        self.backend.delete_object(key).await?;
        debug!(key, "deleted object");
        Ok(())
    }

    /// URL for `key`. Signed stores honor `expire_seconds` (default from the
    /// profile); unsigned stores ignore it and return the stable URL.
    pub async fn url(&self, key: &str, expire_seconds: Option<u64>) -> StoreResult<String> {
        if !self.profile.signed_urls {
            return Ok(self.backend.public_url(key));
        }
        let secs = expire_seconds.unwrap_or(self.profile.default_expire_secs);
        Ok(self
            .backend
            .presign_get(key, Duration::from_secs(secs))
            .await?)
    }
}

async fn rewind_and_measure(body: &mut dyn Payload) -> io::Result<u64> {
    body.seek(SeekFrom::Start(0)).await?;
    let end = body.seek(SeekFrom::End(0)).await?;
    body.seek(SeekFrom::Start(0)).await?;
    Ok(end)
}

async fn read_all(body: &mut dyn Payload, size_hint: u64) -> io::Result<Bytes> {
    let mut data = Vec::with_capacity(size_hint as usize);
    body.read_to_end(&mut data).await?;
    Ok(Bytes::from(data))
}

async fn read_chunk(body: &mut dyn Payload, chunk_size: u64) -> StoreResult<Option<Bytes>> {
    let mut data = Vec::with_capacity(chunk_size as usize);
    body.take(chunk_size).read_to_end(&mut data).await?;
    if data.is_empty() {
        Ok(None)
    } else {
        Ok(Some(Bytes::from(data)))
    }
}

fn gzip(data: &[u8]) -> io::Result<Vec<u8>> {
    let mut encoder = GzEncoder::new(Vec::with_capacity(data.len() / 2), Compression::default());
    encoder.write_all(data)?;
    encoder.finish()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::{
        backend::MockObjectBackend, content_type::ContentTypeResolver, naming::KeyNamingStrategy,
        transfer::MB,
    };
    use crate::models::UploadKind;
    use async_trait::async_trait;
    use flate2::read::GzDecoder;
    use mockall::predicate::eq;
    use std::io::{Cursor, Read};
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// In-memory backend that tracks how many parts are in flight at once.
    #[derive(Default)]
    struct RecordingBackend {
        in_flight: AtomicUsize,
        max_in_flight: AtomicUsize,
        parts: Mutex<Vec<(i32, usize)>>,
        puts: Mutex<Vec<(String, usize, ObjectParams)>>,
        completed: Mutex<Vec<Vec<i32>>>,
        aborted: AtomicUsize,
        fail_part: Option<i32>,
    }

    #[async_trait]
    impl ObjectBackend for RecordingBackend {
        async fn put_object(&self, key: &str, body: Bytes, params: &ObjectParams) -> Result<(), BackendError> {
            self.puts
                .lock()
                .unwrap()
                .push((key.to_string(), body.len(), params.clone()));
            Ok(())
        }

        async fn create_multipart_upload(&self, _key: &str, _params: &ObjectParams) -> Result<String, BackendError> {
            Ok("upload-1".into())
        }

        async fn upload_part(
            &self,
            _key: &str,
            _upload_id: &str,
            part_number: i32,
            body: Bytes,
        ) -> Result<CompletedPart, BackendError> {
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.max_in_flight.fetch_max(now, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(20)).await;
            self.in_flight.fetch_sub(1, Ordering::SeqCst);
            if self.fail_part == Some(part_number) {
                return Err(BackendError::Unreachable("connection reset".into()));
            }
            self.parts.lock().unwrap().push((part_number, body.len()));
            Ok(CompletedPart {
                part_number,
                etag: Some(format!("etag-{part_number}")),
            })
        }

        async fn complete_multipart_upload(
            &self,
            _key: &str,
            _upload_id: &str,
            parts: Vec<CompletedPart>,
        ) -> Result<(), BackendError> {
            self.completed
                .lock()
                .unwrap()
                .push(parts.iter().map(|p| p.part_number).collect());
            Ok(())
        }

        async fn abort_multipart_upload(&self, _key: &str, _upload_id: &str) -> Result<(), BackendError> {
            self.aborted.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }

        async fn head_object(&self, _key: &str) -> Result<bool, BackendError> {
            Ok(false)
        }

        async fn delete_object(&self, _key: &str) -> Result<(), BackendError> {
            Ok(())
        }

        async fn presign_get(&self, key: &str, expires_in: Duration) -> Result<String, BackendError> {
            Ok(format!(
                "https://s3.example.test/bucket/{key}?X-Amz-Expires={}&X-Amz-Signature=abc",
                expires_in.as_secs()
            ))
        }

        fn public_url(&self, key: &str) -> String {
            format!("https://s3.example.test/bucket/{key}")
        }

        async fn check_bucket(&self) -> Result<(), BackendError> {
            Ok(())
        }
    }

    fn private_store(backend: Arc<dyn ObjectBackend>) -> ObjectStore {
        ObjectStore::new(
            backend,
            VisibilityProfile::private(PRIVATE_CACHE_CONTROL, DEFAULT_LINK_EXPIRATION),
            TransferPolicy::default(),
            GzipPolicy::default(),
        )
    }

    fn public_store(backend: Arc<dyn ObjectBackend>, gzip: GzipPolicy) -> ObjectStore {
        ObjectStore::new(
            backend,
            VisibilityProfile::public(PUBLIC_CACHE_CONTROL),
            TransferPolicy::default(),
            gzip,
        )
    }

    fn key(visibility: Visibility, kind: UploadKind, name: &str, ext: &str) -> StorageKey {
        KeyNamingStrategy::new().build_key(visibility, kind, name, ext)
    }

    #[tokio::test]
    async fn public_png_is_a_single_public_read_put() {
        let backend = Arc::new(RecordingBackend::default());
        let store = public_store(backend.clone(), GzipPolicy::default());
        let key = key(Visibility::Public, UploadKind::Image, "photo", ".png");
        let resolved = ContentTypeResolver::new().resolve(key.as_str());
        let mut body = Cursor::new(vec![7u8; 2 * MB as usize]);

        let receipt = store.upload(&key, &mut body, &resolved).await.unwrap();

        assert_eq!(receipt.key, "public/image/photo.png");
        assert_eq!(receipt.parts, None);
        assert_eq!(receipt.params.acl, CannedAcl::PublicRead);
        assert_eq!(receipt.params.content_type, "image/png");
        assert_eq!(receipt.params.content_encoding, None);
        assert_eq!(receipt.params.cache_control, "max-age=0");
        let puts = backend.puts.lock().unwrap();
        assert_eq!(puts.len(), 1);
        assert_eq!(puts[0].1, 2 * MB as usize);
    }

    #[tokio::test]
    async fn large_private_upload_is_chunked_with_bounded_concurrency() {
        let backend = Arc::new(RecordingBackend::default());
        let store = ObjectStore::new(
            backend.clone(),
            VisibilityProfile::default(),
            TransferPolicy {
                max_concurrency: 2,
                ..TransferPolicy::default()
            },
            GzipPolicy::default(),
        );
        let key = key(Visibility::Private, UploadKind::Video, "talk", ".mp4");
        let resolved = ContentTypeResolver::new().resolve(key.as_str());
        let mut body = Cursor::new(vec![1u8; 40 * MB as usize]);

        let receipt = store.upload(&key, &mut body, &resolved).await.unwrap();

        assert_eq!(receipt.parts, Some(3));
        assert!(backend.max_in_flight.load(Ordering::SeqCst) <= 2);
        let mut parts = backend.parts.lock().unwrap().clone();
        parts.sort();
        assert_eq!(
            parts,
            vec![(1, 16 * MB as usize), (2, 16 * MB as usize), (3, 8 * MB as usize)]
        );
        assert_eq!(*backend.completed.lock().unwrap(), vec![vec![1, 2, 3]]);
        assert!(backend.puts.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn default_policy_keeps_forty_megabytes_under_ten_parts_in_flight() {
        let backend = Arc::new(RecordingBackend::default());
        let store = private_store(backend.clone());
        let key = key(Visibility::Private, UploadKind::File, "dump", ".zip");
        let resolved = ContentTypeResolver::new().resolve(key.as_str());
        let mut body = Cursor::new(vec![0u8; 40 * MB as usize]);

        store.upload(&key, &mut body, &resolved).await.unwrap();

        let max = backend.max_in_flight.load(Ordering::SeqCst);
        assert!((1..=10).contains(&max), "max in flight {max}");
        assert_eq!(backend.parts.lock().unwrap().len(), 3);
    }

    #[tokio::test]
    async fn failed_part_aborts_the_multipart_upload() {
        let backend = Arc::new(RecordingBackend {
            fail_part: Some(2),
            ..RecordingBackend::default()
        });
        let store = private_store(backend.clone());
        let key = key(Visibility::Private, UploadKind::File, "dump", ".zip");
        let resolved = ContentTypeResolver::new().resolve(key.as_str());
        let mut body = Cursor::new(vec![0u8; 40 * MB as usize]);

        let err = store.upload(&key, &mut body, &resolved).await.unwrap_err();

        assert!(matches!(
            err,
            StoreError::Backend(BackendError::Unreachable(_))
        ));
        assert_eq!(backend.aborted.load(Ordering::SeqCst), 1);
        assert!(backend.completed.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn body_is_rewound_before_upload() {
        let backend = Arc::new(RecordingBackend::default());
        let store = public_store(backend.clone(), GzipPolicy::default());
        let key = key(Visibility::Public, UploadKind::File, "notes", ".txt");
        let resolved = ContentTypeResolver::new().resolve(key.as_str());
        let mut body = Cursor::new(b"hello world".to_vec());
        body.set_position(6);

        let receipt = store.upload(&key, &mut body, &resolved).await.unwrap();

        assert_eq!(receipt.size_bytes, 11);
        assert_eq!(backend.puts.lock().unwrap()[0].1, 11);
    }

    #[tokio::test]
    async fn measured_length_over_the_limit_is_rejected_before_any_request() {
        let mut backend = MockObjectBackend::new();
        backend.expect_head_object().never();
        backend.expect_put_object().never();
        let store = ObjectStore::new(
            Arc::new(backend),
            VisibilityProfile::default(),
            TransferPolicy {
                max_upload_size: 16,
                ..TransferPolicy::default()
            },
            GzipPolicy::default(),
        );
        let key = key(Visibility::Private, UploadKind::Video, "clip", ".mp4");
        let resolved = ContentTypeResolver::new().resolve(key.as_str());

        let err = store
            .upload(&key, &mut Cursor::new(vec![0u8; 1000]), &resolved)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            StoreError::Rejected(ValidationError::TooLarge {
                actual: 1000,
                limit: 16
            })
        ));
    }

    #[tokio::test]
    async fn private_store_refuses_to_overwrite() {
        let mut backend = MockObjectBackend::new();
        backend
            .expect_head_object()
            .with(eq("private/file/report.xlsx"))
            .times(1)
            .returning(|_| Ok(true));
        backend.expect_put_object().never();
        let store = private_store(Arc::new(backend));
        let key = key(Visibility::Private, UploadKind::File, "report", ".xlsx");
        let resolved = ContentTypeResolver::new().resolve(key.as_str());

        let err = store
            .upload(&key, &mut Cursor::new(vec![1u8; 10]), &resolved)
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::KeyExists(k) if k == "private/file/report.xlsx"));
    }

    #[tokio::test]
    async fn public_store_overwrites_without_checking() {
        let mut backend = MockObjectBackend::new();
        backend.expect_head_object().never();
        backend.expect_put_object().times(1).returning(|_, _, _| Ok(()));
        let store = public_store(Arc::new(backend), GzipPolicy::default());
        let key = key(Visibility::Public, UploadKind::Image, "logo", ".png");
        let resolved = ContentTypeResolver::new().resolve(key.as_str());

        store
            .upload(&key, &mut Cursor::new(vec![1u8; 10]), &resolved)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn upload_failure_is_surfaced_verbatim() {
        let mut backend = MockObjectBackend::new();
        backend
            .expect_put_object()
            .returning(|_, _, _| Err(BackendError::AuthRejected("403 Forbidden".into())));
        let store = public_store(Arc::new(backend), GzipPolicy::default());
        let key = key(Visibility::Public, UploadKind::File, "a", ".pdf");
        let resolved = ContentTypeResolver::new().resolve(key.as_str());

        let err = store
            .upload(&key, &mut Cursor::new(vec![1u8; 10]), &resolved)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            StoreError::Backend(BackendError::AuthRejected(ref msg)) if msg == "403 Forbidden"
        ));
    }

    #[tokio::test]
    async fn gzip_applies_to_css_when_enabled() {
        let backend = Arc::new(RecordingBackend::default());
        let store = public_store(backend.clone(), GzipPolicy::enabled());
        let key = key(Visibility::Public, UploadKind::File, "site", ".css");
        let resolved = ContentTypeResolver::new().resolve(key.as_str());
        let css = "body { color: red; }\n".repeat(200);

        let receipt = store
            .upload(&key, &mut Cursor::new(css.clone().into_bytes()), &resolved)
            .await
            .unwrap();

        assert_eq!(receipt.params.content_encoding.as_deref(), Some("gzip"));
        assert_eq!(receipt.params.content_type, "text/css; charset=utf-8");
        assert_eq!(receipt.source_size, css.len() as u64);
        assert!(receipt.size_bytes < receipt.source_size);
        // the original headers are untouched for the next call
        assert_eq!(store.object_params(&resolved).content_encoding, None);
    }

    #[tokio::test]
    async fn gzip_skips_types_with_an_encoding_or_not_listed() {
        let policy = GzipPolicy::enabled();
        let resolver = ContentTypeResolver::new();
        assert!(!policy.applies(&resolver.resolve("a.tar.gz")));
        assert!(!policy.applies(&resolver.resolve("a.png")));
        assert!(policy.applies(&resolver.resolve("a.svg")));
        assert!(!GzipPolicy::default().applies(&resolver.resolve("a.css")));
    }

    #[test]
    fn gzip_output_round_trips() {
        let data = b"abcabcabcabc".repeat(10);
        let mut out = Vec::new();
        GzDecoder::new(&gzip(&data).unwrap()[..])
            .read_to_end(&mut out)
            .unwrap();
        assert_eq!(out, data);
    }

    #[tokio::test]
    async fn private_url_is_signed_with_expiry() {
        let store = private_store(Arc::new(RecordingBackend::default()));
        let default = store.url("private/file/a.pdf", None).await.unwrap();
        assert!(default.contains("X-Amz-Expires=300"));
        assert!(default.contains("X-Amz-Signature"));
        let short = store.url("private/file/a.pdf", Some(60)).await.unwrap();
        assert!(short.contains("X-Amz-Expires=60"));
    }

    #[tokio::test]
    async fn public_url_ignores_expiry() {
        let store = public_store(Arc::new(RecordingBackend::default()), GzipPolicy::default());
        let a = store.url("public/image/photo.png", None).await.unwrap();
        let b = store.url("public/image/photo.png", Some(5)).await.unwrap();
        assert_eq!(a, "https://s3.example.test/bucket/public/image/photo.png");
        assert_eq!(a, b);
    }

    #[tokio::test]
    async fn exists_failure_is_not_false() {
        let mut backend = MockObjectBackend::new();
        backend
            .expect_head_object()
            .returning(|_| Err(BackendError::Unreachable("dns".into())));
        let store = private_store(Arc::new(backend));
        assert!(store.exists("private/file/a.pdf").await.is_err());
    }

    #[tokio::test]
    async fn delete_of_missing_key_is_ok() {
        let mut backend = MockObjectBackend::new();
        backend
            .expect_delete_object()
            .with(eq("private/file/missing.pdf"))
            .returning(|_| Ok(()));
        let store = private_store(Arc::new(backend));
        assert!(store.delete("private/file/missing.pdf").await.is_ok());
    }
}
