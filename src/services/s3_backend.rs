//! `ObjectBackend` over the AWS S3 SDK.
//!
//! Works against AWS and S3-compatible endpoints: path-style addressing,
//! SigV4, static credentials and checksums only where an operation requires
//! them. Timeouts are fixed when the client is built.

use crate::{
    config::S3Settings,
    services::backend::{
        BackendError, BackendResult, CannedAcl, CompletedPart, ObjectBackend, ObjectParams,
    },
};
use async_trait::async_trait;
use aws_sdk_s3::{
    Client,
    config::{
        BehaviorVersion, Credentials, Region, RequestChecksumCalculation,
        ResponseChecksumValidation, http::HttpResponse, timeout::TimeoutConfig,
    },
    error::{DisplayErrorContext, SdkError},
    operation::head_object::HeadObjectError,
    presigning::PresigningConfig,
    primitives::ByteStream,
    types::{CompletedMultipartUpload, CompletedPart as S3CompletedPart, ObjectCannedAcl},
};
use base64::{Engine as _, engine::general_purpose};
use bytes::Bytes;
use std::time::Duration;
use tracing::{debug, error, warn};

#[derive(Clone, Debug)]
pub struct S3Backend {
    client: Client,
    bucket: String,
    endpoint: String,
    public_base: String,
}

impl S3Backend {
    /// Build the client. Region, credentials and timeouts come from
    /// `settings` only; nothing is read from the ambient AWS environment.
    pub async fn connect(settings: &S3Settings) -> Self {
        let endpoint = endpoint_with_scheme(&settings.endpoint_url, settings.use_ssl);
        if !settings.verify {
            warn!(
                endpoint = %endpoint,
                "certificate verification cannot be disabled for the S3 client; verifying anyway"
            );
        }

        let credentials = Credentials::new(
            settings.access_key_id.clone(),
            settings.secret_access_key.clone(),
            None,
            None,
            "media-vault-static",
        );
        let timeouts = TimeoutConfig::builder()
            .connect_timeout(settings.connect_timeout)
            .read_timeout(settings.read_timeout)
            .build();

        let shared = aws_config::defaults(BehaviorVersion::latest())
            .region(Region::new(settings.region.clone()))
            .endpoint_url(endpoint.clone())
            .credentials_provider(credentials)
            .timeout_config(timeouts)
            .load()
            .await;
        let config = aws_sdk_s3::config::Builder::from(&shared)
            .force_path_style(true)
            .request_checksum_calculation(RequestChecksumCalculation::WhenRequired)
            .response_checksum_validation(ResponseChecksumValidation::WhenRequired)
            .build();

        let public_base = match settings.custom_domain.as_deref() {
            Some(domain) => {
                let scheme = if settings.use_ssl { "https" } else { "http" };
                format!("{scheme}://{}", domain.trim_end_matches('/'))
            }
            None => format!("{endpoint}/{}", settings.bucket),
        };

        debug!(endpoint = %endpoint, bucket = %settings.bucket, region = %settings.region, "built S3 client");
        Self {
            client: Client::from_conf(config),
            bucket: settings.bucket.clone(),
            endpoint,
            public_base,
        }
    }

    pub fn bucket(&self) -> &str {
        &self.bucket
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait]
impl ObjectBackend for S3Backend {
    async fn put_object(&self, key: &str, body: Bytes, params: &ObjectParams) -> BackendResult<()> {
        let md5 = content_md5(&body);
        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .acl(canned_acl(params.acl))
            .cache_control(&params.cache_control)
            .content_type(&params.content_type)
            .set_content_encoding(params.content_encoding.clone())
            .content_length(body.len() as i64)
            .content_md5(md5)
            .body(ByteStream::from(body))
            .send()
            .await
            .map(|_| ())
            .map_err(|err| classify("put_object", key, err))
    }

    async fn create_multipart_upload(
        &self,
        key: &str,
        params: &ObjectParams,
    ) -> BackendResult<String> {
        let output = self
            .client
            .create_multipart_upload()
            .bucket(&self.bucket)
            .key(key)
            .acl(canned_acl(params.acl))
            .cache_control(&params.cache_control)
            .content_type(&params.content_type)
            .set_content_encoding(params.content_encoding.clone())
            .send()
            .await
            .map_err(|err| classify("create_multipart_upload", key, err))?;

        output
            .upload_id()
            .map(str::to_string)
            .ok_or_else(|| BackendError::Other(format!("no upload id returned for `{key}`")))
    }

    async fn upload_part(
        &self,
        key: &str,
        upload_id: &str,
        part_number: i32,
        body: Bytes,
    ) -> BackendResult<CompletedPart> {
        let md5 = content_md5(&body);
        let output = self
            .client
            .upload_part()
            .bucket(&self.bucket)
            .key(key)
            .upload_id(upload_id)
            .part_number(part_number)
            .content_length(body.len() as i64)
            .content_md5(md5)
            .body(ByteStream::from(body))
            .send()
            .await
            .map_err(|err| classify("upload_part", key, err))?;

        Ok(CompletedPart {
            part_number,
            etag: output.e_tag().map(str::to_string),
        })
    }

    async fn complete_multipart_upload(
        &self,
        key: &str,
        upload_id: &str,
        parts: Vec<CompletedPart>,
    ) -> BackendResult<()> {
        let parts = parts
            .into_iter()
            .map(|part| {
                S3CompletedPart::builder()
                    .part_number(part.part_number)
                    .set_e_tag(part.etag)
                    .build()
            })
            .collect::<Vec<_>>();
        let upload = CompletedMultipartUpload::builder()
            .set_parts(Some(parts))
            .build();

        self.client
            .complete_multipart_upload()
            .bucket(&self.bucket)
            .key(key)
            .upload_id(upload_id)
            .multipart_upload(upload)
            .send()
            .await
            .map(|_| ())
            .map_err(|err| classify("complete_multipart_upload", key, err))
    }

    async fn abort_multipart_upload(&self, key: &str, upload_id: &str) -> BackendResult<()> {
        self.client
            .abort_multipart_upload()
            .bucket(&self.bucket)
            .key(key)
            .upload_id(upload_id)
            .send()
            .await
            .map(|_| ())
            .map_err(|err| classify("abort_multipart_upload", key, err))
    }

    async fn head_object(&self, key: &str) -> BackendResult<bool> {
        match self
            .client
            .head_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
        {
            Ok(_) => Ok(true),
            Err(SdkError::ServiceError(ref service_err))
                if matches!(service_err.err(), HeadObjectError::NotFound(_))
                    || service_err.raw().status().as_u16() == 404 =>
            {
                debug!(key, "object does not exist");
                Ok(false)
            }
            Err(err) => Err(classify("head_object", key, err)),
        }
    }

    async fn delete_object(&self, key: &str) -> BackendResult<()> {
        match self
            .client
            .delete_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
        {
            Ok(_) => Ok(()),
            Err(err) if status_of(&err) == Some(404) => Ok(()),
            Err(err) => Err(classify("delete_object", key, err)),
        }
    }

    async fn presign_get(&self, key: &str, expires_in: Duration) -> BackendResult<String> {
        let presigning = PresigningConfig::expires_in(expires_in)
            .map_err(|err| BackendError::Other(format!("invalid link expiration: {err}")))?;
        let request = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(key)
            .presigned(presigning)
            .await
            .map_err(|err| classify("presign_get", key, err))?;
        Ok(request.uri().to_string())
    }

    fn public_url(&self, key: &str) -> String {
        let path = key
            .split('/')
            .map(|segment| urlencoding::encode(segment).into_owned())
            .collect::<Vec<_>>()
            .join("/");
        format!("{}/{}", self.public_base, path)
    }

    async fn check_bucket(&self) -> BackendResult<()> {
        self.client
            .head_bucket()
            .bucket(&self.bucket)
            .send()
            .await
            .map(|_| ())
            .map_err(|err| classify("head_bucket", &self.bucket, err))
    }
}

fn canned_acl(acl: CannedAcl) -> ObjectCannedAcl {
    match acl {
        CannedAcl::Private => ObjectCannedAcl::Private,
        CannedAcl::PublicRead => ObjectCannedAcl::PublicRead,
    }
}

/// Base64 MD5 digest for the `Content-MD5` header.
fn content_md5(data: &[u8]) -> String {
    general_purpose::STANDARD.encode(md5::compute(data).0)
}

/// Prefix a bare host with a scheme chosen by the TLS flag.
pub fn endpoint_with_scheme(endpoint: &str, use_ssl: bool) -> String {
    let endpoint = endpoint.trim().trim_end_matches('/');
    if endpoint.contains("://") {
        endpoint.to_string()
    } else if use_ssl {
        format!("https://{endpoint}")
    } else {
        format!("http://{endpoint}")
    }
}

fn status_of<E>(err: &SdkError<E, HttpResponse>) -> Option<u16> {
    err.raw_response().map(|raw| raw.status().as_u16())
}

/// Sort an SDK failure into unreachable, auth or other.
fn classify<E>(operation: &str, key: &str, err: SdkError<E, HttpResponse>) -> BackendError
where
    E: std::error::Error + Send + Sync + 'static,
{
    let status = status_of(&err);
    let detail = format!("{operation} `{key}`: {}", DisplayErrorContext(&err));
    let classified = match (&err, status) {
        (SdkError::DispatchFailure(_) | SdkError::TimeoutError(_), _) => {
            BackendError::Unreachable(detail)
        }
        (_, Some(401 | 403)) => BackendError::AuthRejected(detail),
        (_, Some(status)) if status >= 500 => BackendError::Unreachable(detail),
        _ => BackendError::Other(detail),
    };
    error!(operation, key, error = %classified, "storage backend call failed");
    classified
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings() -> S3Settings {
        S3Settings {
            access_key_id: "AKIDEXAMPLE".into(),
            secret_access_key: "wJalrXUtnFEMI/K7MDENG+bPxRfiCYEXAMPLEKEY".into(),
            bucket: "media".into(),
            region: "us-east-1".into(),
            endpoint_url: "s3.example.test".into(),
            custom_domain: None,
            use_ssl: true,
            verify: true,
            connect_timeout: Duration::from_secs(10),
            read_timeout: Duration::from_secs(60),
        }
    }

    #[test]
    fn endpoint_gets_scheme_from_tls_flag() {
        assert_eq!(endpoint_with_scheme("s3.local:9000", false), "http://s3.local:9000");
        assert_eq!(endpoint_with_scheme("s3.local/", true), "https://s3.local");
        assert_eq!(
            endpoint_with_scheme("http://minio:9000", true),
            "http://minio:9000"
        );
    }

    #[test]
    fn content_md5_is_base64_digest() {
        assert_eq!(content_md5(b""), "1B2M2Y8AsgTpgAmY7PhCfg==");
    }

    #[tokio::test]
    async fn public_url_is_path_style_and_unsigned() {
        let backend = S3Backend::connect(&settings()).await;
        assert_eq!(
            backend.public_url("public/image/photo.png"),
            "https://s3.example.test/media/public/image/photo.png"
        );
        assert_eq!(
            backend.public_url("public/file/my report.pdf"),
            "https://s3.example.test/media/public/file/my%20report.pdf"
        );
    }

    #[tokio::test]
    async fn custom_domain_replaces_endpoint_and_bucket() {
        let backend = S3Backend::connect(&S3Settings {
            custom_domain: Some("cdn.example.test/".into()),
            ..settings()
        })
        .await;
        assert_eq!(
            backend.public_url("public/image/logo.png"),
            "https://cdn.example.test/public/image/logo.png"
        );
    }

    #[tokio::test]
    async fn presigned_url_carries_signature_and_expiry() {
        let backend = S3Backend::connect(&settings()).await;
        let url = backend
            .presign_get("private/file/report.xlsx", Duration::from_secs(300))
            .await
            .unwrap();
        assert!(url.starts_with("https://s3.example.test/media/private/file/report.xlsx?"));
        assert!(url.contains("X-Amz-Expires=300"));
        assert!(url.contains("X-Amz-Signature="));
    }
}
