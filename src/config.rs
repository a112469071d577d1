use crate::services::transfer::{MB, PolicyField, TransferPolicy};
use anyhow::{Context, Result};
use clap::Parser;
use std::{env, fmt, str::FromStr, time::Duration};
use thiserror::Error;

const REQUIRED: [&str; 5] = [
    "AWS_ACCESS_KEY_ID",
    "AWS_SECRET_ACCESS_KEY",
    "AWS_STORAGE_BUCKET_NAME",
    "AWS_S3_REGION_NAME",
    "AWS_S3_ENDPOINT_URL",
];

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("missing required setting {0}")]
    Missing(&'static str),
    #[error("invalid value `{value}` for {var}")]
    Invalid { var: &'static str, value: String },
    #[error("unsupported signature version `{0}`; only s3v4 is supported")]
    UnsupportedSignature(String),
}

/// Connection settings for the S3 bucket.
#[derive(Clone, PartialEq, Eq)]
pub struct S3Settings {
    pub access_key_id: String,
    pub secret_access_key: String,
    pub bucket: String,
    pub region: String,
    pub endpoint_url: String,
    /// Host serving public objects instead of the endpoint, e.g. a CDN.
    pub custom_domain: Option<String>,
    pub use_ssl: bool,
    pub verify: bool,
    pub connect_timeout: Duration,
    pub read_timeout: Duration,
}

impl fmt::Debug for S3Settings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("S3Settings")
            .field("access_key_id", &self.access_key_id)
            .field("secret_access_key", &"<redacted>")
            .field("bucket", &self.bucket)
            .field("region", &self.region)
            .field("endpoint_url", &self.endpoint_url)
            .field("custom_domain", &self.custom_domain)
            .field("use_ssl", &self.use_ssl)
            .field("verify", &self.verify)
            .field("connect_timeout", &self.connect_timeout)
            .field("read_timeout", &self.read_timeout)
            .finish()
    }
}

/// Centralized application configuration.
/// Combines environment variables and CLI arguments; immutable once built.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    pub database_url: String,
    pub s3: S3Settings,
    /// Default lifetime of signed URLs, in seconds.
    pub link_expiration: u64,
    pub private_cache_control: String,
    pub public_cache_control: String,
    pub transfer: TransferPolicy,
    pub gzip: bool,
}

/// Command-line + environment configuration.
#[derive(Parser, Debug, Default)]
#[command(author, version, about = "Storage policy and object lifecycle service for S3")]
pub struct Args {
    /// Host to bind to (overrides MEDIA_VAULT_HOST)
    #[arg(long)]
    pub host: Option<String>,

    /// Port to bind to (overrides MEDIA_VAULT_PORT)
    #[arg(long)]
    pub port: Option<u16>,

    /// Database URL (overrides MEDIA_VAULT_DATABASE_URL)
    #[arg(long)]
    pub database_url: Option<String>,

    /// Bucket name (overrides AWS_STORAGE_BUCKET_NAME)
    #[arg(long)]
    pub bucket: Option<String>,

    /// Run migrations and exit
    #[arg(long)]
    pub migrate: bool,
}

impl AppConfig {
    /// Parse environment variables + CLI args into AppConfig and migrate flag.
    pub fn from_env_and_args() -> Result<(Self, bool)> {
        let args = Args::parse();
        let migrate = args.migrate;
        let cfg = Self::from_lookup(|var| env::var(var).ok(), args)
            .context("loading configuration")?;
        Ok((cfg, migrate))
    }

    /// Build the configuration from a variable lookup plus CLI overrides.
    pub fn from_lookup<F>(lookup: F, args: Args) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |var: &str| lookup(var).filter(|v| !v.trim().is_empty());

        let mut required = Vec::with_capacity(REQUIRED.len());
        for var in REQUIRED {
            let value = match (var, &args.bucket) {
                ("AWS_STORAGE_BUCKET_NAME", Some(bucket)) => bucket.clone(),
                _ => get(var).ok_or(ConfigError::Missing(var))?,
            };
            required.push(value);
        }
        let [access_key_id, secret_access_key, bucket, region, endpoint_url]: [String; 5] =
            required
                .try_into()
                .map_err(|_| ConfigError::Missing("AWS_ACCESS_KEY_ID"))?;

        let signature = get("AWS_S3_SIGNATURE_VERSION").unwrap_or_else(|| "s3v4".into());
        if !signature.eq_ignore_ascii_case("s3v4") {
            return Err(ConfigError::UnsupportedSignature(signature));
        }

        let defaults = TransferPolicy::default();
        let transfer = TransferPolicy {
            multipart_threshold: parse_or(&get, "AWS_S3_MULTIPART_THRESHOLD", defaults.multipart_threshold)?,
            chunk_size: parse_or(&get, "AWS_S3_MULTIPART_CHUNKSIZE", defaults.chunk_size)?,
            max_concurrency: parse_or(&get, "AWS_S3_MAX_CONCURRENCY", defaults.max_concurrency)?,
            max_upload_size: parse_or(&get, "MEDIA_VAULT_MAX_UPLOAD_SIZE", 100 * MB)?,
        };
        if let Err(err) = transfer.check() {
            let var = match err.field {
                PolicyField::ChunkSize => "AWS_S3_MULTIPART_CHUNKSIZE",
                PolicyField::MaxConcurrency => "AWS_S3_MAX_CONCURRENCY",
                PolicyField::MaxUploadSize => "MEDIA_VAULT_MAX_UPLOAD_SIZE",
            };
            return Err(ConfigError::Invalid {
                var,
                value: err.reason,
            });
        }

        let s3 = S3Settings {
            access_key_id,
            secret_access_key,
            bucket,
            region,
            endpoint_url,
            custom_domain: get("AWS_S3_CUSTOM_DOMAIN"),
            use_ssl: parse_bool_or(&get, "AWS_S3_USE_SSL", true)?,
            verify: parse_bool_or(&get, "AWS_S3_VERIFY", true)?,
            connect_timeout: Duration::from_secs(parse_or(&get, "AWS_S3_CONNECT_TIMEOUT_SECS", 10)?),
            read_timeout: Duration::from_secs(parse_or(&get, "AWS_S3_READ_TIMEOUT_SECS", 60)?),
        };

        Ok(Self {
            host: args
                .host
                .or_else(|| get("MEDIA_VAULT_HOST"))
                .unwrap_or_else(|| "0.0.0.0".into()),
            port: match args.port {
                Some(port) => port,
                None => parse_or(&get, "MEDIA_VAULT_PORT", 3000)?,
            },
            database_url: args
                .database_url
                .or_else(|| get("MEDIA_VAULT_DATABASE_URL"))
                .unwrap_or_else(|| "sqlite://./data/meta/media_vault.db".into()),
            s3,
            link_expiration: parse_or(&get, "AWS_S3_LINK_EXPIRATION", 300)?,
            private_cache_control: get("AWS_S3_PRIVATE_CACHE_CONTROL")
                .unwrap_or_else(|| "max-age=86400".into()),
            public_cache_control: get("AWS_S3_PUBLIC_CACHE_CONTROL")
                .unwrap_or_else(|| "max-age=0".into()),
            transfer,
            gzip: parse_bool_or(&get, "AWS_S3_GZIP", false)?,
        })
    }

    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

fn parse_or<T, G>(get: &G, var: &'static str, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    G: Fn(&str) -> Option<String>,
{
    match get(var) {
        Some(value) => value
            .trim()
            .parse::<T>()
            .map_err(|_| ConfigError::Invalid { var, value }),
        None => Ok(default),
    }
}

fn parse_bool_or<G>(get: &G, var: &'static str, default: bool) -> Result<bool, ConfigError>
where
    G: Fn(&str) -> Option<String>,
{
    match get(var) {
        Some(value) => match value.trim().to_ascii_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => Ok(true),
            "0" | "false" | "no" | "off" => Ok(false),
            _ => Err(ConfigError::Invalid { var, value }),
        },
        None => Ok(default),
    }
}
