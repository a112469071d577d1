//! Content-Type / Content-Encoding resolution for storage keys.

use crate::services::catalog::{self, COMPOUND_EXTENSIONS, OCTET_STREAM};
use serde::Serialize;
use tracing::warn;

/// Headers an object is written with.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResolvedType {
    pub content_type: String,
    pub content_encoding: Option<&'static str>,
}

impl ResolvedType {
    /// MIME type without parameters, e.g. `text/css` for `text/css; charset=utf-8`.
    pub fn essence(&self) -> &str {
        self.content_type
            .split(';')
            .next()
            .unwrap_or(&self.content_type)
            .trim()
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ContentTypeResolver;

impl ContentTypeResolver {
    pub const fn new() -> Self {
        Self
    }

    /// Resolve headers for a key or file name.
    ///
    /// Compound archive suffixes win over their last component. Unknown
    /// extensions fall back to `application/octet-stream` with a warning;
    /// rejecting them is validation's job, not this resolver's.
    pub fn resolve(&self, key: &str) -> ResolvedType {
        let name = key.trim().to_ascii_lowercase();

        if let Some(compound) = COMPOUND_EXTENSIONS
            .iter()
            .find(|ext| name.ends_with(**ext))
        {
            let (_, mime) = catalog::classify(compound);
            return with_charset(mime, encoding_for(compound));
        }

        let extension = catalog::extension_of(&name);
        if extension.is_empty() || !catalog::is_known(&extension) {
            warn!(key = %key, "no MIME type for key, using {}", OCTET_STREAM);
            return ResolvedType {
                content_type: OCTET_STREAM.to_string(),
                content_encoding: None,
            };
        }

        let (_, mime) = catalog::classify(&extension);
        with_charset(mime, encoding_for(&extension))
    }
}

/// Transfer encoding implied by an archive suffix. Only bare compressor
/// suffixes and compounds ending in them carry one; `.tgz` and friends do not.
fn encoding_for(extension: &str) -> Option<&'static str> {
    if extension.ends_with(".gz") {
        Some("gzip")
    } else if extension.ends_with(".bz2") {
        Some("bzip2")
    } else if extension.ends_with(".xz") {
        Some("xz")
    } else {
        None
    }
}

fn with_charset(mime: &str, encoding: Option<&'static str>) -> ResolvedType {
    let content_type = if mime.starts_with("text/") {
        format!("{mime}; charset=utf-8")
    } else {
        mime.to_string()
    };
    ResolvedType {
        content_type,
        content_encoding: encoding,
    }
}
