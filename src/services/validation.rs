//! Upload validation: kind and visibility, size, extension allow-list, and
//! image integrity.
//!
//! Checks run in that fixed order and the first failure is returned. Only image uploads get a content check; videos and
//! generic files are judged on size and extension alone.

use crate::{
    models::{FileCategory, UploadDescriptor, UploadKind, Visibility},
    services::catalog,
};
use std::io::{Cursor, SeekFrom};
use thiserror::Error;
use tokio::io::{AsyncReadExt, AsyncSeekExt};
use tracing::{debug, info};

/// Why an upload was refused. Shown to the uploader as-is.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("file is too large ({actual} bytes); the limit is {limit} bytes")]
    TooLarge { actual: u64, limit: u64 },
    #[error("extension `{extension}` is not allowed for {kind} uploads; allowed: {allowed}")]
    DisallowedExtension {
        extension: String,
        kind: UploadKind,
        allowed: String,
    },
    #[error("file is not a valid image: {reason}")]
    InvalidImageContent { reason: String },
    #[error("{kind} uploads cannot be {visibility}")]
    VisibilityNotAllowed {
        kind: UploadKind,
        visibility: Visibility,
    },
}

/// Rules applied to one upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadRules {
    pub kind: UploadKind,
    pub allowed_extensions: Vec<&'static str>,
    pub max_size: u64,
    pub inspect_images: bool,
}

impl UploadRules {
    pub fn for_kind(kind: UploadKind, max_size: u64) -> Self {
        Self {
            kind,
            allowed_extensions: catalog::allowed_extensions(kind),
            max_size,
            inspect_images: kind == UploadKind::Image,
        }
    }
}

/// What validation learned about an accepted upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatedUpload {
    pub extension: String,
    pub category: FileCategory,
}

#[derive(Debug, Clone)]
pub struct ValidationEngine {
    max_upload_size: u64,
}

impl ValidationEngine {
    pub fn new(max_upload_size: u64) -> Self {
        Self { max_upload_size }
    }

    pub fn max_upload_size(&self) -> u64 {
        self.max_upload_size
    }

    pub fn rules_for(&self, kind: UploadKind) -> UploadRules {
        UploadRules::for_kind(kind, self.max_upload_size)
    }

    /// Validate against the default rules for the descriptor's kind.
    pub async fn validate(
        &self,
        descriptor: &mut UploadDescriptor,
    ) -> Result<ValidatedUpload, ValidationError> {
        let rules = self.rules_for(descriptor.kind);
        self.validate_with(descriptor, &rules).await
    }

    /// Validate against explicit rules. Leaves the body rewound to its start.
    pub async fn validate_with(
        &self,
        descriptor: &mut UploadDescriptor,
        rules: &UploadRules,
    ) -> Result<ValidatedUpload, ValidationError> {
        if !rules.kind.allows(descriptor.visibility) {
            info!(kind = %rules.kind, visibility = %descriptor.visibility, "upload rejected: visibility not allowed");
            return Err(ValidationError::VisibilityNotAllowed {
                kind: rules.kind,
                visibility: descriptor.visibility,
            });
        }
        check_size(descriptor.declared_size, rules.max_size)?;

        let extension = catalog::extension_of(&descriptor.file_name);
        check_extension(&extension, rules)?;

        if rules.inspect_images {
            let data = read_bounded(descriptor, rules.max_size).await?;
            let ext = extension.clone();
            tokio::task::spawn_blocking(move || inspect_image(&data, &ext))
                .await
                .map_err(|err| ValidationError::InvalidImageContent {
                    reason: format!("inspection aborted: {err}"),
                })??;
        }

        let (category, _) = catalog::classify(&extension);
        debug!(
            name = %descriptor.logical_name,
            %extension,
            %category,
            "upload accepted by validation"
        );
        Ok(ValidatedUpload {
            extension,
            category,
        })
    }
}

/// `size == limit` passes; one byte more fails.
pub fn check_size(actual: u64, limit: u64) -> Result<(), ValidationError> {
    if actual > limit {
        info!(actual, limit, "upload rejected: too large");
        return Err(ValidationError::TooLarge { actual, limit });
    }
    Ok(())
}

pub fn check_extension(extension: &str, rules: &UploadRules) -> Result<(), ValidationError> {
    let normalized = catalog::normalize_extension(extension);
    if rules.allowed_extensions.contains(&normalized.as_str()) {
        return Ok(());
    }
    info!(extension = %normalized, kind = %rules.kind, "upload rejected: extension not allowed");
    Err(ValidationError::DisallowedExtension {
        extension: normalized,
        kind: rules.kind,
        allowed: rules
            .allowed_extensions
            .iter()
            .filter(|e| !e.is_empty())
            .copied()
            .collect::<Vec<_>>()
            .join(", "),
    })
}

/// Read the whole body, refusing to buffer more than `limit` bytes even when
/// the declared size understated it.
async fn read_bounded(
    descriptor: &mut UploadDescriptor,
    limit: u64,
) -> Result<Vec<u8>, ValidationError> {
    let unreadable = |err: std::io::Error| ValidationError::InvalidImageContent {
        reason: format!("could not read upload: {err}"),
    };

    let body = &mut descriptor.body;
    body.seek(SeekFrom::Start(0)).await.map_err(unreadable)?;
    let mut data = Vec::with_capacity(descriptor.declared_size.min(limit) as usize);
    (&mut *body)
        .take(limit + 1)
        .read_to_end(&mut data)
        .await
        .map_err(unreadable)?;
    body.seek(SeekFrom::Start(0)).await.map_err(unreadable)?;

    check_size(data.len() as u64, limit)?;
    Ok(data)
}

fn inspect_image(data: &[u8], extension: &str) -> Result<(), ValidationError> {
    let invalid = |reason: String| {
        info!(%extension, %reason, "upload rejected: invalid image content");
        ValidationError::InvalidImageContent { reason }
    };

    if data.is_empty() {
        return Err(invalid("file is empty".into()));
    }

    // Raster decoders cannot read SVG; require a UTF-8 document with an svg root.
    if extension == ".svg" {
        let text = std::str::from_utf8(data).map_err(|_| invalid("svg is not UTF-8 text".into()))?;
        if !text.to_ascii_lowercase().contains("<svg") {
            return Err(invalid("svg root element not found".into()));
        }
        return Ok(());
    }

    let reader = image::ImageReader::new(Cursor::new(data))
        .with_guessed_format()
        .map_err(|err| invalid(err.to_string()))?;
    if reader.format().is_none() {
        return Err(invalid("unrecognized image format".into()));
    }
    reader
        .decode()
        .map(|_| ())
        .map_err(|err| invalid(err.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::transfer::MB;
    use image::{DynamicImage, ImageFormat, RgbImage};

    fn png_bytes() -> Vec<u8> {
        let mut buf = Cursor::new(Vec::new());
        DynamicImage::ImageRgb8(RgbImage::new(4, 4))
            .write_to(&mut buf, ImageFormat::Png)
            .unwrap();
        buf.into_inner()
    }

    fn descriptor(file_name: &str, kind: UploadKind, data: Vec<u8>) -> UploadDescriptor {
        UploadDescriptor::from_bytes("photo", file_name, Visibility::Public, kind, data)
    }

    #[tokio::test]
    async fn size_equal_to_limit_passes_and_one_more_fails() {
        let engine = ValidationEngine::new(16);
        let mut exact = descriptor("notes.txt", UploadKind::File, vec![b'a'; 16]);
        assert!(engine.validate(&mut exact).await.is_ok());

        let mut over = descriptor("notes.txt", UploadKind::File, vec![b'a'; 17]);
        assert_eq!(
            engine.validate(&mut over).await,
            Err(ValidationError::TooLarge {
                actual: 17,
                limit: 16
            })
        );
    }

    #[tokio::test]
    async fn media_uploads_must_be_private() {
        let engine = ValidationEngine::new(MB);
        let mut public = descriptor("notes.txt", UploadKind::Media, b"hi".to_vec());
        assert_eq!(
            engine.validate(&mut public).await,
            Err(ValidationError::VisibilityNotAllowed {
                kind: UploadKind::Media,
                visibility: Visibility::Public,
            })
        );

        let mut private = UploadDescriptor::from_bytes(
            "notes",
            "notes.txt",
            Visibility::Private,
            UploadKind::Media,
            b"hi".to_vec(),
        );
        let accepted = engine.validate(&mut private).await.unwrap();
        assert_eq!(accepted.category, FileCategory::Document);
    }

    #[tokio::test]
    async fn size_is_checked_before_extension() {
        let engine = ValidationEngine::new(4);
        let mut d = descriptor("payload.exe", UploadKind::File, vec![0; 5]);
        assert!(matches!(
            engine.validate(&mut d).await,
            Err(ValidationError::TooLarge { .. })
        ));
    }

    #[tokio::test]
    async fn disallowed_extension_names_the_allow_list() {
        let engine = ValidationEngine::new(MB);
        let mut d = descriptor("clip.avi", UploadKind::Video, vec![0; 8]);
        match engine.validate(&mut d).await {
            Err(ValidationError::DisallowedExtension {
                extension,
                kind,
                allowed,
            }) => {
                assert_eq!(extension, ".avi");
                assert_eq!(kind, UploadKind::Video);
                assert_eq!(allowed, ".mp4, .webm, .ogg, .mov");
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[tokio::test]
    async fn video_payload_is_not_inspected() {
        let engine = ValidationEngine::new(MB);
        let mut d = descriptor("clip.MP4", UploadKind::Video, b"not really a video".to_vec());
        let accepted = engine.validate(&mut d).await.unwrap();
        assert_eq!(accepted.extension, ".mp4");
        assert_eq!(accepted.category, FileCategory::Video);
    }

    #[tokio::test]
    async fn real_png_passes_and_garbage_fails() {
        let engine = ValidationEngine::new(MB);
        let mut good = descriptor("photo.png", UploadKind::Image, png_bytes());
        assert!(engine.validate(&mut good).await.is_ok());

        let mut bad = descriptor("photo.png", UploadKind::Image, b"definitely not a png".to_vec());
        assert!(matches!(
            engine.validate(&mut bad).await,
            Err(ValidationError::InvalidImageContent { .. })
        ));
    }

    #[tokio::test]
    async fn truncated_png_fails_integrity_check() {
        let engine = ValidationEngine::new(MB);
        let mut data = png_bytes();
        data.truncate(data.len() / 2);
        let mut d = descriptor("photo.png", UploadKind::Image, data);
        assert!(matches!(
            engine.validate(&mut d).await,
            Err(ValidationError::InvalidImageContent { .. })
        ));
    }

    #[tokio::test]
    async fn svg_needs_an_svg_root() {
        let engine = ValidationEngine::new(MB);
        let mut ok = descriptor(
            "logo.svg",
            UploadKind::Image,
            br#"<svg xmlns="http://www.w3.org/2000/svg"></svg>"#.to_vec(),
        );
        assert!(engine.validate(&mut ok).await.is_ok());

        let mut not_svg = descriptor("logo.svg", UploadKind::Image, b"<html></html>".to_vec());
        assert!(engine.validate(&mut not_svg).await.is_err());
    }

    #[tokio::test]
    async fn understated_declared_size_is_caught_while_reading() {
        let engine = ValidationEngine::new(8);
        let mut d = UploadDescriptor::new(
            "photo",
            "photo.png",
            Visibility::Private,
            UploadKind::Image,
            4,
            Box::new(Cursor::new(vec![0u8; 32])),
        );
        assert_eq!(
            engine.validate(&mut d).await,
            Err(ValidationError::TooLarge {
                actual: 9,
                limit: 8
            })
        );
    }

    #[tokio::test]
    async fn body_is_rewound_after_inspection() {
        let engine = ValidationEngine::new(MB);
        let png = png_bytes();
        let mut d = descriptor("photo.png", UploadKind::Image, png.clone());
        engine.validate(&mut d).await.unwrap();
        let mut reread = Vec::new();
        d.body.read_to_end(&mut reread).await.unwrap();
        assert_eq!(reread, png);
    }
}
