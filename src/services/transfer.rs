//! How bytes move to the backend: single PUT below the multipart threshold,
//! fixed-size parts with bounded concurrency above it.

use serde::Serialize;
use thiserror::Error;

pub const KB: u64 = 1024;
pub const MB: u64 = KB * KB;

/// Smallest part S3 accepts for every part except the last.
pub const MIN_PART_SIZE: u64 = 5 * MB;

/// Upper bound on parts in one multipart upload.
pub const MAX_PARTS: u64 = 10_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TransferPolicy {
    /// Payloads of at least this many bytes go through multipart upload.
    pub multipart_threshold: u64,
    /// Size of every part but the last.
    pub chunk_size: u64,
    /// Parts in flight at once.
    pub max_concurrency: usize,
    /// Largest payload accepted at all.
    pub max_upload_size: u64,
}

impl Default for TransferPolicy {
    fn default() -> Self {
        Self {
            multipart_threshold: 32 * MB,
            chunk_size: 16 * MB,
            max_concurrency: 10,
            max_upload_size: 100 * MB,
        }
    }
}

/// Policy field a failed `TransferPolicy::check` blames.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PolicyField {
    ChunkSize,
    MaxConcurrency,
    MaxUploadSize,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{reason}")]
pub struct PolicyError {
    pub field: PolicyField,
    pub reason: String,
}

impl PolicyError {
    fn new(field: PolicyField, reason: impl Into<String>) -> Self {
        Self {
            field,
            reason: reason.into(),
        }
    }
}

/// Transfer shape chosen for one payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferPlan {
    Single,
    Multipart {
        chunk_size: u64,
        parts: u64,
        concurrency: usize,
    },
}

impl TransferPolicy {
    pub fn uses_multipart(&self, size: u64) -> bool {
        size >= self.multipart_threshold
    }

    /// Number of parts a payload of `size` bytes splits into.
    pub fn part_count(&self, size: u64) -> u64 {
        size.div_ceil(self.chunk_size).max(1)
    }

    pub fn plan(&self, size: u64) -> TransferPlan {
        if !self.uses_multipart(size) {
            return TransferPlan::Single;
        }
        let parts = self.part_count(size);
        TransferPlan::Multipart {
            chunk_size: self.chunk_size,
            parts,
            concurrency: self.max_concurrency.min(parts as usize).max(1),
        }
    }

    /// Reject combinations the backend would refuse later.
    pub fn check(&self) -> Result<(), PolicyError> {
        if self.chunk_size < MIN_PART_SIZE {
            return Err(PolicyError::new(
                PolicyField::ChunkSize,
                format!(
                    "chunk size {} is below the {} byte minimum part size",
                    self.chunk_size, MIN_PART_SIZE
                ),
            ));
        }
        if self.max_concurrency == 0 {
            return Err(PolicyError::new(
                PolicyField::MaxConcurrency,
                "max concurrency must be at least 1",
            ));
        }
        if self.max_upload_size == 0 {
            return Err(PolicyError::new(
                PolicyField::MaxUploadSize,
                "max upload size must be positive",
            ));
        }
        if self.part_count(self.max_upload_size) > MAX_PARTS {
            return Err(PolicyError::new(
                PolicyField::MaxUploadSize,
                format!(
                    "max upload size {} needs more than {} parts of {} bytes",
                    self.max_upload_size, MAX_PARTS, self.chunk_size
                ),
            ));
        }
        Ok(())
    }
}
