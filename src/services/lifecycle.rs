//! LifecycleCoordinator: save and delete flows for stored objects.
//!
//! Each call walks one object through its states synchronously:
//!
//! ```text
//! save:   Pending -> Validated -> Stored -> Active
//!                 \-> Rejected   \-> UploadFailed
//! delete: Active -> Deleting -> Deleted
//! ```
//!
//! A record is written only once the upload is confirmed; stores that
//! overwrite in place refresh the existing record instead of adding one. A
//! delete always removes the record, even when the remote object could not be
//! removed; storage trouble during delete is logged and reported as a warning.

use crate::{
    models::{NewObjectRecord, ObjectRecord, UploadDescriptor, Visibility},
    services::{
        content_type::ContentTypeResolver,
        naming::{KeyNamingStrategy, StorageKey},
        object_store::{ObjectStore, StoreError, UploadReceipt},
        record_store::{RecordError, RecordStore},
        validation::{ValidationEngine, ValidationError},
    },
};
use serde::Serialize;
use std::{fmt, sync::Arc};
use thiserror::Error;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

#[derive(Serialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum LifecycleState {
    Pending,
    Validated,
    Stored,
    Active,
    Deleting,
    Deleted,
    Rejected,
    UploadFailed,
}

impl fmt::Display for LifecycleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            LifecycleState::Pending => "pending",
            LifecycleState::Validated => "validated",
            LifecycleState::Stored => "stored",
            LifecycleState::Active => "active",
            LifecycleState::Deleting => "deleting",
            LifecycleState::Deleted => "deleted",
            LifecycleState::Rejected => "rejected",
            LifecycleState::UploadFailed => "upload_failed",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Error)]
pub enum LifecycleError {
    #[error(transparent)]
    Rejected(#[from] ValidationError),
    #[error(transparent)]
    Upload(#[from] StoreError),
    #[error(transparent)]
    Record(#[from] RecordError),
}

impl LifecycleError {
    /// Terminal state the failed save ended in.
    pub fn state(&self) -> LifecycleState {
        match self {
            LifecycleError::Rejected(_) => LifecycleState::Rejected,
            LifecycleError::Upload(_) => LifecycleState::UploadFailed,
            LifecycleError::Record(_) => LifecycleState::Stored,
        }
    }
}

/// Result of a successful save.
#[derive(Debug, Clone, Serialize)]
pub struct StoredObject {
    pub state: LifecycleState,
    pub key: StorageKey,
    pub record: ObjectRecord,
    pub receipt: UploadReceipt,
}

/// Result of a delete. `storage_warning` is set when the remote object may
/// still exist.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeleteReport {
    pub state: LifecycleState,
    pub key: String,
    pub storage_warning: Option<String>,
}

/// Outcome for one id of a bulk delete.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum BulkDeleteOutcome {
    Deleted { id: Uuid, report: DeleteReport },
    NotFound { id: Uuid },
    Failed { id: Uuid, error: String },
}

#[derive(Clone)]
pub struct LifecycleCoordinator {
    private: ObjectStore,
    public: ObjectStore,
    validator: ValidationEngine,
    resolver: ContentTypeResolver,
    naming: KeyNamingStrategy,
    records: Arc<dyn RecordStore>,
}

impl LifecycleCoordinator {
    pub fn new(
        private: ObjectStore,
        public: ObjectStore,
        validator: ValidationEngine,
        records: Arc<dyn RecordStore>,
    ) -> Self {
        Self {
            private,
            public,
            validator,
            resolver: ContentTypeResolver::new(),
            naming: KeyNamingStrategy::new(),
            records,
        }
    }

    pub fn store(&self, visibility: Visibility) -> &ObjectStore {
        match visibility {
            Visibility::Private => &self.private,
            Visibility::Public => &self.public,
        }
    }

    pub fn records(&self) -> &Arc<dyn RecordStore> {
        &self.records
    }

    pub fn validator(&self) -> &ValidationEngine {
        &self.validator
    }

    /// Validate, upload and record one object.
    ///
    /// Nothing touches the bucket or the record store before validation
    /// passes, and the record is written only after the upload succeeded.
    pub async fn save(
        &self,
        mut descriptor: UploadDescriptor,
    ) -> Result<StoredObject, LifecycleError> {
        let name = descriptor.logical_name.clone();
        debug!(%name, state = %LifecycleState::Pending, "save started");

        let validated = self.validator.validate(&mut descriptor).await?;
        debug!(%name, state = %LifecycleState::Validated, extension = %validated.extension, "upload validated");

        let key = self.naming.build_key(
            descriptor.visibility,
            descriptor.kind,
            &descriptor.logical_name,
            &validated.extension,
        );
        let resolved = self.resolver.resolve(key.as_str());
        debug!(%name, key = %key, content_type = %resolved.content_type, "derived storage key");

        let store = self.store(descriptor.visibility);
        let receipt = match store.upload(&key, &mut *descriptor.body, &resolved).await {
            Ok(receipt) => receipt,
            Err(StoreError::Rejected(reason)) => {
                info!(key = %key, state = %LifecycleState::Rejected, error = %reason, "upload rejected after measuring the body");
                return Err(LifecycleError::Rejected(reason));
            }
            Err(err) => {
                error!(key = %key, state = %LifecycleState::UploadFailed, error = %err, "upload failed");
                return Err(err.into());
            }
        };
        debug!(key = %key, state = %LifecycleState::Stored, "object stored");

        let new = NewObjectRecord {
            name: descriptor.logical_name.clone(),
            key: key.as_str().to_string(),
            visibility: descriptor.visibility,
            kind: descriptor.kind,
            category: validated.category,
            content_type: receipt.params.content_type.clone(),
            size_bytes: i64::try_from(receipt.source_size).unwrap_or(i64::MAX),
        };
        let written = if store.profile().file_overwrite {
            self.records.upsert(&new).await
        } else {
            self.records.create(&new).await
        };
        let record = written.map_err(|err| {
            match &err {
                RecordError::DuplicateKey(_) => {
                    warn!(key = %key, error = %err, "object stored but another record already holds its key")
                }
                _ => {
                    error!(key = %key, error = %err, "object stored but its record could not be written; object is orphaned")
                }
            }
            err
        })?;

        info!(id = %record.id, key = %key, visibility = %record.visibility, "object saved");
        Ok(StoredObject {
            state: LifecycleState::Active,
            key,
            record,
            receipt,
        })
    }

    /// Best-effort delete of a recorded object.
    ///
    /// The record is removed exactly once regardless of what the bucket says.
    /// Only a record store failure is an error.
    pub async fn delete(&self, record: &ObjectRecord) -> Result<DeleteReport, RecordError> {
        debug!(id = %record.id, key = %record.key, state = %LifecycleState::Deleting, "delete started");
        let storage_warning = self.delete_key(&record.key, record.visibility).await;

        self.records.remove(record.id).await?;
        info!(id = %record.id, key = %record.key, state = %LifecycleState::Deleted, "object deleted");
        Ok(DeleteReport {
            state: LifecycleState::Deleted,
            key: record.key.clone(),
            storage_warning,
        })
    }

    /// Delete every listed record, one at a time. A failure on one id is
    /// reported in its outcome and never stops the rest.
    pub async fn delete_many(&self, ids: &[Uuid]) -> Vec<BulkDeleteOutcome> {
        let mut outcomes = Vec::with_capacity(ids.len());
        for &id in ids {
            let outcome = match self.records.find(id).await {
                Ok(Some(record)) => match self.delete(&record).await {
                    Ok(report) => BulkDeleteOutcome::Deleted { id, report },
                    Err(err) => {
                        error!(%id, error = %err, "bulk delete failed for record");
                        BulkDeleteOutcome::Failed {
                            id,
                            error: err.to_string(),
                        }
                    }
                },
                Ok(None) => BulkDeleteOutcome::NotFound { id },
                Err(err) => {
                    error!(%id, error = %err, "bulk delete could not load record");
                    BulkDeleteOutcome::Failed {
                        id,
                        error: err.to_string(),
                    }
                }
            };
            outcomes.push(outcome);
        }
        info!(requested = ids.len(), "bulk delete finished");
        outcomes
    }

    /// Remove `key` from the bucket without failing. Returns a warning when
    /// the object may still exist.
    pub async fn delete_key(&self, key: &str, visibility: Visibility) -> Option<String> {
        let store = self.store(visibility);
        match store.exists(key).await {
            Ok(false) => {
                debug!(key, "object already absent");
                None
            }
            Ok(true) => match store.delete(key).await {
                Ok(()) => None,
                Err(err) => {
                    error!(key, error = %err, "storage delete failed; object may be orphaned");
                    Some(format!("storage delete failed: {err}"))
                }
            },
            Err(err) => {
                error!(key, error = %err, "existence check failed; skipping storage delete");
                warn!(key, "object may be orphaned");
                Some(format!("could not confirm object state: {err}"))
            }
        }
    }

    pub async fn url(
        &self,
        key: &str,
        visibility: Visibility,
        expire_seconds: Option<u64>,
    ) -> Result<String, StoreError> {
        self.store(visibility).url(key, expire_seconds).await
    }

    /// Backend failures are returned, never reported as `false`.
    pub async fn exists(&self, key: &str, visibility: Visibility) -> Result<bool, StoreError> {
        self.store(visibility).exists(key).await
    }
}
