//! HTTP handlers for stored files.
//! Thin adapters: parse the request, hand it to `LifecycleCoordinator`, and
//! map the outcome to JSON.

use crate::{
    errors::AppError,
    models::{ObjectRecord, UploadDescriptor, UploadKind, Visibility},
    services::{
        catalog,
        lifecycle::{BulkDeleteOutcome, DeleteReport, LifecycleCoordinator},
    },
};
use axum::{
    Json,
    extract::{Multipart, Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Deserialize)]
pub struct ListFilesQuery {
    pub visibility: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct BulkDeleteRequest {
    pub ids: Vec<Uuid>,
}

#[derive(Debug, Deserialize)]
pub struct UrlQuery {
    /// Lifetime of a signed URL in seconds; ignored for public files.
    pub expire: Option<u64>,
}

#[derive(Debug, Serialize)]
pub struct UrlResponse {
    pub url: String,
    pub signed: bool,
    pub expires_in: Option<u64>,
}

#[derive(Debug, Serialize)]
pub struct ExistsResponse {
    pub key: String,
    pub exists: bool,
}

/// POST `/files/upload/{visibility}/{kind}`: multipart upload with `name` and `file` fields.
pub async fn upload_file(
    State(lifecycle): State<LifecycleCoordinator>,
    Path((visibility, kind)): Path<(String, String)>,
    mut multipart: Multipart,
) -> Result<impl IntoResponse, AppError> {
    let visibility = visibility
        .parse::<Visibility>()
        .map_err(|err| AppError::bad_request(err.to_string()))?;
    let kind = kind
        .parse::<UploadKind>()
        .map_err(|err| AppError::bad_request(err.to_string()))?;

    let mut name: Option<String> = None;
    let mut file: Option<(String, Bytes)> = None;
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|err| AppError::new(err.status(), err.body_text()))?
    {
        let field_name = field.name().map(str::to_string);
        match field_name.as_deref() {
            Some("name") => {
                let text = field
                    .text()
                    .await
                    .map_err(|err| AppError::new(err.status(), err.body_text()))?;
                name = Some(text);
            }
            Some("file") => {
                let file_name = field.file_name().unwrap_or_default().to_string();
                let data = field
                    .bytes()
                    .await
                    .map_err(|err| AppError::new(err.status(), err.body_text()))?;
                file = Some((file_name, data));
            }
            _ => {}
        }
    }

    let (file_name, data) = file.ok_or_else(|| AppError::bad_request("missing `file` field"))?;
    let logical_name = name
        .filter(|n| !n.trim().is_empty())
        .unwrap_or_else(|| default_name(&file_name));

    let descriptor = UploadDescriptor::from_bytes(logical_name, file_name, visibility, kind, data);
    let stored = lifecycle.save(descriptor).await?;
    Ok((StatusCode::CREATED, Json(stored.record)))
}

/// GET `/files`: list records, optionally `?visibility=private|public`.
pub async fn list_files(
    State(lifecycle): State<LifecycleCoordinator>,
    Query(q): Query<ListFilesQuery>,
) -> Result<Json<Vec<ObjectRecord>>, AppError> {
    let visibility = q
        .visibility
        .as_deref()
        .map(str::parse::<Visibility>)
        .transpose()
        .map_err(|err| AppError::bad_request(err.to_string()))?;
    let records = lifecycle.records().list(visibility).await?;
    Ok(Json(records))
}

/// GET `/files/{id}`
pub async fn get_file(
    State(lifecycle): State<LifecycleCoordinator>,
    Path(id): Path<Uuid>,
) -> Result<Json<ObjectRecord>, AppError> {
    Ok(Json(find_record(&lifecycle, id).await?))
}

/// DELETE `/files/{id}`: best-effort: the record is always removed, storage
/// trouble comes back as `storage_warning`.
pub async fn delete_file(
    State(lifecycle): State<LifecycleCoordinator>,
    Path(id): Path<Uuid>,
) -> Result<Json<DeleteReport>, AppError> {
    let record = find_record(&lifecycle, id).await?;
    let report = lifecycle.delete(&record).await?;
    Ok(Json(report))
}

/// DELETE `/files` with `{"ids": [...]}`: best-effort delete of each record,
/// one outcome per id in request order.
pub async fn delete_files(
    State(lifecycle): State<LifecycleCoordinator>,
    Json(request): Json<BulkDeleteRequest>,
) -> Result<Json<Vec<BulkDeleteOutcome>>, AppError> {
    if request.ids.is_empty() {
        return Err(AppError::bad_request("`ids` must not be empty"));
    }
    Ok(Json(lifecycle.delete_many(&request.ids).await))
}

/// GET `/files/{id}/url?expire=N`
pub async fn file_url(
    State(lifecycle): State<LifecycleCoordinator>,
    Path(id): Path<Uuid>,
    Query(q): Query<UrlQuery>,
) -> Result<Json<UrlResponse>, AppError> {
    let record = find_record(&lifecycle, id).await?;
    let profile = lifecycle.store(record.visibility).profile();
    let signed = profile.signed_urls;
    let expires_in = signed.then(|| q.expire.unwrap_or(profile.default_expire_secs));

    let url = lifecycle
        .url(&record.key, record.visibility, q.expire)
        .await?;
    Ok(Json(UrlResponse {
        url,
        signed,
        expires_in,
    }))
}

/// GET `/files/{id}/exists`: a backend failure is an error response, not `false`.
pub async fn file_exists(
    State(lifecycle): State<LifecycleCoordinator>,
    Path(id): Path<Uuid>,
) -> Result<Json<ExistsResponse>, AppError> {
    let record = find_record(&lifecycle, id).await?;
    let exists = lifecycle.exists(&record.key, record.visibility).await?;
    Ok(Json(ExistsResponse {
        key: record.key,
        exists,
    }))
}

async fn find_record(lifecycle: &LifecycleCoordinator, id: Uuid) -> Result<ObjectRecord, AppError> {
    lifecycle
        .records()
        .find(id)
        .await?
        .ok_or_else(|| AppError::not_found(format!("file `{id}` not found")))
}

/// Logical name from an uploaded filename: the filename without its extension.
fn default_name(file_name: &str) -> String {
    let file_name = file_name.trim();
    let extension = catalog::extension_of(file_name);
    match file_name.get(..file_name.len() - extension.len()) {
        Some(stem) if !stem.is_empty() => stem.to_string(),
        _ => file_name.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::default_name;

    #[test]
    fn default_name_drops_the_extension() {
        assert_eq!(default_name("photo.png"), "photo");
        assert_eq!(default_name("backup.tar.gz"), "backup");
        assert_eq!(default_name("README"), "README");
    }
}
