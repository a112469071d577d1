//! Defines routes for stored files.
//!
//! ## Structure
//! - **Collection endpoints**
//!   - `GET    /files`: list records (`?visibility=private|public`)
//!   - `DELETE /files`: bulk best-effort delete (`{"ids": [...]}`)
//!   - `POST   /files/upload/{visibility}/{kind}`: multipart upload (`name`, `file`)
//!
//! - **Record endpoints**
//!   - `GET    /files/{id}`: one record
//!   - `DELETE /files/{id}`: best-effort delete
//!   - `GET    /files/{id}/url`: signed or public URL (`?expire=N`)
//!   - `GET    /files/{id}/exists`: existence in the bucket

use crate::{
    handlers::{
        health_handlers::{healthz, readyz},
        object_handlers::{
            delete_file, delete_files, file_exists, file_url, get_file, list_files, upload_file,
        },
    },
    services::lifecycle::LifecycleCoordinator,
};
use axum::{
    Router,
    extract::DefaultBodyLimit,
    routing::{get, post},
};

/// Multipart framing allowance on top of the payload limit.
const MULTIPART_OVERHEAD: usize = 64 * 1024;

/// Build and return the router for all file routes.
///
/// The router carries the shared `LifecycleCoordinator` to all handlers.
/// Upload bodies may exceed the payload limit by the multipart overhead so the
/// size check itself reports oversized files.
pub fn routes(max_upload_size: u64) -> Router<LifecycleCoordinator> {
    let body_limit = usize::try_from(max_upload_size)
        .unwrap_or(usize::MAX)
        .saturating_add(MULTIPART_OVERHEAD);

    Router::new()
        // health endpoints (mounted at root)
        .route("/healthz", get(healthz))
        .route("/readyz", get(readyz))
        .route("/files", get(list_files).delete(delete_files))
        .route(
            "/files/upload/{visibility}/{kind}",
            post(upload_file).layer(DefaultBodyLimit::max(body_limit)),
        )
        .route("/files/{id}", get(get_file).delete(delete_file))
        .route("/files/{id}/url", get(file_url))
        .route("/files/{id}/exists", get(file_exists))
}

#[cfg(test)]
mod tests {
    use super::routes;
    use crate::services::transfer::MB;

    #[test]
    fn route_table_has_no_conflicts() {
        let _router = routes(100 * MB);
        let _unbounded = routes(u64::MAX);
    }
}
