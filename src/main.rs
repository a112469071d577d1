use anyhow::{Context, Result};
use axum::Router;
use media_vault::{
    config::AppConfig,
    routes,
    services::{
        backend::ObjectBackend,
        lifecycle::LifecycleCoordinator,
        object_store::{GzipPolicy, ObjectStore, VisibilityProfile},
        record_store::{self, SqliteRecordStore},
        s3_backend::S3Backend,
        validation::ValidationEngine,
    },
};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use std::{fs, io::ErrorKind, path::Path, str::FromStr, sync::Arc};
use tokio::net::TcpListener;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    // --- Logging setup ---
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    // --- Parse config + migrate flag ---
    let (cfg, migrate) = AppConfig::from_env_and_args()?;

    tracing::info!("Starting media-vault with config: {:?}", cfg);

    // --- Initialize SQLite connection ---
    let db_url = &cfg.database_url;
    let db_path = db_url
        .trim_start_matches("sqlite://")
        .trim_start_matches("file:");
    tracing::debug!("Interpreted SQLite path => {}", db_path);

    // Create parent directory if needed
    if let Some(parent) = Path::new(db_path).parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            fs::create_dir_all(parent)
                .with_context(|| format!("creating database directory {:?}", parent))?;
            tracing::info!("Created missing directory {:?}", parent);
        }
    }

    let db: Arc<sqlx::Pool<sqlx::Sqlite>> = Arc::new(
        SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(
                SqliteConnectOptions::from_str(db_url)
                    .with_context(|| format!("parsing database URL {}", db_url))?
                    .create_if_missing(true),
            )
            .await
            .with_context(|| format!("connecting to {}", db_url))?,
    );

    // --- Handle migration mode ---
    if migrate {
        let applied = record_store::apply_schema(&db, record_store::SCHEMA).await?;
        tracing::info!("Database migration complete ({} statements).", applied);
        return Ok(()); // exit after migration
    }

    // --- Initialize core services ---
    let backend: Arc<dyn ObjectBackend> = Arc::new(S3Backend::connect(&cfg.s3).await);
    let gzip = GzipPolicy {
        enabled: cfg.gzip,
        ..GzipPolicy::default()
    };
    let private = ObjectStore::new(
        backend.clone(),
        VisibilityProfile::private(cfg.private_cache_control.clone(), cfg.link_expiration),
        cfg.transfer,
        gzip.clone(),
    );
    let public = ObjectStore::new(
        backend,
        VisibilityProfile::public(cfg.public_cache_control.clone()),
        cfg.transfer,
        gzip,
    );
    let lifecycle = LifecycleCoordinator::new(
        private,
        public,
        ValidationEngine::new(cfg.transfer.max_upload_size),
        Arc::new(SqliteRecordStore::new(db.clone())),
    );

    // --- Build router ---
    let app: Router = routes::routes::routes(cfg.transfer.max_upload_size).with_state(lifecycle);

    // --- Start server ---
    let addr = cfg.addr();
    let listener = match TcpListener::bind(&addr).await {
        Ok(listener) => listener,
        Err(err)
            if err.kind() == ErrorKind::PermissionDenied
                && matches!(cfg.host.as_str(), "0.0.0.0" | "::") =>
        {
            let fallback_addr = format!("127.0.0.1:{}", cfg.port);
            tracing::warn!(
                "Permission denied binding to {} ({}). Falling back to {}",
                addr,
                err,
                fallback_addr
            );
            TcpListener::bind(&fallback_addr).await?
        }
        Err(err) => return Err(err.into()),
    };

    tracing::info!("Server listening on http://{}", listener.local_addr()?);
    axum::serve(listener, app).await?;

    Ok(())
}
