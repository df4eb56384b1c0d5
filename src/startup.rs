use crate::{
    AppState, config::Config, errors::AppError, repositories::{InMemoryDirectory, InMemoryGallery},
    routes::create_router, storage::LocalFileStorage,
};
use std::sync::Arc;
use tracing;

/// Builds the application state: in-memory stores plus the upload directory.
pub async fn build_state(config: Config) -> Result<Arc<AppState>, AppError> {
    tracing::info!("Startup: Initializing application state...");
    let storage = LocalFileStorage::new(config.upload_dir.clone());
    storage.ensure_root().await?;

    Ok(Arc::new(AppState {
        directory: Arc::new(InMemoryDirectory::new()),
        gallery: Arc::new(InMemoryGallery::new()),
        files: Arc::new(storage),
        config,
    }))
}

/// Binds the listener and serves the router until shutdown.
pub async fn run(config: Config) -> Result<(), AppError> {
    let bind_address = config.bind_address;
    let state = build_state(config).await?;
    let app = create_router(state);

    let listener = tokio::net::TcpListener::bind(bind_address).await?;
    tracing::info!("Server listening on http://{}", bind_address);
    axum::serve(listener, app).await?;
    Ok(())
}
