//! Application state and initialization
//!
//! The core services are wired together here and made available through
//! AppState.

use std::path::Path;

use crate::config::DATA_FILE_NAME;
use crate::error::Result;
use crate::services::QueryService;
use crate::store::Store;

/// Central application state holding the core services
#[derive(Clone)]
pub struct AppState {
    pub store: Store,
    pub queries: QueryService,
}

/// Application setup - called once on startup
pub async fn setup(data_dir: &Path) -> Result<AppState> {
    tracing::info!("Initializing application, data directory: {:?}", data_dir);

    std::fs::create_dir_all(data_dir)?;

    let store = Store::load(data_dir.join(DATA_FILE_NAME)).await;
    let queries = QueryService::new(store.clone());

    tracing::info!("Application initialized successfully");

    Ok(AppState { store, queries })
}
