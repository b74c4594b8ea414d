//! Offline YouTube Viewer - Core Library
//!
//! A REST backend that catalogs YouTube channels and downloads videos through
//! yt-dlp, plus a typed client for driving it.

pub mod api;
pub mod client;
pub mod core;
pub mod utils;

// Re-export commonly used types
pub use api::{router, AppState};
pub use client::{ApiClient, DownloadTracker, SettingsStore, VideoCatalog};
pub use core::{
    config::AppConfig,
    database::Database,
    manager::DownloadManager,
    models::{AppError, AppResult, Channel, UserSettings, Video},
    youtube::{Extractor, YtDlp},
};

use std::sync::Arc;
use tracing::{info, warn};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Library name
pub const NAME: &str = env!("CARGO_PKG_NAME");

/// Initialize logging with the default filter
pub fn init() {
    utils::logging::init_tracing();
    info!("📚 {} v{} initialized", NAME, VERSION);
}

/// Open the database, wire yt-dlp and load persisted settings
pub async fn build_manager(config: &AppConfig) -> anyhow::Result<Arc<DownloadManager>> {
    let db = Database::open(&config.storage.database_path())?;

    if core::youtube::locate_tool(&config.tools.yt_dlp_path).is_none() {
        warn!(
            "⚠️ {} was not found on PATH; fetches and downloads will fail",
            config.tools.yt_dlp_path
        );
    }
    let extractor = YtDlp::new(&config.tools, config.storage.cookies_path());

    let manager = Arc::new(DownloadManager::new(
        db,
        Arc::new(extractor),
        config.storage.clone(),
        config.tools.clone(),
    ));
    manager.bootstrap().await?;
    Ok(manager)
}
