//! Core business logic module
//!
//! Domain models, persistence, the yt-dlp wrapper and the download manager.

pub mod config;
pub mod database;
pub mod manager;
pub mod models;
pub mod progress_tracker;
pub mod updater;
pub mod youtube;

#[cfg(test)]
pub(crate) mod testing;

#[cfg(test)]
mod manager_integration_tests;

// Re-export commonly used types
pub use config::AppConfig;
pub use database::Database;
pub use manager::DownloadManager;
pub use youtube::{Extractor, YtDlp};
