//! Typed client for the backend
//!
//! Resource clients, a list cache, the download progress tracker, the
//! settings store and page view-models built on top of them.

pub mod api_client;
pub mod cache;
pub mod error;
pub mod pages;
pub mod poller;
pub mod settings_store;


pub use api_client::{ApiClient, DownloadApi, SettingsApi};
pub use cache::{VideoCatalog, VideoListCache};
pub use error::{ClientError, ClientResult};
pub use pages::{ChannelsPage, DownloadsPage, HomeFilter, HomePage, Pager};
pub use poller::{DownloadEntry, DownloadTracker};
pub use settings_store::{SettingsStore, Theme};
