//! Test fixtures shared by the unit and integration tests

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

use crate::core::config::{StorageConfig, ToolsConfig};
use crate::core::database::Database;
use crate::core::manager::DownloadManager;
use crate::core::models::{
    AppError, AppResult, Channel, ChannelInfo, SubscriptionOptions, Video, VideoMetadata,
};
use crate::core::youtube::{DownloadJob, Extractor, ProgressSink, SUPPORTED_BROWSERS};

pub fn channel(id: &str, title: &str) -> Channel {
    Channel {
        id: id.to_string(),
        title: title.to_string(),
        thumbnail_url: Some(format!("https://yt3.googleusercontent.com/channel/{}", id)),
        description: None,
        last_updated: Utc::now(),
    }
}

pub fn video(id: &str, channel_id: &str, published_at: DateTime<Utc>) -> Video {
    metadata(id, channel_id, published_at).into_video(channel_id)
}

pub fn metadata(id: &str, channel_id: &str, published_at: DateTime<Utc>) -> VideoMetadata {
    VideoMetadata {
        id: id.to_string(),
        channel_id: Some(channel_id.to_string()),
        title: format!("Video {}", id),
        description: String::new(),
        published_at,
        thumbnail_url: format!("https://i.ytimg.com/vi/{}/maxresdefault.jpg", id),
        duration: 60,
        view_count: 0,
        like_count: 0,
    }
}

/// In-memory stand-in for yt-dlp
#[derive(Default)]
pub struct FakeExtractor {
    channels: Mutex<HashMap<String, ChannelInfo>>,
    listings: Mutex<HashMap<String, Vec<VideoMetadata>>>,
    videos: Mutex<HashMap<String, VideoMetadata>>,
    subscriptions: Mutex<Vec<ChannelInfo>>,
    progress_steps: Mutex<Vec<f64>>,
    step_delay: Mutex<Duration>,
    download_error: Mutex<Option<String>>,
    downloads: Mutex<Vec<DownloadJob>>,
}

impl FakeExtractor {
    pub fn with_channel(self, info: ChannelInfo) -> Self {
        self.channels.lock().insert(info.id.clone(), info);
        self
    }

    /// Resolve `key` (a handle or custom URL name) to `info`
    pub fn with_handle(self, key: &str, info: ChannelInfo) -> Self {
        self.channels.lock().insert(key.to_string(), info);
        self
    }

    pub fn with_listing(self, channel_id: &str, videos: Vec<VideoMetadata>) -> Self {
        self.set_listing(channel_id, videos);
        self
    }

    pub fn with_video(self, metadata: VideoMetadata) -> Self {
        self.videos.lock().insert(metadata.id.clone(), metadata);
        self
    }

    pub fn with_subscriptions(self, channels: Vec<ChannelInfo>) -> Self {
        *self.subscriptions.lock() = channels;
        self
    }

    /// Progress values reported by every download, `delay` apart
    pub fn with_progress(self, steps: Vec<f64>, delay: Duration) -> Self {
        *self.progress_steps.lock() = steps;
        *self.step_delay.lock() = delay;
        self
    }

    pub fn set_listing(&self, channel_id: &str, videos: Vec<VideoMetadata>) {
        self.listings.lock().insert(channel_id.to_string(), videos);
    }

    pub fn fail_downloads(&self, message: &str) {
        *self.download_error.lock() = Some(message.to_string());
    }

    pub fn downloads(&self) -> Vec<DownloadJob> {
        self.downloads.lock().clone()
    }
}

#[async_trait]
impl Extractor for FakeExtractor {
    async fn channel_videos(
        &self,
        channel_id: &str,
        start: Option<DateTime<Utc>>,
        end: Option<DateTime<Utc>>,
    ) -> AppResult<Vec<VideoMetadata>> {
        let listing = self.listings.lock().get(channel_id).cloned().unwrap_or_default();
        Ok(listing
            .into_iter()
            .filter(|v| start.map_or(true, |s| v.published_at >= s))
            .filter(|v| end.map_or(true, |e| v.published_at <= e))
            .collect())
    }

    async fn channel_info(&self, channel_id: &str) -> AppResult<Option<ChannelInfo>> {
        Ok(self.channels.lock().get(channel_id).cloned())
    }

    async fn video_info(&self, video_id: &str) -> AppResult<Option<VideoMetadata>> {
        Ok(self.videos.lock().get(video_id).cloned())
    }

    async fn subscriptions(&self, _options: SubscriptionOptions) -> AppResult<Vec<ChannelInfo>> {
        Ok(self.subscriptions.lock().clone())
    }

    async fn download(&self, job: &DownloadJob, progress: ProgressSink) -> AppResult<PathBuf> {
        self.downloads.lock().push(job.clone());
        let steps = self.progress_steps.lock().clone();
        let delay = *self.step_delay.lock();

        for step in steps {
            progress(step);
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
        }

        if let Some(message) = self.download_error.lock().clone() {
            return Err(AppError::Download(message));
        }

        let dir = job.video_dir();
        tokio::fs::create_dir_all(&dir).await?;
        let path = dir.join(format!("{}.mp4", job.video_id));
        tokio::fs::write(&path, b"fake mp4 payload 0123456789").await?;
        Ok(path)
    }

    async fn export_browser_cookies(&self, browser: &str) -> AppResult<u64> {
        if !SUPPORTED_BROWSERS.contains(&browser.trim().to_lowercase().as_str()) {
            return Err(AppError::Validation(format!("Unsupported browser: {}", browser)));
        }
        Ok(128)
    }
}

/// Manager over a fresh in-memory database rooted in a temp dir
pub async fn manager_with(
    extractor: FakeExtractor,
) -> (Arc<DownloadManager>, Arc<FakeExtractor>, TempDir) {
    let dir = TempDir::new().expect("temp dir");
    let storage = StorageConfig {
        data_dir: dir.path().to_path_buf(),
        ..Default::default()
    };
    let fake = Arc::new(extractor);
    let db = Database::open_in_memory().expect("in-memory database");
    let manager = Arc::new(DownloadManager::new(
        db,
        fake.clone(),
        storage,
        ToolsConfig::default(),
    ));
    manager.bootstrap().await.expect("bootstrap");
    (manager, fake, dir)
}
