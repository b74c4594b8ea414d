//! Download Manager - catalog and download lifecycle
//!
//! Owns the database handle, the extractor and the in-memory progress
//! registry. HTTP handlers and the auto updater only talk to this type.

use chrono::Utc;
use parking_lot::RwLock;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::Semaphore;
use tracing::{error, info, warn};

use crate::core::config::{StorageConfig, ToolsConfig};
use crate::core::database::Database;
use crate::core::models::{
    AppError, AppResult, AuthStatus, Channel, ChannelCreate, ChannelInfo, CookieUploadResponse,
    DatabaseDump, DownloadProgress, DownloadResponse, DumpTables, FetchVideosRequest,
    SettingsUpdate, SubscriptionOptions, UserSettings, Video, VideoFilter, VideoPage, VideoQuery,
    MAX_VIDEO_LIMIT,
};
use crate::core::progress_tracker::ProgressRegistry;
use crate::core::youtube::{DownloadJob, Extractor, ProgressSink};
use crate::utils::{file_utils, validation};

/// Highest value reported while yt-dlp is still running.
///
/// Video and audio streams each report 100% separately, so completion is
/// only published once the process has exited and the row is updated.
pub const IN_FLIGHT_PROGRESS_CAP: f64 = 0.99;

/// Cookie files older than this trigger a refresh warning
pub const COOKIE_MAX_AGE_DAYS: i64 = 30;

/// Steps shown when no cookies file is present
pub const COOKIE_SETUP_INSTRUCTIONS: [&str; 5] = [
    "1. Install a browser extension like 'Get cookies.txt' or 'EditThisCookie'",
    "2. Log in to YouTube in your browser",
    "3. Use the extension to export cookies for youtube.com to cookies.txt",
    "4. Upload the file through POST /api/auth/cookies or import it from a browser",
    "5. Retry the download",
];

struct ConcurrencyLimit {
    max: usize,
    semaphore: Arc<Semaphore>,
}

/// Removes a progress entry when the download future ends or is dropped
struct ProgressGuard<'a> {
    registry: &'a ProgressRegistry,
    video_id: &'a str,
}

impl Drop for ProgressGuard<'_> {
    fn drop(&mut self) {
        self.registry.remove(self.video_id);
    }
}

/// Main download manager
pub struct DownloadManager {
    db: Database,

    extractor: Arc<dyn Extractor>,

    /// Progress of downloads currently running
    progress: ProgressRegistry,

    /// Admission control sized by `max_concurrent_downloads`
    limit: RwLock<ConcurrencyLimit>,

    storage: StorageConfig,

    tools: ToolsConfig,
}

impl DownloadManager {
    pub fn new(
        db: Database,
        extractor: Arc<dyn Extractor>,
        storage: StorageConfig,
        tools: ToolsConfig,
    ) -> Self {
        let defaults = SettingsUpdate::default();
        let max = defaults.max_concurrent_downloads.max(1) as usize;
        Self {
            db,
            extractor,
            progress: ProgressRegistry::new(),
            limit: RwLock::new(ConcurrencyLimit {
                max,
                semaphore: Arc::new(Semaphore::new(max)),
            }),
            storage,
            tools,
        }
    }

    /// Load (or create) persisted settings and size the download limiter from them
    pub async fn bootstrap(&self) -> AppResult<UserSettings> {
        let settings = self.settings().await?;
        self.resize(settings.max_concurrent_downloads.max(1) as usize);
        info!(
            "🚀 Download manager ready (max {} concurrent downloads, directory {:?})",
            settings.max_concurrent_downloads,
            self.download_dir(&settings)
        );
        Ok(settings)
    }

    pub fn database(&self) -> &Database {
        &self.db
    }

    pub fn progress_registry(&self) -> &ProgressRegistry {
        &self.progress
    }

    pub fn storage(&self) -> &StorageConfig {
        &self.storage
    }

    pub fn tools(&self) -> &ToolsConfig {
        &self.tools
    }

    pub fn cookies_path(&self) -> PathBuf {
        self.storage.cookies_path()
    }

    /// Absolute download root for the given settings
    pub fn download_dir(&self, settings: &UserSettings) -> PathBuf {
        self.storage.resolve(&settings.download_directory)
    }

    /// Current admission limit
    pub fn max_concurrent(&self) -> usize {
        self.limit.read().max
    }

    /// Swap the admission semaphore when the limit changes.
    ///
    /// Downloads already holding a permit keep it; new requests queue on the new semaphore.
    pub fn resize(&self, max_concurrent: usize) {
        let max_concurrent = max_concurrent.max(1);
        let mut limit = self.limit.write();
        if limit.max != max_concurrent {
            info!(
                "🔧 Updated concurrent downloads: {} -> {}",
                limit.max, max_concurrent
            );
            limit.max = max_concurrent;
            limit.semaphore = Arc::new(Semaphore::new(max_concurrent));
        }
    }

    // ---- channels ----

    pub async fn list_channels(&self) -> AppResult<Vec<Channel>> {
        self.db.get_channels().await
    }

    pub async fn get_channel(&self, channel_id: &str) -> AppResult<Channel> {
        self.db
            .get_channel(channel_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Channel with ID {} not found", channel_id)))
    }

    /// Subscribe to a channel; an existing subscription is returned unchanged
    pub async fn add_channel(&self, request: ChannelCreate) -> AppResult<Channel> {
        let requested = request.id.trim().to_string();
        if requested.is_empty() {
            return Err(AppError::Validation("Channel id must not be empty".to_string()));
        }
        if let Some(existing) = self.db.get_channel(&requested).await? {
            return Ok(existing);
        }

        let complete = match (&request.title, &request.thumbnail_url) {
            (Some(title), Some(thumbnail)) if !title.is_empty() && !thumbnail.is_empty() => {
                Some(request.clone())
            }
            _ => None,
        };

        let resolved = match complete {
            Some(resolved) => resolved,
            None => {
                let info = self.extractor.channel_info(&requested).await?.ok_or_else(|| {
                    AppError::NotFound(format!(
                        "Channel with ID {} not found on YouTube",
                        requested
                    ))
                })?;
                // Handles resolve to a UC id that may already be subscribed
                if info.id != requested {
                    if let Some(existing) = self.db.get_channel(&info.id).await? {
                        return Ok(existing);
                    }
                }
                ChannelCreate::from(info)
            }
        };

        let channel = Channel {
            id: resolved.id.trim().to_string(),
            title: resolved.title.unwrap_or_else(|| "Unknown Channel".to_string()),
            thumbnail_url: resolved.thumbnail_url,
            description: resolved.description,
            last_updated: Utc::now(),
        };
        let channel = self.db.create_channel(channel).await?;
        info!("📺 Subscribed to channel {} ({})", channel.id, channel.title);
        Ok(channel)
    }

    /// Unsubscribe; catalogued videos of the channel are kept
    pub async fn delete_channel(&self, channel_id: &str) -> AppResult<()> {
        if !self.db.delete_channel(channel_id).await? {
            return Err(AppError::NotFound(format!(
                "Channel with ID {} not found",
                channel_id
            )));
        }
        info!("🗑️ Unsubscribed from channel {}", channel_id);
        Ok(())
    }

    /// Channels of the authenticated account; requires a cookies file
    pub async fn subscriptions(
        &self,
        options: SubscriptionOptions,
    ) -> AppResult<Vec<ChannelInfo>> {
        if !file_utils::non_empty_file(&self.cookies_path()) {
            return Err(AppError::AuthRequired(
                "No cookies.txt file found; it is required for fetching subscriptions".to_string(),
            ));
        }
        self.extractor.subscriptions(options).await
    }

    // ---- videos ----

    pub async fn list_videos(&self, query: &VideoQuery) -> AppResult<VideoPage> {
        let filter = query.to_filter(Utc::now())?;
        let videos = self.db.get_videos(filter.clone()).await?;
        let total = self.db.count_videos(filter).await?;
        Ok(VideoPage { videos, total })
    }

    pub async fn get_video(&self, video_id: &str) -> AppResult<Video> {
        self.db
            .get_video(video_id)
            .await?
            .ok_or_else(|| video_not_found(video_id))
    }

    /// Pull channel listings from YouTube into the catalog
    pub async fn fetch_videos(&self, request: &FetchVideosRequest) -> AppResult<Vec<Video>> {
        request.validate()?;
        let (start, end) = request.window(Utc::now())?;

        if request.fetch_all_channels {
            let mut processed = Vec::new();
            for channel in self.db.get_channels().await? {
                match self.fetch_channel(&channel.id, start, end).await {
                    Ok(videos) => processed.extend(videos),
                    Err(e) => warn!("Failed to fetch videos for channel {}: {}", channel.id, e),
                }
            }
            return Ok(processed);
        }

        let channel_id = request
            .channel_id
            .as_deref()
            .map(str::trim)
            .unwrap_or_default();
        self.fetch_channel(channel_id, start, end).await
    }

    /// Fetch one channel and upsert its videos in a single pass.
    ///
    /// Existing rows only get their metadata refreshed; download state is untouched.
    pub async fn fetch_channel(
        &self,
        channel_id: &str,
        start: Option<chrono::DateTime<Utc>>,
        end: Option<chrono::DateTime<Utc>>,
    ) -> AppResult<Vec<Video>> {
        let started = std::time::Instant::now();
        info!(
            "Fetching videos for channel {} with date range {:?} to {:?}",
            channel_id, start, end
        );

        let fetched = self.extractor.channel_videos(channel_id, start, end).await?;
        if fetched.is_empty() {
            info!("No videos found for channel {} in the requested range", channel_id);
            self.touch_channel(channel_id).await?;
            return Ok(Vec::new());
        }

        let ids: Vec<String> = fetched.iter().map(|v| v.id.clone()).collect();
        let existing: HashSet<String> = self
            .db
            .get_videos_by_ids(ids)
            .await?
            .into_iter()
            .map(|v| v.id)
            .collect();

        let mut seen = HashSet::new();
        let (to_update, to_create): (Vec<Video>, Vec<Video>) = fetched
            .into_iter()
            .filter(|metadata| seen.insert(metadata.id.clone()))
            .map(|metadata| {
                let mut video = metadata.into_video(channel_id);
                video.channel_id = channel_id.to_string();
                video
            })
            .partition(|video| existing.contains(&video.id));

        let created = self.db.create_videos_batch(to_create).await?;
        let updated = self.db.update_videos_metadata_batch(to_update).await?;
        self.touch_channel(channel_id).await?;

        info!(
            "Video fetch for {} completed in {:.2}s - Created: {}, Updated: {}",
            channel_id,
            started.elapsed().as_secs_f64(),
            created.len(),
            updated.len()
        );
        Ok(created.into_iter().chain(updated).collect())
    }

    async fn touch_channel(&self, channel_id: &str) -> AppResult<()> {
        if let Some(mut channel) = self.db.get_channel(channel_id).await? {
            channel.last_updated = Utc::now();
            self.db.update_channel(channel).await?;
        }
        Ok(())
    }

    /// Download a catalogued video and mark it downloaded on success
    pub async fn download(&self, video_id: &str, resolution: &str) -> AppResult<DownloadResponse> {
        validation::validate_resolution(resolution)?;
        let resolution = resolution.trim();
        self.get_video(video_id).await?;

        let settings = self.settings().await?;
        let download_dir = self.download_dir(&settings);
        let checked_dir = download_dir.clone();
        tokio::task::spawn_blocking(move || file_utils::ensure_writable_dir(&checked_dir))
            .await
            .map_err(|e| AppError::System(format!("Directory check task failed: {}", e)))?
            .map_err(|e| {
                error!("Download directory issue for {:?}: {}", download_dir, e);
                AppError::System(format!("Error with download directory: {}", e))
            })?;

        if !self.progress.try_start(video_id) {
            return Err(AppError::Validation(format!(
                "Video {} is already being downloaded",
                video_id
            )));
        }
        let _guard = ProgressGuard {
            registry: &self.progress,
            video_id,
        };

        let semaphore = Arc::clone(&self.limit.read().semaphore);
        let _permit = semaphore
            .acquire_owned()
            .await
            .map_err(|_| AppError::System("Download queue is closed".to_string()))?;

        info!(
            "Processing download request for video {} at resolution {}",
            video_id, resolution
        );

        let registry = self.progress.clone();
        let tracked_id = video_id.to_string();
        let sink: ProgressSink = Arc::new(move |fraction: f64| {
            registry.update(&tracked_id, fraction.min(IN_FLIGHT_PROGRESS_CAP));
        });

        let job = DownloadJob {
            video_id: video_id.to_string(),
            resolution: resolution.to_string(),
            download_dir,
        };

        match self.extractor.download(&job, sink).await {
            Ok(path) => {
                self.db
                    .mark_downloaded(video_id, resolution, Utc::now())
                    .await?
                    .ok_or_else(|| video_not_found(video_id))?;
                self.progress.finish(video_id);
                info!("✅ Video {} downloaded to {:?}", video_id, path);
                Ok(DownloadResponse {
                    message: "Video downloaded successfully.".to_string(),
                    video_id: video_id.to_string(),
                })
            }
            Err(e) => {
                error!("Failed to download video {}: {}", video_id, e);
                Err(e)
            }
        }
    }

    /// Resolve a URL to a video id, catalogue it if unknown, then download it
    pub async fn download_by_url(&self, url: &str, resolution: &str) -> AppResult<DownloadResponse> {
        let video_id = validation::extract_video_id(url)?;

        if self.db.get_video(&video_id).await?.is_none() {
            let metadata = self.extractor.video_info(&video_id).await?.ok_or_else(|| {
                AppError::NotFound(format!("Video {} not found on YouTube", video_id))
            })?;
            let video = metadata.into_video("unknown");
            info!("Adding video {} from URL to the catalog", video.id);
            self.db.create_video(video).await?;
        }

        self.download(&video_id, resolution).await
    }

    /// Live progress if tracked, else 1.0 for downloaded rows, else the persisted value
    pub async fn progress(&self, video_id: &str) -> AppResult<DownloadProgress> {
        if let Some(progress) = self.progress.get(video_id) {
            return Ok(DownloadProgress {
                video_id: video_id.to_string(),
                progress,
            });
        }

        let video = self.get_video(video_id).await?;
        let progress = if video.is_downloaded {
            1.0
        } else {
            video.download_progress
        };
        Ok(DownloadProgress {
            video_id: video_id.to_string(),
            progress,
        })
    }

    /// Remove downloaded files and the catalog row
    pub async fn delete_video(&self, video_id: &str) -> AppResult<()> {
        self.get_video(video_id).await?;

        let settings = self.settings().await?;
        let download_dir = self.download_dir(&settings);
        match file_utils::remove_video_dir(&download_dir, video_id) {
            Ok(true) => info!("🗑️ Removed files for video {}", video_id),
            Ok(false) => {}
            Err(e) => error!("Error removing files for video {}: {}", video_id, e),
        }

        self.db.delete_video(video_id).await?;
        Ok(())
    }

    /// Playable file for a downloaded video
    pub async fn media_file(&self, video_id: &str) -> AppResult<(Video, PathBuf)> {
        let video = self.get_video(video_id).await?;
        if !video.is_downloaded {
            return Err(AppError::Validation(format!(
                "Video {} has not been downloaded yet",
                video_id
            )));
        }

        let settings = self.settings().await?;
        let video_dir = self.download_dir(&settings).join(video_id);
        if !video_dir.is_dir() {
            return Err(AppError::NotFound(format!(
                "Video directory not found for {}",
                video_id
            )));
        }
        let path = file_utils::find_media_file(&video_dir).ok_or_else(|| {
            AppError::NotFound(format!("No video files found for {}", video_id))
        })?;
        Ok((video, path))
    }

    /// Resolve `/downloads/{name}`: a file directly in the download root, else
    /// `{stem}/` with an `.mp4` then `.webm` fallback
    pub async fn static_file(&self, name: &str) -> AppResult<PathBuf> {
        if name.is_empty() || name.contains("..") || name.contains('/') || name.contains('\\') {
            return Err(AppError::NotFound(format!("File {} not found", name)));
        }

        let settings = self.settings().await?;
        let root = self.download_dir(&settings);
        let direct = root.join(name);
        if direct.is_file() {
            return Ok(direct);
        }

        let stem = Path::new(name)
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or(name);
        file_utils::find_media_file(&root.join(stem))
            .ok_or_else(|| AppError::NotFound(format!("File {} not found", name)))
    }

    // ---- settings ----

    /// Persisted settings, created with defaults on first read
    pub async fn settings(&self) -> AppResult<UserSettings> {
        if let Some(settings) = self.db.get_settings().await? {
            return Ok(settings);
        }
        let defaults = SettingsUpdate {
            download_directory: self.storage.download_dir.to_string_lossy().into_owned(),
            ..SettingsUpdate::default()
        };
        info!("Creating default user settings");
        self.db.create_or_update_settings(defaults).await
    }

    pub async fn update_settings(&self, update: SettingsUpdate) -> AppResult<UserSettings> {
        update.validate()?;
        let settings = self.db.create_or_update_settings(update).await?;
        self.resize(settings.max_concurrent_downloads.max(1) as usize);
        info!("⚙️ Settings updated");
        Ok(settings)
    }

    // ---- auth ----

    pub async fn auth_status(&self) -> AuthStatus {
        let path = self.cookies_path();
        let modified = std::fs::metadata(&path)
            .ok()
            .filter(|meta| meta.is_file() && meta.len() > 0)
            .and_then(|meta| meta.modified().ok());

        match modified {
            None => AuthStatus {
                authenticated: false,
                message: "No YouTube authentication found. Create a cookies.txt file with your YouTube credentials."
                    .to_string(),
                cookie_age_days: None,
                warning: None,
                setup_instructions: COOKIE_SETUP_INSTRUCTIONS
                    .iter()
                    .map(|s| s.to_string())
                    .collect(),
            },
            Some(modified) => {
                let modified: chrono::DateTime<Utc> = modified.into();
                let age_days = (Utc::now() - modified).num_days().max(0);
                AuthStatus {
                    authenticated: true,
                    message: "YouTube authentication file found".to_string(),
                    cookie_age_days: Some(age_days),
                    warning: (age_days > COOKIE_MAX_AGE_DAYS).then(|| {
                        "Your cookies are more than 30 days old. Consider refreshing them."
                            .to_string()
                    }),
                    setup_instructions: Vec::new(),
                }
            }
        }
    }

    /// Validate and persist an uploaded cookies file
    pub async fn store_cookies(&self, content: &[u8]) -> AppResult<CookieUploadResponse> {
        let mentions_youtube = content
            .windows(b"youtube.com".len())
            .any(|window| window == b"youtube.com");
        if content.len() < 10 || !mentions_youtube {
            return Err(AppError::Validation(
                "Invalid cookie file format. File must contain YouTube cookies.".to_string(),
            ));
        }

        let path = self.cookies_path();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&path, content).await?;
        info!("🍪 Stored {} bytes of cookies at {:?}", content.len(), path);

        Ok(CookieUploadResponse {
            success: true,
            message: "Cookie file uploaded successfully".to_string(),
            file_size: content.len(),
        })
    }

    pub async fn import_browser_cookies(&self, browser: &str) -> AppResult<CookieUploadResponse> {
        let size = self.extractor.export_browser_cookies(browser).await?;
        Ok(CookieUploadResponse {
            success: true,
            message: format!("Imported cookies from {}", browser.trim()),
            file_size: size as usize,
        })
    }

    pub fn has_cookies(&self) -> bool {
        file_utils::non_empty_file(&self.cookies_path())
    }

    // ---- inspection ----

    pub async fn dump(&self) -> AppResult<DatabaseDump> {
        let channels = self.db.get_channels().await?;
        let videos = self
            .db
            .get_videos(VideoFilter {
                limit: MAX_VIDEO_LIMIT,
                ..Default::default()
            })
            .await?;
        let user_settings = self.db.get_settings().await?;
        Ok(DatabaseDump {
            tables: DumpTables {
                channels,
                videos,
                user_settings,
            },
        })
    }
}

fn video_not_found(video_id: &str) -> AppError {
    AppError::NotFound(format!("Video with ID {} not found", video_id))
}
