//! Core data models for the offline YouTube viewer

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// Default number of rows returned by `GET /api/videos`
pub const DEFAULT_VIDEO_LIMIT: i64 = 50;

/// Upper bound for a single video page
pub const MAX_VIDEO_LIMIT: i64 = 1000;

/// Resolution used when a request does not name one
pub const DEFAULT_RESOLUTION: &str = "720p";

/// Resolution labels understood by the download tool wrapper
pub const KNOWN_RESOLUTIONS: [&str; 6] = ["480p", "720p", "1080p", "1440p", "2160p", "best"];

/// Subscribed channel

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Channel {
    pub id: String,

    pub title: String,

    pub thumbnail_url: Option<String>,

    pub description: Option<String>,

    pub last_updated: DateTime<Utc>,
}

/// Channel subscription request.
///
/// When both `title` and `thumbnail_url` are supplied the backend stores the
/// row as-is, otherwise it looks the channel up with the download tool.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ChannelCreate {
    pub id: String,

    #[serde(default)]
    pub title: Option<String>,

    #[serde(default)]
    pub thumbnail_url: Option<String>,

    #[serde(default)]
    pub description: Option<String>,
}

/// Channel metadata reported by the download tool
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChannelInfo {
    pub id: String,
    pub title: String,
    pub description: String,
    pub thumbnail_url: String,
}

impl From<ChannelInfo> for ChannelCreate {
    fn from(info: ChannelInfo) -> Self {
        Self {
            id: info.id,
            title: Some(info.title),
            thumbnail_url: Some(info.thumbnail_url),
            description: Some(info.description),
        }
    }
}

/// Catalogued video

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Video {
    pub id: String,

    pub channel_id: String,

    pub title: String,

    pub description: Option<String>,

    pub published_at: DateTime<Utc>,

    pub thumbnail_url: Option<String>,

    /// Duration in seconds
    pub duration: Option<i64>,

    pub view_count: Option<i64>,

    pub like_count: Option<i64>,

    pub is_downloaded: bool,

    pub downloaded_at: Option<DateTime<Utc>>,

    pub downloaded_resolution: Option<String>,

    /// Persisted completion fraction, 1.0 once downloaded
    pub download_progress: f64,
}

/// Video metadata extracted from the download tool output
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct VideoMetadata {
    pub id: String,
    pub channel_id: Option<String>,
    pub title: String,
    pub description: String,
    pub published_at: DateTime<Utc>,
    pub thumbnail_url: String,
    pub duration: i64,
    pub view_count: i64,
    pub like_count: i64,
}

impl VideoMetadata {
    /// Build a fresh, not yet downloaded catalog row.
    pub fn into_video(self, fallback_channel_id: &str) -> Video {
        let channel_id = self
            .channel_id
            .filter(|id| !id.is_empty())
            .unwrap_or_else(|| fallback_channel_id.to_string());

        Video {
            id: self.id,
            channel_id,
            title: self.title,
            description: Some(self.description),
            published_at: self.published_at,
            thumbnail_url: Some(self.thumbnail_url),
            duration: Some(self.duration),
            view_count: Some(self.view_count),
            like_count: Some(self.like_count),
            is_downloaded: false,
            downloaded_at: None,
            downloaded_resolution: None,
            download_progress: 0.0,
        }
    }
}

/// Database-level video filter
#[derive(Debug, Clone, PartialEq)]
pub struct VideoFilter {
    pub channel_id: Option<String>,
    pub start_date: Option<DateTime<Utc>>,
    pub end_date: Option<DateTime<Utc>>,
    pub is_downloaded: Option<bool>,
    pub limit: i64,
    pub offset: i64,
}

impl Default for VideoFilter {
    fn default() -> Self {
        Self {
            channel_id: None,
            start_date: None,
            end_date: None,
            is_downloaded: None,
            limit: DEFAULT_VIDEO_LIMIT,
            offset: 0,
        }
    }
}

/// Query string accepted by `GET /api/videos`.
///
/// `is_downloaded` stays a string on the wire: `"true"`/`"false"` filter,
/// anything else is ignored.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct VideoQuery {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub channel_id: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub days: Option<i64>,

    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "flexible_datetime::deserialize_option"
    )]
    pub start_date: Option<DateTime<Utc>>,

    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "flexible_datetime::deserialize_option"
    )]
    pub end_date: Option<DateTime<Utc>>,

    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "flexible_datetime::deserialize_option"
    )]
    pub published_after: Option<DateTime<Utc>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_downloaded: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub limit: Option<i64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub offset: Option<i64>,
}

impl VideoQuery {
    pub fn downloaded(mut self, flag: bool) -> Self {
        self.is_downloaded = Some(flag.to_string());
        self
    }

    pub fn channel(mut self, channel_id: impl Into<String>) -> Self {
        self.channel_id = Some(channel_id.into());
        self
    }

    pub fn page(mut self, limit: i64, offset: i64) -> Self {
        self.limit = Some(limit);
        self.offset = Some(offset);
        self
    }

    pub fn published_after(mut self, after: DateTime<Utc>) -> Self {
        self.published_after = Some(after);
        self
    }

    /// Parsed `is_downloaded` flag; unknown spellings mean "no filter".
    pub fn downloaded_flag(&self) -> Option<bool> {
        match self.is_downloaded.as_deref().map(str::to_ascii_lowercase) {
            Some(value) if value == "true" => Some(true),
            Some(value) if value == "false" => Some(false),
            _ => None,
        }
    }

    /// Resolve relative windows (`days`, `published_after`) into a concrete filter.
    pub fn to_filter(&self, now: DateTime<Utc>) -> AppResult<VideoFilter> {
        let mut start_date = self.start_date;
        let mut end_date = self.end_date;

        if let Some(days) = self.days.filter(|days| *days > 0) {
            if start_date.is_none() {
                start_date = Some(window_start(now, days)?);
                end_date = Some(now);
            }
        }

        if start_date.is_none() {
            start_date = self.published_after;
        }

        Ok(VideoFilter {
            channel_id: self.channel_id.clone().filter(|id| !id.is_empty()),
            start_date,
            end_date,
            is_downloaded: self.downloaded_flag(),
            limit: self
                .limit
                .unwrap_or(DEFAULT_VIDEO_LIMIT)
                .clamp(1, MAX_VIDEO_LIMIT),
            offset: self.offset.unwrap_or(0).max(0),
        })
    }
}

/// `now - days`, rejecting windows chrono cannot represent
pub fn days_before(now: DateTime<Utc>, days: i64) -> Option<DateTime<Utc>> {
    Duration::try_days(days).and_then(|window| now.checked_sub_signed(window))
}

fn window_start(now: DateTime<Utc>, days: i64) -> AppResult<DateTime<Utc>> {
    days_before(now, days)
        .ok_or_else(|| AppError::Validation(format!("days is out of range: {}", days)))
}

/// One page of videos plus the unpaginated total
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct VideoPage {
    pub videos: Vec<Video>,
    pub total: i64,
}

/// Body of `POST /api/videos/fetch`
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct FetchVideosRequest {
    #[serde(default)]
    pub channel_id: Option<String>,

    #[serde(default, deserialize_with = "flexible_datetime::deserialize_option")]
    pub start_date: Option<DateTime<Utc>>,

    #[serde(default, deserialize_with = "flexible_datetime::deserialize_option")]
    pub end_date: Option<DateTime<Utc>>,

    #[serde(default)]
    pub days: Option<i64>,

    #[serde(default)]
    pub fetch_all_channels: bool,
}

impl FetchVideosRequest {
    pub fn validate(&self) -> AppResult<()> {
        let missing_channel = self
            .channel_id
            .as_deref()
            .map(str::trim)
            .map_or(true, str::is_empty);
        if !self.fetch_all_channels && missing_channel {
            return Err(AppError::Validation(
                "channel_id is required when fetch_all_channels is false".to_string(),
            ));
        }
        if let Some(days) = self.days {
            if days < 0 {
                return Err(AppError::Validation("days must not be negative".to_string()));
            }
            if days > 0 {
                window_start(Utc::now(), days)?;
            }
        }
        Ok(())
    }

    /// Date window to hand to the extractor; `days` only applies without an explicit start.
    pub fn window(
        &self,
        now: DateTime<Utc>,
    ) -> AppResult<(Option<DateTime<Utc>>, Option<DateTime<Utc>>)> {
        match (self.days.filter(|days| *days > 0), self.start_date) {
            (Some(days), None) => Ok((Some(window_start(now, days)?), Some(now))),
            _ => Ok((self.start_date, self.end_date)),
        }
    }
}

fn default_resolution() -> String {
    DEFAULT_RESOLUTION.to_string()
}

/// Body of `POST /api/videos/download`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DownloadRequest {
    pub video_id: String,

    #[serde(default = "default_resolution")]
    pub resolution: String,
}

/// Body of `POST /api/videos/download-by-url`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DownloadByUrlRequest {
    pub url: String,

    #[serde(default = "default_resolution")]
    pub resolution: String,
}

/// Response of both download endpoints once the file is on disk
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DownloadResponse {
    pub message: String,
    pub video_id: String,
}

/// Response of `GET /api/videos/{id}/progress`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DownloadProgress {
    pub video_id: String,
    pub progress: f64,
}

/// Generic `{ "message": ... }` response
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MessageResponse {
    pub message: String,
}

/// Persisted user settings record

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct UserSettings {
    pub id: i64,

    pub download_directory: String,

    pub default_resolution: String,

    pub max_concurrent_downloads: i64,

    /// Hours between automatic channel refreshes, 0 disables
    pub auto_update_interval: i64,

    pub dark_mode: bool,

    pub last_updated: DateTime<Utc>,
}

impl UserSettings {
    pub fn to_update(&self) -> SettingsUpdate {
        SettingsUpdate {
            download_directory: self.download_directory.clone(),
            default_resolution: self.default_resolution.clone(),
            max_concurrent_downloads: self.max_concurrent_downloads,
            auto_update_interval: self.auto_update_interval,
            dark_mode: self.dark_mode,
        }
    }

    /// Copy of this record with every user-editable field taken from `update`.
    pub fn with_update(&self, update: &SettingsUpdate) -> Self {
        Self {
            id: self.id,
            download_directory: update.download_directory.clone(),
            default_resolution: update.default_resolution.clone(),
            max_concurrent_downloads: update.max_concurrent_downloads,
            auto_update_interval: update.auto_update_interval,
            dark_mode: update.dark_mode,
            last_updated: self.last_updated,
        }
    }

    pub fn matches(&self, update: &SettingsUpdate) -> bool {
        self.to_update() == *update
    }
}

/// Body of `PUT /api/settings`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SettingsUpdate {
    pub download_directory: String,
    pub default_resolution: String,
    pub max_concurrent_downloads: i64,
    pub auto_update_interval: i64,
    pub dark_mode: bool,
}

impl Default for SettingsUpdate {
    fn default() -> Self {
        Self {
            download_directory: "downloads".to_string(),
            default_resolution: DEFAULT_RESOLUTION.to_string(),
            max_concurrent_downloads: 2,
            auto_update_interval: 24,
            dark_mode: false,
        }
    }
}

impl SettingsUpdate {
    pub fn validate(&self) -> AppResult<()> {
        if self.download_directory.trim().is_empty() {
            return Err(AppError::Validation(
                "download_directory must not be empty".to_string(),
            ));
        }
        if self.default_resolution.trim().is_empty() {
            return Err(AppError::Validation(
                "default_resolution must not be empty".to_string(),
            ));
        }
        if !(1..=20).contains(&self.max_concurrent_downloads) {
            return Err(AppError::Validation(
                "max_concurrent_downloads must be between 1 and 20".to_string(),
            ));
        }
        if !(0..=24 * 30).contains(&self.auto_update_interval) {
            return Err(AppError::Validation(
                "auto_update_interval must be between 0 and 720 hours".to_string(),
            ));
        }
        Ok(())
    }
}

/// Response of `GET /api/auth/status`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AuthStatus {
    pub authenticated: bool,

    pub message: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cookie_age_days: Option<i64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub warning: Option<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub setup_instructions: Vec<String>,
}

/// Response of `POST /api/auth/cookies`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CookieUploadResponse {
    pub success: bool,
    pub message: String,
    pub file_size: usize,
}

/// Body of `POST /api/auth/cookies/browser`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BrowserCookiesRequest {
    pub browser: String,
}

/// Query of `GET /api/youtube/subscriptions`
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct SubscriptionOptions {
    pub skip_auth_check: bool,
    pub fast: bool,
}

impl Default for SubscriptionOptions {
    fn default() -> Self {
        Self {
            skip_auth_check: false,
            fast: true,
        }
    }
}

/// Response of `GET /api/db`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DatabaseDump {
    pub tables: DumpTables,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DumpTables {
    pub channels: Vec<Channel>,
    pub videos: Vec<Video>,
    pub user_settings: Option<UserSettings>,
}

/// Lenient timestamp parsing for query strings and request bodies.
///
/// Accepts RFC 3339, naive `YYYY-MM-DDTHH:MM:SS[.f]` (taken as UTC) and bare dates.
pub mod flexible_datetime {
    use chrono::{DateTime, NaiveDate, NaiveDateTime, TimeZone, Utc};
    use serde::{Deserialize, Deserializer};

    pub fn parse(value: &str) -> Option<DateTime<Utc>> {
        let value = value.trim();
        if value.is_empty() {
            return None;
        }

        if let Ok(parsed) = DateTime::parse_from_rfc3339(value) {
            return Some(parsed.with_timezone(&Utc));
        }

        // A literal '+' in an unencoded query string arrives as a space.
        if value.contains('T') && value.contains(' ') {
            let repaired = value.replacen(' ', "+", 1);
            if let Ok(parsed) = DateTime::parse_from_rfc3339(&repaired) {
                return Some(parsed.with_timezone(&Utc));
            }
        }

        for format in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"] {
            if let Ok(naive) = NaiveDateTime::parse_from_str(value, format) {
                return Some(Utc.from_utc_datetime(&naive));
            }
        }

        NaiveDate::parse_from_str(value, "%Y-%m-%d")
            .ok()
            .and_then(|date| date.and_hms_opt(0, 0, 0))
            .map(|naive| Utc.from_utc_datetime(&naive))
    }

    pub fn deserialize_option<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw: Option<String> = Option::deserialize(deserializer)?;
        match raw {
            None => Ok(None),
            Some(text) if text.trim().is_empty() => Ok(None),
            Some(text) => parse(&text)
                .map(Some)
                .ok_or_else(|| serde::de::Error::custom(format!("invalid datetime: {text}"))),
        }
    }
}

/// Application error types

#[derive(Debug, thiserror::Error)]

pub enum AppError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Validation(String),

    #[error("Authentication required: {0}")]
    AuthRequired(String),

    #[error("The requested format ({0}) is not available. Try a different resolution.")]
    FormatUnavailable(String),

    #[error("YouTube returned an HTML page instead of a video: {0}")]
    HtmlResponse(String),

    #[error("Download error: {0}")]
    Download(String),

    #[error("External tool failed: {tool} (code={code:?}) {stderr}")]
    Tool {
        tool: String,
        code: Option<i32>,
        stderr: String,
    },

    #[error("External tool is missing: {0}")]
    ToolMissing(String),

    #[error("System error: {0}")]
    System(String),
}

/// Result type alias for application operations

pub type AppResult<T> = Result<T, AppError>;
