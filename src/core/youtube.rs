//! yt-dlp integration
//!
//! [`Extractor`] is the seam between the download manager and the external
//! tool. [`YtDlp`] shells out to the `yt-dlp` binary; the parsing helpers in
//! this module are kept free of process handling so they can be tested alone.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use regex::Regex;
use serde_json::Value;
use std::collections::{HashSet, VecDeque};
use std::path::{Path, PathBuf};
use std::process::{Output, Stdio};
use std::sync::{Arc, OnceLock};
use tokio::io::{AsyncBufReadExt, AsyncReadExt, BufReader};
use tokio::process::Command;
use tracing::{debug, error, info, warn};

use crate::core::config::ToolsConfig;
use crate::core::models::{AppError, AppResult, ChannelInfo, SubscriptionOptions, VideoMetadata};
use crate::utils::file_utils;

/// Receives download progress as a fraction in `[0, 1]`
pub type ProgressSink = Arc<dyn Fn(f64) + Send + Sync>;

/// Browsers understood by `--cookies-from-browser`
pub const SUPPORTED_BROWSERS: [&str; 9] = [
    "brave", "chrome", "chromium", "edge", "firefox", "opera", "safari", "vivaldi", "whale",
];

const SUBSCRIPTION_SOURCES: [&str; 3] = [
    "https://www.youtube.com/feed/channels",
    ":ytsubs",
    "https://www.youtube.com/feed/subscriptions",
];

const OUTPUT_TAIL_LINES: usize = 200;

/// One download request handed to the extractor
#[derive(Debug, Clone, PartialEq)]
pub struct DownloadJob {
    pub video_id: String,
    pub resolution: String,
    /// Root download directory; files land in `{download_dir}/{video_id}/`
    pub download_dir: PathBuf,
}

impl DownloadJob {
    pub fn video_dir(&self) -> PathBuf {
        self.download_dir.join(&self.video_id)
    }
}

/// Operations the backend needs from the external download tool
#[async_trait]
pub trait Extractor: Send + Sync {
    /// Recent uploads of a channel, optionally limited to a date window
    async fn channel_videos(
        &self,
        channel_id: &str,
        start: Option<DateTime<Utc>>,
        end: Option<DateTime<Utc>>,
    ) -> AppResult<Vec<VideoMetadata>>;

    async fn channel_info(&self, channel_id: &str) -> AppResult<Option<ChannelInfo>>;

    async fn video_info(&self, video_id: &str) -> AppResult<Option<VideoMetadata>>;

    /// Channels the authenticated account is subscribed to
    async fn subscriptions(&self, options: SubscriptionOptions) -> AppResult<Vec<ChannelInfo>>;

    /// Download one video, reporting progress through `progress`; returns the playable file
    async fn download(&self, job: &DownloadJob, progress: ProgressSink) -> AppResult<PathBuf>;

    /// Export cookies from a local browser profile into the cookies file; returns its size
    async fn export_browser_cookies(&self, browser: &str) -> AppResult<u64>;
}

/// Extractor backed by the `yt-dlp` command line tool
#[derive(Debug, Clone)]
pub struct YtDlp {
    binary: String,
    ffmpeg: String,
    cookies_path: PathBuf,
    channel_fetch_limit: u32,
}

impl YtDlp {
    pub fn new(tools: &ToolsConfig, cookies_path: PathBuf) -> Self {
        Self {
            binary: tools.yt_dlp_path.clone(),
            ffmpeg: tools.ffmpeg_path.clone(),
            cookies_path,
            channel_fetch_limit: tools.channel_fetch_limit,
        }
    }

    pub fn cookies_path(&self) -> &Path {
        &self.cookies_path
    }

    fn cookie_args(&self) -> Vec<String> {
        if file_utils::non_empty_file(&self.cookies_path) {
            vec![
                "--cookies".to_string(),
                self.cookies_path.to_string_lossy().into_owned(),
            ]
        } else {
            Vec::new()
        }
    }

    fn command(&self, args: &[String]) -> Command {
        let mut command = Command::new(&self.binary);
        command
            .args(args)
            .stdin(Stdio::null())
            .kill_on_drop(true);
        command
    }

    /// Run yt-dlp to completion and capture its output
    async fn run(&self, args: Vec<String>) -> AppResult<Output> {
        debug!("Running {} {}", self.binary, args.join(" "));
        self.command(&args)
            .output()
            .await
            .map_err(|e| spawn_error(&self.binary, e))
    }

    async fn run_print_subscriptions(&self, source: &str) -> AppResult<Option<Vec<ChannelInfo>>> {
        let mut args = vec![
            "--flat-playlist".to_string(),
            "--print".to_string(),
            "%(uploader)s %(channel_id)s %(uploader_id)s".to_string(),
        ];
        args.extend(self.cookie_args());
        args.push("--no-warnings".to_string());
        args.push(source.to_string());

        let output = self.run(args).await?;
        if !output.status.success() {
            warn!(
                "Subscription listing from {} failed: {}",
                source,
                tail(&String::from_utf8_lossy(&output.stderr), 3)
            );
            return Ok(None);
        }
        Ok(Some(parse_subscription_lines(&String::from_utf8_lossy(
            &output.stdout,
        ))))
    }

    async fn merge_streams(&self, video: &Path, audio: &Path) -> AppResult<Option<PathBuf>> {
        let stem = video
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "video".to_string());
        let target = video.with_file_name(format!("{}_merged.mp4", stem));

        let output = Command::new(&self.ffmpeg)
            .arg("-y")
            .arg("-i")
            .arg(video)
            .arg("-i")
            .arg(audio)
            .args(["-c:v", "copy", "-c:a", "aac"])
            .arg(&target)
            .stdin(Stdio::null())
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| spawn_error(&self.ffmpeg, e))?;

        if !output.status.success() {
            error!(
                "Failed to merge {:?} and {:?}: {}",
                video,
                audio,
                tail(&String::from_utf8_lossy(&output.stderr), 5)
            );
            return Ok(None);
        }

        for source in [video, audio] {
            if let Err(e) = tokio::fs::remove_file(source).await {
                warn!("Failed to remove merged source {:?}: {}", source, e);
            }
        }
        Ok(Some(target))
    }

    /// Post-process a finished download directory
    async fn finalize(&self, video_dir: &Path) -> AppResult<PathBuf> {
        let files = file_utils::list_files(video_dir)?;

        let html: Vec<&PathBuf> = files
            .iter()
            .filter(|p| file_utils::has_extension(p, &["html", "htm"]))
            .collect();
        for page in &html {
            if file_utils::looks_like_html(page) {
                let _ = std::fs::remove_file(page);
                return Err(AppError::HtmlResponse(
                    "This usually means authentication is required or there is an issue with the video."
                        .to_string(),
                ));
            }
        }

        let videos: Vec<&PathBuf> = files
            .iter()
            .filter(|p| file_utils::has_extension(p, &["mp4", "webm", "mkv"]))
            .collect();
        let audios: Vec<&PathBuf> = files
            .iter()
            .filter(|p| file_utils::has_extension(p, &["m4a", "mp3"]))
            .collect();

        if let (Some(video), Some(audio)) = (videos.first(), audios.first()) {
            info!("Found separate audio and video streams in {:?}, merging", video_dir);
            if let Some(merged) = self.merge_streams(video, audio).await? {
                return Ok(merged);
            }
        }

        match file_utils::find_media_file(video_dir) {
            Some(path) => Ok(path),
            None if !audios.is_empty() => Ok(audios[0].clone()),
            None => Err(AppError::Download(
                "Download completed, but no media files were found.".to_string(),
            )),
        }
    }
}

#[async_trait]
impl Extractor for YtDlp {
    async fn channel_videos(
        &self,
        channel_id: &str,
        start: Option<DateTime<Utc>>,
        end: Option<DateTime<Utc>>,
    ) -> AppResult<Vec<VideoMetadata>> {
        let url = format!("https://www.youtube.com/channel/{}/videos", channel_id);
        let mut args: Vec<String> = [
            "--dump-json",
            "--no-download",
            "--ignore-no-formats-error",
            "--no-warnings",
        ]
        .iter()
        .map(|s| s.to_string())
        .collect();
        if let Some(start) = start {
            args.push("--dateafter".to_string());
            args.push(start.format("%Y%m%d").to_string());
        }
        if let Some(end) = end {
            args.push("--datebefore".to_string());
            args.push(end.format("%Y%m%d").to_string());
        }
        args.push("--break-on-reject".to_string());
        args.push("--playlist-end".to_string());
        args.push(self.channel_fetch_limit.to_string());
        args.extend(self.cookie_args());
        args.push(url.clone());

        info!("📺 Fetching videos from {}", url);
        let output = self.run(args).await?;
        let stdout = String::from_utf8_lossy(&output.stdout);
        let videos: Vec<VideoMetadata> = stdout
            .lines()
            .filter_map(parse_json_line)
            .filter_map(|value| parse_video_entry(&value, Some(channel_id)))
            .collect();

        // --break-on-reject exits non-zero once the date window is passed
        if !output.status.success() && videos.is_empty() {
            warn!(
                "yt-dlp returned no videos for channel {} (code={:?}): {}",
                channel_id,
                output.status.code(),
                tail(&String::from_utf8_lossy(&output.stderr), 3)
            );
        }
        info!("Found {} videos from channel {}", videos.len(), channel_id);
        Ok(videos)
    }

    async fn channel_info(&self, channel_id: &str) -> AppResult<Option<ChannelInfo>> {
        let url = channel_url(channel_id);
        let mut args: Vec<String> = [
            "--dump-single-json",
            "--flat-playlist",
            "--playlist-end",
            "1",
            "--skip-download",
            "--ignore-no-formats-error",
            "--no-warnings",
            "--socket-timeout",
            "10",
        ]
        .iter()
        .map(|s| s.to_string())
        .collect();
        args.extend(self.cookie_args());
        args.push(url.clone());

        info!("Fetching channel info from: {}", url);
        let output = self.run(args).await?;
        let stdout = String::from_utf8_lossy(&output.stdout);
        let info = stdout
            .lines()
            .find_map(parse_json_line)
            .map(|value| parse_channel_info(&value, channel_id));

        if info.is_none() {
            warn!(
                "No channel information for {} (code={:?}): {}",
                channel_id,
                output.status.code(),
                tail(&String::from_utf8_lossy(&output.stderr), 3)
            );
        }
        Ok(info)
    }

    async fn video_info(&self, video_id: &str) -> AppResult<Option<VideoMetadata>> {
        let url = format!("https://www.youtube.com/watch?v={}", video_id);
        let mut args: Vec<String> = [
            "--dump-json",
            "--no-download",
            "--no-playlist",
            "--ignore-no-formats-error",
            "--no-warnings",
        ]
        .iter()
        .map(|s| s.to_string())
        .collect();
        args.extend(self.cookie_args());
        args.push(url.clone());

        info!("Fetching video info for: {}", url);
        let output = self.run(args).await?;
        let stdout = String::from_utf8_lossy(&output.stdout);
        let metadata = stdout
            .lines()
            .find_map(parse_json_line)
            .and_then(|value| parse_video_entry(&value, None))
            .map(|mut metadata| {
                metadata.id = video_id.to_string();
                metadata
            });

        if metadata.is_none() {
            warn!(
                "No information returned for video {}: {}",
                video_id,
                tail(&String::from_utf8_lossy(&output.stderr), 3)
            );
        }
        Ok(metadata)
    }

    async fn subscriptions(&self, options: SubscriptionOptions) -> AppResult<Vec<ChannelInfo>> {
        if options.fast {
            for source in SUBSCRIPTION_SOURCES {
                if let Some(channels) = self.run_print_subscriptions(source).await? {
                    if !channels.is_empty() {
                        info!("Fast extraction found {} subscribed channels", channels.len());
                        return Ok(channels);
                    }
                    break;
                }
            }
            info!("Fast subscription extraction found nothing, using JSON fallback");
        }

        let mut args = vec!["--flat-playlist".to_string()];
        if options.skip_auth_check {
            args.push("--extractor-args".to_string());
            args.push("youtubetab:skip=authcheck".to_string());
        }
        args.push("--dump-json".to_string());
        args.extend(self.cookie_args());
        args.push("--no-warnings".to_string());
        args.push(":ytsubs".to_string());

        let output = self.run(args).await?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            error!("Subscription extraction failed: {}", tail(&stderr, 3));
            if stderr.contains("Sign in") || stderr.contains("login") {
                return Err(AppError::AuthRequired(
                    "YouTube rejected the cookies file; export fresh cookies and try again."
                        .to_string(),
                ));
            }
            return Ok(Vec::new());
        }

        let channels = parse_subscription_json(&String::from_utf8_lossy(&output.stdout));
        if channels.is_empty() {
            warn!("All subscription extraction methods returned nothing");
        }
        Ok(channels)
    }

    async fn download(&self, job: &DownloadJob, progress: ProgressSink) -> AppResult<PathBuf> {
        let video_dir = job.video_dir();
        tokio::fs::create_dir_all(&video_dir).await?;

        let template = video_dir.join("%(title)s.%(ext)s");
        let mut args = vec![
            format!("https://www.youtube.com/watch?v={}", job.video_id),
            "--format".to_string(),
            format_for_resolution(&job.resolution),
            "--output".to_string(),
            template.to_string_lossy().into_owned(),
            "--newline".to_string(),
            "--no-continue".to_string(),
            "--force-overwrites".to_string(),
            "--no-playlist".to_string(),
            "--merge-output-format".to_string(),
            "mp4".to_string(),
            "--geo-bypass".to_string(),
        ];
        match locate_tool(&self.ffmpeg) {
            Some(ffmpeg) => {
                args.push("--ffmpeg-location".to_string());
                args.push(ffmpeg.to_string_lossy().into_owned());
            }
            None => warn!("ffmpeg not found, stream merging may fail"),
        }
        args.extend(self.cookie_args());

        info!(
            "🎬 Starting download for video {} at resolution {}",
            job.video_id, job.resolution
        );

        let mut child = self
            .command(&args)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| spawn_error(&self.binary, e))?;

        let stderr = child.stderr.take();
        let stderr_task = tokio::spawn(async move {
            let mut buffer = String::new();
            if let Some(mut stderr) = stderr {
                let mut bytes = Vec::new();
                if stderr.read_to_end(&mut bytes).await.is_ok() {
                    buffer = String::from_utf8_lossy(&bytes).into_owned();
                }
            }
            buffer
        });

        let mut recent: VecDeque<String> = VecDeque::with_capacity(OUTPUT_TAIL_LINES);
        if let Some(stdout) = child.stdout.take() {
            let mut segments = BufReader::new(stdout).split(b'\n');
            while let Some(segment) = segments.next_segment().await? {
                let line = String::from_utf8_lossy(&segment).trim_end().to_string();
                if let Some(fraction) = parse_progress_line(&line) {
                    progress(fraction);
                }
                if recent.len() == OUTPUT_TAIL_LINES {
                    recent.pop_front();
                }
                recent.push_back(line);
            }
        }

        let status = child.wait().await?;
        let stderr = stderr_task.await.unwrap_or_default();

        if !status.success() {
            let stdout: Vec<String> = recent.into_iter().collect();
            let combined = format!("{}\n{}", stdout.join("\n"), stderr);
            error!(
                "yt-dlp failed for {} (code={:?}): {}",
                job.video_id,
                status.code(),
                tail(&combined, 5)
            );
            return Err(classify_failure(status.code(), &combined, &job.resolution));
        }

        let media = self.finalize(&video_dir).await?;
        info!("✅ Downloaded video {} to {:?}", job.video_id, media);
        Ok(media)
    }

    async fn export_browser_cookies(&self, browser: &str) -> AppResult<u64> {
        let browser = browser.trim().to_ascii_lowercase();
        if !SUPPORTED_BROWSERS.contains(&browser.as_str()) {
            return Err(AppError::Validation(format!(
                "Unsupported browser '{}'. Supported: {}",
                browser,
                SUPPORTED_BROWSERS.join(", ")
            )));
        }

        if let Some(parent) = self
            .cookies_path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
        {
            tokio::fs::create_dir_all(parent).await?;
        }

        let args = vec![
            "--cookies-from-browser".to_string(),
            browser.clone(),
            "--cookies".to_string(),
            self.cookies_path.to_string_lossy().into_owned(),
            "--skip-download".to_string(),
            "--no-warnings".to_string(),
            "--no-playlist".to_string(),
            "https://www.youtube.com/watch?v=jNQXAC9IVRw".to_string(),
        ];
        let output = self.run(args).await?;
        if !output.status.success() {
            warn!(
                "yt-dlp exited with {:?} while exporting {} cookies: {}",
                output.status.code(),
                browser,
                tail(&String::from_utf8_lossy(&output.stderr), 3)
            );
        }

        let size = tokio::fs::metadata(&self.cookies_path)
            .await
            .map(|m| m.len())
            .unwrap_or(0);
        if size == 0 {
            return Err(AppError::AuthRequired(format!(
                "Could not read YouTube cookies from {}. Log in to YouTube in that browser and retry.",
                browser
            )));
        }
        info!("🍪 Exported {} bytes of cookies from {}", size, browser);
        Ok(size)
    }
}

fn spawn_error(tool: &str, error: std::io::Error) -> AppError {
    if error.kind() == std::io::ErrorKind::NotFound {
        AppError::ToolMissing(tool.to_string())
    } else {
        AppError::Io(error)
    }
}

/// Resolve a tool name or path to an executable on disk
pub fn locate_tool(name: &str) -> Option<PathBuf> {
    which::which(name).ok()
}

/// Map a resolution label to a yt-dlp `--format` selector
pub fn format_for_resolution(resolution: &str) -> String {
    match resolution {
        "480p" | "720p" | "1080p" | "1440p" | "2160p" => {
            let height = resolution.trim_end_matches('p');
            format!(
                "bestvideo[height<={h}]+bestaudio/best[height<={h}]",
                h = height
            )
        }
        "best" => "bestvideo+bestaudio/best".to_string(),
        other => other.to_string(),
    }
}

/// Channel page URL for a handle, a `UC…` id or a legacy custom name
pub fn channel_url(channel_id: &str) -> String {
    if channel_id.starts_with('@') {
        format!("https://www.youtube.com/{}", channel_id)
    } else if channel_id.starts_with("UC") {
        format!("https://www.youtube.com/channel/{}", channel_id)
    } else {
        format!("https://www.youtube.com/c/{}", channel_id)
    }
}

pub fn video_thumbnail_url(video_id: &str) -> String {
    format!("https://i.ytimg.com/vi/{}/maxresdefault.jpg", video_id)
}

fn fallback_channel_thumbnail(channel_id: &str) -> String {
    format!("https://yt3.googleusercontent.com/channel/{}", channel_id)
}

fn parse_json_line(line: &str) -> Option<Value> {
    let line = line.trim();
    if line.is_empty() {
        return None;
    }
    match serde_json::from_str(line) {
        Ok(value) => Some(value),
        Err(_) => {
            let preview: String = line.chars().take(100).collect();
            warn!("Failed to parse JSON line: {}...", preview);
            None
        }
    }
}

fn str_field<'a>(value: &'a Value, key: &str) -> Option<&'a str> {
    value.get(key).and_then(Value::as_str).filter(|s| !s.is_empty())
}

fn int_field(value: &Value, key: &str) -> i64 {
    value
        .get(key)
        .and_then(|v| v.as_i64().or_else(|| v.as_f64().map(|f| f as i64)))
        .unwrap_or(0)
}

/// Publish time from `timestamp`, then `upload_date` (YYYYMMDD), else now
pub fn published_at_from(value: &Value) -> DateTime<Utc> {
    let from_timestamp = value
        .get("timestamp")
        .and_then(|v| v.as_i64().or_else(|| v.as_f64().map(|f| f as i64)))
        .and_then(|secs| Utc.timestamp_opt(secs, 0).single());
    if let Some(published) = from_timestamp {
        return published;
    }

    str_field(value, "upload_date")
        .filter(|date| date.len() == 8)
        .and_then(|date| NaiveDate::parse_from_str(date, "%Y%m%d").ok())
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|naive| Utc.from_utc_datetime(&naive))
        .unwrap_or_else(Utc::now)
}

/// Convert one `--dump-json` object into video metadata
pub fn parse_video_entry(value: &Value, channel_id: Option<&str>) -> Option<VideoMetadata> {
    let id = str_field(value, "id")?.to_string();
    let channel = str_field(value, "channel_id")
        .or_else(|| str_field(value, "uploader_id"))
        .or(channel_id)
        .map(str::to_string);

    Some(VideoMetadata {
        thumbnail_url: video_thumbnail_url(&id),
        channel_id: channel,
        title: str_field(value, "title")
            .unwrap_or("Untitled Video")
            .to_string(),
        description: str_field(value, "description").unwrap_or_default().to_string(),
        published_at: published_at_from(value),
        duration: int_field(value, "duration"),
        view_count: int_field(value, "view_count"),
        like_count: int_field(value, "like_count"),
        id,
    })
}

fn largest_thumbnail(value: &Value) -> Option<String> {
    value
        .get("thumbnails")
        .and_then(Value::as_array)?
        .iter()
        .filter_map(|thumb| {
            let url = str_field(thumb, "url")?;
            let area = int_field(thumb, "width") * int_field(thumb, "height");
            Some((area, url))
        })
        .max_by_key(|(area, _)| *area)
        .map(|(_, url)| url.to_string())
}

/// Best available channel avatar URL
pub fn channel_thumbnail(value: &Value, channel_id: &str) -> String {
    if let Some(thumbnail) = str_field(value, "thumbnail") {
        return thumbnail.to_string();
    }
    if let Some(thumbnail) = largest_thumbnail(value) {
        return thumbnail;
    }
    for key in ["uploader_id", "channel_id"] {
        if let Some(id) = str_field(value, key).filter(|id| id.starts_with("UC")) {
            return fallback_channel_thumbnail(id);
        }
    }
    if channel_id.starts_with("UC") {
        return fallback_channel_thumbnail(channel_id);
    }
    String::new()
}

pub fn parse_channel_info(value: &Value, requested_id: &str) -> ChannelInfo {
    let id = str_field(value, "channel_id")
        .unwrap_or(requested_id)
        .to_string();
    ChannelInfo {
        thumbnail_url: channel_thumbnail(value, &id),
        title: str_field(value, "channel")
            .or_else(|| str_field(value, "title"))
            .unwrap_or("Unknown Channel")
            .to_string(),
        description: str_field(value, "description").unwrap_or_default().to_string(),
        id,
    }
}

fn progress_regex() -> &'static Regex {
    static PROGRESS_RE: OnceLock<Regex> = OnceLock::new();
    PROGRESS_RE
        .get_or_init(|| Regex::new(r"\[download\]\s+(\d+(?:\.\d+)?)%").expect("valid regex"))
}

/// Fraction from a `[download]  42.0% of ...` line
pub fn parse_progress_line(line: &str) -> Option<f64> {
    let captures = progress_regex().captures(line)?;
    let percent: f64 = captures.get(1)?.as_str().parse().ok()?;
    Some((percent / 100.0).clamp(0.0, 1.0))
}

/// Turn a failed yt-dlp run into a domain error
pub fn classify_failure(code: Option<i32>, output: &str, resolution: &str) -> AppError {
    let lowered = output.to_ascii_lowercase();
    if output.contains("Sign in to confirm") {
        AppError::AuthRequired(
            "YouTube requires authentication to download this video. Please set up a cookies.txt file with YouTube login credentials."
                .to_string(),
        )
    } else if lowered.contains("requested format not available")
        || lowered.contains("requested format is not available")
    {
        AppError::FormatUnavailable(resolution.to_string())
    } else if lowered.contains("<!doctype html") || lowered.contains("<html") {
        AppError::HtmlResponse(
            "This usually happens when authentication is required or there is an issue with the video."
                .to_string(),
        )
    } else {
        AppError::Tool {
            tool: "yt-dlp".to_string(),
            code,
            stderr: tail(output, 3),
        }
    }
}

fn is_channel_id(token: &str) -> bool {
    token.starts_with("UC") && token.len() >= 20
}

/// Parse `--print "%(uploader)s %(channel_id)s %(uploader_id)s"` output
pub fn parse_subscription_lines(stdout: &str) -> Vec<ChannelInfo> {
    let mut seen = HashSet::new();
    let mut channels = Vec::new();

    for line in stdout.lines() {
        let parts: Vec<&str> = line.split_whitespace().collect();
        if parts.len() < 2 {
            continue;
        }
        let Some(id) = parts.iter().copied().find(|p| is_channel_id(p)) else {
            continue;
        };
        if !seen.insert(id.to_string()) {
            continue;
        }
        let title_parts: Vec<&str> = parts
            .iter()
            .copied()
            .filter(|p| !is_channel_id(p) && !p.starts_with('@') && *p != "NA")
            .collect();
        let title = if title_parts.is_empty() {
            "Unknown Channel".to_string()
        } else {
            title_parts.join(" ")
        };
        channels.push(ChannelInfo {
            id: id.to_string(),
            title,
            description: String::new(),
            thumbnail_url: fallback_channel_thumbnail(id),
        });
    }
    channels
}

/// Parse `--dump-json` subscription entries
pub fn parse_subscription_json(stdout: &str) -> Vec<ChannelInfo> {
    let mut seen = HashSet::new();
    stdout
        .lines()
        .filter_map(parse_json_line)
        .filter_map(|value| {
            let id = str_field(&value, "channel_id")
                .or_else(|| str_field(&value, "uploader_id"))
                .filter(|id| id.starts_with("UC"))?
                .to_string();
            if !seen.insert(id.clone()) {
                return None;
            }
            Some(ChannelInfo {
                title: str_field(&value, "channel")
                    .or_else(|| str_field(&value, "uploader"))
                    .unwrap_or("Unknown Channel")
                    .to_string(),
                description: String::new(),
                thumbnail_url: str_field(&value, "thumbnail")
                    .map(str::to_string)
                    .unwrap_or_else(|| fallback_channel_thumbnail(&id)),
                id,
            })
        })
        .collect()
}

/// Last `n` non-empty lines of tool output
fn tail(output: &str, n: usize) -> String {
    let lines: Vec<&str> = output
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .collect();
    let start = lines.len().saturating_sub(n);
    lines[start..].join(" | ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_format_for_resolution() {
        assert_eq!(
            format_for_resolution("720p"),
            "bestvideo[height<=720]+bestaudio/best[height<=720]"
        );
        assert_eq!(
            format_for_resolution("2160p"),
            "bestvideo[height<=2160]+bestaudio/best[height<=2160]"
        );
        assert_eq!(format_for_resolution("best"), "bestvideo+bestaudio/best");
        assert_eq!(format_for_resolution("worstaudio"), "worstaudio");
    }

    #[test]
    fn test_channel_url_shapes() {
        assert_eq!(channel_url("@veritasium"), "https://www.youtube.com/@veritasium");
        assert_eq!(
            channel_url("UCHnyfMqiRRG1u-2MsSQLbXA"),
            "https://www.youtube.com/channel/UCHnyfMqiRRG1u-2MsSQLbXA"
        );
        assert_eq!(channel_url("legacyname"), "https://www.youtube.com/c/legacyname");
    }

    #[test]
    fn test_progress_line_parsing() {
        assert_eq!(
            parse_progress_line("[download]  42.0% of ~ 12.00MiB at 1.00MiB/s ETA 00:10"),
            Some(0.42)
        );
        assert_eq!(parse_progress_line("[download] 100% of 5.00MiB in 00:03"), Some(1.0));
        assert_eq!(parse_progress_line("[download] Destination: x.mp4"), None);
        assert_eq!(parse_progress_line("[Merger] Merging formats"), None);
    }

    #[test]
    fn test_published_at_prefers_timestamp() {
        let value = json!({ "timestamp": 1_700_000_000, "upload_date": "20200101" });
        assert_eq!(published_at_from(&value).timestamp(), 1_700_000_000);

        let value = json!({ "upload_date": "20240215" });
        assert_eq!(
            published_at_from(&value),
            Utc.with_ymd_and_hms(2024, 2, 15, 0, 0, 0).unwrap()
        );

        let before = Utc::now();
        let value = json!({ "upload_date": "garbage" });
        assert!(published_at_from(&value) >= before);
    }

    #[test]
    fn test_parse_video_entry() {
        let value = json!({
            "id": "abc123",
            "title": "A video",
            "description": "desc",
            "duration": 61.5,
            "view_count": 10,
            "upload_date": "20240101",
            "uploader_id": "UCxyz"
        });
        let video = parse_video_entry(&value, Some("UCfallback")).unwrap();
        assert_eq!(video.id, "abc123");
        assert_eq!(video.channel_id.as_deref(), Some("UCxyz"));
        assert_eq!(video.duration, 61);
        assert_eq!(video.like_count, 0);
        assert_eq!(
            video.thumbnail_url,
            "https://i.ytimg.com/vi/abc123/maxresdefault.jpg"
        );

        assert!(parse_video_entry(&json!({ "title": "no id" }), None).is_none());
    }

    #[test]
    fn test_channel_thumbnail_fallbacks() {
        let direct = json!({ "thumbnail": "https://img/direct.jpg" });
        assert_eq!(channel_thumbnail(&direct, "UCa"), "https://img/direct.jpg");

        let listed = json!({ "thumbnails": [
            { "url": "https://img/small.jpg", "width": 88, "height": 88 },
            { "url": "https://img/large.jpg", "width": 900, "height": 900 },
            { "url": "https://img/banner.jpg" }
        ]});
        assert_eq!(channel_thumbnail(&listed, "UCa"), "https://img/large.jpg");

        let bare = json!({});
        assert_eq!(
            channel_thumbnail(&bare, "UCabc"),
            "https://yt3.googleusercontent.com/channel/UCabc"
        );
        assert_eq!(channel_thumbnail(&bare, "@handle"), "");
    }

    #[test]
    fn test_parse_channel_info_resolves_handle() {
        let value = json!({
            "channel_id": "UCresolved0000000000000",
            "channel": "Resolved",
            "title": "Resolved - Videos",
            "description": "about"
        });
        let info = parse_channel_info(&value, "@resolved");
        assert_eq!(info.id, "UCresolved0000000000000");
        assert_eq!(info.title, "Resolved");
        assert_eq!(
            info.thumbnail_url,
            "https://yt3.googleusercontent.com/channel/UCresolved0000000000000"
        );
    }

    #[test]
    fn test_classify_failure() {
        assert!(matches!(
            classify_failure(Some(1), "ERROR: Sign in to confirm you're not a bot", "720p"),
            AppError::AuthRequired(_)
        ));
        match classify_failure(Some(1), "ERROR: Requested format is not available", "1440p") {
            AppError::FormatUnavailable(resolution) => assert_eq!(resolution, "1440p"),
            other => panic!("unexpected error: {other:?}"),
        }
        match classify_failure(Some(2), "line one\n\nERROR: boom", "720p") {
            AppError::Tool { code, stderr, .. } => {
                assert_eq!(code, Some(2));
                assert!(stderr.contains("ERROR: boom"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_parse_subscription_lines() {
        let stdout = "Some Channel UCaaaaaaaaaaaaaaaaaaaaaa @somechannel\n\
                      Other UCbbbbbbbbbbbbbbbbbbbbbb NA\n\
                      Some Channel UCaaaaaaaaaaaaaaaaaaaaaa @somechannel\n\
                      garbage\n\
                      NA UCcccccccccccccccccccccc\n";
        let channels = parse_subscription_lines(stdout);
        assert_eq!(channels.len(), 3);
        assert_eq!(channels[0].title, "Some Channel");
        assert_eq!(channels[1].title, "Other");
        assert_eq!(channels[2].title, "Unknown Channel");
    }

    #[test]
    fn test_parse_subscription_json() {
        let stdout = concat!(
            r#"{"channel_id":"UCaaaaaaaaaaaaaaaaaaaaaa","channel":"Alpha"}"#,
            "\n",
            r#"{"uploader_id":"UCbbbbbbbbbbbbbbbbbbbbbb","uploader":"Beta","thumbnail":"https://t/b.jpg"}"#,
            "\n",
            r#"{"uploader_id":"@notachannel"}"#,
            "\n",
            "not json\n",
            r#"{"channel_id":"UCaaaaaaaaaaaaaaaaaaaaaa","channel":"Alpha again"}"#,
        );
        let channels = parse_subscription_json(stdout);
        assert_eq!(channels.len(), 2);
        assert_eq!(channels[0].title, "Alpha");
        assert_eq!(channels[1].thumbnail_url, "https://t/b.jpg");
    }

    #[tokio::test]
    async fn test_missing_binary_is_reported() {
        let tools = ToolsConfig {
            yt_dlp_path: "definitely-not-a-real-yt-dlp-binary".to_string(),
            ..Default::default()
        };
        let ytdlp = YtDlp::new(&tools, PathBuf::from("cookies.txt"));
        let result = ytdlp.video_info("abc123").await;
        assert!(matches!(result, Err(AppError::ToolMissing(_))));
    }

    #[tokio::test]
    async fn test_unsupported_browser_is_rejected() {
        let ytdlp = YtDlp::new(&ToolsConfig::default(), PathBuf::from("cookies.txt"));
        let result = ytdlp.export_browser_cookies("netscape").await;
        assert!(matches!(result, Err(AppError::Validation(_))));
    }
}
