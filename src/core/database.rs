//! SQLite persistence for channels, videos and user settings
//!
//! A single connection is shared behind a mutex; every call runs on the
//! blocking thread pool so handlers never stall the async runtime.

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use rusqlite::{params, params_from_iter, Connection, OptionalExtension, Row, ToSql};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use super::models::{
    AppError, AppResult, Channel, SettingsUpdate, UserSettings, Video, VideoFilter,
};

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS channels (
  id TEXT PRIMARY KEY,
  title TEXT NOT NULL,
  thumbnail_url TEXT,
  description TEXT,
  last_updated TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS videos (
  id TEXT PRIMARY KEY,
  channel_id TEXT NOT NULL,
  title TEXT NOT NULL,
  description TEXT,
  published_at TEXT NOT NULL,
  thumbnail_url TEXT,
  duration INTEGER,
  view_count INTEGER,
  like_count INTEGER,
  is_downloaded INTEGER NOT NULL DEFAULT 0,
  downloaded_at TEXT,
  downloaded_resolution TEXT,
  download_progress REAL NOT NULL DEFAULT 0
);

CREATE TABLE IF NOT EXISTS user_settings (
  id INTEGER PRIMARY KEY,
  download_directory TEXT NOT NULL,
  default_resolution TEXT NOT NULL,
  max_concurrent_downloads INTEGER NOT NULL,
  auto_update_interval INTEGER NOT NULL,
  dark_mode INTEGER NOT NULL DEFAULT 0,
  last_updated TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_videos_published ON videos(published_at DESC);
CREATE INDEX IF NOT EXISTS idx_videos_channel ON videos(channel_id);
CREATE INDEX IF NOT EXISTS idx_videos_downloaded ON videos(is_downloaded, downloaded_at);
"#;

const CHANNEL_COLUMNS: &str = "id, title, thumbnail_url, description, last_updated";

const VIDEO_COLUMNS: &str = "id, channel_id, title, description, published_at, thumbnail_url, \
     duration, view_count, like_count, is_downloaded, downloaded_at, downloaded_resolution, \
     download_progress";

const SETTINGS_COLUMNS: &str = "id, download_directory, default_resolution, \
     max_concurrent_downloads, auto_update_interval, dark_mode, last_updated";

/// Handle to the application database
#[derive(Clone)]
pub struct Database {
    conn: Arc<Mutex<Connection>>,
}

impl Database {
    /// Open (or create) the database file at `path` and apply the schema
    pub fn open(path: &Path) -> AppResult<Self> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(path)?;
        conn.busy_timeout(Duration::from_secs(10))?;
        conn.pragma_update(None, "journal_mode", "WAL")?;
        tracing::info!("🗄️ Opened database at {:?}", path);
        Self::from_connection(conn)
    }

    /// Private in-memory database, used by tests and tooling
    pub fn open_in_memory() -> AppResult<Self> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    fn from_connection(conn: Connection) -> AppResult<Self> {
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Run `f` against the connection on the blocking pool
    async fn call<F, T>(&self, f: F) -> AppResult<T>
    where
        F: FnOnce(&mut Connection) -> AppResult<T> + Send + 'static,
        T: Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || {
            let mut guard = conn.lock();
            f(&mut guard)
        })
        .await
        .map_err(|e| AppError::System(format!("Database task failed: {}", e)))?
    }

    // ---- channels ----

    pub async fn get_channels(&self) -> AppResult<Vec<Channel>> {
        self.call(|conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {CHANNEL_COLUMNS} FROM channels ORDER BY title COLLATE NOCASE, id"
            ))?;
            let channels = stmt
                .query_map([], channel_from_row)?
                .collect::<Result<Vec<_>, _>>()?;
            Ok(channels)
        })
        .await
    }

    pub async fn get_channel(&self, id: &str) -> AppResult<Option<Channel>> {
        let id = id.to_string();
        self.call(move |conn| {
            let channel = conn
                .query_row(
                    &format!("SELECT {CHANNEL_COLUMNS} FROM channels WHERE id = ?1"),
                    params![id],
                    channel_from_row,
                )
                .optional()?;
            Ok(channel)
        })
        .await
    }

    pub async fn create_channel(&self, channel: Channel) -> AppResult<Channel> {
        self.call(move |conn| {
            conn.execute(
                "INSERT INTO channels (id, title, thumbnail_url, description, last_updated)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![
                    channel.id,
                    channel.title,
                    channel.thumbnail_url,
                    channel.description,
                    channel.last_updated
                ],
            )?;
            Ok(channel)
        })
        .await
    }

    /// Overwrite every column of an existing channel; false when the row is missing
    pub async fn update_channel(&self, channel: Channel) -> AppResult<bool> {
        self.call(move |conn| {
            let changed = conn.execute(
                "UPDATE channels
                 SET title = ?2, thumbnail_url = ?3, description = ?4, last_updated = ?5
                 WHERE id = ?1",
                params![
                    channel.id,
                    channel.title,
                    channel.thumbnail_url,
                    channel.description,
                    channel.last_updated
                ],
            )?;
            Ok(changed > 0)
        })
        .await
    }

    /// Delete the channel row only; its videos stay in the catalog
    pub async fn delete_channel(&self, id: &str) -> AppResult<bool> {
        let id = id.to_string();
        self.call(move |conn| {
            let changed = conn.execute("DELETE FROM channels WHERE id = ?1", params![id])?;
            Ok(changed > 0)
        })
        .await
    }

    // ---- videos ----

    pub async fn get_videos(&self, filter: VideoFilter) -> AppResult<Vec<Video>> {
        self.call(move |conn| {
            let (clause, mut values) = filter_clause(&filter);
            values.push(Box::new(filter.limit));
            values.push(Box::new(filter.offset));
            let sql = format!(
                "SELECT {VIDEO_COLUMNS} FROM videos{clause}
                 ORDER BY published_at DESC, id ASC LIMIT ? OFFSET ?"
            );
            let mut stmt = conn.prepare(&sql)?;
            let videos = stmt
                .query_map(params_from_iter(values.iter()), video_from_row)?
                .collect::<Result<Vec<_>, _>>()?;
            Ok(videos)
        })
        .await
    }

    /// Number of rows matching `filter`, ignoring its limit and offset
    pub async fn count_videos(&self, filter: VideoFilter) -> AppResult<i64> {
        self.call(move |conn| {
            let (clause, values) = filter_clause(&filter);
            let sql = format!("SELECT COUNT(*) FROM videos{clause}");
            let total = conn.query_row(&sql, params_from_iter(values.iter()), |row| row.get(0))?;
            Ok(total)
        })
        .await
    }

    pub async fn get_video(&self, id: &str) -> AppResult<Option<Video>> {
        let id = id.to_string();
        self.call(move |conn| {
            let video = conn
                .query_row(
                    &format!("SELECT {VIDEO_COLUMNS} FROM videos WHERE id = ?1"),
                    params![id],
                    video_from_row,
                )
                .optional()?;
            Ok(video)
        })
        .await
    }

    pub async fn get_videos_by_ids(&self, ids: Vec<String>) -> AppResult<Vec<Video>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        self.call(move |conn| {
            let placeholders = vec!["?"; ids.len()].join(", ");
            let sql = format!("SELECT {VIDEO_COLUMNS} FROM videos WHERE id IN ({placeholders})");
            let mut stmt = conn.prepare(&sql)?;
            let videos = stmt
                .query_map(params_from_iter(ids.iter()), video_from_row)?
                .collect::<Result<Vec<_>, _>>()?;
            Ok(videos)
        })
        .await
    }

    pub async fn create_video(&self, video: Video) -> AppResult<Video> {
        self.call(move |conn| {
            insert_video(conn, &video, "")?;
            Ok(video)
        })
        .await
    }

    /// Insert many videos in one transaction.
    ///
    /// A row that already exists, e.g. written by a concurrent fetch of the same
    /// channel, only has its metadata refreshed and keeps its download state.
    pub async fn create_videos_batch(&self, videos: Vec<Video>) -> AppResult<Vec<Video>> {
        if videos.is_empty() {
            return Ok(videos);
        }
        self.call(move |conn| {
            let tx = conn.transaction()?;
            for video in &videos {
                insert_video(&tx, video, REFRESH_ON_CONFLICT)?;
            }
            tx.commit()?;
            Ok(videos)
        })
        .await
    }

    /// Refresh metadata columns of existing videos in one transaction.
    ///
    /// Download state (`is_downloaded`, `downloaded_at`, `downloaded_resolution`,
    /// `download_progress`) is never touched here.
    pub async fn update_videos_metadata_batch(&self, videos: Vec<Video>) -> AppResult<Vec<Video>> {
        if videos.is_empty() {
            return Ok(videos);
        }
        self.call(move |conn| {
            let tx = conn.transaction()?;
            {
                let mut stmt = tx.prepare(
                    "UPDATE videos
                     SET title = ?2, description = ?3, published_at = ?4, thumbnail_url = ?5,
                         duration = ?6, view_count = ?7, like_count = ?8
                     WHERE id = ?1",
                )?;
                for video in &videos {
                    stmt.execute(params![
                        video.id,
                        video.title,
                        video.description,
                        video.published_at,
                        video.thumbnail_url,
                        video.duration,
                        video.view_count,
                        video.like_count
                    ])?;
                }
            }
            let ids: Vec<&str> = videos.iter().map(|v| v.id.as_str()).collect();
            let placeholders = vec!["?"; ids.len()].join(", ");
            let refreshed = {
                let mut stmt = tx.prepare(&format!(
                    "SELECT {VIDEO_COLUMNS} FROM videos WHERE id IN ({placeholders})
                     ORDER BY published_at DESC, id ASC"
                ))?;
                let rows = stmt.query_map(params_from_iter(ids.iter()), video_from_row)?;
                rows.collect::<Result<Vec<_>, _>>()?
            };
            tx.commit()?;
            Ok(refreshed)
        })
        .await
    }

    /// Flag a video as downloaded; returns the updated row
    pub async fn mark_downloaded(
        &self,
        id: &str,
        resolution: &str,
        at: DateTime<Utc>,
    ) -> AppResult<Option<Video>> {
        let id = id.to_string();
        let resolution = resolution.to_string();
        self.call(move |conn| {
            let changed = conn.execute(
                "UPDATE videos
                 SET is_downloaded = 1, downloaded_at = ?2, downloaded_resolution = ?3,
                     download_progress = 1.0
                 WHERE id = ?1",
                params![id, at, resolution],
            )?;
            if changed == 0 {
                return Ok(None);
            }
            let video = conn
                .query_row(
                    &format!("SELECT {VIDEO_COLUMNS} FROM videos WHERE id = ?1"),
                    params![id],
                    video_from_row,
                )
                .optional()?;
            Ok(video)
        })
        .await
    }

    pub async fn delete_video(&self, id: &str) -> AppResult<bool> {
        let id = id.to_string();
        self.call(move |conn| {
            let changed = conn.execute("DELETE FROM videos WHERE id = ?1", params![id])?;
            Ok(changed > 0)
        })
        .await
    }

    // ---- settings ----

    pub async fn get_settings(&self) -> AppResult<Option<UserSettings>> {
        self.call(|conn| {
            let settings = conn
                .query_row(
                    &format!("SELECT {SETTINGS_COLUMNS} FROM user_settings ORDER BY id LIMIT 1"),
                    [],
                    settings_from_row,
                )
                .optional()?;
            Ok(settings)
        })
        .await
    }

    /// Update the single settings record, creating it when absent
    pub async fn create_or_update_settings(
        &self,
        update: SettingsUpdate,
    ) -> AppResult<UserSettings> {
        self.call(move |conn| {
            let now = Utc::now();
            let existing: Option<i64> = conn
                .query_row("SELECT id FROM user_settings ORDER BY id LIMIT 1", [], |row| {
                    row.get(0)
                })
                .optional()?;

            let id = match existing {
                Some(id) => {
                    conn.execute(
                        "UPDATE user_settings
                         SET download_directory = ?2, default_resolution = ?3,
                             max_concurrent_downloads = ?4, auto_update_interval = ?5,
                             dark_mode = ?6, last_updated = ?7
                         WHERE id = ?1",
                        params![
                            id,
                            update.download_directory,
                            update.default_resolution,
                            update.max_concurrent_downloads,
                            update.auto_update_interval,
                            update.dark_mode,
                            now
                        ],
                    )?;
                    id
                }
                None => {
                    conn.execute(
                        "INSERT INTO user_settings (download_directory, default_resolution,
                             max_concurrent_downloads, auto_update_interval, dark_mode, last_updated)
                         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                        params![
                            update.download_directory,
                            update.default_resolution,
                            update.max_concurrent_downloads,
                            update.auto_update_interval,
                            update.dark_mode,
                            now
                        ],
                    )?;
                    conn.last_insert_rowid()
                }
            };

            let settings = conn.query_row(
                &format!("SELECT {SETTINGS_COLUMNS} FROM user_settings WHERE id = ?1"),
                params![id],
                settings_from_row,
            )?;
            Ok(settings)
        })
        .await
    }
}

/// WHERE clause and bound values for a video filter.
///
/// With `is_downloaded = true` the date window applies to `downloaded_at`,
/// otherwise to `published_at`.
fn filter_clause(filter: &VideoFilter) -> (String, Vec<Box<dyn ToSql>>) {
    let mut conditions: Vec<&str> = Vec::new();
    let mut values: Vec<Box<dyn ToSql>> = Vec::new();

    if let Some(channel_id) = &filter.channel_id {
        conditions.push("channel_id = ?");
        values.push(Box::new(channel_id.clone()));
    }

    match filter.is_downloaded {
        Some(true) => conditions.push("is_downloaded = 1"),
        Some(false) => conditions.push("is_downloaded = 0"),
        None => {}
    }

    let (after, before) = if filter.is_downloaded == Some(true) {
        ("downloaded_at >= ?", "downloaded_at <= ?")
    } else {
        ("published_at >= ?", "published_at <= ?")
    };

    if let Some(start) = filter.start_date {
        conditions.push(after);
        values.push(Box::new(start));
    }
    if let Some(end) = filter.end_date {
        conditions.push(before);
        values.push(Box::new(end));
    }

    let clause = if conditions.is_empty() {
        String::new()
    } else {
        format!(" WHERE {}", conditions.join(" AND "))
    };
    (clause, values)
}

/// Upsert tail that refreshes metadata columns only
const REFRESH_ON_CONFLICT: &str = " ON CONFLICT(id) DO UPDATE SET
     title = excluded.title, description = excluded.description,
     published_at = excluded.published_at, thumbnail_url = excluded.thumbnail_url,
     duration = excluded.duration, view_count = excluded.view_count,
     like_count = excluded.like_count";

fn insert_video(conn: &Connection, video: &Video, on_conflict: &str) -> rusqlite::Result<usize> {
    conn.execute(
        &format!("INSERT INTO videos ({VIDEO_COLUMNS}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13){on_conflict}"),
        params![
            video.id,
            video.channel_id,
            video.title,
            video.description,
            video.published_at,
            video.thumbnail_url,
            video.duration,
            video.view_count,
            video.like_count,
            video.is_downloaded,
            video.downloaded_at,
            video.downloaded_resolution,
            video.download_progress
        ],
    )
}

fn channel_from_row(row: &Row<'_>) -> rusqlite::Result<Channel> {
    Ok(Channel {
        id: row.get("id")?,
        title: row.get("title")?,
        thumbnail_url: row.get("thumbnail_url")?,
        description: row.get("description")?,
        last_updated: row.get("last_updated")?,
    })
}

fn video_from_row(row: &Row<'_>) -> rusqlite::Result<Video> {
    Ok(Video {
        id: row.get("id")?,
        channel_id: row.get("channel_id")?,
        title: row.get("title")?,
        description: row.get("description")?,
        published_at: row.get("published_at")?,
        thumbnail_url: row.get("thumbnail_url")?,
        duration: row.get("duration")?,
        view_count: row.get("view_count")?,
        like_count: row.get("like_count")?,
        is_downloaded: row.get("is_downloaded")?,
        downloaded_at: row.get("downloaded_at")?,
        downloaded_resolution: row.get("downloaded_resolution")?,
        download_progress: row.get("download_progress")?,
    })
}

fn settings_from_row(row: &Row<'_>) -> rusqlite::Result<UserSettings> {
    Ok(UserSettings {
        id: row.get("id")?,
        download_directory: row.get("download_directory")?,
        default_resolution: row.get("default_resolution")?,
        max_concurrent_downloads: row.get("max_concurrent_downloads")?,
        auto_update_interval: row.get("auto_update_interval")?,
        dark_mode: row.get("dark_mode")?,
        last_updated: row.get("last_updated")?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::testing::{channel, video};
    use chrono::{Duration, TimeZone};

    fn day(n: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, n, 12, 0, 0).unwrap()
    }

    async fn seeded() -> Database {
        let db = Database::open_in_memory().unwrap();
        db.create_videos_batch(vec![
            video("v1", "UCa", day(1)),
            video("v2", "UCa", day(2)),
            video("v3", "UCb", day(3)),
            video("v4", "UCb", day(4)),
        ])
        .await
        .unwrap();
        db
    }

    #[tokio::test]
    async fn test_videos_are_ordered_newest_first() {
        let db = seeded().await;
        let videos = db.get_videos(VideoFilter::default()).await.unwrap();
        let ids: Vec<_> = videos.iter().map(|v| v.id.as_str()).collect();
        assert_eq!(ids, vec!["v4", "v3", "v2", "v1"]);
        assert_eq!(db.count_videos(VideoFilter::default()).await.unwrap(), 4);
    }

    #[tokio::test]
    async fn test_channel_and_published_window_filters() {
        let db = seeded().await;
        let filter = VideoFilter {
            channel_id: Some("UCb".to_string()),
            start_date: Some(day(4) - Duration::hours(1)),
            ..Default::default()
        };
        let videos = db.get_videos(filter.clone()).await.unwrap();
        assert_eq!(videos.len(), 1);
        assert_eq!(videos[0].id, "v4");
        assert_eq!(db.count_videos(filter).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_downloaded_filter_windows_on_downloaded_at() {
        let db = seeded().await;
        // v1 is old by publish date but downloaded recently
        db.mark_downloaded("v1", "720p", day(20)).await.unwrap();

        let filter = VideoFilter {
            is_downloaded: Some(true),
            start_date: Some(day(15)),
            ..Default::default()
        };
        let videos = db.get_videos(filter).await.unwrap();
        assert_eq!(videos.len(), 1);
        assert_eq!(videos[0].id, "v1");

        let pending = VideoFilter {
            is_downloaded: Some(false),
            ..Default::default()
        };
        assert_eq!(db.count_videos(pending).await.unwrap(), 3);
    }

    #[tokio::test]
    async fn test_limit_and_offset() {
        let db = seeded().await;
        let page = db
            .get_videos(VideoFilter {
                limit: 2,
                offset: 1,
                ..Default::default()
            })
            .await
            .unwrap();
        let ids: Vec<_> = page.iter().map(|v| v.id.as_str()).collect();
        assert_eq!(ids, vec!["v3", "v2"]);
    }

    #[tokio::test]
    async fn test_mark_downloaded_sets_fields() {
        let db = seeded().await;
        let updated = db.mark_downloaded("v2", "1080p", day(9)).await.unwrap().unwrap();
        assert!(updated.is_downloaded);
        assert_eq!(updated.downloaded_resolution.as_deref(), Some("1080p"));
        assert_eq!(updated.downloaded_at, Some(day(9)));
        assert_eq!(updated.download_progress, 1.0);

        assert!(db.mark_downloaded("missing", "720p", day(9)).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_metadata_refresh_keeps_download_state() {
        let db = seeded().await;
        db.mark_downloaded("v3", "720p", day(10)).await.unwrap();

        let mut refreshed = video("v3", "UCb", day(3));
        refreshed.title = "Renamed".to_string();
        refreshed.view_count = Some(999);
        let rows = db.update_videos_metadata_batch(vec![refreshed]).await.unwrap();

        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].title, "Renamed");
        assert_eq!(rows[0].view_count, Some(999));
        assert!(rows[0].is_downloaded);
        assert_eq!(rows[0].downloaded_resolution.as_deref(), Some("720p"));
    }

    #[tokio::test]
    async fn test_batch_insert_over_existing_row_refreshes_metadata() {
        let db = seeded().await;
        db.mark_downloaded("v2", "480p", day(11)).await.unwrap();

        let mut again = video("v2", "UCa", day(2));
        again.title = "Fetched twice".to_string();
        let rows = db
            .create_videos_batch(vec![again, video("v5", "UCa", day(5))])
            .await
            .unwrap();
        assert_eq!(rows.len(), 2);

        let stored = db.get_video("v2").await.unwrap().unwrap();
        assert_eq!(stored.title, "Fetched twice");
        assert!(stored.is_downloaded);
        assert_eq!(stored.downloaded_resolution.as_deref(), Some("480p"));
        assert_eq!(stored.downloaded_at, Some(day(11)));
        assert_eq!(db.count_videos(VideoFilter::default()).await.unwrap(), 5);

        assert!(db.create_video(video("v1", "UCa", day(1))).await.is_err());
    }

    #[tokio::test]
    async fn test_get_videos_by_ids_and_delete() {
        let db = seeded().await;
        let found = db
            .get_videos_by_ids(vec!["v1".to_string(), "v4".to_string(), "nope".to_string()])
            .await
            .unwrap();
        assert_eq!(found.len(), 2);

        assert!(db.delete_video("v1").await.unwrap());
        assert!(!db.delete_video("v1").await.unwrap());
        assert!(db.get_video("v1").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_channel_delete_does_not_cascade() {
        let db = seeded().await;
        db.create_channel(channel("UCa", "Alpha")).await.unwrap();
        assert!(db.create_channel(channel("UCa", "Again")).await.is_err());

        assert!(db.delete_channel("UCa").await.unwrap());
        assert!(db.get_channel("UCa").await.unwrap().is_none());

        let remaining = db
            .count_videos(VideoFilter {
                channel_id: Some("UCa".to_string()),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(remaining, 2);
    }

    #[tokio::test]
    async fn test_update_channel() {
        let db = Database::open_in_memory().unwrap();
        db.create_channel(channel("UCz", "Zed")).await.unwrap();

        let mut changed = channel("UCz", "Zed Renamed");
        changed.last_updated = day(5);
        assert!(db.update_channel(changed).await.unwrap());
        let stored = db.get_channel("UCz").await.unwrap().unwrap();
        assert_eq!(stored.title, "Zed Renamed");
        assert_eq!(stored.last_updated, day(5));

        assert!(!db.update_channel(channel("UCnone", "x")).await.unwrap());
        assert_eq!(db.get_channels().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_settings_upsert() {
        let db = Database::open_in_memory().unwrap();
        assert!(db.get_settings().await.unwrap().is_none());

        let created = db
            .create_or_update_settings(SettingsUpdate::default())
            .await
            .unwrap();
        assert_eq!(created.default_resolution, "720p");

        let update = SettingsUpdate {
            default_resolution: "1080p".to_string(),
            max_concurrent_downloads: 4,
            dark_mode: true,
            ..Default::default()
        };
        let updated = db.create_or_update_settings(update.clone()).await.unwrap();
        assert_eq!(updated.id, created.id);
        assert!(updated.matches(&update));

        let stored = db.get_settings().await.unwrap().unwrap();
        assert_eq!(stored, updated);
    }

    #[tokio::test]
    async fn test_open_file_database() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("db").join("catalog.db");
        {
            let db = Database::open(&path).unwrap();
            db.create_video(video("v9", "UCa", day(9))).await.unwrap();
        }
        let reopened = Database::open(&path).unwrap();
        assert!(reopened.get_video("v9").await.unwrap().is_some());
    }
}
