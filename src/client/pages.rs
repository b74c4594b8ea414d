//! Page view-models composed from the client pieces

use chrono::{DateTime, Utc};

use super::cache::VideoCatalog;
use super::error::ClientResult;
use crate::core::models::{
    days_before, Channel, ChannelCreate, FetchVideosRequest, MessageResponse, Video, VideoPage,
    VideoQuery, MAX_VIDEO_LIMIT,
};

pub const DEFAULT_PAGE_SIZE: i64 = 10;

/// 1-based page cursor
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pager {
    pub page: i64,
    pub page_size: i64,
}

impl Default for Pager {
    fn default() -> Self {
        Self {
            page: 1,
            page_size: DEFAULT_PAGE_SIZE,
        }
    }
}

impl Pager {
    /// `page_size` is clamped to what the backend serves in one response
    pub fn new(page: i64, page_size: i64) -> Self {
        Self {
            page: page.max(1),
            page_size: page_size.clamp(1, MAX_VIDEO_LIMIT),
        }
    }

    pub fn offset(&self) -> i64 {
        (self.page - 1).saturating_mul(self.page_size)
    }

    pub fn total_pages(&self, total: i64) -> i64 {
        if total <= 0 {
            0
        } else {
            (total - 1) / self.page_size + 1
        }
    }

    pub fn has_next(&self, total: i64) -> bool {
        self.page < self.total_pages(total)
    }

    pub fn next(self) -> Self {
        Self {
            page: self.page.saturating_add(1),
            ..self
        }
    }

    pub fn previous(self) -> Self {
        Self {
            page: (self.page - 1).max(1),
            ..self
        }
    }

    /// Apply limit/offset to `query`
    pub fn apply(&self, query: VideoQuery) -> VideoQuery {
        query.page(self.page_size, self.offset())
    }
}

/// Filters of the home page
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HomeFilter {
    pub channel_id: Option<String>,
    /// Only videos published in the last `days` days
    pub days: Option<i64>,
    pub downloaded: Option<bool>,
}

impl HomeFilter {
    /// `days` is resolved to an absolute `published_after` so a page of
    /// results stays stable while paging.
    pub fn to_query(&self, now: DateTime<Utc>) -> VideoQuery {
        let mut query = VideoQuery::default();
        if let Some(channel_id) = self.channel_id.as_deref().filter(|id| !id.is_empty()) {
            query = query.channel(channel_id);
        }
        // A window reaching past the representable range means no lower bound
        if let Some(after) = self
            .days
            .filter(|days| *days > 0)
            .and_then(|days| days_before(now, days))
        {
            query = query.published_after(after);
        }
        if let Some(downloaded) = self.downloaded {
            query = query.downloaded(downloaded);
        }
        query
    }
}

/// Home page: filtered, paginated catalog
#[derive(Debug, Clone)]
pub struct HomePage {
    pub filter: HomeFilter,
    pub pager: Pager,
    anchor: DateTime<Utc>,
}

impl HomePage {
    pub fn new(filter: HomeFilter) -> Self {
        Self {
            filter,
            pager: Pager::default(),
            anchor: Utc::now(),
        }
    }

    pub fn query(&self) -> VideoQuery {
        self.pager.apply(self.filter.to_query(self.anchor))
    }

    pub async fn load(&self, catalog: &VideoCatalog) -> ClientResult<VideoPage> {
        catalog.videos(&self.query()).await
    }
}

/// Downloaded videos, newest first
#[derive(Debug, Clone, Default)]
pub struct DownloadsPage {
    pub pager: Pager,
}

impl DownloadsPage {
    pub fn query(&self) -> VideoQuery {
        self.pager.apply(VideoQuery::default().downloaded(true))
    }

    pub async fn load(&self, catalog: &VideoCatalog) -> ClientResult<VideoPage> {
        catalog.videos(&self.query()).await
    }
}

/// Subscribed channels
#[derive(Debug, Clone)]
pub struct ChannelsPage {
    catalog: VideoCatalog,
}

impl ChannelsPage {
    pub fn new(catalog: VideoCatalog) -> Self {
        Self { catalog }
    }

    pub async fn channels(&self) -> ClientResult<Vec<Channel>> {
        self.catalog.client().get_channels().await
    }

    /// Subscribe by channel id, `@handle` or custom name
    pub async fn subscribe(&self, channel_id: &str) -> ClientResult<Channel> {
        let request = ChannelCreate {
            id: channel_id.to_string(),
            ..Default::default()
        };
        self.catalog.client().add_channel(&request).await
    }

    pub async fn unsubscribe(&self, channel_id: &str) -> ClientResult<MessageResponse> {
        self.catalog.client().delete_channel(channel_id).await
    }

    /// Pull recent videos of one channel, or of all when `channel_id` is `None`
    pub async fn refresh(
        &self,
        channel_id: Option<&str>,
        days: Option<i64>,
    ) -> ClientResult<Vec<Video>> {
        let request = FetchVideosRequest {
            channel_id: channel_id.map(str::to_string),
            days,
            fetch_all_channels: channel_id.is_none(),
            ..Default::default()
        };
        self.catalog.fetch_videos(&request).await
    }
}

/// Walk every page of `base` and collect the videos
pub async fn collect_all(
    catalog: &VideoCatalog,
    base: VideoQuery,
    page_size: i64,
) -> ClientResult<Vec<Video>> {
    let mut pager = Pager::new(1, page_size);
    let mut videos = Vec::new();
    loop {
        let page = catalog.videos(&pager.apply(base.clone())).await?;
        videos.extend(page.videos);
        if !pager.has_next(page.total) {
            return Ok(videos);
        }
        pager = pager.next();
    }
}
