//! Query-keyed cache of video list responses

use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

use super::api_client::ApiClient;
use super::error::ClientResult;
use crate::core::models::{FetchVideosRequest, MessageResponse, Video, VideoPage, VideoQuery};

#[derive(Debug, Default)]
struct CacheState {
    /// Bumped by every invalidation
    generation: u64,
    pages: HashMap<VideoQuery, VideoPage>,
}

#[derive(Debug, Default)]
pub struct VideoListCache {
    state: RwLock<CacheState>,
}

impl VideoListCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, query: &VideoQuery) -> Option<VideoPage> {
        self.state.read().pages.get(query).cloned()
    }

    pub fn insert(&self, query: VideoQuery, page: VideoPage) {
        self.state.write().pages.insert(query, page);
    }

    /// Generation to pass to [`insert_if_current`](Self::insert_if_current)
    pub fn generation(&self) -> u64 {
        self.state.read().generation
    }

    /// Store `page` only if no invalidation happened since `generation` was read.
    /// Returns whether the page was stored.
    pub fn insert_if_current(&self, query: VideoQuery, page: VideoPage, generation: u64) -> bool {
        let mut state = self.state.write();
        if state.generation != generation {
            debug!("Discarding video page fetched before invalidation");
            return false;
        }
        state.pages.insert(query, page);
        true
    }

    /// Drop every cached page
    pub fn invalidate(&self) {
        let mut state = self.state.write();
        state.generation = state.generation.wrapping_add(1);
        if !state.pages.is_empty() {
            debug!("Invalidating {} cached video pages", state.pages.len());
            state.pages.clear();
        }
    }

    pub fn len(&self) -> usize {
        self.state.read().pages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.state.read().pages.is_empty()
    }
}

/// Video client with a shared list cache.
///
/// Relative windows (`days`, `published_after`) are part of the key, so a cached
/// `days=7` page keeps the window it was fetched with until invalidated.
#[derive(Debug, Clone)]
pub struct VideoCatalog {
    client: ApiClient,
    cache: Arc<VideoListCache>,
}

impl VideoCatalog {
    pub fn new(client: ApiClient) -> Self {
        Self::with_cache(client, Arc::new(VideoListCache::new()))
    }

    pub fn with_cache(client: ApiClient, cache: Arc<VideoListCache>) -> Self {
        Self { client, cache }
    }

    pub fn client(&self) -> &ApiClient {
        &self.client
    }

    pub fn cache(&self) -> &Arc<VideoListCache> {
        &self.cache
    }

    pub async fn videos(&self, query: &VideoQuery) -> ClientResult<VideoPage> {
        if let Some(page) = self.cache.get(query) {
            return Ok(page);
        }
        let generation = self.cache.generation();
        let page = self.client.get_videos(query).await?;
        self.cache.insert_if_current(query.clone(), page.clone(), generation);
        Ok(page)
    }

    pub async fn delete_video(&self, video_id: &str) -> ClientResult<MessageResponse> {
        let response = self.client.delete_video(video_id).await?;
        self.cache.invalidate();
        Ok(response)
    }

    pub async fn fetch_videos(&self, request: &FetchVideosRequest) -> ClientResult<Vec<Video>> {
        let videos = self.client.fetch_videos(request).await?;
        self.cache.invalidate();
        Ok(videos)
    }

    pub fn invalidate(&self) {
        self.cache.invalidate();
    }
}
