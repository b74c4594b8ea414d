//! Client-side download progress tracking
//!
//! `start_download` fires the (long) download request in its own task and a
//! single poll task queries `/progress` for every active entry on a fixed
//! interval. The poll task exits as soon as nothing is active.

use parking_lot::Mutex;
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

use super::api_client::DownloadApi;
use super::cache::VideoListCache;
use super::error::ClientResult;
use crate::core::models::DownloadResponse;

/// Client view of one download
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DownloadEntry {
    pub video_id: String,
    pub resolution: String,
    /// Highest progress seen, in [0,1]
    pub progress: f64,
    /// Download request still outstanding
    pub loading: bool,
    pub complete: bool,
    pub error: Option<String>,
}

impl DownloadEntry {
    fn new(video_id: &str, resolution: &str) -> Self {
        Self {
            video_id: video_id.to_string(),
            resolution: resolution.to_string(),
            progress: 0.0,
            loading: true,
            complete: false,
            error: None,
        }
    }

    /// Neither complete nor errored
    pub fn is_active(&self) -> bool {
        !self.complete && self.error.is_none()
    }
}

#[derive(Default)]
struct TrackerState {
    entries: BTreeMap<String, DownloadEntry>,
    poller: Option<JoinHandle<()>>,
    requests: Vec<JoinHandle<()>>,
}

impl TrackerState {
    fn has_active(&self) -> bool {
        self.entries.values().any(DownloadEntry::is_active)
    }

    fn active_ids(&self) -> Vec<String> {
        self.entries
            .values()
            .filter(|e| e.is_active())
            .map(|e| e.video_id.clone())
            .collect()
    }
}

struct Shared {
    api: Arc<dyn DownloadApi>,
    cache: Option<Arc<VideoListCache>>,
    interval: Duration,
    state: Mutex<TrackerState>,
    changes: watch::Sender<Vec<DownloadEntry>>,
}

impl Shared {
    fn publish(&self, state: &TrackerState) {
        self.changes
            .send_replace(state.entries.values().cloned().collect());
    }

    fn invalidate_cache(&self) {
        if let Some(cache) = &self.cache {
            cache.invalidate();
        }
    }

    /// Apply a polled value; progress only moves forward
    fn apply_progress(&self, video_id: &str, progress: f64) {
        let mut state = self.state.lock();
        let Some(entry) = state.entries.get_mut(video_id) else {
            return;
        };
        if !entry.is_active() || progress.is_nan() {
            return;
        }

        let progress = progress.clamp(0.0, 1.0);
        if progress > entry.progress {
            entry.progress = progress;
        }
        let completed = progress >= 1.0;
        if completed {
            entry.complete = true;
            entry.loading = false;
            info!("✅ Download of {} reported complete", video_id);
        }
        self.publish(&state);
        drop(state);

        if completed {
            self.invalidate_cache();
        }
    }

    fn finish_request(&self, video_id: &str, result: ClientResult<DownloadResponse>) {
        let mut state = self.state.lock();
        let Some(entry) = state.entries.get_mut(video_id) else {
            return;
        };

        entry.loading = false;
        let succeeded = match result {
            Ok(response) => {
                debug!("Download request for {} finished: {}", video_id, response.message);
                entry.progress = 1.0;
                entry.complete = true;
                entry.error = None;
                true
            }
            Err(e) => {
                if entry.complete {
                    // The poller already saw 1.0; keep the completed entry
                    warn!("Download request for {} failed after completion: {}", video_id, e);
                } else {
                    warn!("Download of {} failed: {}", video_id, e);
                    entry.error = Some(e.to_string());
                }
                false
            }
        };

        if !state.has_active() {
            if let Some(poller) = state.poller.take() {
                poller.abort();
                debug!("No active downloads left, polling stopped");
            }
        }
        self.publish(&state);
        drop(state);

        if succeeded {
            self.invalidate_cache();
        }
    }
}

async fn poll_loop(shared: Arc<Shared>) {
    let mut ticker = interval_at(Instant::now() + shared.interval, shared.interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        ticker.tick().await;

        let active = {
            let mut state = shared.state.lock();
            let active = state.active_ids();
            if active.is_empty() {
                state.poller = None;
                return;
            }
            active
        };

        for video_id in active {
            match shared.api.get_progress(&video_id).await {
                Ok(progress) => shared.apply_progress(&video_id, progress.progress),
                // Retried on the next tick
                Err(e) => warn!("Progress poll for {} failed: {}", video_id, e),
            }
        }

        let mut state = shared.state.lock();
        if !state.has_active() {
            state.poller = None;
            debug!("No active downloads left, polling stopped");
            return;
        }
    }
}

/// Tracks downloads started from this client.
///
/// Dropping the tracker aborts the poll task and any outstanding request tasks.
pub struct DownloadTracker {
    shared: Arc<Shared>,
}

impl DownloadTracker {
    pub fn new(api: Arc<dyn DownloadApi>, interval: Duration) -> Self {
        Self::build(api, None, interval)
    }

    /// Invalidate `cache` whenever a download completes
    pub fn with_cache(
        api: Arc<dyn DownloadApi>,
        cache: Arc<VideoListCache>,
        interval: Duration,
    ) -> Self {
        Self::build(api, Some(cache), interval)
    }

    fn build(
        api: Arc<dyn DownloadApi>,
        cache: Option<Arc<VideoListCache>>,
        interval: Duration,
    ) -> Self {
        let (changes, _) = watch::channel(Vec::new());
        Self {
            shared: Arc::new(Shared {
                api,
                cache,
                interval: interval.max(Duration::from_millis(1)),
                state: Mutex::new(TrackerState::default()),
                changes,
            }),
        }
    }

    /// Start tracking a download.
    ///
    /// Returns `false` when the video already has an active entry.
    pub fn start_download(&self, video_id: &str, resolution: &str) -> bool {
        let mut state = self.shared.state.lock();
        if state
            .entries
            .get(video_id)
            .is_some_and(DownloadEntry::is_active)
        {
            return false;
        }

        state
            .entries
            .insert(video_id.to_string(), DownloadEntry::new(video_id, resolution));
        info!("⬇️ Starting download of {} at {}", video_id, resolution);

        let shared = Arc::clone(&self.shared);
        let id = video_id.to_string();
        let res = resolution.to_string();
        let request = tokio::spawn(async move {
            let result = shared.api.download_video(&id, &res).await;
            shared.finish_request(&id, result);
        });
        state.requests.retain(|handle| !handle.is_finished());
        state.requests.push(request);

        if state.poller.as_ref().map_or(true, JoinHandle::is_finished) {
            debug!("📊 Polling download progress every {:?}", self.shared.interval);
            state.poller = Some(tokio::spawn(poll_loop(Arc::clone(&self.shared))));
        }

        self.shared.publish(&state);
        true
    }

    pub fn entries(&self) -> Vec<DownloadEntry> {
        self.shared.state.lock().entries.values().cloned().collect()
    }

    pub fn entry(&self, video_id: &str) -> Option<DownloadEntry> {
        self.shared.state.lock().entries.get(video_id).cloned()
    }

    pub fn has_active(&self) -> bool {
        self.shared.state.lock().has_active()
    }

    pub fn is_polling(&self) -> bool {
        self.shared
            .state
            .lock()
            .poller
            .as_ref()
            .is_some_and(|handle| !handle.is_finished())
    }

    /// Forget complete and errored entries
    pub fn clear_finished(&self) {
        let mut state = self.shared.state.lock();
        state.entries.retain(|_, entry| entry.is_active());
        self.shared.publish(&state);
    }

    /// Snapshot of all entries after every change
    pub fn subscribe(&self) -> watch::Receiver<Vec<DownloadEntry>> {
        self.shared.changes.subscribe()
    }

    /// Resolve once no entry is active
    pub async fn wait_idle(&self) {
        let mut changes = self.subscribe();
        if !self.has_active() {
            return;
        }
        // The sender lives in `self`, so this only ends when idle
        let _ = changes
            .wait_for(|entries| !entries.iter().any(DownloadEntry::is_active))
            .await;
    }
}

impl Drop for DownloadTracker {
    fn drop(&mut self) {
        let mut state = self.shared.state.lock();
        if let Some(poller) = state.poller.take() {
            poller.abort();
        }
        for request in state.requests.drain(..) {
            request.abort();
        }
        debug!("🔚 Download tracker dropped");
    }
}
