//! In-memory download progress registry
//!
//! Holds the completion fraction of every download currently in flight,
//! keyed by video id. Values are clamped to `[0, 1]` and never move backwards
//! while an entry exists.

use chrono::{DateTime, Utc};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info};

/// Snapshot of one tracked download
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ProgressEntry {
    pub video_id: String,
    /// Completion fraction (0.0 - 1.0)
    pub progress: f64,
    pub started_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Concurrent map of in-flight download progress
#[derive(Debug, Clone, Default)]
pub struct ProgressRegistry {
    entries: Arc<DashMap<String, ProgressEntry>>,
}

fn clamp_fraction(value: f64) -> f64 {
    if value.is_nan() {
        0.0
    } else {
        value.clamp(0.0, 1.0)
    }
}

impl ProgressRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Begin tracking `video_id` at 0.0, replacing any stale entry
    pub fn start(&self, video_id: &str) -> f64 {
        let now = Utc::now();
        self.entries.insert(
            video_id.to_string(),
            ProgressEntry {
                video_id: video_id.to_string(),
                progress: 0.0,
                started_at: now,
                updated_at: now,
            },
        );
        info!("📊 Started progress tracking for video: {}", video_id);
        0.0
    }

    /// Begin tracking unless a download for `video_id` is already registered
    pub fn try_start(&self, video_id: &str) -> bool {
        match self.entries.entry(video_id.to_string()) {
            Entry::Occupied(_) => false,
            Entry::Vacant(slot) => {
                let now = Utc::now();
                slot.insert(ProgressEntry {
                    video_id: video_id.to_string(),
                    progress: 0.0,
                    started_at: now,
                    updated_at: now,
                });
                info!("📊 Started progress tracking for video: {}", video_id);
                true
            }
        }
    }

    /// Record a new value; returns the stored value, or `None` when untracked.
    ///
    /// Lower values than the current one are ignored.
    pub fn update(&self, video_id: &str, progress: f64) -> Option<f64> {
        let mut entry = self.entries.get_mut(video_id)?;
        let value = clamp_fraction(progress);
        if value > entry.progress {
            entry.progress = value;
            entry.updated_at = Utc::now();
            debug!("Progress for {}: {:.1}%", video_id, value * 100.0);
        }
        Some(entry.progress)
    }

    /// Mark the download complete (1.0) without removing it
    pub fn finish(&self, video_id: &str) -> Option<f64> {
        self.update(video_id, 1.0)
    }

    /// Stop tracking; returns the last known value
    pub fn remove(&self, video_id: &str) -> Option<f64> {
        let removed = self.entries.remove(video_id).map(|(_, entry)| entry.progress);
        if removed.is_some() {
            info!("🔚 Stopped progress tracking for video: {}", video_id);
        }
        removed
    }

    pub fn get(&self, video_id: &str) -> Option<f64> {
        self.entries.get(video_id).map(|entry| entry.progress)
    }

    pub fn contains(&self, video_id: &str) -> bool {
        self.entries.contains_key(video_id)
    }

    /// All tracked downloads, oldest first
    pub fn active(&self) -> Vec<ProgressEntry> {
        let mut entries: Vec<ProgressEntry> =
            self.entries.iter().map(|entry| entry.value().clone()).collect();
        entries.sort_by(|a, b| {
            a.started_at
                .cmp(&b.started_at)
                .then_with(|| a.video_id.cmp(&b.video_id))
        });
        entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
