//! Periodic channel refresh driven by the `auto_update_interval` setting

use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::core::manager::DownloadManager;
use crate::core::models::AppResult;

/// How often a disabled updater re-reads the settings
pub const DISABLED_RECHECK: Duration = Duration::from_secs(15 * 60);

/// Background refresh task; aborted on drop
pub struct AutoUpdater {
    handle: JoinHandle<()>,
}

impl AutoUpdater {
    pub fn spawn(manager: Arc<DownloadManager>) -> Self {
        let handle = tokio::spawn(async move {
            loop {
                let hours = match manager.settings().await {
                    Ok(settings) => settings.auto_update_interval,
                    Err(e) => {
                        error!("Auto update could not read settings: {}", e);
                        0
                    }
                };

                if hours <= 0 {
                    debug!("Auto update disabled, checking again later");
                    tokio::time::sleep(DISABLED_RECHECK).await;
                    continue;
                }

                tokio::time::sleep(Duration::from_secs(hours as u64 * 3600)).await;
                match refresh_all(&manager).await {
                    Ok(count) => info!("🔄 Auto update processed {} videos", count),
                    Err(e) => error!("Auto update failed: {}", e),
                }
            }
        });
        Self { handle }
    }

    pub fn is_running(&self) -> bool {
        !self.handle.is_finished()
    }
}

impl Drop for AutoUpdater {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

/// Fetch videos published since each channel's `last_updated`.
///
/// A failing channel is logged and skipped; the rest are still refreshed.
pub async fn refresh_all(manager: &DownloadManager) -> AppResult<usize> {
    let channels = manager.list_channels().await?;
    let mut processed = 0;
    for channel in channels {
        match manager
            .fetch_channel(&channel.id, Some(channel.last_updated), None)
            .await
        {
            Ok(videos) => processed += videos.len(),
            Err(e) => warn!("Auto update skipped channel {}: {}", channel.id, e),
        }
    }
    Ok(processed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::testing::{channel, manager_with, metadata, FakeExtractor};
    use chrono::{Duration as ChronoDuration, Utc};

    #[tokio::test]
    async fn test_refresh_all_uses_last_updated() {
        let now = Utc::now();
        let fake = FakeExtractor::default().with_listing(
            "UCa",
            vec![
                metadata("new1", "UCa", now - ChronoDuration::hours(1)),
                metadata("old1", "UCa", now - ChronoDuration::days(10)),
            ],
        );
        let (manager, _fake, _dir) = manager_with(fake).await;

        let mut subscribed = channel("UCa", "A");
        subscribed.last_updated = now - ChronoDuration::days(1);
        manager.database().create_channel(subscribed).await.unwrap();

        assert_eq!(refresh_all(&manager).await.unwrap(), 1);
        assert!(manager.database().get_video("new1").await.unwrap().is_some());
        assert!(manager.database().get_video("old1").await.unwrap().is_none());

        let touched = manager.get_channel("UCa").await.unwrap();
        assert!(touched.last_updated > now - ChronoDuration::minutes(1));
    }

    #[tokio::test]
    async fn test_updater_stops_on_drop() {
        let (manager, _fake, _dir) = manager_with(FakeExtractor::default()).await;
        let updater = AutoUpdater::spawn(manager);
        assert!(updater.is_running());
        drop(updater);
    }
}
