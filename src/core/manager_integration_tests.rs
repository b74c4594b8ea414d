//! 集成测试模块
//! 测试下载管理器与数据库、提取器之间的完整工作流程

#[cfg(test)]
mod tests {
    use crate::core::models::{
        AppError, ChannelCreate, ChannelInfo, FetchVideosRequest, VideoQuery,
    };
    use crate::core::testing::{channel, manager_with, metadata, video, FakeExtractor};
    use chrono::{Duration as ChronoDuration, TimeZone, Utc};
    use std::sync::Arc;
    use std::time::Duration;

    fn info(id: &str, title: &str) -> ChannelInfo {
        ChannelInfo {
            id: id.to_string(),
            title: title.to_string(),
            description: format!("{} description", title),
            thumbnail_url: format!("https://yt3.googleusercontent.com/channel/{}", id),
        }
    }

    #[tokio::test]
    async fn test_fetch_preserves_download_state() {
        let day = |d| Utc.with_ymd_and_hms(2024, 3, d, 12, 0, 0).unwrap();
        let fake = FakeExtractor::default()
            .with_listing("UCa", vec![metadata("v1", "UCa", day(1)), metadata("v2", "UCa", day(2))]);
        let (manager, fake, _dir) = manager_with(fake).await;
        manager.database().create_channel(channel("UCa", "A")).await.unwrap();

        let request = FetchVideosRequest {
            channel_id: Some("UCa".to_string()),
            ..Default::default()
        };
        assert_eq!(manager.fetch_videos(&request).await.unwrap().len(), 2);

        manager
            .database()
            .mark_downloaded("v1", "720p", Utc::now())
            .await
            .unwrap();

        // 重新抓取时只刷新元数据
        let mut renamed = metadata("v1", "UCa", day(1));
        renamed.title = "Renamed".to_string();
        fake.set_listing("UCa", vec![renamed, metadata("v3", "UCa", day(3))]);
        let processed = manager.fetch_videos(&request).await.unwrap();
        assert_eq!(processed.len(), 2);

        let v1 = manager.get_video("v1").await.unwrap();
        assert_eq!(v1.title, "Renamed");
        assert!(v1.is_downloaded);
        assert_eq!(v1.downloaded_resolution.as_deref(), Some("720p"));
        assert_eq!(v1.download_progress, 1.0);

        let page = manager.list_videos(&VideoQuery::default()).await.unwrap();
        assert_eq!(page.total, 3);
        assert_eq!(page.videos[0].id, "v3");
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_overlapping_fetches_of_one_channel() {
        let day = |d| Utc.with_ymd_and_hms(2024, 3, d, 12, 0, 0).unwrap();
        let listing: Vec<_> = (1..=20)
            .map(|d| metadata(&format!("o{:02}", d), "UCa", day(d)))
            .collect();
        let fake = FakeExtractor::default().with_listing("UCa", listing);
        let (manager, _fake, _dir) = manager_with(fake).await;
        manager.database().create_channel(channel("UCa", "A")).await.unwrap();

        let request = FetchVideosRequest {
            channel_id: Some("UCa".to_string()),
            ..Default::default()
        };
        let workers: Vec<_> = (0..6)
            .map(|_| {
                let manager = Arc::clone(&manager);
                let request = request.clone();
                tokio::spawn(async move { manager.fetch_videos(&request).await })
            })
            .collect();
        for worker in workers {
            assert_eq!(worker.await.unwrap().unwrap().len(), 20);
        }

        let page = manager.list_videos(&VideoQuery::default()).await.unwrap();
        assert_eq!(page.total, 20);
    }

    #[tokio::test]
    async fn test_fetch_requires_channel_unless_all() {
        let (manager, _fake, _dir) = manager_with(FakeExtractor::default()).await;
        let result = manager.fetch_videos(&FetchVideosRequest::default()).await;
        assert!(matches!(result, Err(AppError::Validation(_))));

        let all = FetchVideosRequest {
            fetch_all_channels: true,
            ..Default::default()
        };
        assert!(manager.fetch_videos(&all).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_download_success_marks_row() {
        let fake = FakeExtractor::default()
            .with_progress(vec![0.1, 0.5, 1.0], Duration::from_millis(5));
        let (manager, fake, dir) = manager_with(fake).await;
        manager
            .database()
            .create_video(video("abc123", "UCa", Utc::now()))
            .await
            .unwrap();

        let response = manager.download("abc123", "720p").await.unwrap();
        assert_eq!(response.video_id, "abc123");
        assert_eq!(response.message, "Video downloaded successfully.");

        let stored = manager.get_video("abc123").await.unwrap();
        assert!(stored.is_downloaded);
        assert_eq!(stored.downloaded_resolution.as_deref(), Some("720p"));
        assert!(stored.downloaded_at.is_some());
        assert_eq!(manager.progress("abc123").await.unwrap().progress, 1.0);
        assert!(manager.progress_registry().is_empty());

        let jobs = fake.downloads();
        assert_eq!(jobs.len(), 1);
        assert_eq!(jobs[0].download_dir, dir.path().join("downloads"));

        let (_, path) = manager.media_file("abc123").await.unwrap();
        assert!(path.starts_with(dir.path().join("downloads").join("abc123")));
        assert_eq!(manager.static_file("abc123.mp4").await.unwrap(), path);
        assert_eq!(manager.static_file("abc123.webm").await.unwrap(), path);
    }

    #[tokio::test]
    async fn test_in_flight_progress_is_capped_and_monotonic() {
        let fake = FakeExtractor::default().with_progress(
            vec![0.2, 0.6, 0.4, 1.0, 1.0],
            Duration::from_millis(20),
        );
        let (manager, _fake, _dir) = manager_with(fake).await;
        manager
            .database()
            .create_video(video("v1", "UCa", Utc::now()))
            .await
            .unwrap();

        let worker = {
            let manager = Arc::clone(&manager);
            tokio::spawn(async move { manager.download("v1", "best").await })
        };

        let mut seen = Vec::new();
        while !worker.is_finished() {
            if let Some(p) = manager.progress_registry().get("v1") {
                seen.push(p);
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        worker.await.unwrap().unwrap();

        assert!(seen.windows(2).all(|w| w[0] <= w[1]));
        // 进程结束前最多报告 0.99
        assert!(seen.contains(&0.99));
        assert!(!seen.iter().any(|p| *p > 0.99 && *p < 1.0));
    }

    #[tokio::test]
    async fn test_download_failure_clears_progress() {
        let (manager, fake, _dir) = manager_with(FakeExtractor::default()).await;
        fake.fail_downloads("network went away");
        manager
            .database()
            .create_video(video("v1", "UCa", Utc::now()))
            .await
            .unwrap();

        let result = manager.download("v1", "720p").await;
        assert!(matches!(result, Err(AppError::Download(_))));
        assert!(!manager.progress_registry().contains("v1"));
        assert!(!manager.get_video("v1").await.unwrap().is_downloaded);
    }

    #[tokio::test]
    async fn test_download_unknown_video_is_not_found() {
        let (manager, fake, _dir) = manager_with(FakeExtractor::default()).await;
        assert!(matches!(
            manager.download("missing", "720p").await,
            Err(AppError::NotFound(_))
        ));
        assert!(fake.downloads().is_empty());
    }

    #[tokio::test]
    async fn test_duplicate_download_is_rejected() {
        let fake =
            FakeExtractor::default().with_progress(vec![0.1, 0.2], Duration::from_millis(100));
        let (manager, _fake, _dir) = manager_with(fake).await;
        manager
            .database()
            .create_video(video("v1", "UCa", Utc::now()))
            .await
            .unwrap();

        let first = {
            let manager = Arc::clone(&manager);
            tokio::spawn(async move { manager.download("v1", "720p").await })
        };
        tokio::time::sleep(Duration::from_millis(30)).await;

        assert!(matches!(
            manager.download("v1", "720p").await,
            Err(AppError::Validation(_))
        ));
        first.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn test_concurrency_limit_queues_downloads() {
        let fake =
            FakeExtractor::default().with_progress(vec![0.5], Duration::from_millis(150));
        let (manager, fake, _dir) = manager_with(fake).await;
        manager.resize(1);
        for id in ["a1", "a2"] {
            manager
                .database()
                .create_video(video(id, "UCa", Utc::now()))
                .await
                .unwrap();
        }

        let workers: Vec<_> = ["a1", "a2"]
            .into_iter()
            .map(|id| {
                let manager = Arc::clone(&manager);
                tokio::spawn(async move { manager.download(id, "720p").await })
            })
            .collect();

        tokio::time::sleep(Duration::from_millis(60)).await;
        assert_eq!(fake.downloads().len(), 1);
        // 排队中的下载也已登记进度
        assert_eq!(manager.progress_registry().len(), 2);

        for worker in workers {
            worker.await.unwrap().unwrap();
        }
        assert_eq!(fake.downloads().len(), 2);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_parallel_downloads_share_directory_check() {
        let (manager, fake, dir) = manager_with(FakeExtractor::default()).await;
        manager.resize(8);
        let ids: Vec<String> = (0..12).map(|i| format!("p{:02}", i)).collect();
        for id in &ids {
            manager
                .database()
                .create_video(video(id, "UCa", Utc::now()))
                .await
                .unwrap();
        }

        let workers: Vec<_> = ids
            .iter()
            .cloned()
            .map(|id| {
                let manager = Arc::clone(&manager);
                tokio::spawn(async move { manager.download(&id, "720p").await })
            })
            .collect();
        for worker in workers {
            worker.await.unwrap().unwrap();
        }

        assert_eq!(fake.downloads().len(), ids.len());
        let downloads = dir.path().join("downloads");
        let leftovers: Vec<_> = std::fs::read_dir(&downloads)
            .unwrap()
            .filter_map(|entry| entry.ok())
            .filter(|entry| entry.file_name().to_string_lossy().starts_with(".write_test"))
            .collect();
        assert!(leftovers.is_empty());
    }

    #[tokio::test]
    async fn test_download_by_url_catalogues_unknown_video() {
        let published = Utc::now() - ChronoDuration::days(2);
        let fake = FakeExtractor::default().with_video(metadata("dQw4w9WgXcQ", "UCz", published));
        let (manager, _fake, _dir) = manager_with(fake).await;

        manager
            .download_by_url("https://youtu.be/dQw4w9WgXcQ", "1080p")
            .await
            .unwrap();

        let stored = manager.get_video("dQw4w9WgXcQ").await.unwrap();
        assert_eq!(stored.channel_id, "UCz");
        assert!(stored.is_downloaded);

        assert!(matches!(
            manager.download_by_url("https://example.com/watch", "720p").await,
            Err(AppError::Validation(_))
        ));
        assert!(matches!(
            manager.download_by_url("https://youtu.be/aaaaaaaaaaa", "720p").await,
            Err(AppError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_delete_video_removes_files_and_row() {
        let (manager, _fake, dir) = manager_with(FakeExtractor::default()).await;
        manager
            .database()
            .create_video(video("v1", "UCa", Utc::now()))
            .await
            .unwrap();
        manager.download("v1", "720p").await.unwrap();
        let video_dir = dir.path().join("downloads").join("v1");
        assert!(video_dir.is_dir());

        manager.delete_video("v1").await.unwrap();
        assert!(!video_dir.exists());
        assert!(matches!(
            manager.get_video("v1").await,
            Err(AppError::NotFound(_))
        ));
        assert!(matches!(
            manager.delete_video("v1").await,
            Err(AppError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_media_file_requires_download() {
        let (manager, _fake, _dir) = manager_with(FakeExtractor::default()).await;
        manager
            .database()
            .create_video(video("v1", "UCa", Utc::now()))
            .await
            .unwrap();
        assert!(matches!(
            manager.media_file("v1").await,
            Err(AppError::Validation(_))
        ));
    }

    #[tokio::test]
    async fn test_add_channel_resolves_and_deduplicates() {
        let fake = FakeExtractor::default()
            .with_channel(info("UCabc", "Alpha"))
            .with_handle("@alpha", info("UCabc", "Alpha"));
        let (manager, _fake, _dir) = manager_with(fake).await;

        let created = manager
            .add_channel(ChannelCreate {
                id: "UCabc".to_string(),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(created.title, "Alpha");
        assert_eq!(created.description.as_deref(), Some("Alpha description"));

        // handle 解析到已订阅的频道
        let via_handle = manager
            .add_channel(ChannelCreate {
                id: "@alpha".to_string(),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(via_handle.id, "UCabc");
        assert_eq!(manager.list_channels().await.unwrap().len(), 1);

        assert!(matches!(
            manager
                .add_channel(ChannelCreate {
                    id: "UCmissing".to_string(),
                    ..Default::default()
                })
                .await,
            Err(AppError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_add_channel_with_full_details_skips_lookup() {
        let (manager, _fake, _dir) = manager_with(FakeExtractor::default()).await;
        let created = manager
            .add_channel(ChannelCreate {
                id: "UCgiven".to_string(),
                title: Some("Given".to_string()),
                thumbnail_url: Some("https://example.com/t.jpg".to_string()),
                description: None,
            })
            .await
            .unwrap();
        assert_eq!(created.id, "UCgiven");
        assert_eq!(manager.get_channel("UCgiven").await.unwrap().title, "Given");
    }

    #[tokio::test]
    async fn test_unsubscribe_keeps_videos() {
        let (manager, _fake, _dir) = manager_with(FakeExtractor::default()).await;
        manager.database().create_channel(channel("UCa", "A")).await.unwrap();
        manager
            .database()
            .create_video(video("v1", "UCa", Utc::now()))
            .await
            .unwrap();

        manager.delete_channel("UCa").await.unwrap();
        assert!(manager.get_video("v1").await.is_ok());
    }

    #[tokio::test]
    async fn test_dump_includes_all_tables() {
        let (manager, _fake, _dir) = manager_with(FakeExtractor::default()).await;
        manager.database().create_channel(channel("UCa", "A")).await.unwrap();
        manager
            .database()
            .create_video(video("v1", "UCa", Utc::now()))
            .await
            .unwrap();

        let dump = manager.dump().await.unwrap();
        assert_eq!(dump.tables.channels.len(), 1);
        assert_eq!(dump.tables.videos.len(), 1);
        assert!(dump.tables.user_settings.is_some());
    }
}
