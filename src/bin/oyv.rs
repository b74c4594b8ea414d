//! Terminal client for the Offline YouTube Viewer backend

use anyhow::{anyhow, bail, Context, Result};
use std::io::Write;
use std::sync::Arc;
use std::time::Duration;

use offline_yt_viewer::client::{
    ApiClient, ChannelsPage, DownloadEntry, DownloadTracker, DownloadsPage, HomeFilter, HomePage,
    Pager, SettingsStore, VideoCatalog,
};
use offline_yt_viewer::core::models::{SettingsUpdate, Video, VideoPage};
use offline_yt_viewer::utils::validation;
use offline_yt_viewer::AppConfig;

const USAGE: &str = "Usage: oyv [--server URL] <command> [args]

Commands:
  list [--downloaded] [--channel ID] [--days N] [--page N]
  downloads [--page N]
  fetch (<channel-id> | --all) [--days N]
  download <video-id | url> [--resolution RES]
  delete <video-id>
  channels
  subscribe <channel-id | @handle>
  unsubscribe <channel-id>
  settings [key=value ...]
  theme
  auth
  cookies <file>";

struct Cli {
    server: Option<String>,
    command: String,
    rest: Vec<String>,
}

impl Cli {
    fn parse() -> Result<Self> {
        Self::from_iter(std::env::args().skip(1))
    }

    fn from_iter<I>(iter: I) -> Result<Self>
    where
        I: IntoIterator<Item = String>,
    {
        let mut server = None;
        let mut args = iter.into_iter();
        while let Some(arg) = args.next() {
            if let Some(value) = arg.strip_prefix("--server=") {
                server = Some(value.to_string());
                continue;
            }
            match arg.as_str() {
                "--server" => {
                    server = Some(args.next().ok_or_else(|| anyhow!("--server requires a value"))?)
                }
                "-h" | "--help" => break,
                _ => {
                    return Ok(Self {
                        server,
                        command: arg,
                        rest: args.collect(),
                    })
                }
            }
        }
        bail!("{}", USAGE)
    }
}

/// `--name value` lookup inside a command's arguments
fn flag_value(args: &[String], name: &str) -> Option<String> {
    args.iter()
        .position(|a| a == name)
        .and_then(|i| args.get(i + 1).cloned())
}

fn flag_number(args: &[String], name: &str) -> Result<Option<i64>> {
    flag_value(args, name)
        .map(|v| v.parse().with_context(|| format!("{} expects a number", name)))
        .transpose()
}

fn positional(args: &[String]) -> Option<&String> {
    let mut skip = false;
    for arg in args {
        if skip {
            skip = false;
            continue;
        }
        if arg.starts_with("--") {
            skip = !matches!(arg.as_str(), "--downloaded" | "--all");
            continue;
        }
        return Some(arg);
    }
    None
}

fn print_videos(page: &VideoPage, pager: Pager) {
    for video in &page.videos {
        print_video(video);
    }
    println!(
        "-- page {} of {} ({} videos)",
        pager.page,
        pager.total_pages(page.total).max(1),
        page.total
    );
}

fn print_video(video: &Video) {
    let status = if video.is_downloaded {
        format!("[{}]", video.downloaded_resolution.as_deref().unwrap_or("done"))
    } else {
        "[ ]".to_string()
    };
    println!(
        "{:<8} {} {}  {}  {}",
        status,
        video.id,
        video.published_at.format("%Y-%m-%d"),
        video.channel_id,
        video.title
    );
}

fn render_progress(entry: &DownloadEntry) {
    let width = 30;
    let filled = (entry.progress * width as f64).round() as usize;
    print!(
        "\r{} [{}{}] {:>5.1}%",
        entry.video_id,
        "#".repeat(filled.min(width)),
        " ".repeat(width - filled.min(width)),
        entry.progress * 100.0
    );
    let _ = std::io::stdout().flush();
}

async fn download(client: &ApiClient, config: &AppConfig, args: &[String]) -> Result<()> {
    let target = positional(args).ok_or_else(|| anyhow!("download requires a video id or url"))?;
    let settings = client.get_settings().await?;
    let resolution = flag_value(args, "--resolution").unwrap_or(settings.default_resolution);

    if target.contains("://") {
        let video_id = validation::extract_video_id(target)?;
        println!("Downloading {} at {} ...", video_id, resolution);
        let response = client.download_by_url(target, &resolution).await?;
        println!("{}", response.message);
        return Ok(());
    }

    let tracker = DownloadTracker::new(
        Arc::new(client.clone()),
        Duration::from_millis(config.client.poll_interval_ms),
    );
    let mut changes = tracker.subscribe();
    tracker.start_download(target, &resolution);

    loop {
        let entry = changes
            .borrow_and_update()
            .iter()
            .find(|e| &e.video_id == target)
            .cloned();
        if let Some(entry) = entry {
            render_progress(&entry);
            if let Some(error) = entry.error {
                println!();
                bail!("download failed: {}", error);
            }
            if entry.complete {
                println!();
                println!("✅ {} downloaded at {}", target, resolution);
                return Ok(());
            }
        }
        if changes.changed().await.is_err() {
            bail!("download tracker stopped");
        }
    }
}

fn apply_setting(update: &mut SettingsUpdate, pair: &str) -> Result<()> {
    let (key, value) = pair
        .split_once('=')
        .ok_or_else(|| anyhow!("expected key=value, got {}", pair))?;
    match key {
        "download_directory" => update.download_directory = value.to_string(),
        "default_resolution" => update.default_resolution = value.to_string(),
        "max_concurrent_downloads" => update.max_concurrent_downloads = value.parse()?,
        "auto_update_interval" => update.auto_update_interval = value.parse()?,
        "dark_mode" => update.dark_mode = value.parse()?,
        _ => bail!("unknown setting: {}", key),
    }
    Ok(())
}

async fn run(cli: Cli) -> Result<()> {
    let mut config = AppConfig::load().unwrap_or_default();
    if let Some(server) = cli.server {
        config.client.base_url = server;
    }
    let client = ApiClient::from_config(&config.client)?;
    let catalog = VideoCatalog::new(client.clone());
    let args = cli.rest;

    match cli.command.as_str() {
        "list" => {
            let filter = HomeFilter {
                channel_id: flag_value(&args, "--channel"),
                days: flag_number(&args, "--days")?,
                downloaded: args.iter().any(|a| a == "--downloaded").then_some(true),
            };
            let mut home = HomePage::new(filter);
            home.pager = Pager::new(flag_number(&args, "--page")?.unwrap_or(1), 10);
            print_videos(&home.load(&catalog).await?, home.pager);
        }
        "downloads" => {
            let page = DownloadsPage {
                pager: Pager::new(flag_number(&args, "--page")?.unwrap_or(1), 10),
            };
            print_videos(&page.load(&catalog).await?, page.pager);
        }
        "fetch" => {
            let channels = ChannelsPage::new(catalog.clone());
            let channel = if args.iter().any(|a| a == "--all") {
                None
            } else {
                Some(
                    positional(&args)
                        .ok_or_else(|| anyhow!("fetch requires a channel id or --all"))?
                        .as_str(),
                )
            };
            let videos = channels.refresh(channel, flag_number(&args, "--days")?).await?;
            println!("Processed {} videos", videos.len());
        }
        "download" => download(&client, &config, &args).await?,
        "delete" => {
            let id = positional(&args).ok_or_else(|| anyhow!("delete requires a video id"))?;
            println!("{}", catalog.delete_video(id).await?.message);
        }
        "channels" => {
            for channel in ChannelsPage::new(catalog.clone()).channels().await? {
                println!(
                    "{}  {}  (updated {})",
                    channel.id,
                    channel.title,
                    channel.last_updated.format("%Y-%m-%d %H:%M")
                );
            }
        }
        "subscribe" => {
            let id = positional(&args).ok_or_else(|| anyhow!("subscribe requires a channel id"))?;
            let channel = ChannelsPage::new(catalog.clone()).subscribe(id).await?;
            println!("Subscribed to {} ({})", channel.title, channel.id);
        }
        "unsubscribe" => {
            let id =
                positional(&args).ok_or_else(|| anyhow!("unsubscribe requires a channel id"))?;
            println!("{}", ChannelsPage::new(catalog.clone()).unsubscribe(id).await?.message);
        }
        "settings" => {
            let store = SettingsStore::new(Arc::new(client.clone()));
            let mut settings = store.load().await?;
            if !args.is_empty() {
                let mut update = settings.to_update();
                for pair in &args {
                    apply_setting(&mut update, pair)?;
                }
                settings = store.save(update).await?;
            }
            println!("{}", serde_json::to_string_pretty(&settings)?);
        }
        "theme" => {
            let store = SettingsStore::new(Arc::new(client.clone()));
            println!("Theme is now {}", store.toggle_theme().await?);
        }
        "auth" => {
            let status = client.auth_status().await?;
            println!("{}", serde_json::to_string_pretty(&status)?);
        }
        "cookies" => {
            let path = positional(&args).ok_or_else(|| anyhow!("cookies requires a file"))?;
            let content =
                std::fs::read(path).with_context(|| format!("Failed to read {}", path))?;
            let response = client.upload_cookies(content, "cookies.txt").await?;
            println!("{} ({} bytes)", response.message, response.file_size);
        }
        other => bail!("unknown command: {}\n\n{}", other, USAGE),
    }
    Ok(())
}

#[tokio::main]
async fn main() {
    offline_yt_viewer::utils::logging::init_tracing_with("warn");

    let result = match Cli::parse() {
        Ok(cli) => run(cli).await,
        Err(e) => Err(e),
    };
    if let Err(error) = result {
        eprintln!("Error: {error:#}");
        std::process::exit(1);
    }
}
