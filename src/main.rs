use std::path::PathBuf;
use tokio::signal;
use tracing::{error, info, warn};

use offline_yt_viewer::core::updater::AutoUpdater;
use offline_yt_viewer::{build_manager, router, AppConfig, AppState};

#[derive(Debug, Default)]
struct ServerArgs {
    config: Option<PathBuf>,
    host: Option<String>,
    port: Option<u16>,
}

impl ServerArgs {
    fn parse() -> anyhow::Result<Self> {
        Self::from_iter(std::env::args().skip(1))
    }

    fn from_iter<I>(iter: I) -> anyhow::Result<Self>
    where
        I: IntoIterator<Item = String>,
    {
        let mut parsed = Self::default();
        let mut args = iter.into_iter();
        while let Some(arg) = args.next() {
            let (flag, inline) = match arg.split_once('=') {
                Some((flag, value)) => (flag.to_string(), Some(value.to_string())),
                None => (arg.clone(), None),
            };
            let mut value = |name: &str| {
                inline
                    .clone()
                    .or_else(|| args.next())
                    .ok_or_else(|| anyhow::anyhow!("{} requires a value", name))
            };
            match flag.as_str() {
                "--config" => parsed.config = Some(PathBuf::from(value("--config")?)),
                "--host" => parsed.host = Some(value("--host")?),
                "--port" => {
                    let raw = value("--port")?;
                    parsed.port = Some(
                        raw.parse()
                            .map_err(|_| anyhow::anyhow!("invalid port: {}", raw))?,
                    );
                }
                "-h" | "--help" => {
                    println!("Usage: offline-yt-viewer [--config PATH] [--host HOST] [--port PORT]");
                    std::process::exit(0);
                }
                _ => anyhow::bail!("unknown argument: {}", arg),
            }
        }
        Ok(parsed)
    }
}

fn load_config(args: &ServerArgs) -> anyhow::Result<AppConfig> {
    let mut config = match &args.config {
        Some(path) => AppConfig::load_from(path)?,
        None => AppConfig::load().unwrap_or_else(|err| {
            warn!("Failed to load configuration: {}. Using defaults", err);
            AppConfig::default()
        }),
    };
    if let Some(host) = &args.host {
        config.server.host = host.clone();
    }
    if let Some(port) = args.port {
        config.server.port = port;
    }
    config.validate()?;
    Ok(config)
}

async fn shutdown_signal() {
    if let Err(err) = signal::ctrl_c().await {
        error!("Failed to install Ctrl+C handler: {}", err);
    }
    info!("🛑 Shutting down");
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    offline_yt_viewer::init();

    let args = ServerArgs::parse()?;
    let config = load_config(&args)?;

    let manager = build_manager(&config).await?;
    let _updater = AutoUpdater::spawn(manager.clone());

    let app = router(AppState::new(manager), &config.server.cors_origin);
    let addr = config.bind_address();
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("🚀 Offline YouTube Viewer API listening on http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}
