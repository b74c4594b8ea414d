//! Tracing subscriber setup shared by the binaries

/// Filter used when `RUST_LOG` is not set
pub const DEFAULT_LOG_FILTER: &str = "offline_yt_viewer=info,tower_http=info";

pub fn init_tracing() {
    init_tracing_with(DEFAULT_LOG_FILTER);
}

/// Install the global fmt subscriber; repeated calls are ignored
pub fn init_tracing_with(default_filter: &str) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| default_filter.into());

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .try_init();
}
