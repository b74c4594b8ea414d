use axum::{
    extract::{multipart::MultipartRejection, Multipart, State},
    Json,
};
use serde_json::{json, Value};

use super::{ApiError, ApiJson, ApiResult, AppState};
use crate::core::manager::COOKIE_SETUP_INSTRUCTIONS;
use crate::core::models::{AuthStatus, BrowserCookiesRequest, CookieUploadResponse};
use crate::core::youtube::locate_tool;
use crate::utils::file_utils;

pub(super) async fn auth_status(State(state): State<AppState>) -> Json<AuthStatus> {
    Json(state.manager.auth_status().await)
}

/// Accepts a multipart form with a `file` field holding a Netscape cookies file
pub(super) async fn upload_cookies(
    State(state): State<AppState>,
    multipart: Result<Multipart, MultipartRejection>,
) -> ApiResult<Json<CookieUploadResponse>> {
    let mut multipart = multipart?;
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::bad_request(format!("Invalid multipart body: {}", e)))?
    {
        if field.name() != Some("file") {
            continue;
        }

        let is_text = field
            .content_type()
            .map(|ct| ct.contains("text"))
            .unwrap_or(false);
        if !is_text {
            return Err(ApiError::bad_request("File must be a text file"));
        }

        let content = field
            .bytes()
            .await
            .map_err(|e| ApiError::bad_request(format!("Failed to read upload: {}", e)))?;
        return Ok(Json(state.manager.store_cookies(&content).await?));
    }

    Err(ApiError::bad_request("Missing file field"))
}

pub(super) async fn browser_cookies(
    State(state): State<AppState>,
    ApiJson(request): ApiJson<BrowserCookiesRequest>,
) -> ApiResult<Json<CookieUploadResponse>> {
    Ok(Json(
        state.manager.import_browser_cookies(&request.browser).await?,
    ))
}

/// Environment report for diagnosing failed downloads
pub(super) async fn troubleshooting(State(state): State<AppState>) -> ApiResult<Json<Value>> {
    let manager = &state.manager;
    let has_cookies = manager.has_cookies();
    let tools = manager.tools();
    let ffmpeg = locate_tool(&tools.ffmpeg_path);
    let yt_dlp = locate_tool(&tools.yt_dlp_path);

    let settings = manager.settings().await?;
    let download_dir = manager.download_dir(&settings);
    let download_dir_writable = file_utils::ensure_writable_dir(&download_dir).is_ok();

    let setup_instructions: Vec<&str> = if has_cookies {
        Vec::new()
    } else {
        COOKIE_SETUP_INSTRUCTIONS.to_vec()
    };
    let ffmpeg_instructions: Vec<&str> = if ffmpeg.is_some() {
        Vec::new()
    } else {
        vec![
            "Install ffmpeg using your package manager:",
            "macOS: brew install ffmpeg",
            "Ubuntu/Debian: sudo apt install ffmpeg",
            "Windows: Download from https://ffmpeg.org/download.html",
            "After installation, restart the application",
        ]
    };

    Ok(Json(json!({
        "common_issues": [
            {
                "issue": "403 Forbidden errors",
                "possible_causes": [
                    "YouTube is blocking automated downloads",
                    "The video requires authentication",
                    "Geographic restrictions apply to the video"
                ],
                "solutions": [
                    "Set up a cookies.txt file with your YouTube credentials",
                    "Try using a different video resolution",
                    "Make sure ffmpeg is installed for proper post-processing",
                    "Try using a VPN if the video is region-restricted"
                ]
            },
            {
                "issue": "Sign in to confirm you're not a bot",
                "possible_causes": [
                    "YouTube's anti-bot mechanisms are detecting the downloader"
                ],
                "solutions": [
                    "Set up a cookies.txt file with valid YouTube login credentials",
                    "Reduce the frequency of download requests",
                    "Update your cookies.txt file if it's more than a few days old"
                ]
            },
            {
                "issue": "HTML files downloaded instead of videos",
                "possible_causes": [
                    "YouTube is returning an error page instead of the video",
                    "Authentication required",
                    "Video is restricted or removed"
                ],
                "solutions": [
                    "Ensure you have a valid cookies.txt file",
                    "Check if the video is still available on YouTube directly",
                    "Try a different video to rule out specific video issues"
                ]
            }
        ],
        "authentication_status": {
            "cookies_file_exists": has_cookies,
            "cookies_path": manager.cookies_path(),
            "setup_instructions": setup_instructions,
        },
        "ffmpeg_status": {
            "installed": ffmpeg.is_some(),
            "path": ffmpeg,
            "installation_instructions": ffmpeg_instructions,
        },
        "yt_dlp_status": {
            "installed": yt_dlp.is_some(),
            "path": yt_dlp,
        },
        "download_directory": {
            "path": download_dir,
            "writable": download_dir_writable,
        },
        "alternative_methods": [
            "Try a lower resolution (e.g. 720p instead of 1080p)",
            "Make sure your cookies are fresh (logged in recently to YouTube)",
            "Some videos may have download restrictions - not all videos can be downloaded"
        ]
    })))
}
