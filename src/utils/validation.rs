//! URL and input validation utilities

use url::Url;

use crate::core::models::{AppError, AppResult};

fn is_video_id(candidate: &str) -> bool {
    candidate.len() == 11
        && candidate
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
}

/// Extract the video id from a YouTube URL or accept a bare 11-character id.
///
/// Understands `watch?v=`, `youtu.be/`, `/shorts/`, `/embed/` and `/live/` links.
pub fn extract_video_id(input: &str) -> AppResult<String> {
    let input = input.trim();
    if is_video_id(input) {
        return Ok(input.to_string());
    }

    let parsed = Url::parse(input)
        .map_err(|e| AppError::Validation(format!("Invalid URL format: {}", e)))?;

    if parsed.scheme() != "http" && parsed.scheme() != "https" {
        return Err(AppError::Validation(format!(
            "Unsupported URL scheme: {}",
            parsed.scheme()
        )));
    }

    let host = parsed
        .host_str()
        .unwrap_or_default()
        .trim_start_matches("www.")
        .trim_start_matches("m.")
        .to_ascii_lowercase();

    let candidate = match host.as_str() {
        "youtu.be" => parsed
            .path_segments()
            .and_then(|mut segments| segments.next())
            .map(str::to_string),
        "youtube.com" | "music.youtube.com" | "youtube-nocookie.com" => {
            let segments: Vec<&str> = parsed
                .path_segments()
                .map(|segments| segments.filter(|s| !s.is_empty()).collect())
                .unwrap_or_default();
            match segments.as_slice() {
                ["watch"] => parsed
                    .query_pairs()
                    .find(|(key, _)| key == "v")
                    .map(|(_, value)| value.into_owned()),
                ["shorts" | "embed" | "live" | "v", id, ..] => Some(id.to_string()),
                _ => None,
            }
        }
        _ => {
            return Err(AppError::Validation(format!(
                "Not a YouTube URL: {}",
                input
            )))
        }
    };

    candidate
        .filter(|id| is_video_id(id))
        .ok_or_else(|| AppError::Validation(format!("No video id found in URL: {}", input)))
}

/// Reject empty or obviously malformed resolution labels
pub fn validate_resolution(resolution: &str) -> AppResult<()> {
    let trimmed = resolution.trim();
    if trimmed.is_empty() {
        return Err(AppError::Validation("Resolution must not be empty".to_string()));
    }
    if trimmed.chars().any(char::is_whitespace) {
        return Err(AppError::Validation(format!(
            "Invalid resolution: {}",
            resolution
        )));
    }
    Ok(())
}
