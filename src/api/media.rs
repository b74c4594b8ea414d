//! Range-aware file serving for downloaded videos

use axum::{
    body::Body,
    extract::{Path, State},
    http::{header, HeaderMap, HeaderValue, StatusCode},
    response::Response,
};
use std::path::PathBuf;
use tokio::fs::File;
use tokio::io::{AsyncReadExt, AsyncSeekExt};
use tokio_util::io::ReaderStream;

use super::{ApiError, ApiResult, AppState};

/// `GET /api/downloads/{id}`
pub(super) async fn serve_video(
    State(state): State<AppState>,
    Path(id): Path<String>,
    headers: HeaderMap,
) -> ApiResult<Response> {
    let (_, path) = state.manager.media_file(&id).await?;
    stream_file(path, &headers).await
}

/// `GET /downloads/{file}`
pub(super) async fn serve_static(
    State(state): State<AppState>,
    Path(file): Path<String>,
    headers: HeaderMap,
) -> ApiResult<Response> {
    let path = state.manager.static_file(&file).await?;
    stream_file(path, &headers).await
}

async fn stream_file(path: PathBuf, headers: &HeaderMap) -> ApiResult<Response> {
    let mut file = File::open(&path)
        .await
        .map_err(|_| ApiError::not_found("File not found"))?;
    let size = file
        .metadata()
        .await
        .map_err(|_| ApiError::not_found("File not found"))?
        .len();

    let mime = mime_guess::from_path(&path).first_or_octet_stream();
    let range = headers
        .get(header::RANGE)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| parse_range_header(value, size));

    let builder = Response::builder()
        .header(header::ACCEPT_RANGES, "bytes")
        .header(header::CONTENT_TYPE, mime.as_ref());

    let response = match range {
        Some((start, _)) if start >= size => builder
            .status(StatusCode::RANGE_NOT_SATISFIABLE)
            .header(header::CONTENT_RANGE, format!("bytes */{}", size))
            .body(Body::empty()),
        Some((start, end)) => {
            let end = end.min(size.saturating_sub(1));
            let length = end - start + 1;
            file.seek(std::io::SeekFrom::Start(start))
                .await
                .map_err(|e| ApiError::new(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))?;
            builder
                .status(StatusCode::PARTIAL_CONTENT)
                .header(
                    header::CONTENT_RANGE,
                    format!("bytes {}-{}/{}", start, end, size),
                )
                .header(header::CONTENT_LENGTH, HeaderValue::from(length))
                .body(Body::from_stream(ReaderStream::new(file.take(length))))
        }
        None => builder
            .status(StatusCode::OK)
            .header(header::CONTENT_LENGTH, HeaderValue::from(size))
            .body(Body::from_stream(ReaderStream::new(file))),
    };

    response.map_err(|e| ApiError::new(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))
}

/// Parse a single `bytes=` range; `None` means serve the whole file
pub fn parse_range_header(value: &str, size: u64) -> Option<(u64, u64)> {
    let range = value.trim().strip_prefix("bytes=")?.trim();
    // Multi-range requests fall back to the full body
    if range.is_empty() || range.contains(',') {
        return None;
    }
    let (start, end) = range.split_once('-')?;

    if start.is_empty() {
        let suffix: u64 = end.parse().ok()?;
        if suffix == 0 {
            return None;
        }
        return Some((size.saturating_sub(suffix), size.saturating_sub(1)));
    }

    let start: u64 = start.parse().ok()?;
    let end = if end.is_empty() {
        size.saturating_sub(1)
    } else {
        end.parse().ok()?
    };
    (end >= start).then_some((start, end))
}
