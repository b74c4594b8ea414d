use axum::{
    extract::{Path, State},
    Json,
};

use super::{ApiJson, ApiQuery, ApiResult, AppState};
use crate::core::models::{
    DownloadByUrlRequest, DownloadProgress, DownloadRequest, DownloadResponse,
    FetchVideosRequest, MessageResponse, Video, VideoPage, VideoQuery,
};

pub(super) async fn list_videos(
    State(state): State<AppState>,
    ApiQuery(query): ApiQuery<VideoQuery>,
) -> ApiResult<Json<VideoPage>> {
    Ok(Json(state.manager.list_videos(&query).await?))
}

pub(super) async fn fetch_videos(
    State(state): State<AppState>,
    ApiJson(request): ApiJson<FetchVideosRequest>,
) -> ApiResult<Json<Vec<Video>>> {
    Ok(Json(state.manager.fetch_videos(&request).await?))
}

pub(super) async fn get_video(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<Video>> {
    Ok(Json(state.manager.get_video(&id).await?))
}

pub(super) async fn download_video(
    State(state): State<AppState>,
    ApiJson(request): ApiJson<DownloadRequest>,
) -> ApiResult<Json<DownloadResponse>> {
    let response = state
        .manager
        .download(&request.video_id, &request.resolution)
        .await?;
    Ok(Json(response))
}

pub(super) async fn download_by_url(
    State(state): State<AppState>,
    ApiJson(request): ApiJson<DownloadByUrlRequest>,
) -> ApiResult<Json<DownloadResponse>> {
    let response = state
        .manager
        .download_by_url(&request.url, &request.resolution)
        .await?;
    Ok(Json(response))
}

pub(super) async fn get_progress(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<DownloadProgress>> {
    Ok(Json(state.manager.progress(&id).await?))
}

pub(super) async fn delete_video(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<MessageResponse>> {
    state.manager.delete_video(&id).await?;
    Ok(Json(MessageResponse {
        message: format!("Video {} deleted successfully", id),
    }))
}
