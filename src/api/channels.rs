use axum::{
    extract::{Path, State},
    Json,
};

use super::{ApiJson, ApiQuery, ApiResult, AppState};
use crate::core::models::{
    Channel, ChannelCreate, ChannelInfo, MessageResponse, SubscriptionOptions,
};

pub(super) async fn list_channels(State(state): State<AppState>) -> ApiResult<Json<Vec<Channel>>> {
    Ok(Json(state.manager.list_channels().await?))
}

pub(super) async fn add_channel(
    State(state): State<AppState>,
    ApiJson(request): ApiJson<ChannelCreate>,
) -> ApiResult<Json<Channel>> {
    Ok(Json(state.manager.add_channel(request).await?))
}

pub(super) async fn get_channel(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<Channel>> {
    Ok(Json(state.manager.get_channel(&id).await?))
}

pub(super) async fn delete_channel(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<MessageResponse>> {
    state.manager.delete_channel(&id).await?;
    Ok(Json(MessageResponse {
        message: format!("Channel {} deleted successfully", id),
    }))
}

pub(super) async fn subscriptions(
    State(state): State<AppState>,
    ApiQuery(options): ApiQuery<SubscriptionOptions>,
) -> ApiResult<Json<Vec<ChannelInfo>>> {
    Ok(Json(state.manager.subscriptions(options).await?))
}
