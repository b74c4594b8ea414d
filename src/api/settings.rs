use axum::{extract::State, Json};

use super::{ApiJson, ApiResult, AppState};
use crate::core::models::{DatabaseDump, SettingsUpdate, UserSettings};

pub(super) async fn get_settings(State(state): State<AppState>) -> ApiResult<Json<UserSettings>> {
    Ok(Json(state.manager.settings().await?))
}

pub(super) async fn update_settings(
    State(state): State<AppState>,
    ApiJson(update): ApiJson<SettingsUpdate>,
) -> ApiResult<Json<UserSettings>> {
    Ok(Json(state.manager.update_settings(update).await?))
}

/// Raw table contents for inspection
pub(super) async fn dump_database(State(state): State<AppState>) -> ApiResult<Json<DatabaseDump>> {
    Ok(Json(state.manager.dump().await?))
}
