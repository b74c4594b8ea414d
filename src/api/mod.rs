//! REST surface of the backend
//!
//! Handlers are thin: they decode the request, call the [`DownloadManager`]
//! and map [`AppError`] into an `{ "detail": ... }` response.

mod auth;
mod channels;
mod media;
mod settings;
mod videos;


use axum::{
    extract::{
        multipart::MultipartRejection,
        rejection::{JsonRejection, QueryRejection},
        FromRequest, FromRequestParts,
    },
    http::{header, HeaderValue, Method, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;
use serde_json::{json, Value};
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{error, warn};

use crate::core::manager::DownloadManager;
use crate::core::models::AppError;

/// Shared state handed to every handler
#[derive(Clone)]
pub struct AppState {
    pub manager: Arc<DownloadManager>,
}

impl AppState {
    pub fn new(manager: Arc<DownloadManager>) -> Self {
        Self { manager }
    }
}

/// Error returned by handlers, rendered as `{ "detail": ... }`
#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub detail: Value,
}

impl ApiError {
    pub fn new(status: StatusCode, detail: impl Into<String>) -> Self {
        Self {
            status,
            detail: Value::String(detail.into()),
        }
    }

    pub fn bad_request(detail: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, detail)
    }

    pub fn not_found(detail: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, detail)
    }
}

impl From<AppError> for ApiError {
    fn from(err: AppError) -> Self {
        match err {
            AppError::NotFound(message) => Self::not_found(message),
            AppError::Validation(message) => Self::bad_request(message),
            AppError::AuthRequired(message) => Self {
                status: StatusCode::FORBIDDEN,
                detail: json!({
                    "message": "YouTube requires authentication for this request.",
                    "solution": "Please set up a cookies.txt file with your YouTube credentials.",
                    "additional_info": message,
                }),
            },
            AppError::HtmlResponse(message) => Self {
                status: StatusCode::BAD_REQUEST,
                detail: json!({
                    "message": "YouTube returned an HTML page instead of a video.",
                    "solution": "This usually happens when authentication is required or there's an issue with the video.",
                    "additional_info": message,
                    "check_endpoint": "/api/troubleshooting/downloads",
                }),
            },
            other => {
                error!("Request failed: {}", other);
                Self::new(StatusCode::INTERNAL_SERVER_ERROR, other.to_string())
            }
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self::new(rejection.status(), rejection.body_text())
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        Self::new(rejection.status(), rejection.body_text())
    }
}

impl From<MultipartRejection> for ApiError {
    fn from(rejection: MultipartRejection) -> Self {
        Self::new(rejection.status(), rejection.body_text())
    }
}

/// `Json` body whose rejections render as `{ "detail": ... }`
#[derive(Debug, FromRequest)]
#[from_request(via(axum::Json), rejection(ApiError))]
pub struct ApiJson<T>(pub T);

/// Query string whose rejections render as `{ "detail": ... }`
#[derive(Debug, FromRequestParts)]
#[from_request(via(axum::extract::Query), rejection(ApiError))]
pub struct ApiQuery<T>(pub T);

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        if self.status.is_client_error() {
            warn!("{} {}", self.status, self.detail);
        }
        (self.status, Json(json!({ "detail": self.detail }))).into_response()
    }
}

pub type ApiResult<T> = Result<T, ApiError>;

#[derive(Debug, Serialize)]
struct Welcome {
    message: &'static str,
}

async fn root() -> Json<Welcome> {
    Json(Welcome {
        message: "Welcome to the Offline YouTube Viewer API",
    })
}

/// Build the full application router
pub fn router(state: AppState, cors_origin: &str) -> Router {
    let api = Router::new()
        .route("/videos", get(videos::list_videos))
        .route("/videos/fetch", post(videos::fetch_videos))
        .route("/videos/download", post(videos::download_video))
        .route("/videos/download-by-url", post(videos::download_by_url))
        .route(
            "/videos/{id}",
            get(videos::get_video).delete(videos::delete_video),
        )
        .route("/videos/{id}/progress", get(videos::get_progress))
        .route(
            "/channels",
            get(channels::list_channels).post(channels::add_channel),
        )
        .route(
            "/channels/{id}",
            get(channels::get_channel).delete(channels::delete_channel),
        )
        .route(
            "/settings",
            get(settings::get_settings).put(settings::update_settings),
        )
        .route("/db", get(settings::dump_database))
        .route("/auth/status", get(auth::auth_status))
        .route("/auth/cookies", post(auth::upload_cookies))
        .route("/auth/cookies/browser", post(auth::browser_cookies))
        .route("/troubleshooting/downloads", get(auth::troubleshooting))
        .route("/youtube/subscriptions", get(channels::subscriptions))
        .route("/downloads/{id}", get(media::serve_video));

    Router::new()
        .route("/", get(root))
        .nest("/api", api)
        .route("/downloads/{file}", get(media::serve_static))
        .fallback(|| async { ApiError::not_found("Not Found") })
        .layer(cors_layer(cors_origin))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

fn cors_layer(origin: &str) -> CorsLayer {
    let layer = CorsLayer::new()
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([header::CONTENT_TYPE, header::RANGE, header::AUTHORIZATION])
        .allow_credentials(true);

    match origin.parse::<HeaderValue>() {
        Ok(value) => layer.allow_origin(value),
        Err(e) => {
            warn!("Ignoring invalid CORS origin {:?}: {}", origin, e);
            layer
        }
    }
}
