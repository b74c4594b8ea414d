//! Typed HTTP client for the backend REST API
//!
//! Every method maps one endpoint; failures are logged and returned.

use async_trait::async_trait;
use reqwest::{multipart, Client, Method, RequestBuilder};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{json, Value};
use std::time::Duration;
use tracing::{debug, warn};
use url::Url;

use super::error::{ClientError, ClientResult};
use crate::core::config::ClientConfig;
use crate::core::models::{
    AuthStatus, Channel, ChannelCreate, ChannelInfo, CookieUploadResponse, DownloadProgress,
    DownloadResponse, FetchVideosRequest, MessageResponse, SettingsUpdate, SubscriptionOptions,
    UserSettings, Video, VideoPage, VideoQuery,
};

/// Calls the download tracker depends on
#[async_trait]
pub trait DownloadApi: Send + Sync {
    async fn download_video(
        &self,
        video_id: &str,
        resolution: &str,
    ) -> ClientResult<DownloadResponse>;

    async fn get_progress(&self, video_id: &str) -> ClientResult<DownloadProgress>;
}

/// Calls the settings store depends on
#[async_trait]
pub trait SettingsApi: Send + Sync {
    async fn get_settings(&self) -> ClientResult<UserSettings>;

    async fn update_settings(&self, update: &SettingsUpdate) -> ClientResult<UserSettings>;
}

#[derive(Debug, Clone)]
pub struct ApiClient {
    http: Client,
    base: Url,
    timeout: Duration,
}

impl ApiClient {
    pub fn new(base_url: &str) -> ClientResult<Self> {
        Self::with_timeout(base_url, Duration::from_secs(30))
    }

    pub fn from_config(config: &ClientConfig) -> ClientResult<Self> {
        Self::with_timeout(
            &config.base_url,
            Duration::from_secs(config.request_timeout_secs),
        )
    }

    /// `timeout` applies to every call except downloads, which block until yt-dlp exits
    pub fn with_timeout(base_url: &str, timeout: Duration) -> ClientResult<Self> {
        let mut base = Url::parse(base_url)?;
        if !base.path().ends_with('/') {
            let path = format!("{}/", base.path());
            base.set_path(&path);
        }
        let http = Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .user_agent(concat!("oyv/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self {
            http,
            base,
            timeout,
        })
    }

    pub fn base_url(&self) -> &Url {
        &self.base
    }

    fn url(&self, path: &str) -> ClientResult<Url> {
        Ok(self.base.join(path.trim_start_matches('/'))?)
    }

    fn request(&self, method: Method, path: &str) -> ClientResult<RequestBuilder> {
        let url = self.url(path)?;
        debug!("{} {}", method, url);
        Ok(self.http.request(method, url).timeout(self.timeout))
    }

    async fn send<T: DeserializeOwned>(&self, request: RequestBuilder) -> ClientResult<T> {
        let response = request.send().await.map_err(|e| {
            warn!("Request failed: {}", e);
            ClientError::Transport(e)
        })?;

        let status = response.status();
        let body = response.bytes().await?;
        if !status.is_success() {
            let err = ClientError::from_body(status.as_u16(), &String::from_utf8_lossy(&body));
            warn!("{}", err);
            return Err(err);
        }

        serde_json::from_slice(&body).map_err(|e| {
            warn!("Failed to decode response: {}", e);
            ClientError::Decode(e.to_string())
        })
    }

    async fn get<T: DeserializeOwned>(&self, path: &str) -> ClientResult<T> {
        self.send(self.request(Method::GET, path)?).await
    }

    async fn post<B: Serialize + ?Sized, T: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
    ) -> ClientResult<T> {
        self.send(self.request(Method::POST, path)?.json(body)).await
    }

    // ---- videos ----

    pub async fn get_videos(&self, query: &VideoQuery) -> ClientResult<VideoPage> {
        self.send(self.request(Method::GET, "api/videos")?.query(query))
            .await
    }

    pub async fn get_video(&self, video_id: &str) -> ClientResult<Video> {
        self.get(&format!("api/videos/{}", video_id)).await
    }

    pub async fn fetch_videos(&self, request: &FetchVideosRequest) -> ClientResult<Vec<Video>> {
        self.post("api/videos/fetch", request).await
    }

    pub async fn download_video(
        &self,
        video_id: &str,
        resolution: &str,
    ) -> ClientResult<DownloadResponse> {
        let body = json!({ "video_id": video_id, "resolution": resolution });
        let request = self.http.post(self.url("api/videos/download")?).json(&body);
        self.send(request).await
    }

    pub async fn download_by_url(
        &self,
        url: &str,
        resolution: &str,
    ) -> ClientResult<DownloadResponse> {
        let body = json!({ "url": url, "resolution": resolution });
        let request = self
            .http
            .post(self.url("api/videos/download-by-url")?)
            .json(&body);
        self.send(request).await
    }

    pub async fn get_progress(&self, video_id: &str) -> ClientResult<DownloadProgress> {
        self.get(&format!("api/videos/{}/progress", video_id)).await
    }

    pub async fn delete_video(&self, video_id: &str) -> ClientResult<MessageResponse> {
        self.send(self.request(Method::DELETE, &format!("api/videos/{}", video_id))?)
            .await
    }

    /// Streaming URL of a downloaded video
    pub fn video_file_url(&self, video_id: &str) -> ClientResult<Url> {
        self.url(&format!("api/downloads/{}", video_id))
    }

    // ---- channels ----

    pub async fn get_channels(&self) -> ClientResult<Vec<Channel>> {
        self.get("api/channels").await
    }

    pub async fn get_channel(&self, channel_id: &str) -> ClientResult<Channel> {
        self.get(&format!("api/channels/{}", channel_id)).await
    }

    pub async fn add_channel(&self, request: &ChannelCreate) -> ClientResult<Channel> {
        self.post("api/channels", request).await
    }

    pub async fn delete_channel(&self, channel_id: &str) -> ClientResult<MessageResponse> {
        self.send(self.request(Method::DELETE, &format!("api/channels/{}", channel_id))?)
            .await
    }

    pub async fn get_subscriptions(
        &self,
        skip_auth_check: bool,
        fast: bool,
    ) -> ClientResult<Vec<ChannelInfo>> {
        let options = SubscriptionOptions {
            skip_auth_check,
            fast,
        };
        self.send(
            self.request(Method::GET, "api/youtube/subscriptions")?
                .query(&options),
        )
        .await
    }

    // ---- settings ----

    pub async fn get_settings(&self) -> ClientResult<UserSettings> {
        self.get("api/settings").await
    }

    pub async fn update_settings(&self, update: &SettingsUpdate) -> ClientResult<UserSettings> {
        self.send(self.request(Method::PUT, "api/settings")?.json(update))
            .await
    }

    // ---- auth ----

    pub async fn auth_status(&self) -> ClientResult<AuthStatus> {
        self.get("api/auth/status").await
    }

    pub async fn upload_cookies(
        &self,
        content: Vec<u8>,
        file_name: &str,
    ) -> ClientResult<CookieUploadResponse> {
        let part = multipart::Part::bytes(content)
            .file_name(file_name.to_string())
            .mime_str("text/plain")?;
        let form = multipart::Form::new().part("file", part);
        self.send(self.request(Method::POST, "api/auth/cookies")?.multipart(form))
            .await
    }

    pub async fn import_browser_cookies(&self, browser: &str) -> ClientResult<CookieUploadResponse> {
        self.post("api/auth/cookies/browser", &json!({ "browser": browser }))
            .await
    }

    pub async fn troubleshooting(&self) -> ClientResult<Value> {
        self.get("api/troubleshooting/downloads").await
    }
}

#[async_trait]
impl DownloadApi for ApiClient {
    async fn download_video(
        &self,
        video_id: &str,
        resolution: &str,
    ) -> ClientResult<DownloadResponse> {
        ApiClient::download_video(self, video_id, resolution).await
    }

    async fn get_progress(&self, video_id: &str) -> ClientResult<DownloadProgress> {
        ApiClient::get_progress(self, video_id).await
    }
}

#[async_trait]
impl SettingsApi for ApiClient {
    async fn get_settings(&self) -> ClientResult<UserSettings> {
        ApiClient::get_settings(self).await
    }

    async fn update_settings(&self, update: &SettingsUpdate) -> ClientResult<UserSettings> {
        ApiClient::update_settings(self, update).await
    }
}
