//! Single source of truth for user settings on the client side

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use tokio::sync::{watch, Mutex};
use tracing::{info, warn};

use super::api_client::SettingsApi;
use super::error::ClientResult;
use crate::core::models::{SettingsUpdate, UserSettings};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Theme {
    Light,
    Dark,
}

impl Theme {
    pub fn from_dark_mode(dark_mode: bool) -> Self {
        if dark_mode {
            Theme::Dark
        } else {
            Theme::Light
        }
    }

    pub fn is_dark(self) -> bool {
        self == Theme::Dark
    }

    pub fn toggled(self) -> Self {
        Self::from_dark_mode(!self.is_dark())
    }
}

impl fmt::Display for Theme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Theme::Light => write!(f, "light"),
            Theme::Dark => write!(f, "dark"),
        }
    }
}

/// Fetched once, cached, updated optimistically.
///
/// A failed save restores the previous value before the error is returned.
pub struct SettingsStore {
    api: Arc<dyn SettingsApi>,
    current: watch::Sender<Option<UserSettings>>,
    // Saves are applied one at a time so rollbacks restore the right value
    saving: Mutex<()>,
}

impl SettingsStore {
    pub fn new(api: Arc<dyn SettingsApi>) -> Self {
        let (current, _) = watch::channel(None);
        Self {
            api,
            current,
            saving: Mutex::new(()),
        }
    }

    /// Cached settings, fetching them on first use
    pub async fn load(&self) -> ClientResult<UserSettings> {
        if let Some(settings) = self.current() {
            return Ok(settings);
        }
        self.refresh().await
    }

    /// Re-fetch from the backend
    pub async fn refresh(&self) -> ClientResult<UserSettings> {
        let settings = self.api.get_settings().await?;
        self.current.send_replace(Some(settings.clone()));
        Ok(settings)
    }

    pub fn current(&self) -> Option<UserSettings> {
        self.current.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<Option<UserSettings>> {
        self.current.subscribe()
    }

    pub async fn save(&self, update: SettingsUpdate) -> ClientResult<UserSettings> {
        let _saving = self.saving.lock().await;
        let previous = self.load().await?;

        self.current
            .send_replace(Some(previous.with_update(&update)));

        match self.api.update_settings(&update).await {
            Ok(saved) => {
                info!("⚙️ Settings saved");
                self.current.send_replace(Some(saved.clone()));
                Ok(saved)
            }
            Err(e) => {
                warn!("Saving settings failed, rolling back: {}", e);
                self.current.send_replace(Some(previous));
                Err(e)
            }
        }
    }

    /// Theme derived from `dark_mode`; light until settings are loaded
    pub fn theme(&self) -> Theme {
        self.current
            .borrow()
            .as_ref()
            .map(|s| Theme::from_dark_mode(s.dark_mode))
            .unwrap_or(Theme::Light)
    }

    pub async fn set_theme(&self, theme: Theme) -> ClientResult<Theme> {
        let mut update = self.load().await?.to_update();
        update.dark_mode = theme.is_dark();
        let saved = self.save(update).await?;
        Ok(Theme::from_dark_mode(saved.dark_mode))
    }

    pub async fn toggle_theme(&self) -> ClientResult<Theme> {
        let current = Theme::from_dark_mode(self.load().await?.dark_mode);
        self.set_theme(current.toggled()).await
    }
}
