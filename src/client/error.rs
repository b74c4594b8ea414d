use serde_json::Value;

/// Errors surfaced by the typed client
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("Request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("HTTP {status}: {detail}")]
    Http { status: u16, detail: String },

    #[error("Invalid response: {0}")]
    Decode(String),

    #[error("Invalid URL: {0}")]
    Url(#[from] url::ParseError),
}

pub type ClientResult<T> = Result<T, ClientError>;

impl ClientError {
    /// Build an [`ClientError::Http`] from a non-success response body.
    ///
    /// `{"detail": "..."}` yields the string, `{"detail": {"message": ...}}`
    /// the message, anything else the raw body.
    pub fn from_body(status: u16, body: &str) -> Self {
        let detail = match serde_json::from_str::<Value>(body) {
            Ok(Value::Object(map)) => match map.get("detail") {
                Some(Value::String(detail)) => detail.clone(),
                Some(Value::Object(detail)) => detail
                    .get("message")
                    .and_then(Value::as_str)
                    .map(str::to_string)
                    .unwrap_or_else(|| Value::Object(detail.clone()).to_string()),
                Some(other) => other.to_string(),
                None => body.to_string(),
            },
            _ => body.to_string(),
        };
        ClientError::Http { status, detail }
    }

    pub fn status(&self) -> Option<u16> {
        match self {
            ClientError::Http { status, .. } => Some(*status),
            ClientError::Transport(e) => e.status().map(|s| s.as_u16()),
            _ => None,
        }
    }

    pub fn is_not_found(&self) -> bool {
        self.status() == Some(404)
    }
}
