//! Error types for medicine checks.

use std::time::Duration;

/// Maximum length of an upstream error body kept in an error message.
const MAX_ERROR_MESSAGE_LEN: usize = 500;

/// Errors that can occur while acquiring, preparing or analyzing an image.
#[derive(Debug, thiserror::Error)]
pub enum MedCheckError {
    /// API key missing or invalid.
    #[error("authentication failed: {0}")]
    Auth(String),

    /// API returned an error response.
    #[error("API error: {status} - {message}")]
    Api { status: u16, message: String },

    /// Rate limit exceeded.
    #[error("rate limited, retry after {retry_after:?}")]
    RateLimited { retry_after: Option<Duration> },

    /// Operation timed out (camera capture or inference call).
    #[error("operation timed out after {0:?}")]
    Timeout(Duration),

    /// Prompt or response was blocked by safety filters.
    #[error("content blocked: {0}")]
    ContentBlocked(String),

    /// The model answered without any usable text.
    #[error("Gemini returned an empty or invalid response")]
    EmptyResponse,

    /// Invalid request parameters.
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// Network or HTTP error.
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    /// Image could not be decoded or encoded.
    #[error("image error: {0}")]
    Image(#[from] image::ImageError),

    /// File is not an image we can read.
    #[error("unsupported image: {0}")]
    UnsupportedImage(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration file could not be read or parsed.
    #[error("config error: {0}")]
    Config(String),

    /// The camera device exists but the current user may not open it.
    #[error("camera permission denied: {0}")]
    CameraPermissionDenied(String),

    /// No program is available to take a photo.
    #[error("camera unavailable: {0}")]
    CameraUnavailable(String),

    /// The temporary file for a camera photo could not be created.
    #[error("unable to create capture file: {0}")]
    CaptureFile(String),

    /// The capture program ran but produced no photo.
    #[error("capture cancelled: {0}")]
    CaptureCancelled(String),

    /// A background task failed to complete.
    #[error("background task failed: {0}")]
    Task(String),
}

impl MedCheckError {
    /// Returns true if this error is likely transient and worth retrying.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::RateLimited { .. } | Self::Timeout(_) | Self::Network(_)
        )
    }

    /// Returns the suggested retry delay, if available.
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            Self::RateLimited { retry_after } => *retry_after,
            Self::Timeout(_) => Some(Duration::from_secs(1)),
            Self::Network(_) => Some(Duration::from_secs(2)),
            _ => None,
        }
    }
}

impl From<tokio::task::JoinError> for MedCheckError {
    fn from(err: tokio::task::JoinError) -> Self {
        Self::Task(err.to_string())
    }
}

/// Result type alias for medicine check operations.
pub type Result<T> = std::result::Result<T, MedCheckError>;

/// Reads a `Retry-After` header expressed in seconds.
pub(crate) fn parse_retry_after(headers: &reqwest::header::HeaderMap) -> Option<u64> {
    headers
        .get(reqwest::header::RETRY_AFTER)?
        .to_str()
        .ok()?
        .trim()
        .parse()
        .ok()
}

/// Removes API keys from upstream error text and caps its length.
pub(crate) fn sanitize_error_message(text: &str) -> String {
    let redacted: Vec<String> = text
        .split_inclusive(|c: char| c.is_whitespace() || c == '"' || c == '&' || c == '?')
        .map(redact_token)
        .collect();
    let mut out = redacted.concat().trim().to_string();

    if out.chars().count() > MAX_ERROR_MESSAGE_LEN {
        out = out.chars().take(MAX_ERROR_MESSAGE_LEN).collect();
        out.push_str("...");
    }
    out
}

fn redact_token(token: &str) -> String {
    let body = token.trim_end_matches(|c: char| c.is_whitespace() || c == '"' || c == '&' || c == '?');
    let tail = &token[body.len()..];

    if let Some(rest) = body.strip_prefix("key=") {
        if !rest.is_empty() {
            return format!("key=[REDACTED]{tail}");
        }
    }
    if body.starts_with("AIza") && body.len() > 20 {
        return format!("[REDACTED]{tail}");
    }
    token.to_string()
}
