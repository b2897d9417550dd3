//! Configuration loading and resolution.
//!
//! Settings live in a TOML file (`MEDCHECK_CONFIG`, else
//! `<config dir>/medcheck/config.toml`). A missing file means defaults.
//!
//! ```toml
//! retries = 1
//!
//! [gemini]
//! model = "gemini-2.5-flash"
//! timeout_secs = 120
//!
//! [image]
//! max_dimension = 1024
//! jpeg_quality = 75
//!
//! [camera]
//! command = ["fswebcam", "--no-banner", "-r", "1920x1080", "{output}"]
//! device = "/dev/video0"
//!
//! [prompt]
//! language = "en"
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{MedCheckError, Result};
use crate::prepare::{PrepareOptions, DEFAULT_JPEG_QUALITY, DEFAULT_MAX_DIMENSION};
use crate::prompt::PromptLanguage;

/// Default config file name within the config directory.
const CONFIG_FILE_NAME: &str = "config.toml";

/// Application directory name under the platform config/cache dirs.
const APP_DIR: &str = "medcheck";

/// Full application configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// Retries on transient inference failures.
    pub retries: u32,
    /// Inference endpoint settings.
    pub gemini: GeminiConfig,
    /// Upload preparation settings.
    pub image: ImageConfig,
    /// Camera capture settings.
    pub camera: CameraConfig,
    /// Prompt settings.
    pub prompt: PromptConfig,
}

/// Inference endpoint settings.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct GeminiConfig {
    /// API key; environment variables are used when absent.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    /// Model identifier, e.g. `gemini-2.5-flash`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    /// REST base URL override.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
    /// Request timeout in seconds.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timeout_secs: Option<u64>,
}

/// Upload preparation settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ImageConfig {
    /// Longest edge in pixels.
    pub max_dimension: u32,
    /// JPEG quality, 1-100.
    pub jpeg_quality: u8,
}

impl Default for ImageConfig {
    fn default() -> Self {
        Self {
            max_dimension: DEFAULT_MAX_DIMENSION,
            jpeg_quality: DEFAULT_JPEG_QUALITY,
        }
    }
}

/// Camera capture settings.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CameraConfig {
    /// Capture argv; `{output}` and `{device}` are substituted.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub command: Option<Vec<String>>,
    /// Video device node.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub device: Option<PathBuf>,
    /// Seconds allowed for one capture.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timeout_secs: Option<u64>,
    /// Directory for temporary captures.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub capture_dir: Option<PathBuf>,
}

/// Prompt settings.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PromptConfig {
    /// Summary language.
    pub language: PromptLanguage,
}

impl Config {
    /// Options for image preparation.
    pub fn prepare_options(&self) -> PrepareOptions {
        PrepareOptions::default()
            .with_max_dimension(self.image.max_dimension)
            .with_jpeg_quality(self.image.jpeg_quality)
    }

    /// Directory holding temporary camera captures.
    pub fn capture_dir(&self) -> PathBuf {
        if let Some(dir) = &self.camera.capture_dir {
            return dir.clone();
        }
        dirs::cache_dir()
            .unwrap_or_else(std::env::temp_dir)
            .join(APP_DIR)
            .join("captures")
    }

    /// Inference request timeout, if configured.
    pub fn gemini_timeout(&self) -> Option<Duration> {
        self.gemini.timeout_secs.map(Duration::from_secs)
    }

    /// Copy safe to print: the API key is masked.
    pub fn redacted(&self) -> Self {
        let mut copy = self.clone();
        if let Some(key) = copy.gemini.api_key.as_mut() {
            *key = redact_key(key);
        }
        copy
    }
}

fn redact_key(key: &str) -> String {
    let count = key.chars().count();
    if count <= 8 {
        return "****".to_string();
    }
    let visible: String = key.chars().skip(count - 4).collect();
    format!("****{visible}")
}

/// Resolve the config file path.
/// Priority: `MEDCHECK_CONFIG` env > `<config dir>/medcheck/config.toml`.
pub fn config_file_path() -> PathBuf {
    if let Ok(path) = std::env::var("MEDCHECK_CONFIG") {
        if !path.trim().is_empty() {
            return PathBuf::from(path);
        }
    }
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(APP_DIR)
        .join(CONFIG_FILE_NAME)
}

/// Load and parse the config from disk.
///
/// Returns `Ok(Config::default())` if the file doesn't exist.
pub fn load_config(path: &Path) -> Result<Config> {
    if !path.exists() {
        tracing::debug!(path = %path.display(), "config file does not exist; using defaults");
        return Ok(Config::default());
    }

    let raw = std::fs::read_to_string(path).map_err(|e| {
        MedCheckError::Config(format!("failed to read {}: {e}", path.display()))
    })?;
    let config: Config = toml::from_str(&raw)
        .map_err(|e| MedCheckError::Config(format!("failed to parse {}: {e}", path.display())))?;

    tracing::info!(path = %path.display(), "loaded config");
    Ok(config)
}

/// Parse config TOML text.
pub fn parse_config(raw: &str) -> Result<Config> {
    toml::from_str(raw).map_err(|e| MedCheckError::Config(e.to_string()))
}
