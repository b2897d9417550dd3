//! Getting a photo onto disk: from an existing file or from a camera.

mod camera;

pub use camera::{CameraCapture, CameraPreset, CAMERA_PRESETS};

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tempfile::TempPath;

use crate::error::{MedCheckError, Result};

/// Where the photo comes from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ImageSource {
    /// An existing image file picked by the user.
    Gallery { path: PathBuf },
    /// A fresh photo taken with the camera.
    Camera,
}

impl ImageSource {
    /// Convenience constructor for a gallery file.
    pub fn gallery(path: impl Into<PathBuf>) -> Self {
        Self::Gallery { path: path.into() }
    }
}

impl std::fmt::Display for ImageSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Gallery { path } => write!(f, "gallery:{}", path.display()),
            Self::Camera => write!(f, "camera"),
        }
    }
}

/// A photo on disk, ready for preparation.
///
/// Camera photos are owned temporary files and are deleted by
/// [`AcquiredImage::cleanup`] or on drop. Gallery files are never touched.
#[derive(Debug)]
pub struct AcquiredImage {
    path: PathBuf,
    temp: Option<TempPath>,
}

impl AcquiredImage {
    /// Wraps a user file that must not be deleted.
    pub fn borrowed(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            temp: None,
        }
    }

    /// Wraps a temporary file owned by the application.
    pub fn owned(temp: TempPath) -> Self {
        Self {
            path: temp.to_path_buf(),
            temp: Some(temp),
        }
    }

    /// Path of the image file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Returns true if the file is a temporary capture.
    pub fn is_owned(&self) -> bool {
        self.temp.is_some()
    }

    /// Deletes the file if the application owns it. Failures are logged.
    pub fn cleanup(self) {
        if let Some(temp) = self.temp {
            if let Err(e) = temp.close() {
                tracing::warn!(path = %self.path.display(), "failed to remove temp image: {e}");
            } else {
                tracing::debug!(path = %self.path.display(), "removed temp image");
            }
        }
    }
}

/// File extensions accepted from the gallery.
const SUPPORTED_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "webp", "gif", "bmp", "tif", "tiff"];

/// Check if a path has a supported image extension.
pub fn is_supported_format(path: &Path) -> bool {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_lowercase();
    SUPPORTED_EXTENSIONS.contains(&ext.as_str())
}

/// Accepts an existing image file as the photo to analyze.
pub fn open_gallery(path: impl AsRef<Path>) -> Result<AcquiredImage> {
    let path = path.as_ref();
    let meta = std::fs::metadata(path).map_err(|e| {
        MedCheckError::UnsupportedImage(format!("cannot open {}: {e}", path.display()))
    })?;
    if !meta.is_file() {
        return Err(MedCheckError::UnsupportedImage(format!(
            "{} is not a file",
            path.display()
        )));
    }
    if !is_supported_format(path) {
        return Err(MedCheckError::UnsupportedImage(format!(
            "{} is not a supported image (expected one of: {})",
            path.display(),
            SUPPORTED_EXTENSIONS.join(", ")
        )));
    }
    Ok(AcquiredImage::borrowed(path))
}

/// Acquires a photo from the requested source.
pub async fn acquire(source: &ImageSource, camera: &CameraCapture) -> Result<AcquiredImage> {
    match source {
        ImageSource::Gallery { path } => open_gallery(path),
        ImageSource::Camera => camera.capture().await,
    }
}
