//! The end-to-end check: acquire, prepare, analyze, clean up.

use std::time::Duration;

use crate::acquire::{acquire, CameraCapture, ImageSource};
use crate::analyzer::{Analysis, AnalysisRequest, VisionAnalyzer, VisionAnalyzerExt};
use crate::config::Config;
use crate::error::Result;
use crate::prepare::{prepare_image, PrepareOptions};
use crate::prompt::PromptLanguage;

/// Runs medicine checks against one analyzer.
pub struct MedicineChecker<A> {
    analyzer: A,
    camera: CameraCapture,
    prepare: PrepareOptions,
    language: PromptLanguage,
    retries: u32,
}

impl<A: VisionAnalyzer> MedicineChecker<A> {
    /// Creates a checker with default preparation and English prompt.
    pub fn new(analyzer: A, camera: CameraCapture) -> Self {
        Self {
            analyzer,
            camera,
            prepare: PrepareOptions::default(),
            language: PromptLanguage::default(),
            retries: 0,
        }
    }

    /// Creates a checker from loaded configuration.
    pub fn from_config(analyzer: A, config: &Config) -> Self {
        let mut camera = CameraCapture::new(config.capture_dir());
        if let Some(command) = &config.camera.command {
            camera = camera.with_command(command.clone());
        }
        if let Some(device) = &config.camera.device {
            camera = camera.with_device(Some(device.clone()));
        }
        if let Some(secs) = config.camera.timeout_secs {
            camera = camera.with_timeout(Duration::from_secs(secs));
        }

        Self::new(analyzer, camera)
            .with_prepare_options(config.prepare_options())
            .with_language(config.prompt.language)
            .with_retries(config.retries)
    }

    /// Sets image preparation options.
    pub fn with_prepare_options(mut self, options: PrepareOptions) -> Self {
        self.prepare = options;
        self
    }

    /// Sets the summary language.
    pub fn with_language(mut self, language: PromptLanguage) -> Self {
        self.language = language;
        self
    }

    /// Sets retries on transient inference failures.
    pub fn with_retries(mut self, retries: u32) -> Self {
        self.retries = retries;
        self
    }

    /// The analyzer in use.
    pub fn analyzer(&self) -> &A {
        &self.analyzer
    }

    /// Acquires a photo from `source` and returns the model's summary.
    ///
    /// Temporary camera captures are deleted whether or not the check
    /// succeeds.
    pub async fn check(&self, source: &ImageSource) -> Result<Analysis> {
        tracing::info!(%source, analyzer = self.analyzer.name(), "starting medicine check");

        let image = acquire(source, &self.camera).await?;
        let result = self.analyze_file(image.path().to_path_buf()).await;
        image.cleanup();

        match &result {
            Ok(analysis) => tracing::info!(
                chars = analysis.text.chars().count(),
                duration_ms = analysis.metadata.duration_ms,
                "medicine check complete"
            ),
            Err(e) => tracing::warn!("medicine check failed: {e}"),
        }
        result
    }

    async fn analyze_file(&self, path: std::path::PathBuf) -> Result<Analysis> {
        let options = self.prepare;
        let prepared = tokio::task::spawn_blocking(move || prepare_image(&path, &options)).await??;

        let request = AnalysisRequest::new(self.language.prompt(), prepared);
        self.analyzer
            .analyze_with_retries(&request, self.retries)
            .await
    }
}
