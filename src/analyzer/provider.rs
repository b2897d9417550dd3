//! Analyzer trait and retry helper.

use crate::analyzer::types::{Analysis, AnalysisRequest, AnalyzerKind};
use crate::error::Result;
use async_trait::async_trait;

/// Trait for services that describe a medicine photo.
#[async_trait]
pub trait VisionAnalyzer: Send + Sync {
    /// Sends the prompt and image and returns the model's text.
    async fn analyze(&self, request: &AnalysisRequest) -> Result<Analysis>;

    /// Returns the kind of this analyzer.
    fn kind(&self) -> AnalyzerKind;

    /// Returns the name of this analyzer for display.
    fn name(&self) -> &str {
        match self.kind() {
            AnalyzerKind::Gemini => "Gemini (Google)",
        }
    }

    /// Checks if the service is reachable and authenticated.
    async fn health_check(&self) -> Result<()>;
}

/// Extension trait for analyzers with retry logic.
#[async_trait]
pub trait VisionAnalyzerExt: VisionAnalyzer {
    /// Analyzes with automatic retries on transient failures.
    async fn analyze_with_retries(
        &self,
        request: &AnalysisRequest,
        max_retries: u32,
    ) -> Result<Analysis> {
        let mut attempt = 0;
        loop {
            match self.analyze(request).await {
                Ok(analysis) => return Ok(analysis),
                Err(e) if e.is_retryable() && attempt < max_retries => {
                    attempt += 1;
                    let delay = e.retry_after().unwrap_or(std::time::Duration::from_secs(1));
                    tracing::warn!(
                        attempt,
                        max_retries,
                        delay_ms = delay.as_millis(),
                        "retrying after transient error: {e}"
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(e) => return Err(e),
            }
        }
    }
}

impl<T: VisionAnalyzer> VisionAnalyzerExt for T {}
