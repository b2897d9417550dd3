#![warn(missing_docs)]
//! medcheck - Medicine package safety summaries from a photo.
//!
//! Takes a photo of a medicine package (from a camera or an existing file),
//! shrinks it, sends it to a multimodal model with a fixed prompt and
//! returns the model's summary: uses, contraindications, emergency dosage
//! and key side effects. The text is whatever the model emits, unvalidated.
//!
//! # Quick Start
//!
//! ```no_run
//! use medcheck::{CameraCapture, GeminiAnalyzer, ImageSource, MedicineChecker};
//!
//! #[tokio::main]
//! async fn main() -> medcheck::Result<()> {
//!     let analyzer = GeminiAnalyzer::builder().build()?;
//!     let checker = MedicineChecker::new(analyzer, CameraCapture::new("/tmp/medcheck"));
//!     let analysis = checker.check(&ImageSource::gallery("box.jpg")).await?;
//!     println!("{}", analysis.text);
//!     Ok(())
//! }
//! ```
//!
//! # Features
//!
//! - `gemini`: Gemini (Google) analyzer
//! - `cli`: Command-line interface and interactive session

pub mod acquire;
pub mod analyzer;
mod checker;
pub mod config;
mod error;
pub mod panel;
pub mod prepare;
mod prompt;

#[cfg(feature = "cli")]
#[doc(hidden)]
pub mod repl;

// Re-export error types at crate root
pub use error::{MedCheckError, Result};

pub use acquire::{AcquiredImage, CameraCapture, ImageSource};
pub use analyzer::{
    Analysis, AnalysisMetadata, AnalysisRequest, AnalyzerKind, VisionAnalyzer, VisionAnalyzerExt,
};
pub use checker::MedicineChecker;
pub use config::Config;
pub use panel::ResultPanel;
pub use prepare::{PrepareOptions, PreparedImage};
pub use prompt::PromptLanguage;

#[cfg(feature = "gemini")]
pub use analyzer::providers::{GeminiAnalyzer, GeminiAnalyzerBuilder, GeminiModel};

/// Prelude for convenient imports.
pub mod prelude {
    pub use crate::acquire::ImageSource;
    pub use crate::analyzer::{Analysis, VisionAnalyzer, VisionAnalyzerExt};
    pub use crate::checker::MedicineChecker;
    pub use crate::error::{MedCheckError, Result};

    #[cfg(feature = "gemini")]
    pub use crate::analyzer::providers::GeminiAnalyzer;
}
