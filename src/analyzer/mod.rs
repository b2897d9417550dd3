//! Remote vision analysis of prepared photos.

mod provider;
pub mod providers;
mod types;

pub use provider::{VisionAnalyzer, VisionAnalyzerExt};
pub use types::{Analysis, AnalysisMetadata, AnalysisRequest, AnalyzerKind};
