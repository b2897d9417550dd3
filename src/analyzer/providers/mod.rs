//! Vision analysis providers.

#[cfg(feature = "gemini")]
mod gemini;

#[cfg(feature = "gemini")]
pub use gemini::{GeminiAnalyzer, GeminiAnalyzerBuilder, GeminiModel, DEFAULT_GEMINI_BASE_URL};
