//! Core types for vision analysis.

use crate::prepare::PreparedImage;
use serde::{Deserialize, Serialize};

/// Analyzer kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AnalyzerKind {
    /// Google Gemini multimodal models.
    Gemini,
}

impl std::fmt::Display for AnalyzerKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Gemini => write!(f, "gemini"),
        }
    }
}

/// A prompt plus one inline image.
#[derive(Debug, Clone)]
pub struct AnalysisRequest {
    /// Instruction text sent before the image.
    pub prompt: String,
    /// JPEG to describe.
    pub image: PreparedImage,
}

impl AnalysisRequest {
    /// Creates a new request.
    pub fn new(prompt: impl Into<String>, image: PreparedImage) -> Self {
        Self {
            prompt: prompt.into(),
            image,
        }
    }
}

/// Metadata about the analysis call.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnalysisMetadata {
    /// Model that answered.
    pub model: Option<String>,
    /// Round-trip time in milliseconds.
    pub duration_ms: Option<u64>,
    /// Why the model stopped generating.
    pub finish_reason: Option<String>,
    /// Tokens consumed by the prompt and image.
    pub prompt_tokens: Option<u32>,
    /// Tokens in the answer.
    pub response_tokens: Option<u32>,
}

/// The model's description of the medicine.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[must_use = "analysis text should be shown to the user"]
pub struct Analysis {
    /// Text as emitted by the model, unvalidated.
    pub text: String,
    /// Analyzer that produced this text.
    pub provider: AnalyzerKind,
    /// Call metadata.
    pub metadata: AnalysisMetadata,
}

impl Analysis {
    /// Creates a new analysis.
    pub fn new(text: impl Into<String>, provider: AnalyzerKind, metadata: AnalysisMetadata) -> Self {
        Self {
            text: text.into(),
            provider,
            metadata,
        }
    }
}
