//! Gemini (Google) vision analysis provider.

use crate::analyzer::provider::VisionAnalyzer;
use crate::analyzer::types::{Analysis, AnalysisMetadata, AnalysisRequest, AnalyzerKind};
use crate::error::{parse_retry_after, sanitize_error_message, MedCheckError, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};

/// Public Gemini REST endpoint.
pub const DEFAULT_GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

/// Default time allowed for one inference call.
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(120);

/// Gemini multimodal model variants.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum GeminiModel {
    /// Gemini 2.5 Flash (fast, good at reading packaging).
    #[default]
    Flash,
    /// Gemini 2.5 Flash-Lite (cheapest).
    FlashLite,
    /// Gemini 2.5 Pro (highest quality, slower).
    Pro,
}

impl GeminiModel {
    /// All known variants.
    pub const ALL: [GeminiModel; 3] = [Self::Flash, Self::FlashLite, Self::Pro];

    /// Returns the API model identifier.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Flash => "gemini-2.5-flash",
            Self::FlashLite => "gemini-2.5-flash-lite",
            Self::Pro => "gemini-2.5-pro",
        }
    }

    /// Short description for listings.
    pub fn description(&self) -> &'static str {
        match self {
            Self::Flash => "fast, good at reading packaging (default)",
            Self::FlashLite => "cheapest, lower accuracy on small print",
            Self::Pro => "highest quality, slower",
        }
    }
}

impl std::str::FromStr for GeminiModel {
    type Err = MedCheckError;

    fn from_str(s: &str) -> Result<Self> {
        let name = s.trim().trim_start_matches("models/");
        match name {
            "gemini-2.5-flash" | "flash" => Ok(Self::Flash),
            "gemini-2.5-flash-lite" | "flash-lite" => Ok(Self::FlashLite),
            "gemini-2.5-pro" | "pro" => Ok(Self::Pro),
            other => Err(MedCheckError::InvalidRequest(format!(
                "unknown Gemini model `{other}`"
            ))),
        }
    }
}

impl std::fmt::Display for GeminiModel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Builder for GeminiAnalyzer.
#[derive(Debug, Clone, Default)]
pub struct GeminiAnalyzerBuilder {
    api_key: Option<String>,
    model: GeminiModel,
    base_url: Option<String>,
    timeout: Option<Duration>,
}

impl GeminiAnalyzerBuilder {
    /// Creates a new builder with default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the API key. Falls back to `GEMINI_API_KEY`, then `GOOGLE_API_KEY`.
    pub fn api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(key.into());
        self
    }

    /// Sets the Gemini model variant.
    pub fn model(mut self, model: GeminiModel) -> Self {
        self.model = model;
        self
    }

    /// Overrides the REST base URL (proxies, tests).
    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = Some(url.into());
        self
    }

    /// Sets the request timeout.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Builds the analyzer, resolving the API key.
    pub fn build(self) -> Result<GeminiAnalyzer> {
        let api_key = self
            .api_key
            .filter(|k| !k.trim().is_empty())
            .or_else(|| non_empty_env("GEMINI_API_KEY"))
            .or_else(|| non_empty_env("GOOGLE_API_KEY"))
            .ok_or_else(|| {
                MedCheckError::Auth(
                    "GEMINI_API_KEY / GOOGLE_API_KEY not set and no API key provided".into(),
                )
            })?;

        let timeout = self.timeout.unwrap_or(DEFAULT_TIMEOUT);
        let client = reqwest::Client::builder().timeout(timeout).build()?;

        let base_url = self
            .base_url
            .unwrap_or_else(|| DEFAULT_GEMINI_BASE_URL.to_string())
            .trim_end_matches('/')
            .to_string();

        Ok(GeminiAnalyzer {
            client,
            api_key,
            model: self.model,
            base_url,
            timeout,
        })
    }
}

fn non_empty_env(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}

/// Gemini vision analysis provider.
pub struct GeminiAnalyzer {
    client: reqwest::Client,
    api_key: String,
    model: GeminiModel,
    base_url: String,
    timeout: Duration,
}

impl GeminiAnalyzer {
    /// Creates a new `GeminiAnalyzerBuilder`.
    pub fn builder() -> GeminiAnalyzerBuilder {
        GeminiAnalyzerBuilder::new()
    }

    /// The model this analyzer calls.
    pub fn model(&self) -> GeminiModel {
        self.model
    }

    async fn analyze_impl(&self, request: &AnalysisRequest) -> Result<Analysis> {
        let start = Instant::now();

        let url = format!(
            "{}/models/{}:generateContent",
            self.base_url,
            self.model.as_str(),
        );

        let body = GeminiRequest::from_analysis_request(request);

        tracing::debug!(
            model = self.model.as_str(),
            image_bytes = request.image.size(),
            "sending Gemini generateContent request"
        );

        let response = self
            .client
            .post(&url)
            .header("x-goog-api-key", &self.api_key)
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|e| self.request_error(e))?;

        let status = response.status();
        if !status.is_success() {
            let headers = response.headers().clone();
            let text = response.text().await.unwrap_or_default();
            return Err(self.parse_error(status.as_u16(), &text, &headers));
        }

        let gemini_response: GeminiResponse = response
            .json()
            .await
            .map_err(|e| self.request_error(e))?;
        let duration_ms = start.elapsed().as_millis() as u64;

        let mut analysis = gemini_response.into_analysis(status.as_u16())?;
        analysis.metadata.model = Some(self.model.as_str().to_string());
        analysis.metadata.duration_ms = Some(duration_ms);

        tracing::debug!(
            duration_ms,
            finish_reason = analysis.metadata.finish_reason.as_deref().unwrap_or(""),
            "Gemini analysis complete"
        );

        Ok(analysis)
    }

    fn request_error(&self, err: reqwest::Error) -> MedCheckError {
        if err.is_timeout() {
            tracing::warn!(timeout = ?self.timeout, "Gemini request timed out");
            MedCheckError::Timeout(self.timeout)
        } else {
            MedCheckError::Network(err)
        }
    }

    fn parse_error(
        &self,
        status: u16,
        text: &str,
        headers: &reqwest::header::HeaderMap,
    ) -> MedCheckError {
        let message = serde_json::from_str::<GeminiErrorEnvelope>(text)
            .map(|e| e.error.message)
            .unwrap_or_else(|_| text.to_string());
        let message = sanitize_error_message(&message);

        if status == 404 {
            return MedCheckError::InvalidRequest(
                "Model not found. Verify the model name is correct.".into(),
            );
        }
        if status == 429 {
            let retry_after = parse_retry_after(headers).map(Duration::from_secs);
            return MedCheckError::RateLimited { retry_after };
        }
        if status == 401 || status == 403 {
            return MedCheckError::Auth(message);
        }
        if status == 400 && message.to_lowercase().contains("api key") {
            return MedCheckError::Auth(message);
        }
        MedCheckError::Api { status, message }
    }
}

#[async_trait]
impl VisionAnalyzer for GeminiAnalyzer {
    async fn analyze(&self, request: &AnalysisRequest) -> Result<Analysis> {
        self.analyze_impl(request).await
    }

    fn kind(&self) -> AnalyzerKind {
        AnalyzerKind::Gemini
    }

    async fn health_check(&self) -> Result<()> {
        let url = format!("{}/models/{}", self.base_url, self.model.as_str());

        let response = self
            .client
            .get(&url)
            .header("x-goog-api-key", &self.api_key)
            .send()
            .await
            .map_err(|e| self.request_error(e))?;

        match response.status().as_u16() {
            400 | 401 | 403 => Err(MedCheckError::Auth("Invalid API key".into())),
            404 => Err(MedCheckError::InvalidRequest(
                "Model not found. Verify the model name is correct.".into(),
            )),
            s if !(200..300).contains(&s) => Err(MedCheckError::Api {
                status: s,
                message: "Health check failed".into(),
            }),
            _ => Ok(()),
        }
    }
}

// Request/Response types
#[derive(Debug, Serialize)]
struct GeminiRequest {
    contents: Vec<GeminiContent>,
}

#[derive(Debug, Serialize)]
struct GeminiContent {
    parts: Vec<GeminiRequestPart>,
}

/// A part in a Gemini request - can be text or inline image data.
#[derive(Debug, Serialize)]
#[serde(untagged)]
enum GeminiRequestPart {
    Text {
        text: String,
    },
    InlineData {
        #[serde(rename = "inlineData")]
        inline_data: GeminiInlineData,
    },
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiInlineData {
    mime_type: String,
    data: String,
}

impl GeminiRequest {
    fn from_analysis_request(req: &AnalysisRequest) -> Self {
        let parts = vec![
            GeminiRequestPart::Text {
                text: req.prompt.clone(),
            },
            GeminiRequestPart::InlineData {
                inline_data: GeminiInlineData {
                    mime_type: req.image.mime_type().to_string(),
                    data: req.image.to_base64(),
                },
            },
        ];

        Self {
            contents: vec![GeminiContent { parts }],
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiResponse {
    #[serde(default)]
    candidates: Vec<GeminiCandidate>,
    #[serde(default)]
    prompt_feedback: Option<PromptFeedback>,
    #[serde(default)]
    usage_metadata: Option<UsageMetadata>,
    #[serde(default)]
    error: Option<GeminiError>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiCandidate {
    #[serde(default)]
    content: Option<GeminiContentResponse>,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PromptFeedback {
    #[serde(default)]
    block_reason: Option<String>,
    #[serde(default)]
    block_reason_message: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UsageMetadata {
    #[serde(default)]
    prompt_token_count: Option<u32>,
    #[serde(default)]
    candidates_token_count: Option<u32>,
}

#[derive(Debug, Deserialize)]
struct GeminiContentResponse {
    #[serde(default)]
    parts: Vec<GeminiPartResponse>,
}

#[derive(Debug, Deserialize)]
struct GeminiPartResponse {
    #[serde(default)]
    text: Option<String>,
    #[serde(default)]
    thought: bool,
}

#[derive(Debug, Deserialize)]
struct GeminiErrorEnvelope {
    error: GeminiError,
}

#[derive(Debug, Deserialize)]
struct GeminiError {
    #[serde(default)]
    code: Option<u16>,
    message: String,
}

impl GeminiResponse {
    /// Extracts the answer text, mapping blocks and empty answers to errors.
    fn into_analysis(self, status: u16) -> Result<Analysis> {
        if let Some(error) = self.error {
            return Err(MedCheckError::Api {
                status: error.code.unwrap_or(status),
                message: sanitize_error_message(&error.message),
            });
        }

        // Prompt blocks arrive as HTTP 200
        if let Some(ref feedback) = self.prompt_feedback {
            if let Some(ref reason) = feedback.block_reason {
                let msg = feedback
                    .block_reason_message
                    .clone()
                    .unwrap_or_else(|| format!("Prompt blocked: {}", reason));
                return Err(MedCheckError::ContentBlocked(msg));
            }
        }

        let candidate = self
            .candidates
            .into_iter()
            .next()
            .ok_or(MedCheckError::EmptyResponse)?;

        if let Some(ref finish_reason) = candidate.finish_reason {
            match finish_reason.as_str() {
                "SAFETY" | "RECITATION" | "PROHIBITED_CONTENT" | "BLOCKLIST" | "SPII" => {
                    return Err(MedCheckError::ContentBlocked(format!(
                        "Response blocked by Gemini safety filter: {}",
                        finish_reason
                    )));
                }
                _ => {} // STOP, MAX_TOKENS, etc. are normal
            }
        }

        let text: String = candidate
            .content
            .map(|c| c.parts)
            .unwrap_or_default()
            .into_iter()
            .filter(|p| !p.thought)
            .filter_map(|p| p.text)
            .collect();

        if text.trim().is_empty() {
            return Err(MedCheckError::EmptyResponse);
        }

        let usage = self.usage_metadata;
        Ok(Analysis::new(
            text,
            AnalyzerKind::Gemini,
            AnalysisMetadata {
                model: None,
                duration_ms: None,
                finish_reason: candidate.finish_reason,
                prompt_tokens: usage.as_ref().and_then(|u| u.prompt_token_count),
                response_tokens: usage.as_ref().and_then(|u| u.candidates_token_count),
            },
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::prepare::PreparedImage;

    fn request() -> AnalysisRequest {
        AnalysisRequest::new(
            "What medicine is this?",
            PreparedImage {
                data: vec![0xFF, 0xD8, 0xFF],
                width: 1,
                height: 1,
                original_width: 1,
                original_height: 1,
            },
        )
    }

    fn parse(json: &str) -> Result<Analysis> {
        let resp: GeminiResponse = serde_json::from_str(json).unwrap();
        resp.into_analysis(200)
    }

    #[test]
    fn test_gemini_model_as_str() {
        assert_eq!(GeminiModel::Flash.as_str(), "gemini-2.5-flash");
        assert_eq!(GeminiModel::FlashLite.as_str(), "gemini-2.5-flash-lite");
        assert_eq!(GeminiModel::Pro.as_str(), "gemini-2.5-pro");
    }

    #[test]
    fn test_gemini_model_default() {
        assert_eq!(GeminiModel::default(), GeminiModel::Flash);
    }

    #[test]
    fn test_gemini_model_from_str() {
        assert_eq!("gemini-2.5-pro".parse::<GeminiModel>().unwrap(), GeminiModel::Pro);
        assert_eq!(
            "models/gemini-2.5-flash".parse::<GeminiModel>().unwrap(),
            GeminiModel::Flash
        );
        assert_eq!("flash-lite".parse::<GeminiModel>().unwrap(), GeminiModel::FlashLite);
        assert!("gpt-4o".parse::<GeminiModel>().is_err());
    }

    #[test]
    fn test_builder_with_explicit_key() {
        let analyzer = GeminiAnalyzerBuilder::new()
            .api_key("test-key")
            .model(GeminiModel::Pro)
            .base_url("http://localhost:1234/v1beta/")
            .build()
            .unwrap();
        assert_eq!(analyzer.model(), GeminiModel::Pro);
        assert_eq!(analyzer.base_url, "http://localhost:1234/v1beta");
    }

    #[test]
    fn test_request_has_prompt_then_image() {
        let gemini_req = GeminiRequest::from_analysis_request(&request());
        let json = serde_json::to_value(&gemini_req).unwrap();

        let parts = &json["contents"][0]["parts"];
        assert_eq!(parts.as_array().unwrap().len(), 2);
        assert_eq!(parts[0]["text"], "What medicine is this?");
        assert_eq!(parts[1]["inlineData"]["mimeType"], "image/jpeg");
        assert_eq!(parts[1]["inlineData"]["data"], "/9j/");
        assert!(parts[1].get("text").is_none());
    }

    #[test]
    fn test_response_text() {
        let analysis = parse(
            r#"{
                "candidates": [{
                    "content": {"parts": [{"text": "Ibuprofen. "}, {"text": "Used for pain."}]},
                    "finishReason": "STOP"
                }],
                "usageMetadata": {"promptTokenCount": 300, "candidatesTokenCount": 120}
            }"#,
        )
        .unwrap();
        assert_eq!(analysis.text, "Ibuprofen. Used for pain.");
        assert_eq!(analysis.metadata.finish_reason.as_deref(), Some("STOP"));
        assert_eq!(analysis.metadata.prompt_tokens, Some(300));
        assert_eq!(analysis.metadata.response_tokens, Some(120));
    }

    #[test]
    fn test_response_skips_thought_parts() {
        let analysis = parse(
            r#"{"candidates": [{"content": {"parts": [
                {"text": "thinking about the box", "thought": true},
                {"text": "Aspirin 100 mg"}
            ]}}]}"#,
        )
        .unwrap();
        assert_eq!(analysis.text, "Aspirin 100 mg");
    }

    #[test]
    fn test_response_empty() {
        assert!(matches!(
            parse(r#"{"candidates": []}"#),
            Err(MedCheckError::EmptyResponse)
        ));
        assert!(matches!(
            parse(r#"{"candidates": [{"finishReason": "STOP"}]}"#),
            Err(MedCheckError::EmptyResponse)
        ));
        assert!(matches!(
            parse(r#"{"candidates": [{"content": {"parts": [{}]}}]}"#),
            Err(MedCheckError::EmptyResponse)
        ));
        assert!(matches!(parse("{}"), Err(MedCheckError::EmptyResponse)));
    }

    #[test]
    fn test_response_error_field() {
        let err = parse(r#"{"error": {"code": 400, "message": "Image too large"}}"#).unwrap_err();
        match err {
            MedCheckError::Api { status, message } => {
                assert_eq!(status, 400);
                assert_eq!(message, "Image too large");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_response_with_prompt_feedback_block() {
        let err = parse(
            r#"{
                "candidates": [],
                "promptFeedback": {
                    "blockReason": "SAFETY",
                    "blockReasonMessage": "Prompt was blocked due to safety"
                }
            }"#,
        )
        .unwrap_err();
        assert!(
            matches!(err, MedCheckError::ContentBlocked(ref m) if m == "Prompt was blocked due to safety")
        );
    }

    #[test]
    fn test_response_safety_finish_reason() {
        let err = parse(r#"{"candidates": [{"finishReason": "SAFETY"}]}"#).unwrap_err();
        assert!(matches!(err, MedCheckError::ContentBlocked(_)));
    }

    #[test]
    fn test_parse_error_statuses() {
        let analyzer = GeminiAnalyzer::builder().api_key("k").build().unwrap();
        let headers = reqwest::header::HeaderMap::new();
        let body = r#"{"error": {"code": 403, "message": "Permission denied", "status": "PERMISSION_DENIED"}}"#;

        assert!(matches!(
            analyzer.parse_error(403, body, &headers),
            MedCheckError::Auth(ref m) if m == "Permission denied"
        ));
        assert!(matches!(
            analyzer.parse_error(400, r#"{"error": {"message": "API key not valid. Please pass a valid API key."}}"#, &headers),
            MedCheckError::Auth(_)
        ));
        assert!(matches!(
            analyzer.parse_error(404, "", &headers),
            MedCheckError::InvalidRequest(_)
        ));
        assert!(matches!(
            analyzer.parse_error(500, "upstream exploded", &headers),
            MedCheckError::Api { status: 500, ref message } if message == "upstream exploded"
        ));

        let mut headers = reqwest::header::HeaderMap::new();
        headers.insert(reqwest::header::RETRY_AFTER, "3".parse().unwrap());
        assert!(matches!(
            analyzer.parse_error(429, "", &headers),
            MedCheckError::RateLimited { retry_after: Some(d) } if d == Duration::from_secs(3)
        ));
    }
}
