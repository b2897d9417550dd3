//! Result panel state shown to the user.

use crate::analyzer::Analysis;
use crate::error::{MedCheckError, Result};

/// Text shown before the first check.
pub const PLACEHOLDER: &str = "Choose a photo source to analyze a medicine package.";

/// Hint shown under the source menu.
pub const LIGHTING_HINT: &str =
    "Take the photo in good light so the label is readable; accuracy drops on dim or blurry shots.";

/// The single result area plus the busy flag.
#[derive(Debug, Clone)]
pub struct ResultPanel {
    text: String,
    busy: bool,
}

impl Default for ResultPanel {
    fn default() -> Self {
        Self::new()
    }
}

impl ResultPanel {
    /// Creates a panel showing the placeholder.
    pub fn new() -> Self {
        Self {
            text: PLACEHOLDER.to_string(),
            busy: false,
        }
    }

    /// Current text.
    pub fn text(&self) -> &str {
        &self.text
    }

    /// Returns true while a check is running.
    pub fn is_busy(&self) -> bool {
        self.busy
    }

    /// Marks a check as started. Returns false if one is already running.
    pub fn begin(&mut self) -> bool {
        if self.busy {
            return false;
        }
        self.busy = true;
        true
    }

    /// Records the outcome of a check and clears the busy flag.
    pub fn finish(&mut self, result: &Result<Analysis>) {
        self.busy = false;
        match result {
            Ok(analysis) => self.text = analysis.text.clone(),
            Err(e) => {
                if let Some(message) = failure_message(e) {
                    self.text = message;
                }
            }
        }
    }

    /// Abandons a running check, keeping the current text.
    pub fn cancel(&mut self) {
        self.busy = false;
    }

    /// Replaces the text with a status message.
    pub fn show(&mut self, message: impl Into<String>) {
        self.text = message.into();
    }
}

/// User-facing text for a failed check.
///
/// Returns `None` when the user backed out of the camera, which leaves
/// the previous result on screen.
pub fn failure_message(err: &MedCheckError) -> Option<String> {
    let message = match err {
        MedCheckError::CaptureCancelled(_) => return None,
        MedCheckError::CameraPermissionDenied(detail) => {
            format!("Camera permission denied. The camera cannot be used ({detail}).")
        }
        MedCheckError::CameraUnavailable(detail) => format!(
            "Unable to start the camera: {detail}. Install a capture program or choose a photo from the gallery."
        ),
        MedCheckError::CaptureFile(detail) => format!(
            "Unable to create a cache file for the photo ({detail})."
        ),
        MedCheckError::Api { message, .. } => format!("API Error: {message}"),
        MedCheckError::Auth(detail) => format!(
            "API Error: {detail}. Set GEMINI_API_KEY or add api_key to the [gemini] config section."
        ),
        MedCheckError::EmptyResponse => "Gemini returned an empty or invalid response.".to_string(),
        MedCheckError::ContentBlocked(detail) => format!("The model declined to answer: {detail}"),
        other => format!("Processing failed: {other}"),
    };
    Some(message)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analyzer::{AnalysisMetadata, AnalyzerKind};

    #[test]
    fn test_starts_with_placeholder() {
        let panel = ResultPanel::new();
        assert_eq!(panel.text(), PLACEHOLDER);
        assert!(!panel.is_busy());
    }

    #[test]
    fn test_begin_refuses_while_busy() {
        let mut panel = ResultPanel::new();
        assert!(panel.begin());
        assert!(!panel.begin());
        panel.finish(&Err(MedCheckError::EmptyResponse));
        assert!(!panel.is_busy());
        assert!(panel.begin());
    }

    #[test]
    fn test_finish_success_shows_text() {
        let mut panel = ResultPanel::new();
        panel.begin();
        panel.finish(&Ok(Analysis::new(
            "Loratadine: antihistamine.",
            AnalyzerKind::Gemini,
            AnalysisMetadata::default(),
        )));
        assert_eq!(panel.text(), "Loratadine: antihistamine.");
    }

    #[test]
    fn test_cancelled_capture_keeps_previous_text() {
        let mut panel = ResultPanel::new();
        panel.show("previous result");
        panel.begin();
        panel.finish(&Err(MedCheckError::CaptureCancelled("exit 1".into())));
        assert_eq!(panel.text(), "previous result");
        assert!(!panel.is_busy());
    }

    #[test]
    fn test_cancel_keeps_text_and_clears_busy() {
        let mut panel = ResultPanel::new();
        panel.show("previous result");
        assert!(panel.begin());
        panel.cancel();
        assert_eq!(panel.text(), "previous result");
        assert!(panel.begin());
    }

    #[test]
    fn test_failure_messages() {
        let msg = failure_message(&MedCheckError::Api {
            status: 400,
            message: "Image too large".into(),
        })
        .unwrap();
        assert_eq!(msg, "API Error: Image too large");

        let msg = failure_message(&MedCheckError::CameraPermissionDenied("/dev/video0".into()))
            .unwrap();
        assert!(msg.starts_with("Camera permission denied"));

        let msg = failure_message(&MedCheckError::Timeout(std::time::Duration::from_secs(5)))
            .unwrap();
        assert!(msg.starts_with("Processing failed:"));

        assert_eq!(
            failure_message(&MedCheckError::EmptyResponse).unwrap(),
            "Gemini returned an empty or invalid response."
        );
    }
}
