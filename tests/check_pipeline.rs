//! End-to-end checks: acquisition, preparation, analysis and cleanup.

use async_trait::async_trait;
use medcheck::{
    Analysis, AnalysisMetadata, AnalysisRequest, AnalyzerKind, CameraCapture, GeminiAnalyzer,
    ImageSource, MedCheckError, MedicineChecker, PromptLanguage, ResultPanel, VisionAnalyzer,
};
use serde_json::{json, Value};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::Duration;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Records every image it is asked about.
#[derive(Default)]
struct Recording {
    sizes: Mutex<Vec<(u32, u32)>>,
}

#[async_trait]
impl VisionAnalyzer for Recording {
    async fn analyze(&self, request: &AnalysisRequest) -> medcheck::Result<Analysis> {
        self.sizes
            .lock()
            .unwrap()
            .push((request.image.width, request.image.height));
        Ok(Analysis::new(
            "Cetirizine 10 mg tablets.",
            AnalyzerKind::Gemini,
            AnalysisMetadata::default(),
        ))
    }

    fn kind(&self) -> AnalyzerKind {
        AnalyzerKind::Gemini
    }

    async fn health_check(&self) -> medcheck::Result<()> {
        Ok(())
    }
}

fn write_photo(dir: &Path, name: &str, width: u32, height: u32) -> PathBuf {
    let path = dir.join(name);
    image::DynamicImage::new_rgb8(width, height)
        .save(&path)
        .unwrap();
    path
}

fn dir_entries(dir: &Path) -> usize {
    std::fs::read_dir(dir).map(|d| d.count()).unwrap_or(0)
}

#[tokio::test]
async fn test_gallery_photo_through_gemini() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1beta/models/gemini-2.5-flash:generateContent"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "candidates": [{
                "content": {"parts": [{"text": "硝酸甘油片：用于心绞痛急性发作。"}]},
                "finishReason": "STOP"
            }]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let photo = write_photo(dir.path(), "box.png", 1600, 1200);

    let analyzer = GeminiAnalyzer::builder()
        .api_key("test-key")
        .base_url(format!("{}/v1beta", server.uri()))
        .build()
        .unwrap();
    let checker = MedicineChecker::new(analyzer, CameraCapture::new(dir.path().join("captures")))
        .with_language(PromptLanguage::Chinese);

    let analysis = checker.check(&ImageSource::gallery(&photo)).await.unwrap();
    assert_eq!(analysis.text, "硝酸甘油片：用于心绞痛急性发作。");
    assert!(photo.exists(), "gallery photos must never be deleted");

    let received = server.received_requests().await.unwrap();
    let body: Value = serde_json::from_slice(&received[0].body).unwrap();
    assert_eq!(
        body["contents"][0]["parts"][0]["text"],
        PromptLanguage::Chinese.prompt()
    );
}

#[cfg(unix)]
#[tokio::test]
async fn test_camera_capture_is_analyzed_and_removed() {
    let dir = tempfile::tempdir().unwrap();
    let fixture = write_photo(dir.path(), "fixture.png", 2048, 1536);
    let captures = dir.path().join("captures");

    let camera = CameraCapture::new(&captures)
        .with_device(None)
        .with_command(vec![
            "cp".into(),
            fixture.display().to_string(),
            "{output}".into(),
        ]);
    let checker = MedicineChecker::new(Recording::default(), camera);

    let analysis = checker.check(&ImageSource::Camera).await.unwrap();
    assert_eq!(analysis.text, "Cetirizine 10 mg tablets.");
    assert_eq!(*checker.analyzer().sizes.lock().unwrap(), vec![(1024, 768)]);
    assert_eq!(dir_entries(&captures), 0, "temp capture should be deleted");
}

#[cfg(unix)]
#[tokio::test]
async fn test_failed_capture_is_cancelled_and_removed() {
    let dir = tempfile::tempdir().unwrap();
    let captures = dir.path().join("captures");
    let camera = CameraCapture::new(&captures)
        .with_device(None)
        .with_command(vec!["false".into()]);
    let checker = MedicineChecker::new(Recording::default(), camera);

    let mut panel = ResultPanel::new();
    panel.show("earlier result");
    assert!(panel.begin());
    let result = checker.check(&ImageSource::Camera).await;
    assert!(matches!(result, Err(MedCheckError::CaptureCancelled(_))));

    panel.finish(&result);
    assert_eq!(panel.text(), "earlier result");
    assert!(!panel.is_busy());
    assert!(checker.analyzer().sizes.lock().unwrap().is_empty());
    assert_eq!(dir_entries(&captures), 0);
}

#[cfg(unix)]
#[tokio::test]
async fn test_capture_producing_nothing_is_cancelled() {
    let dir = tempfile::tempdir().unwrap();
    let captures = dir.path().join("captures");
    let camera = CameraCapture::new(&captures)
        .with_device(None)
        .with_command(vec!["true".into()]);
    let checker = MedicineChecker::new(Recording::default(), camera);

    let result = checker.check(&ImageSource::Camera).await;
    assert!(matches!(result, Err(MedCheckError::CaptureCancelled(_))));
    assert_eq!(dir_entries(&captures), 0);
}

#[cfg(unix)]
#[tokio::test]
async fn test_slow_capture_times_out_and_is_removed() {
    let dir = tempfile::tempdir().unwrap();
    let captures = dir.path().join("captures");
    let camera = CameraCapture::new(&captures)
        .with_device(None)
        .with_timeout(Duration::from_millis(200))
        .with_command(vec![
            "sh".into(),
            "-c".into(),
            "sleep 5".into(),
            "x".into(),
            "{output}".into(),
        ]);
    let checker = MedicineChecker::new(Recording::default(), camera);

    let result = checker.check(&ImageSource::Camera).await;
    assert!(matches!(result, Err(MedCheckError::Timeout(d)) if d == Duration::from_millis(200)));
    assert!(checker.analyzer().sizes.lock().unwrap().is_empty());
    assert_eq!(dir_entries(&captures), 0);
}

#[cfg(unix)]
#[tokio::test]
async fn test_interrupted_capture_is_removed() {
    let dir = tempfile::tempdir().unwrap();
    let captures = dir.path().join("captures");
    let camera = CameraCapture::new(&captures)
        .with_device(None)
        .with_command(vec![
            "sh".into(),
            "-c".into(),
            "sleep 5".into(),
            "x".into(),
            "{output}".into(),
        ]);
    let checker = MedicineChecker::new(Recording::default(), camera);

    let interrupted = tokio::select! {
        _ = checker.check(&ImageSource::Camera) => false,
        _ = tokio::time::sleep(Duration::from_millis(300)) => true,
    };
    assert!(interrupted);
    assert_eq!(dir_entries(&captures), 0);
}

#[tokio::test]
async fn test_missing_camera_program() {
    let dir = tempfile::tempdir().unwrap();
    let captures = dir.path().join("captures");
    let camera = CameraCapture::new(&captures)
        .with_device(None)
        .with_command(vec!["medcheck-no-such-camera-program".into()]);
    let checker = MedicineChecker::new(Recording::default(), camera);

    let result = checker.check(&ImageSource::Camera).await;
    let err = result.as_ref().unwrap_err();
    assert!(matches!(err, MedCheckError::CameraUnavailable(_)));
    assert_eq!(dir_entries(&captures), 0);

    let mut panel = ResultPanel::new();
    panel.begin();
    panel.finish(&result);
    assert!(panel.text().starts_with("Unable to start the camera"));
}

#[tokio::test]
async fn test_unsupported_gallery_file() {
    let dir = tempfile::tempdir().unwrap();
    let leaflet = dir.path().join("leaflet.pdf");
    std::fs::write(&leaflet, b"%PDF-1.7").unwrap();

    let checker = MedicineChecker::new(Recording::default(), CameraCapture::new(dir.path()));
    let err = checker
        .check(&ImageSource::gallery(&leaflet))
        .await
        .unwrap_err();
    assert!(matches!(err, MedCheckError::UnsupportedImage(_)));
    assert!(leaflet.exists());
}
