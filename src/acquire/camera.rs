//! Taking a photo with an external capture program.

use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::acquire::AcquiredImage;
use crate::error::{MedCheckError, Result};

/// Default time allowed for a capture program to produce a photo.
pub const DEFAULT_CAPTURE_TIMEOUT: Duration = Duration::from_secs(30);

/// Placeholder replaced by the temporary output path.
const OUTPUT_PLACEHOLDER: &str = "{output}";

/// Placeholder replaced by the camera device path.
const DEVICE_PLACEHOLDER: &str = "{device}";

/// A known capture program and how to invoke it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CameraPreset {
    /// Executable name looked up on `PATH`.
    pub program: &'static str,
    /// Arguments; `{output}` and `{device}` are substituted.
    pub args: &'static [&'static str],
}

/// Capture programs tried in order when none is configured.
pub const CAMERA_PRESETS: &[CameraPreset] = &[
    CameraPreset {
        program: "rpicam-still",
        args: &["-n", "-o", OUTPUT_PLACEHOLDER],
    },
    CameraPreset {
        program: "libcamera-still",
        args: &["-n", "-o", OUTPUT_PLACEHOLDER],
    },
    CameraPreset {
        program: "fswebcam",
        args: &["-q", "--no-banner", "-d", DEVICE_PLACEHOLDER, "-r", "1920x1080", OUTPUT_PLACEHOLDER],
    },
    CameraPreset {
        program: "imagesnap",
        args: &["-q", "-w", "1", OUTPUT_PLACEHOLDER],
    },
    CameraPreset {
        program: "ffmpeg",
        args: &[
            "-y", "-loglevel", "error", "-f", "v4l2", "-i", DEVICE_PLACEHOLDER, "-frames:v", "1",
            OUTPUT_PLACEHOLDER,
        ],
    },
];

/// Takes photos into a private capture directory.
#[derive(Debug, Clone)]
pub struct CameraCapture {
    capture_dir: PathBuf,
    command: Option<Vec<String>>,
    device: Option<PathBuf>,
    timeout: Duration,
}

impl CameraCapture {
    /// Creates a capture helper writing into `capture_dir`.
    pub fn new(capture_dir: impl Into<PathBuf>) -> Self {
        Self {
            capture_dir: capture_dir.into(),
            command: None,
            device: default_device(),
            timeout: DEFAULT_CAPTURE_TIMEOUT,
        }
    }

    /// Uses an explicit argv instead of probing for a preset.
    pub fn with_command(mut self, command: Vec<String>) -> Self {
        self.command = if command.is_empty() {
            None
        } else {
            Some(command)
        };
        self
    }

    /// Sets the device node checked for permission and passed as `{device}`.
    pub fn with_device(mut self, device: Option<PathBuf>) -> Self {
        self.device = device;
        self
    }

    /// Sets the capture timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Directory holding temporary captures.
    pub fn capture_dir(&self) -> &Path {
        &self.capture_dir
    }

    /// Fails if the camera device exists but this user may not open it.
    pub fn check_permission(&self) -> Result<()> {
        let Some(device) = self.device.as_deref() else {
            return Ok(());
        };
        if !device.exists() {
            return Ok(());
        }
        match std::fs::OpenOptions::new().read(true).open(device) {
            Ok(_) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::PermissionDenied => {
                Err(MedCheckError::CameraPermissionDenied(format!(
                    "cannot open {}; add your user to the `video` group or adjust the device permissions",
                    device.display()
                )))
            }
            Err(e) => {
                tracing::debug!(device = %device.display(), "camera device probe failed: {e}");
                Ok(())
            }
        }
    }

    /// Resolves the argv to run, with placeholders still in place.
    pub fn resolve_command(&self) -> Result<(PathBuf, Vec<String>)> {
        if let Some(command) = &self.command {
            let (program, args) = command
                .split_first()
                .ok_or_else(|| MedCheckError::Config("camera command is empty".into()))?;
            let resolved = which::which(program).map_err(|_| {
                MedCheckError::CameraUnavailable(format!("capture program `{program}` not found"))
            })?;
            return Ok((resolved, args.to_vec()));
        }

        for preset in CAMERA_PRESETS {
            if let Ok(resolved) = which::which(preset.program) {
                tracing::debug!(program = preset.program, "using camera preset");
                let args = preset.args.iter().map(|a| a.to_string()).collect();
                return Ok((resolved, args));
            }
        }

        let names: Vec<&str> = CAMERA_PRESETS.iter().map(|p| p.program).collect();
        Err(MedCheckError::CameraUnavailable(format!(
            "no capture program found; install one of: {}",
            names.join(", ")
        )))
    }

    /// Takes a photo into a fresh `capture_*.jpg` temp file.
    ///
    /// The temp file is removed on every failure path.
    pub async fn capture(&self) -> Result<AcquiredImage> {
        self.check_permission()?;

        let temp = self.create_capture_file()?;
        let (program, args) = self.resolve_command()?;
        let args = substitute_args(&args, &temp, self.device.as_deref());

        tracing::info!(program = %program.display(), output = %temp.display(), "capturing photo");

        let mut cmd = tokio::process::Command::new(&program);
        cmd.args(&args)
            .stdin(std::process::Stdio::null())
            .kill_on_drop(true);

        let output = match tokio::time::timeout(self.timeout, cmd.output()).await {
            Ok(Ok(output)) => output,
            Ok(Err(e)) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(MedCheckError::CameraUnavailable(format!(
                    "capture program `{}` not found",
                    program.display()
                )));
            }
            Ok(Err(e)) => return Err(MedCheckError::Io(e)),
            Err(_) => return Err(MedCheckError::Timeout(self.timeout)),
        };

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            tracing::warn!(status = %output.status, stderr = %stderr.trim(), "capture program failed");
            return Err(MedCheckError::CaptureCancelled(format!(
                "capture program exited with {}",
                output.status
            )));
        }

        let written = std::fs::metadata(&temp).map(|m| m.len()).unwrap_or(0);
        if written == 0 {
            return Err(MedCheckError::CaptureCancelled(
                "capture program produced no photo".into(),
            ));
        }

        tracing::debug!(bytes = written, "photo captured");
        Ok(AcquiredImage::owned(temp))
    }

    fn create_capture_file(&self) -> Result<tempfile::TempPath> {
        std::fs::create_dir_all(&self.capture_dir).map_err(|e| {
            tracing::error!(dir = %self.capture_dir.display(), "unable to create capture directory: {e}");
            MedCheckError::CaptureFile(format!(
                "cannot create {}: {e}; check available storage",
                self.capture_dir.display()
            ))
        })?;

        let file = tempfile::Builder::new()
            .prefix("capture_")
            .suffix(".jpg")
            .tempfile_in(&self.capture_dir)
            .map_err(|e| {
                tracing::error!("failed to create image file for camera capture: {e}");
                MedCheckError::CaptureFile(format!("{e}; check available storage"))
            })?;
        Ok(file.into_temp_path())
    }
}

fn default_device() -> Option<PathBuf> {
    if cfg!(target_os = "linux") {
        Some(PathBuf::from("/dev/video0"))
    } else {
        None
    }
}

/// Fills `{output}` and `{device}`; appends the output path if absent.
fn substitute_args(args: &[String], output: &Path, device: Option<&Path>) -> Vec<String> {
    let output = output.display().to_string();
    let device = device
        .map(|d| d.display().to_string())
        .unwrap_or_else(|| "/dev/video0".to_string());

    let mut has_output = false;
    let mut out: Vec<String> = args
        .iter()
        .map(|arg| {
            if arg.contains(OUTPUT_PLACEHOLDER) {
                has_output = true;
            }
            arg.replace(OUTPUT_PLACEHOLDER, &output)
                .replace(DEVICE_PLACEHOLDER, &device)
        })
        .collect();
    if !has_output {
        out.push(output);
    }
    out
}
