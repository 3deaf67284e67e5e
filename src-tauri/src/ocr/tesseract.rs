//! Tesseract OCR via the `tesseract` command-line executable.
//!
//! The PNG is piped through stdin and the text read back from stdout
//! (`tesseract stdin stdout -l <lang>`), so nothing touches the disk.

use super::{OcrEngine, OcrError};
use std::io::Write;
use std::path::PathBuf;
use std::process::{Command, Stdio};
use std::time::Instant;

pub struct TesseractEngine {
    /// Explicit executable path. When unset, `tesseract` is looked up on PATH
    /// at recognition time so a missing install fails the capture, not startup.
    binary: Option<PathBuf>,
    language: String,
}

impl TesseractEngine {
    pub fn new(language: impl Into<String>) -> Self {
        Self {
            binary: None,
            language: language.into(),
        }
    }

    pub fn with_binary(binary: impl Into<PathBuf>, language: impl Into<String>) -> Self {
        Self {
            binary: Some(binary.into()),
            language: language.into(),
        }
    }

    fn resolve_binary(&self) -> Result<PathBuf, OcrError> {
        match &self.binary {
            Some(path) => Ok(path.clone()),
            None => which::which("tesseract").map_err(|e| {
                OcrError::EngineUnavailable(format!("tesseract executable not found ({})", e))
            }),
        }
    }

    /// Log whether the engine can be found, so a missing install shows up
    /// at startup instead of on the first snip.
    pub fn probe(&self) {
        match self.resolve_binary() {
            Ok(path) => log::info!("[OCR] Using tesseract at {}", path.display()),
            Err(e) => log::warn!("[OCR] {}", e),
        }
    }
}

impl OcrEngine for TesseractEngine {
    fn recognize(&self, png_bytes: &[u8]) -> Result<String, OcrError> {
        let start = Instant::now();
        let binary = self.resolve_binary()?;

        let mut child = Command::new(&binary)
            .args(["stdin", "stdout", "-l", &self.language])
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()?;

        // An early exit breaks the pipe; its status and stderr come first.
        let written = match child.stdin.take() {
            Some(mut stdin) => stdin.write_all(png_bytes),
            None => Ok(()),
        };

        let output = child.wait_with_output()?;
        if !output.status.success() {
            return Err(OcrError::Failed {
                status: output.status.to_string(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }
        written?;

        let text = String::from_utf8_lossy(&output.stdout).into_owned();
        log::info!(
            "[OCR] tesseract ({}) read {} chars in {}ms",
            self.language,
            text.len(),
            start.elapsed().as_millis()
        );
        Ok(text)
    }
}
