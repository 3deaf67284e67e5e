//! OCR engine seam.
//!
//! An engine takes PNG bytes and returns the raw recognized text. Trimming
//! and the empty-text decision belong to the caller.

mod tesseract;

pub use tesseract::TesseractEngine;

pub trait OcrEngine: Send + Sync {
    fn recognize(&self, png_bytes: &[u8]) -> Result<String, OcrError>;
}

#[derive(Debug, thiserror::Error)]
pub enum OcrError {
    #[error("OCR engine not available: {0}")]
    EngineUnavailable(String),

    #[error("Failed to run OCR engine: {0}")]
    Spawn(#[from] std::io::Error),

    #[error("OCR engine exited with {status}: {stderr}")]
    Failed { status: String, stderr: String },
}
