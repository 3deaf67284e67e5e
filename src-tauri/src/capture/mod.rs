//! Screen capture domain — public API.
//!
//! This module owns region geometry, screen grabbing, and the
//! capture-then-OCR step the pipeline calls after a region is chosen.
//! External code should only use the items exported here.

mod region;
mod screenshot;

pub use region::{crop_to_png_bytes, CropError, DragGesture, Point, Region, ScreenMapping};
pub use screenshot::GrabError;

use crate::ocr::{OcrEngine, OcrError};
use std::time::Instant;

/// Turns a screen region into text.
pub trait TextExtractor: Send + Sync {
    /// Returns the trimmed text found in `region`. An empty string means the
    /// grab and OCR worked but found nothing.
    fn extract_text(&self, region: Region) -> Result<String, CaptureError>;
}

/// Grabs screen pixels with `xcap` and hands the crop to an OCR engine.
pub struct ScreenOcr<E> {
    engine: E,
}

impl<E: OcrEngine> ScreenOcr<E> {
    pub fn new(engine: E) -> Self {
        Self { engine }
    }
}

impl<E: OcrEngine> TextExtractor for ScreenOcr<E> {
    fn extract_text(&self, region: Region) -> Result<String, CaptureError> {
        if region.is_empty() {
            return Err(CaptureError::EmptyRegion {
                width: region.width(),
                height: region.height(),
            });
        }

        let start = Instant::now();
        let shot = screenshot::capture_monitor_for(&region)?;

        let local = region
            .relative_to(shot.origin_x, shot.origin_y)
            .clamp_to(shot.image.width(), shot.image.height());
        let png = crop_to_png_bytes(
            &shot.image,
            local.left as u32,
            local.top as u32,
            local.width(),
            local.height(),
        )?;
        log::info!(
            "[CAPTURE] Region {} cropped in {}ms — {} bytes",
            region,
            start.elapsed().as_millis(),
            png.len()
        );

        let text = self.engine.recognize(&png)?;
        Ok(text.trim().to_string())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum CaptureError {
    #[error("Selected region is empty ({width}x{height})")]
    EmptyRegion { width: u32, height: u32 },

    #[error(transparent)]
    Grab(#[from] GrabError),

    #[error(transparent)]
    Crop(#[from] CropError),

    #[error("OCR Error: {0}")]
    Ocr(#[from] OcrError),
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingEngine(AtomicUsize);

    impl OcrEngine for CountingEngine {
        fn recognize(&self, _png: &[u8]) -> Result<String, OcrError> {
            self.0.fetch_add(1, Ordering::SeqCst);
            Ok("  text \n".to_string())
        }
    }

    #[test]
    fn empty_region_fails_before_grab_or_ocr() {
        let ocr = ScreenOcr::new(CountingEngine(AtomicUsize::new(0)));
        let err = ocr
            .extract_text(Region::from_corners((40, 40), (40, 90)))
            .unwrap_err();
        assert!(matches!(err, CaptureError::EmptyRegion { width: 0, height: 50 }));
        assert_eq!(ocr.engine.0.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn capture_errors_carry_a_cause() {
        let err = CaptureError::Ocr(OcrError::EngineUnavailable("not installed".into()));
        assert!(err.to_string().contains("not installed"));
    }
}
