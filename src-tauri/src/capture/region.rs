//! Pure region logic — functional core.
//!
//! This module has zero infrastructure dependencies. It turns pointer
//! gestures into screen rectangles and cuts rectangles out of pixel data.

use image::{DynamicImage, ImageFormat};
use serde::Serialize;
use std::io::Cursor;

/// A point in overlay coordinates (CSS pixels inside the overlay window).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

/// Axis-aligned rectangle in screen pixels.
///
/// Always normalized: `left <= right` and `top <= bottom`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Region {
    pub left: i32,
    pub top: i32,
    pub right: i32,
    pub bottom: i32,
}

impl Region {
    /// Build a region from two opposite corners given in any order.
    pub fn from_corners(a: (i32, i32), b: (i32, i32)) -> Self {
        Self {
            left: a.0.min(b.0),
            top: a.1.min(b.1),
            right: a.0.max(b.0),
            bottom: a.1.max(b.1),
        }
    }

    pub fn width(&self) -> u32 {
        self.right.abs_diff(self.left)
    }

    pub fn height(&self) -> u32 {
        self.bottom.abs_diff(self.top)
    }

    pub fn is_empty(&self) -> bool {
        self.width() == 0 || self.height() == 0
    }

    /// Shift the region so that `(origin_x, origin_y)` becomes `(0, 0)`.
    pub fn relative_to(&self, origin_x: i32, origin_y: i32) -> Self {
        Self {
            left: self.left - origin_x,
            top: self.top - origin_y,
            right: self.right - origin_x,
            bottom: self.bottom - origin_y,
        }
    }

    /// Intersect with the rectangle `(0, 0, width, height)`.
    pub fn clamp_to(&self, width: u32, height: u32) -> Self {
        let max_x = i32::try_from(width).unwrap_or(i32::MAX);
        let max_y = i32::try_from(height).unwrap_or(i32::MAX);
        Self {
            left: self.left.clamp(0, max_x),
            top: self.top.clamp(0, max_y),
            right: self.right.clamp(0, max_x),
            bottom: self.bottom.clamp(0, max_y),
        }
    }
}

impl std::fmt::Display for Region {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "({}, {}, {}, {})",
            self.left, self.top, self.right, self.bottom
        )
    }
}

/// Converts overlay coordinates to physical screen pixels.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScreenMapping {
    /// Physical screen position of the overlay's top-left corner.
    pub origin_x: i32,
    pub origin_y: i32,
    /// Physical pixels per overlay pixel.
    pub scale: f64,
}

impl ScreenMapping {
    pub fn identity() -> Self {
        Self {
            origin_x: 0,
            origin_y: 0,
            scale: 1.0,
        }
    }

    pub fn to_screen(&self, p: Point) -> (i32, i32) {
        (
            self.origin_x + (p.x * self.scale).round() as i32,
            self.origin_y + (p.y * self.scale).round() as i32,
        )
    }

    pub fn region(&self, a: Point, b: Point) -> Region {
        Region::from_corners(self.to_screen(a), self.to_screen(b))
    }
}

/// Press-drag-release tracker for the selection rectangle.
///
/// Works in overlay coordinates. The rectangle is anchored at the press
/// position and its opposite corner follows the pointer until release.
#[derive(Debug, Default)]
pub struct DragGesture {
    anchor: Option<Point>,
}

impl DragGesture {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reset(&mut self) {
        self.anchor = None;
    }

    pub fn is_active(&self) -> bool {
        self.anchor.is_some()
    }

    pub fn press(&mut self, p: Point) {
        self.anchor = Some(p);
    }

    /// The (anchor, pointer) pair to draw, or `None` when no button is held.
    pub fn drag(&self, p: Point) -> Option<(Point, Point)> {
        Some((self.anchor?, p))
    }

    /// Finish the gesture. Returns the (anchor, release) pair and clears
    /// the tracker, or `None` if the button was never pressed.
    pub fn release(&mut self, p: Point) -> Option<(Point, Point)> {
        let anchor = self.anchor.take()?;
        Some((anchor, p))
    }
}

/// Crops a `DynamicImage` to the specified rectangle and returns PNG bytes.
///
/// # Arguments
/// * `image` - The monitor screenshot
/// * `x` - Left edge of the crop rectangle
/// * `y` - Top edge of the crop rectangle
/// * `width` - Width of the crop rectangle
/// * `height` - Height of the crop rectangle
pub fn crop_to_png_bytes(
    image: &DynamicImage,
    x: u32,
    y: u32,
    width: u32,
    height: u32,
) -> Result<Vec<u8>, CropError> {
    if width == 0 || height == 0 {
        return Err(CropError::ZeroDimension);
    }

    let (img_width, img_height) = (image.width(), image.height());

    if x.saturating_add(width) > img_width || y.saturating_add(height) > img_height {
        return Err(CropError::OutOfBounds {
            requested: (x, y, width, height),
            image_size: (img_width, img_height),
        });
    }

    let cropped = image.crop_imm(x, y, width, height);

    let mut png_bytes: Vec<u8> = Vec::new();
    cropped
        .write_to(&mut Cursor::new(&mut png_bytes), ImageFormat::Png)
        .map_err(|e| CropError::EncodingFailed(e.to_string()))?;

    Ok(png_bytes)
}

#[derive(Debug, thiserror::Error)]
pub enum CropError {
    #[error("Crop rectangle has zero width or height")]
    ZeroDimension,

    #[error(
        "Crop rectangle ({},{},{},{}) exceeds image bounds ({}x{})",
        requested.0, requested.1, requested.2, requested.3,
        image_size.0, image_size.1
    )]
    OutOfBounds {
        requested: (u32, u32, u32, u32),
        image_size: (u32, u32),
    },

    #[error("PNG encoding failed: {0}")]
    EncodingFailed(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{DynamicImage, RgbaImage};

    #[test]
    fn up_left_drag_is_normalized() {
        let r = Region::from_corners((300, 300), (100, 100));
        assert_eq!(
            r,
            Region {
                left: 100,
                top: 100,
                right: 300,
                bottom: 300
            }
        );
    }

    #[test]
    fn every_drag_direction_normalizes() {
        let corners = [(10, 20), (90, 20), (10, 80), (90, 80)];
        for &a in &corners {
            for &b in &corners {
                let r = Region::from_corners(a, b);
                assert!(r.left <= r.right, "{a:?} -> {b:?} gave {r}");
                assert!(r.top <= r.bottom, "{a:?} -> {b:?} gave {r}");
            }
        }
    }

    #[test]
    fn click_without_drag_is_empty_region() {
        let r = Region::from_corners((5, 5), (5, 5));
        assert!(r.is_empty());
        assert_eq!(r.width(), 0);
    }

    #[test]
    fn gesture_tracks_live_corner_and_finishes() {
        let mut g = DragGesture::new();
        assert!(g.drag(Point::new(1.0, 1.0)).is_none(), "drag without press");

        g.press(Point::new(300.0, 300.0));
        assert!(g.is_active());
        let (a, c) = g.drag(Point::new(200.0, 250.0)).unwrap();
        assert_eq!(a, Point::new(300.0, 300.0));
        assert_eq!(c, Point::new(200.0, 250.0));

        let (a, b) = g.release(Point::new(100.0, 100.0)).unwrap();
        let r = ScreenMapping::identity().region(a, b);
        assert_eq!(r, Region::from_corners((100, 100), (300, 300)));
        assert!(!g.is_active());
    }

    #[test]
    fn release_without_press_yields_nothing() {
        let mut g = DragGesture::new();
        assert!(g.release(Point::new(10.0, 10.0)).is_none());
    }

    #[test]
    fn mapping_applies_scale_and_origin() {
        let m = ScreenMapping {
            origin_x: -1920,
            origin_y: 0,
            scale: 2.0,
        };
        assert_eq!(m.to_screen(Point::new(10.0, 20.5)), (-1900, 41));
    }

    #[test]
    fn relative_and_clamp() {
        let r = Region::from_corners((1900, 10), (2100, 50)).relative_to(1920, 0);
        assert_eq!(r.left, -20);
        let c = r.clamp_to(1920, 1080);
        assert_eq!(c, Region::from_corners((0, 10), (180, 50)));
    }

    #[test]
    fn crop_valid_region() {
        let img = DynamicImage::ImageRgba8(RgbaImage::new(100, 100));
        let bytes = crop_to_png_bytes(&img, 10, 10, 50, 50).unwrap();
        // PNG magic bytes
        assert_eq!(&bytes[..4], &[0x89, 0x50, 0x4E, 0x47]);
    }

    #[test]
    fn crop_zero_dimension_fails() {
        let img = DynamicImage::ImageRgba8(RgbaImage::new(100, 100));
        let result = crop_to_png_bytes(&img, 0, 0, 0, 50);
        assert!(matches!(result, Err(CropError::ZeroDimension)));
    }

    #[test]
    fn crop_out_of_bounds_fails() {
        let img = DynamicImage::ImageRgba8(RgbaImage::new(100, 100));
        let result = crop_to_png_bytes(&img, 80, 80, 30, 30);
        assert!(matches!(result, Err(CropError::OutOfBounds { .. })));
    }
}
