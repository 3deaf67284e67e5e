//! Screen grabbing using the `xcap` crate.
//!
//! This is the infrastructure layer — it talks to the OS.

use super::region::Region;
use image::DynamicImage;
use xcap::Monitor;

/// A full-monitor screenshot plus the monitor's position on the virtual screen.
pub struct MonitorShot {
    pub image: DynamicImage,
    pub origin_x: i32,
    pub origin_y: i32,
}

/// Captures the monitor that holds the region's top-left corner.
///
/// Falls back to the primary monitor, then to the first one, when no
/// monitor contains that corner.
pub fn capture_monitor_for(region: &Region) -> Result<MonitorShot, GrabError> {
    let monitors = Monitor::all().map_err(|e| GrabError::MonitorEnumeration(e.to_string()))?;

    let index = monitors
        .iter()
        .position(|m| contains(m, region.left, region.top))
        .or_else(|| {
            monitors
                .iter()
                .position(|m| m.is_primary().unwrap_or(false))
        })
        .or((!monitors.is_empty()).then_some(0))
        .ok_or(GrabError::NoMonitor)?;

    let monitor = &monitors[index];
    let origin_x = monitor.x().unwrap_or(0);
    let origin_y = monitor.y().unwrap_or(0);

    let image = monitor
        .capture_image()
        .map_err(|e| GrabError::CaptureFailed(e.to_string()))?;

    log::debug!(
        "[CAPTURE] Grabbed monitor at ({}, {}) — {}x{}",
        origin_x,
        origin_y,
        image.width(),
        image.height()
    );

    Ok(MonitorShot {
        image: DynamicImage::ImageRgba8(image),
        origin_x,
        origin_y,
    })
}

fn contains(monitor: &Monitor, x: i32, y: i32) -> bool {
    let (Ok(mx), Ok(my), Ok(w), Ok(h)) = (
        monitor.x(),
        monitor.y(),
        monitor.width(),
        monitor.height(),
    ) else {
        return false;
    };
    x >= mx
        && y >= my
        && i64::from(x) < i64::from(mx) + i64::from(w)
        && i64::from(y) < i64::from(my) + i64::from(h)
}

#[derive(Debug, thiserror::Error)]
pub enum GrabError {
    #[error("Failed to enumerate monitors: {0}")]
    MonitorEnumeration(String),

    #[error("No monitor found")]
    NoMonitor,

    #[error("Screen capture failed: {0}")]
    CaptureFailed(String),
}
