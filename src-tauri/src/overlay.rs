//! Region selection overlay.
//!
//! The pipeline thread opens a transparent, always-on-top webview over the
//! whole desktop and blocks on a channel. The page (`ui/overlay.html`)
//! forwards pointer events to the commands below. Release resolves the
//! session with a region, while Escape or a closed window resolves it
//! with `None`.
//!
//! Every overlay is labelled `overlay-<session>` so events from a window
//! that is already closing can't resolve a newer selection.

use crate::capture::{DragGesture, Point, Region, ScreenMapping};
use crate::pipeline::{RegionSelector, SelectionError};
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::Mutex;
use tauri::{AppHandle, Manager, PhysicalPosition, PhysicalSize, WebviewUrl, WebviewWindow};

const LABEL_PREFIX: &str = "overlay-";

struct PendingSelection {
    session: u64,
    reply: Sender<Option<Region>>,
}

/// Shared between the blocked pipeline thread and the overlay commands.
#[derive(Default)]
pub struct SelectionState {
    gesture: Mutex<DragGesture>,
    pending: Mutex<Option<PendingSelection>>,
    next_session: AtomicU64,
}

impl SelectionState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a new session. Any older pending session is dropped, which
    /// wakes its receiver with a disconnect.
    pub fn begin(&self) -> (u64, Receiver<Option<Region>>) {
        let session = self.next_session.fetch_add(1, Ordering::SeqCst) + 1;
        let (tx, rx) = mpsc::channel();

        if let Ok(mut gesture) = self.gesture.lock() {
            gesture.reset();
        }
        if let Ok(mut pending) = self.pending.lock() {
            *pending = Some(PendingSelection { session, reply: tx });
        }
        (session, rx)
    }

    /// Deliver the outcome of `session`. Returns false if that session is
    /// no longer the pending one.
    pub fn resolve(&self, session: u64, region: Option<Region>) -> bool {
        let Ok(mut pending) = self.pending.lock() else {
            return false;
        };
        match pending.take() {
            Some(p) if p.session == session => {
                let _ = p.reply.send(region);
                true
            }
            other => {
                *pending = other;
                false
            }
        }
    }

    fn is_current(&self, session: u64) -> bool {
        self.pending
            .lock()
            .map(|p| p.as_ref().is_some_and(|p| p.session == session))
            .unwrap_or(false)
    }

    /// Run `f` on the gesture of `session`. Events from any other session
    /// leave the gesture untouched and yield `None`.
    fn with_gesture<T>(
        &self,
        session: u64,
        f: impl FnOnce(&mut DragGesture) -> Option<T>,
    ) -> Result<Option<T>, String> {
        if !self.is_current(session) {
            return Ok(None);
        }
        let mut gesture = self.gesture.lock().map_err(|e| e.to_string())?;
        Ok(f(&mut gesture))
    }

    pub fn press(&self, session: u64, p: Point) -> Result<(), String> {
        self.with_gesture(session, |g| {
            g.press(p);
            Some(())
        })
        .map(|_| ())
    }

    pub fn drag(&self, session: u64, p: Point) -> Result<Option<DragRect>, String> {
        self.with_gesture(session, |g| g.drag(p))
            .map(|pair| pair.map(|(a, b)| DragRect::between(a, b)))
    }

    /// Finish the gesture of `session`: the (anchor, release) pair, or
    /// `None` for a stale session or a release without a press.
    pub fn release(&self, session: u64, p: Point) -> Result<Option<(Point, Point)>, String> {
        self.with_gesture(session, |g| g.release(p))
    }
}

/// Rectangle to draw, in overlay (CSS) pixels.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct DragRect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl DragRect {
    fn between(a: Point, b: Point) -> Self {
        Self {
            x: a.x.min(b.x),
            y: a.y.min(b.y),
            width: (a.x - b.x).abs(),
            height: (a.y - b.y).abs(),
        }
    }
}

/// Session id encoded in an overlay window label.
pub fn session_from_label(label: &str) -> Option<u64> {
    label.strip_prefix(LABEL_PREFIX)?.parse().ok()
}

/// Bounding box `(x, y, width, height)` of a set of monitor rectangles.
pub fn virtual_bounds(monitors: &[(i32, i32, u32, u32)]) -> Option<(i32, i32, u32, u32)> {
    let mut iter = monitors.iter();
    let &(x, y, w, h) = iter.next()?;
    let (mut left, mut top) = (i64::from(x), i64::from(y));
    let (mut right, mut bottom) = (left + i64::from(w), top + i64::from(h));

    for &(x, y, w, h) in iter {
        left = left.min(i64::from(x));
        top = top.min(i64::from(y));
        right = right.max(i64::from(x) + i64::from(w));
        bottom = bottom.max(i64::from(y) + i64::from(h));
    }

    Some((
        left as i32,
        top as i32,
        (right - left) as u32,
        (bottom - top) as u32,
    ))
}

/// Region selector that runs the webview overlay.
pub struct OverlaySelector {
    app: AppHandle,
}

impl OverlaySelector {
    pub fn new(app: AppHandle) -> Self {
        Self { app }
    }
}

impl RegionSelector for OverlaySelector {
    fn select_region(&self) -> Result<Option<Region>, SelectionError> {
        let state = self.app.state::<SelectionState>();
        let (session, rx) = state.begin();

        if let Err(e) = open_overlay(&self.app, session) {
            state.resolve(session, None);
            return Err(SelectionError(e.to_string()));
        }
        log::info!("[OVERLAY] Session {} waiting for selection", session);

        // A dropped sender (superseded session) counts as a cancel.
        Ok(rx.recv().unwrap_or(None))
    }
}

fn open_overlay(app: &AppHandle, session: u64) -> tauri::Result<WebviewWindow> {
    let label = format!("{}{}", LABEL_PREFIX, session);

    let url = WebviewUrl::App("overlay.html".into());
    let mut builder = tauri::WebviewWindowBuilder::new(app, &label, url)
        .initialization_script(&format!("window.__OVERLAY_SESSION__ = {};", session))
        .title("OCR Assistant Selection")
        .transparent(true)
        .decorations(false)
        .always_on_top(true)
        .skip_taskbar(true)
        .resizable(false)
        .shadow(false)
        .focused(true);

    let monitors: Vec<(i32, i32, u32, u32)> = app
        .available_monitors()
        .unwrap_or_default()
        .iter()
        .map(|m| (m.position().x, m.position().y, m.size().width, m.size().height))
        .collect();
    let bounds = virtual_bounds(&monitors);
    if bounds.is_none() {
        builder = builder.fullscreen(true);
    } else {
        builder = builder.visible(false);
    }

    let window = builder.build()?;
    if let Some((x, y, width, height)) = bounds {
        window.set_position(PhysicalPosition::new(x, y))?;
        window.set_size(PhysicalSize::new(width, height))?;
        window.show()?;
        window.set_focus()?;
    }
    Ok(window)
}

fn mapping_for(window: &WebviewWindow) -> Result<ScreenMapping, String> {
    let origin = window.inner_position().map_err(|e| e.to_string())?;
    let scale = window.scale_factor().map_err(|e| e.to_string())?;
    Ok(ScreenMapping {
        origin_x: origin.x,
        origin_y: origin.y,
        scale,
    })
}

/// Tauri command: mouse button pressed at `(x, y)`.
#[tauri::command]
pub fn overlay_press(
    state: tauri::State<'_, SelectionState>,
    session: u64,
    x: f64,
    y: f64,
) -> Result<(), String> {
    state.press(session, Point::new(x, y))
}

/// Tauri command: pointer moved. Returns the rectangle to draw, if a drag
/// is in progress.
#[tauri::command]
pub fn overlay_drag(
    state: tauri::State<'_, SelectionState>,
    session: u64,
    x: f64,
    y: f64,
) -> Result<Option<DragRect>, String> {
    state.drag(session, Point::new(x, y))
}

/// Tauri command: mouse button released. Completes the selection and
/// closes the overlay.
#[tauri::command]
pub fn overlay_release(
    window: WebviewWindow,
    state: tauri::State<'_, SelectionState>,
    session: u64,
    x: f64,
    y: f64,
) -> Result<(), String> {
    if !state.is_current(session) {
        log::debug!("[OVERLAY] Release from stale session {}", session);
        return window.close().map_err(|e| e.to_string());
    }
    let Some((anchor, end)) = state.release(session, Point::new(x, y))? else {
        // Release without a press: keep waiting for a real gesture.
        return Ok(());
    };

    let region = mapping_for(&window)?.region(anchor, end);
    if state.resolve(session, Some(region)) {
        log::info!("[OVERLAY] Session {} selected {}", session, region);
    }
    window.close().map_err(|e| e.to_string())
}

/// Tauri command: selection abandoned (Escape).
#[tauri::command]
pub fn overlay_cancel(
    window: WebviewWindow,
    state: tauri::State<'_, SelectionState>,
    session: u64,
) -> Result<(), String> {
    if state.resolve(session, None) {
        log::info!("[OVERLAY] Session {} cancelled", session);
    }
    window.close().map_err(|e| e.to_string())
}

/// Window-event hook: an overlay destroyed before resolving is a cancel.
pub fn on_overlay_destroyed(app: &AppHandle, label: &str) {
    if let Some(session) = session_from_label(label) {
        if app.state::<SelectionState>().resolve(session, None) {
            log::info!("[OVERLAY] Session {} window closed without a selection", session);
        }
    }
}
