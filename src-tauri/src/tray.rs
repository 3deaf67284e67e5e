//! System tray setup and menu handler.
//!
//! In tray mode the icon is the main entry point: its menu starts a
//! capture cycle, opens the settings editor, or quits.

use crate::dialogs;
use crate::pipeline::Orchestrator;
use std::sync::Arc;
use tauri::{
    image::Image as TauriImage,
    menu::{MenuBuilder, MenuItemBuilder},
    tray::TrayIconBuilder,
    AppHandle, Manager,
};

const ICON_SIZE: u32 = 64;
/// Placeholder icon colour (opaque black).
const ICON_RGBA: [u8; 4] = [0, 0, 0, 255];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrayAction {
    Activate,
    Settings,
    Quit,
}

impl TrayAction {
    pub const ALL: [TrayAction; 3] = [Self::Activate, Self::Settings, Self::Quit];

    pub fn id(self) -> &'static str {
        match self {
            Self::Activate => "activate",
            Self::Settings => "settings",
            Self::Quit => "quit",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::Activate => "Activate (Ctrl+Shift+G)",
            Self::Settings => "Settings",
            Self::Quit => "Quit",
        }
    }

    pub fn from_id(id: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|a| a.id() == id)
    }
}

/// Run the handler bound to a tray menu entry.
pub fn dispatch(app: &AppHandle, action: TrayAction) {
    match action {
        TrayAction::Activate => {
            log::info!("[TRAY] Activate selected");
            let orchestrator = app.state::<Arc<Orchestrator>>();
            orchestrator.trigger();
        }
        TrayAction::Settings => {
            log::info!("[TRAY] Settings selected");
            if let Err(e) = dialogs::open_settings_window(app) {
                log::error!("[TRAY] Failed to open settings: {}", e);
            }
        }
        TrayAction::Quit => {
            log::info!("[TRAY] Quit selected");
            app.exit(0);
        }
    }
}

fn placeholder_icon() -> TauriImage<'static> {
    let rgba = image::RgbaImage::from_pixel(ICON_SIZE, ICON_SIZE, image::Rgba(ICON_RGBA));
    TauriImage::new_owned(rgba.into_raw(), ICON_SIZE, ICON_SIZE)
}

/// Sets up the tray icon and its Activate / Settings / Quit menu.
pub fn setup_tray(app: &AppHandle) -> Result<(), Box<dyn std::error::Error>> {
    let mut menu = MenuBuilder::new(app);
    for action in TrayAction::ALL {
        let item = MenuItemBuilder::with_id(action.id(), action.label()).build(app)?;
        menu = menu.item(&item);
    }
    let menu = menu.build()?;

    let _tray = TrayIconBuilder::with_id("main")
        .icon(placeholder_icon())
        .tooltip("OCR Assistant")
        .menu(&menu)
        .show_menu_on_left_click(true)
        .on_menu_event(|app, event| match TrayAction::from_id(event.id().as_ref()) {
            Some(action) => dispatch(app, action),
            None => log::warn!("[TRAY] Unknown menu id: {}", event.id().as_ref()),
        })
        .build(app)?;

    log::info!("[TRAY] Tray icon ready");
    Ok(())
}
