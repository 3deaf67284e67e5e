//! Global hotkeys, live for the whole process.
//!
//! Ctrl+Shift+G starts a capture cycle, Ctrl+Shift+Q asks to exit.

use crate::dialogs;
use crate::pipeline::Orchestrator;
use std::sync::Arc;
use tauri::{AppHandle, Manager};
use tauri_plugin_global_shortcut::{Code, GlobalShortcutExt, Modifiers, Shortcut, ShortcutState};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HotkeyAction {
    Activate,
    Exit,
}

impl HotkeyAction {
    pub const ALL: [HotkeyAction; 2] = [Self::Activate, Self::Exit];

    pub fn shortcut(self) -> Shortcut {
        let mods = Some(Modifiers::CONTROL | Modifiers::SHIFT);
        match self {
            Self::Activate => Shortcut::new(mods, Code::KeyG),
            Self::Exit => Shortcut::new(mods, Code::KeyQ),
        }
    }

    pub fn for_shortcut(shortcut: &Shortcut) -> Option<Self> {
        Self::ALL.into_iter().find(|a| a.shortcut().id() == shortcut.id())
    }
}

fn fire(app: &AppHandle, action: HotkeyAction) {
    match action {
        HotkeyAction::Activate => {
            log::info!("[HOTKEY] Activate pressed");
            app.state::<Arc<Orchestrator>>().trigger();
        }
        HotkeyAction::Exit => {
            log::info!("[HOTKEY] Exit pressed");
            dialogs::confirm_exit(app);
        }
    }
}

pub fn register_hotkeys(app: &AppHandle) -> Result<(), Box<dyn std::error::Error>> {
    let shortcuts = HotkeyAction::ALL.map(HotkeyAction::shortcut);
    app.global_shortcut()
        .on_shortcuts(shortcuts, |app, shortcut, event| {
            if event.state != ShortcutState::Pressed {
                return;
            }
            match HotkeyAction::for_shortcut(shortcut) {
                Some(action) => fire(app, action),
                None => log::warn!("[HOTKEY] Unbound shortcut {}", shortcut.into_string()),
            }
        })?;

    for action in HotkeyAction::ALL {
        log::info!("[HOTKEY] {} -> {:?}", action.shortcut().into_string(), action);
    }
    Ok(())
}
