//! User-facing dialogs: modal notices, the settings editor and the exit
//! confirmation.
//!
//! Message boxes use `tauri-plugin-dialog` in blocking mode, which waits on
//! the main event loop. They must only be shown from a worker thread.

use crate::pipeline::{NoticeKind, Notifier};
use crate::settings::{Settings, SettingsStore};
use serde::Serialize;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use tauri::{AppHandle, Manager, WebviewUrl, WebviewWindow};
use tauri_plugin_dialog::{DialogExt, MessageDialogButtons, MessageDialogKind};

pub const SETTINGS_LABEL: &str = "settings";

/// Guards against stacking exit confirmations from repeated hotkey presses.
static EXIT_PROMPT_OPEN: AtomicBool = AtomicBool::new(false);

fn dialog_kind(kind: NoticeKind) -> MessageDialogKind {
    match kind {
        NoticeKind::Info => MessageDialogKind::Info,
        NoticeKind::Error => MessageDialogKind::Error,
    }
}

/// Notifier backed by native message boxes. Blocks until dismissed.
pub struct DialogNotifier {
    app: AppHandle,
}

impl DialogNotifier {
    pub fn new(app: AppHandle) -> Self {
        Self { app }
    }
}

impl Notifier for DialogNotifier {
    fn notify(&self, kind: NoticeKind, title: &str, message: &str) {
        self.app
            .dialog()
            .message(message)
            .title(title)
            .kind(dialog_kind(kind))
            .blocking_show();
    }
}

/// Show a notice from a context that must not block (main thread, command
/// handlers). `then` runs on the same worker after the notice is dismissed.
pub fn spawn_notice<F>(app: &AppHandle, kind: NoticeKind, title: &str, message: &str, then: F)
where
    F: FnOnce(&AppHandle) + Send + 'static,
{
    let app = app.clone();
    let title = title.to_string();
    let message = message.to_string();
    let spawned = thread::Builder::new()
        .name("notice".to_string())
        .spawn(move || {
            DialogNotifier::new(app.clone()).notify(kind, &title, &message);
            then(&app);
        });
    if let Err(e) = spawned {
        log::error!("[DIALOG] Failed to spawn notice thread: {}", e);
    }
}

/// Settings as loaded at startup plus where to write edits.
pub struct SettingsContext {
    pub current: Settings,
    pub store: SettingsStore,
}

/// The editable subset shown in the settings window.
#[derive(Debug, Serialize)]
pub struct EndpointFields {
    pub base_url: String,
    pub model_name: String,
}

/// Open the settings editor, or focus it if it is already open.
pub fn open_settings_window(app: &AppHandle) -> tauri::Result<WebviewWindow> {
    if let Some(window) = app.get_webview_window(SETTINGS_LABEL) {
        window.set_focus()?;
        return Ok(window);
    }

    tauri::WebviewWindowBuilder::new(app, SETTINGS_LABEL, WebviewUrl::App("settings.html".into()))
        .title("Settings")
        .inner_size(460.0, 260.0)
        .resizable(false)
        .always_on_top(true)
        .center()
        .focused(true)
        .build()
}

/// Tauri command: values to seed the settings form with.
#[tauri::command]
pub fn get_settings(context: tauri::State<'_, SettingsContext>) -> EndpointFields {
    EndpointFields {
        base_url: context.current.base_url.clone(),
        model_name: context.current.model_name.clone(),
    }
}

/// Tauri command: validate and persist the endpoint fields.
///
/// A validation or write error comes back as the command error so the form
/// can show it and stay open. On success the user is told to restart and
/// the window closes.
#[tauri::command]
pub fn save_settings(
    app: AppHandle,
    context: tauri::State<'_, SettingsContext>,
    base_url: String,
    model_name: String,
) -> Result<(), String> {
    let updated = context
        .current
        .with_endpoint(&base_url, &model_name)
        .map_err(|e| e.to_string())?;
    context.store.save(&updated).map_err(|e| e.to_string())?;

    spawn_notice(
        &app,
        NoticeKind::Info,
        "Settings",
        "Settings saved. Please restart the app.",
        |app| {
            if let Some(window) = app.get_webview_window(SETTINGS_LABEL) {
                let _ = window.close();
            }
        },
    );
    Ok(())
}

/// Ask before exiting. The single "Exit Program" button ends the process
/// immediately; dismissing the box does nothing.
pub fn confirm_exit(app: &AppHandle) {
    if EXIT_PROMPT_OPEN.swap(true, Ordering::SeqCst) {
        log::debug!("[DIALOG] Exit confirmation already open");
        return;
    }

    let app = app.clone();
    let spawned = thread::Builder::new()
        .name("exit-confirm".to_string())
        .spawn(move || {
            let confirmed = app
                .dialog()
                .message("Exit the OCR assistant?")
                .title("Exit")
                .kind(MessageDialogKind::Warning)
                .buttons(MessageDialogButtons::OkCustom("Exit Program".to_string()))
                .blocking_show();
            EXIT_PROMPT_OPEN.store(false, Ordering::SeqCst);

            if confirmed {
                log::info!("[DIALOG] Exit confirmed");
                app.exit(0);
            }
        });

    if let Err(e) = spawned {
        EXIT_PROMPT_OPEN.store(false, Ordering::SeqCst);
        log::error!("[DIALOG] Failed to spawn exit confirmation: {}", e);
    }
}
