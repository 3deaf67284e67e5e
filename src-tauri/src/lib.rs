//! OCR Assistant — Tauri application entry point.
//!
//! This is the app shell that wires together:
//! - Startup mode prompt and connectivity check (startup.rs)
//! - System tray (tray.rs) and global hotkeys (hotkeys.rs)
//! - The capture → OCR → model pipeline (pipeline.rs)
//! - Overlay and dialog windows (overlay.rs, dialogs.rs)

mod capture;
mod clipboard;
mod dialogs;
mod hotkeys;
mod interaction_log;
pub mod llm;
mod ocr;
mod overlay;
mod pipeline;
pub mod settings;
mod startup;
mod tray;

use clipboard::ArboardClipboard;
use dialogs::{DialogNotifier, SettingsContext, SETTINGS_LABEL};
use interaction_log::InteractionLog;
use llm::ChatQuery;
use ocr::TesseractEngine;
use overlay::{OverlaySelector, SelectionState};
use pipeline::{Collaborators, NoticeKind, Orchestrator};
use settings::{Settings, SettingsStore};
use startup::{Connectivity, StartupMode, StartupPolicy};
use std::sync::Arc;
use tauri::{Manager, RunEvent, WindowEvent};

fn init_logging() {
    let _ = dotenvy::dotenv();
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
}

fn load_settings(store: &SettingsStore) -> Settings {
    match store.load() {
        Ok(settings) => {
            log::info!("[SETTINGS] Loaded from {}", store.path().display());
            settings
        }
        Err(e) => {
            log::warn!("[SETTINGS] {} — using defaults", e);
            Settings::default()
        }
    }
}

/// Entry point — called from main.rs.
#[cfg_attr(mobile, tauri::mobile_entry_point)]
pub fn run() {
    init_logging();

    let store = SettingsStore::default_location();
    let settings = load_settings(&store);

    let mut input = std::io::stdin().lock();
    let mode = match startup::prompt_startup_mode(&mut input, &mut std::io::stdout()) {
        Ok(mode) => mode,
        Err(e) => {
            log::info!("[STARTUP] {}", e);
            println!("No valid choice. Exiting.");
            return;
        }
    };
    log::info!("[STARTUP] Mode: {:?}", mode);

    let connectivity = if mode.needs_model() {
        tauri::async_runtime::block_on(startup::check_connectivity(&settings))
    } else {
        Connectivity::Ready
    };

    let query = match ChatQuery::from_settings(&settings) {
        Ok(query) => query,
        Err(e) => {
            log::error!("[STARTUP] Failed to build HTTP client: {}", e);
            return;
        }
    };
    let ocr_engine = TesseractEngine::new(settings.ocr_language.clone());
    if mode.needs_model() {
        ocr_engine.probe();
    }

    let app = tauri::Builder::default()
        .plugin(tauri_plugin_dialog::init())
        .plugin(tauri_plugin_global_shortcut::Builder::new().build())
        .manage(SelectionState::new())
        .manage(SettingsContext {
            current: settings,
            store,
        })
        .invoke_handler(tauri::generate_handler![
            overlay::overlay_press,
            overlay::overlay_drag,
            overlay::overlay_release,
            overlay::overlay_cancel,
            dialogs::get_settings,
            dialogs::save_settings,
        ])
        .on_window_event(move |window, event| {
            if let WindowEvent::Destroyed = event {
                let label = window.label();
                if label == SETTINGS_LABEL && mode == StartupMode::Settings {
                    log::info!("[STARTUP] Settings closed — exiting");
                    window.app_handle().exit(0);
                } else {
                    overlay::on_overlay_destroyed(window.app_handle(), label);
                }
            }
        })
        .setup(move |app| {
            let handle = app.handle().clone();

            if mode == StartupMode::Settings {
                dialogs::open_settings_window(&handle)?;
                return Ok(());
            }

            let interaction_log = InteractionLog::new(settings::default_log_path());
            log::info!(
                "[STARTUP] Interactions are logged to {}",
                interaction_log.path().display()
            );

            let orchestrator = Arc::new(Orchestrator::new(Collaborators {
                selector: Box::new(OverlaySelector::new(handle.clone())),
                extractor: Box::new(capture::ScreenOcr::new(ocr_engine)),
                engine: Box::new(query),
                notifier: Box::new(DialogNotifier::new(handle.clone())),
                clipboard: Box::new(ArboardClipboard),
                log: Box::new(interaction_log),
            }));
            app.manage(orchestrator);

            if let Some(message) = connectivity.message() {
                if let Connectivity::Failed {
                    policy: StartupPolicy::Strict,
                    ..
                } = connectivity
                {
                    dialogs::spawn_notice(
                        &handle,
                        NoticeKind::Error,
                        "Connection Error",
                        &message,
                        |app| app.exit(1),
                    );
                    return Ok(());
                }
                log::warn!("[STARTUP] Continuing without a reachable model");
                dialogs::spawn_notice(
                    &handle,
                    NoticeKind::Error,
                    "Connection Warning",
                    &message,
                    |_| {},
                );
            }

            hotkeys::register_hotkeys(&handle)?;
            if mode == StartupMode::Tray {
                tray::setup_tray(&handle)?;
            }

            log::info!("[STARTUP] Ready — press Ctrl+Shift+G to capture, Ctrl+Shift+Q to exit");
            Ok(())
        })
        .build(tauri::generate_context!())
        .expect("Error building OCR Assistant");

    app.run(move |_app, event| {
        // Closing the overlay or a dialog must not end a tray/hotkey session.
        if let RunEvent::ExitRequested {
            code: None, api, ..
        } = event
        {
            if mode.needs_model() {
                api.prevent_exit();
            }
        }
    });
}
