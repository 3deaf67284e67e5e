//! Startup mode prompt and the model-endpoint connectivity check.

use crate::llm::{ChatClient, QueryError};
use crate::settings::Settings;
use std::io::{BufRead, Write};
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartupMode {
    /// Tray icon plus global hotkeys.
    Tray,
    /// Global hotkeys only.
    Hotkey,
    /// Open the settings editor and exit when it closes.
    Settings,
}

impl StartupMode {
    /// Modes that run capture cycles and need a reachable model.
    pub fn needs_model(self) -> bool {
        !matches!(self, Self::Settings)
    }
}

#[derive(Debug, thiserror::Error)]
#[error("unrecognized startup mode {0:?}")]
pub struct UnknownMode(String);

impl FromStr for StartupMode {
    type Err = UnknownMode;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "tray" => Ok(Self::Tray),
            "hotkey" => Ok(Self::Hotkey),
            "settings" => Ok(Self::Settings),
            other => Err(UnknownMode(other.to_string())),
        }
    }
}

/// Ask on the console which mode to run in.
pub fn prompt_startup_mode<R: BufRead, W: Write>(
    input: &mut R,
    output: &mut W,
) -> Result<StartupMode, UnknownMode> {
    let _ = write!(
        output,
        "Type 'tray' for tray app, 'hotkey' for hotkey only, 'settings' for settings: "
    );
    let _ = output.flush();

    let mut line = String::new();
    if let Err(e) = input.read_line(&mut line) {
        log::warn!("[STARTUP] Failed to read startup choice: {}", e);
    }
    line.parse()
}

/// What to do when the model endpoint can't be reached at startup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartupPolicy {
    /// Tell the user and exit.
    Strict,
    /// Warn and keep running.
    Degraded,
}

impl StartupPolicy {
    pub fn from_settings(settings: &Settings) -> Self {
        if settings.strict_startup {
            Self::Strict
        } else {
            Self::Degraded
        }
    }
}

/// Outcome of the connectivity check.
#[derive(Debug)]
pub enum Connectivity {
    Ready,
    /// Endpoint unreachable; carries the cause and the policy to apply.
    Failed {
        error: QueryError,
        policy: StartupPolicy,
    },
}

impl Connectivity {
    pub fn message(&self) -> Option<String> {
        match self {
            Self::Ready => None,
            Self::Failed { error, .. } => Some(format!(
                "Could not connect to the model server. Please check your settings.\n\n{}",
                error
            )),
        }
    }
}

/// List the server's models once. Logs what it finds.
pub async fn check_connectivity(settings: &Settings) -> Connectivity {
    let policy = StartupPolicy::from_settings(settings);
    let result = match ChatClient::new(settings) {
        Ok(client) => client.list_models().await,
        Err(e) => Err(e),
    };

    match result {
        Ok(models) => {
            log::info!(
                "[STARTUP] Connected to {} ({} models: {})",
                settings.base_url,
                models.len(),
                models.join(", ")
            );
            if !models.iter().any(|m| m == &settings.model_name) {
                log::warn!(
                    "[STARTUP] Configured model {} is not in the server's list",
                    settings.model_name
                );
            }
            Connectivity::Ready
        }
        Err(error) => {
            log::error!("[STARTUP] Connectivity check failed: {}", error);
            Connectivity::Failed { error, policy }
        }
    }
}
