//! Persisted settings — a flat `key=value` file read once at startup.
//!
//! Lives in the platform config directory:
//!   macOS:   ~/Library/Application Support/ocr-assistant/settings.txt
//!   Linux:   ~/.config/ocr-assistant/settings.txt
//!   Windows: %APPDATA%/ocr-assistant/settings.txt
//!
//! Settings are read-only for the rest of the process. The settings editor
//! writes the file, and the new values take effect on the next start.

use std::fmt::Write as _;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const DEFAULT_BASE_URL: &str = "http://127.0.0.1:1234/v1";
pub const DEFAULT_MODEL_NAME: &str = "mistralai/mistral-7b-instruct-v0.3";
/// LM Studio ignores the key, but OpenAI-compatible servers expect one.
pub const DEFAULT_API_KEY: &str = "lm-studio";
pub const DEFAULT_TIMEOUT_SECS: u64 = 120;
pub const DEFAULT_OCR_LANGUAGE: &str = "eng";

const SETTINGS_FILE: &str = "settings.txt";
const LOG_FILE: &str = "ocr_assistant_log.txt";

/// Per-user directory holding the settings file and the interaction log.
pub fn app_dir() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("ocr-assistant")
}

/// Default location of the interaction log.
pub fn default_log_path() -> PathBuf {
    app_dir().join(LOG_FILE)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub base_url: String,
    pub model_name: String,
    pub api_key: String,
    /// Use the streaming chat-completion variant.
    pub stream: bool,
    pub timeout_secs: u64,
    /// Abort startup when the model endpoint is unreachable.
    pub strict_startup: bool,
    pub ocr_language: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            model_name: DEFAULT_MODEL_NAME.to_string(),
            api_key: DEFAULT_API_KEY.to_string(),
            stream: false,
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            strict_startup: true,
            ocr_language: DEFAULT_OCR_LANGUAGE.to_string(),
        }
    }
}

impl Settings {
    /// Parse the `key=value` format.
    ///
    /// Lines without `=` are skipped, the first `=` splits key from value,
    /// and any key that is missing, empty, or unparseable keeps its default.
    pub fn parse(contents: &str) -> Self {
        let mut settings = Settings::default();

        for line in contents.lines() {
            let Some((key, value)) = line.trim().split_once('=') else {
                continue;
            };
            let (key, value) = (key.trim(), value.trim());
            if value.is_empty() {
                continue;
            }

            match key {
                "base_url" => settings.base_url = value.to_string(),
                "model_name" => settings.model_name = value.to_string(),
                "api_key" => settings.api_key = value.to_string(),
                "ocr_language" => settings.ocr_language = value.to_string(),
                "stream" => match parse_bool(value) {
                    Some(v) => settings.stream = v,
                    None => log::warn!("[SETTINGS] Ignoring invalid stream value: {}", value),
                },
                "strict_startup" => match parse_bool(value) {
                    Some(v) => settings.strict_startup = v,
                    None => {
                        log::warn!("[SETTINGS] Ignoring invalid strict_startup value: {}", value)
                    }
                },
                "timeout_secs" => match value.parse::<u64>() {
                    Ok(v) if v > 0 => settings.timeout_secs = v,
                    _ => log::warn!("[SETTINGS] Ignoring invalid timeout_secs value: {}", value),
                },
                other => log::debug!("[SETTINGS] Unknown key: {}", other),
            }
        }

        settings
    }

    /// Serialize back to the `key=value` format, one pair per line.
    pub fn to_file_contents(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "base_url={}", self.base_url);
        let _ = writeln!(out, "model_name={}", self.model_name);
        let _ = writeln!(out, "api_key={}", self.api_key);
        let _ = writeln!(out, "stream={}", self.stream);
        let _ = writeln!(out, "timeout_secs={}", self.timeout_secs);
        let _ = writeln!(out, "strict_startup={}", self.strict_startup);
        let _ = writeln!(out, "ocr_language={}", self.ocr_language);
        out
    }

    /// Return a copy with the two user-editable fields replaced, after validation.
    pub fn with_endpoint(
        &self,
        base_url: &str,
        model_name: &str,
    ) -> Result<Self, SettingsValidationError> {
        let base_url = base_url.trim();
        let model_name = model_name.trim();

        if base_url.is_empty() {
            return Err(SettingsValidationError::EmptyBaseUrl);
        }
        if model_name.is_empty() {
            return Err(SettingsValidationError::EmptyModelName);
        }
        match reqwest::Url::parse(base_url) {
            Ok(url) if matches!(url.scheme(), "http" | "https") => {}
            _ => return Err(SettingsValidationError::InvalidBaseUrl(base_url.to_string())),
        }

        Ok(Self {
            base_url: base_url.to_string(),
            model_name: model_name.to_string(),
            ..self.clone()
        })
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Some(true),
        "false" | "0" | "no" | "off" => Some(false),
        _ => None,
    }
}

/// File-backed settings store.
#[derive(Debug, Clone)]
pub struct SettingsStore {
    path: PathBuf,
}

impl SettingsStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Store at the default per-user location.
    pub fn default_location() -> Self {
        Self::new(app_dir().join(SETTINGS_FILE))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load settings. An absent file yields the defaults.
    pub fn load(&self) -> Result<Settings, SettingsError> {
        match std::fs::read_to_string(&self.path) {
            Ok(contents) => Ok(Settings::parse(&contents)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                log::info!(
                    "[SETTINGS] No settings file at {} — using defaults",
                    self.path.display()
                );
                Ok(Settings::default())
            }
            Err(e) => Err(SettingsError::Read {
                path: self.path.clone(),
                source: e,
            }),
        }
    }

    pub fn save(&self, settings: &Settings) -> Result<(), SettingsError> {
        if let Some(dir) = self.path.parent() {
            std::fs::create_dir_all(dir).map_err(|e| SettingsError::Write {
                path: self.path.clone(),
                source: e,
            })?;
        }
        std::fs::write(&self.path, settings.to_file_contents()).map_err(|e| {
            SettingsError::Write {
                path: self.path.clone(),
                source: e,
            }
        })?;
        log::info!("[SETTINGS] Saved to {}", self.path.display());
        Ok(())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum SettingsError {
    #[error("Failed to read settings from {}: {source}", path.display())]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to write settings to {}: {source}", path.display())]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SettingsValidationError {
    #[error("Server URL must not be empty")]
    EmptyBaseUrl,

    #[error("Model name must not be empty")]
    EmptyModelName,

    #[error("Server URL must be an http:// or https:// URL, got '{0}'")]
    InvalidBaseUrl(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_store(name: &str) -> SettingsStore {
        let dir = std::env::temp_dir().join(format!(
            "ocr-assistant-settings-{}-{}",
            name,
            std::process::id()
        ));
        let _ = std::fs::remove_dir_all(&dir);
        SettingsStore::new(dir.join("settings.txt"))
    }

    #[test]
    fn empty_input_yields_defaults() {
        assert_eq!(Settings::parse(""), Settings::default());
    }

    #[test]
    fn parse_skips_malformed_lines_and_splits_on_first_equals() {
        let s = Settings::parse(
            "this line has no separator\nbase_url=http://host:1/v1?a=b\nmodel_name=m\n",
        );
        assert_eq!(s.base_url, "http://host:1/v1?a=b");
        assert_eq!(s.model_name, "m");
        assert_eq!(s.api_key, DEFAULT_API_KEY);
    }

    #[test]
    fn empty_values_fall_back_to_defaults() {
        let s = Settings::parse("base_url=\nmodel_name=   \n");
        assert_eq!(s.base_url, DEFAULT_BASE_URL);
        assert_eq!(s.model_name, DEFAULT_MODEL_NAME);
    }

    #[test]
    fn invalid_optional_values_keep_defaults() {
        let s = Settings::parse("stream=maybe\ntimeout_secs=0\nstrict_startup=no\n");
        assert!(!s.stream);
        assert_eq!(s.timeout_secs, DEFAULT_TIMEOUT_SECS);
        assert!(!s.strict_startup);
    }

    #[test]
    fn missing_file_loads_defaults() {
        let store = temp_store("missing");
        assert_eq!(store.load().unwrap(), Settings::default());
    }

    #[test]
    fn save_then_load_round_trips() {
        let store = temp_store("roundtrip");
        let settings = Settings::default()
            .with_endpoint("http://x/v1", "m")
            .unwrap();
        store.save(&settings).unwrap();

        let raw = std::fs::read_to_string(store.path()).unwrap();
        assert!(raw.contains("base_url=http://x/v1\n"));
        assert!(raw.contains("model_name=m\n"));

        let loaded = store.load().unwrap();
        assert_eq!(loaded.base_url, "http://x/v1");
        assert_eq!(loaded.model_name, "m");
        assert_eq!(loaded, settings);
    }

    #[test]
    fn round_trip_keeps_optional_keys() {
        let store = temp_store("optional");
        let settings = Settings {
            stream: true,
            timeout_secs: 30,
            strict_startup: false,
            ocr_language: "deu".to_string(),
            api_key: "secret".to_string(),
            ..Settings::default()
        };
        store.save(&settings).unwrap();
        assert_eq!(store.load().unwrap(), settings);
    }

    #[test]
    fn validation_rejects_empty_fields() {
        let base = Settings::default();
        assert_eq!(
            base.with_endpoint("  ", "m"),
            Err(SettingsValidationError::EmptyBaseUrl)
        );
        assert_eq!(
            base.with_endpoint("http://x/v1", ""),
            Err(SettingsValidationError::EmptyModelName)
        );
    }

    #[test]
    fn validation_rejects_non_http_urls() {
        let base = Settings::default();
        assert!(matches!(
            base.with_endpoint("ftp://x/v1", "m"),
            Err(SettingsValidationError::InvalidBaseUrl(_))
        ));
        assert!(matches!(
            base.with_endpoint("not a url", "m"),
            Err(SettingsValidationError::InvalidBaseUrl(_))
        ));
    }

    #[test]
    fn validation_trims_input() {
        let s = Settings::default()
            .with_endpoint("  http://x/v1 ", " m ")
            .unwrap();
        assert_eq!(s.base_url, "http://x/v1");
        assert_eq!(s.model_name, "m");
    }
}
