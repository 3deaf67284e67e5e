//! Append-only text log of completed interactions.
//!
//! Each entry is two timestamped lines (the OCR text and the reply)
//! followed by a blank line. Nothing ever reads the file back.

use crate::pipeline::{InteractionResult, InteractionSink};
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};

pub struct InteractionLog {
    path: PathBuf,
}

impl InteractionLog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

fn format_entry(timestamp: &str, result: &InteractionResult) -> String {
    format!(
        "[{ts}] OCR: {}\n[{ts}] Reply: {}\n\n",
        result.extracted_text,
        result.reply,
        ts = timestamp
    )
}

impl InteractionSink for InteractionLog {
    fn append(&self, result: &InteractionResult) -> std::io::Result<()> {
        if let Some(dir) = self.path.parent() {
            std::fs::create_dir_all(dir)?;
        }
        let timestamp = chrono::Local::now()
            .format("%Y-%m-%d %H:%M:%S%.3f")
            .to_string();

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        file.write_all(format_entry(&timestamp, result).as_bytes())?;

        log::info!("[PIPELINE] Interaction logged to {}", self.path.display());
        Ok(())
    }
}
