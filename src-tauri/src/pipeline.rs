//! Interaction orchestrator: select a region, read its text, ask the model,
//! deliver the reply.
//!
//! One cycle runs at a time. Every failure is turned into a notification
//! and the state always returns to `Idle`.

use crate::capture::{CaptureError, Region, TextExtractor};
use crate::llm::{QueryEngine, QueryFailure};
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread::{self, JoinHandle};
use std::time::Instant;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineState {
    Idle,
    Selecting,
    Capturing,
    Querying,
    Delivering,
    Errored,
}

impl fmt::Display for PipelineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Idle => "idle",
            Self::Selecting => "selecting",
            Self::Capturing => "capturing",
            Self::Querying => "querying",
            Self::Delivering => "delivering",
            Self::Errored => "errored",
        };
        f.write_str(name)
    }
}

/// What a successful cycle produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InteractionResult {
    pub extracted_text: String,
    pub reply: String,
}

#[derive(Debug, thiserror::Error)]
#[error("Region selection failed: {0}")]
pub struct SelectionError(pub String);

#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("Selection cancelled")]
    SelectionCancelled,

    #[error(transparent)]
    Selection(#[from] SelectionError),

    #[error(transparent)]
    Capture(#[from] CaptureError),

    #[error("No text detected.")]
    EmptyExtraction,

    #[error("Model error: {0}")]
    Query(#[from] QueryFailure),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeKind {
    Info,
    Error,
}

/// Lets the user pick a screen region. `Ok(None)` means the user cancelled.
pub trait RegionSelector: Send + Sync {
    fn select_region(&self) -> Result<Option<Region>, SelectionError>;
}

/// Blocking user-facing message.
pub trait Notifier: Send + Sync {
    fn notify(&self, kind: NoticeKind, title: &str, message: &str);
}

pub trait ClipboardSink: Send + Sync {
    fn set_text(&self, text: &str) -> Result<(), String>;
}

/// Durable record of completed interactions.
pub trait InteractionSink: Send + Sync {
    fn append(&self, result: &InteractionResult) -> std::io::Result<()>;
}

/// Everything a cycle talks to.
pub struct Collaborators {
    pub selector: Box<dyn RegionSelector>,
    pub extractor: Box<dyn TextExtractor>,
    pub engine: Box<dyn QueryEngine>,
    pub notifier: Box<dyn Notifier>,
    pub clipboard: Box<dyn ClipboardSink>,
    pub log: Box<dyn InteractionSink>,
}

pub struct Orchestrator {
    state: Mutex<PipelineState>,
    deps: Collaborators,
}

/// Puts the state back to `Idle` however the cycle ends, unwinding included.
struct IdleOnDrop<'a>(&'a Mutex<PipelineState>);

impl Drop for IdleOnDrop<'_> {
    fn drop(&mut self) {
        *lock(self.0) = PipelineState::Idle;
    }
}

fn lock(state: &Mutex<PipelineState>) -> MutexGuard<'_, PipelineState> {
    state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl Orchestrator {
    pub fn new(deps: Collaborators) -> Self {
        Self {
            state: Mutex::new(PipelineState::Idle),
            deps,
        }
    }

    pub fn state(&self) -> PipelineState {
        *lock(&self.state)
    }

    fn set_state(&self, next: PipelineState) {
        let mut state = lock(&self.state);
        log::debug!("[PIPELINE] {} -> {}", *state, next);
        *state = next;
    }

    /// Idle -> Selecting, atomically. False when a cycle is already running.
    fn try_claim(&self) -> bool {
        let mut state = lock(&self.state);
        if *state != PipelineState::Idle {
            return false;
        }
        *state = PipelineState::Selecting;
        true
    }

    /// Start a cycle on its own thread. Returns `None` (and does nothing)
    /// when a cycle is already in flight.
    pub fn trigger(self: &Arc<Self>) -> Option<JoinHandle<()>> {
        if !self.try_claim() {
            log::info!("[PIPELINE] Trigger ignored, busy ({})", self.state());
            return None;
        }

        let this = Arc::clone(self);
        let spawned = thread::Builder::new()
            .name("pipeline".to_string())
            .spawn(move || {
                let _ = this.run_claimed();
            });

        match spawned {
            Ok(handle) => Some(handle),
            Err(e) => {
                log::error!("[PIPELINE] Failed to spawn pipeline thread: {}", e);
                self.set_state(PipelineState::Idle);
                None
            }
        }
    }

    /// Run one cycle on the calling thread. `None` when a cycle is already
    /// in flight.
    pub fn run_cycle(&self) -> Option<Result<InteractionResult, PipelineError>> {
        if !self.try_claim() {
            log::info!("[PIPELINE] Cycle skipped, busy ({})", self.state());
            return None;
        }
        Some(self.run_claimed())
    }

    fn run_claimed(&self) -> Result<InteractionResult, PipelineError> {
        let _idle = IdleOnDrop(&self.state);
        let start = Instant::now();

        let outcome = self.stages();
        match &outcome {
            Ok(_) => log::info!(
                "[PIPELINE] Cycle complete in {}ms",
                start.elapsed().as_millis()
            ),
            Err(e) => {
                self.set_state(PipelineState::Errored);
                self.report(e);
            }
        }
        outcome
    }

    fn stages(&self) -> Result<InteractionResult, PipelineError> {
        let region = self
            .deps
            .selector
            .select_region()?
            .ok_or(PipelineError::SelectionCancelled)?;
        log::info!("[PIPELINE] Region selected: {}", region);

        self.set_state(PipelineState::Capturing);
        let extracted_text = self.deps.extractor.extract_text(region)?;
        if extracted_text.trim().is_empty() {
            return Err(PipelineError::EmptyExtraction);
        }
        log::info!(
            "[PIPELINE] OCR text: {:?}",
            extracted_text.chars().take(100).collect::<String>()
        );

        self.set_state(PipelineState::Querying);
        let reply = self.deps.engine.query(&extracted_text)?;

        self.set_state(PipelineState::Delivering);
        let result = InteractionResult {
            extracted_text,
            reply,
        };
        self.deliver(&result);
        Ok(result)
    }

    fn deliver(&self, result: &InteractionResult) {
        if let Err(e) = self.deps.clipboard.set_text(&result.reply) {
            log::warn!("[PIPELINE] Clipboard write failed: {}", e);
        } else {
            log::info!("[PIPELINE] Reply copied to clipboard");
        }

        self.deps
            .notifier
            .notify(NoticeKind::Info, "Model Response", &result.reply);

        if let Err(e) = self.deps.log.append(result) {
            log::warn!("[PIPELINE] Interaction log write failed: {}", e);
        }
    }

    fn report(&self, error: &PipelineError) {
        match error {
            PipelineError::SelectionCancelled => {
                log::info!("[PIPELINE] Selection cancelled");
                self.deps
                    .notifier
                    .notify(NoticeKind::Info, "Cancelled", "No region was selected.");
            }
            PipelineError::Query(failure) if !failure.partial.is_empty() => {
                log::error!("[PIPELINE] {}", error);
                let message = format!("{}\n\nPartial reply:\n{}", error, failure.partial);
                self.deps.notifier.notify(NoticeKind::Error, "Error", &message);
            }
            _ => {
                log::error!("[PIPELINE] {}", error);
                self.deps
                    .notifier
                    .notify(NoticeKind::Error, "Error", &error.to_string());
            }
        }
    }
}
