//! LLM domain — public API.
//!
//! Sends extracted text to an OpenAI-compatible chat endpoint and returns
//! the reply, either in one piece or assembled from a fragment stream.

pub mod client;
pub mod streaming;

pub use client::ChatClient;

use crate::settings::Settings;

/// Sends one prompt and returns the reply text.
pub trait QueryEngine: Send + Sync {
    fn query(&self, prompt: &str) -> Result<String, QueryFailure>;
}

#[derive(Debug, thiserror::Error)]
pub enum QueryError {
    #[error("Request failed: {}", error_chain(.0))]
    Transport(#[from] reqwest::Error),

    #[error("Server returned HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Malformed response: {0}")]
    Malformed(String),
}

/// `err` followed by each distinct message in its `source()` chain.
///
/// reqwest only prints "error sending request"; the refused connection or
/// timeout behind it lives further down the chain.
pub fn error_chain(err: &dyn std::error::Error) -> String {
    let mut text = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        let message = cause.to_string();
        if !message.is_empty() && !text.contains(&message) {
            text.push_str(": ");
            text.push_str(&message);
        }
        source = cause.source();
    }
    text
}

/// A failed query. `partial` holds whatever streamed text arrived before
/// the failure; it is empty for blocking queries.
#[derive(Debug, thiserror::Error)]
#[error("{error}")]
pub struct QueryFailure {
    pub error: QueryError,
    pub partial: String,
}

impl From<QueryError> for QueryFailure {
    fn from(error: QueryError) -> Self {
        Self {
            error,
            partial: String::new(),
        }
    }
}

/// The production engine: a `ChatClient` driven to completion on the
/// calling thread.
pub struct ChatQuery {
    client: ChatClient,
    streaming: bool,
}

impl ChatQuery {
    pub fn new(client: ChatClient, streaming: bool) -> Self {
        Self { client, streaming }
    }

    pub fn from_settings(settings: &Settings) -> Result<Self, QueryError> {
        Ok(Self::new(ChatClient::new(settings)?, settings.stream))
    }

    /// Blocking variant.
    pub async fn ask(&self, prompt: &str) -> Result<String, QueryFailure> {
        Ok(self.client.ask(prompt).await?)
    }

    /// Streaming variant; fragments are logged as they arrive.
    pub async fn ask_streaming(&self, prompt: &str) -> Result<String, QueryFailure> {
        let stream = self.client.ask_streaming(prompt).await?;
        let mut count = 0usize;
        let reply = streaming::collect_reply(stream, |fragment| {
            count += 1;
            log::debug!("[LLM] fragment {}: {:?}", count, fragment);
        })
        .await?;
        log::info!("[LLM] stream finished after {} fragments", count);
        Ok(reply)
    }
}

impl QueryEngine for ChatQuery {
    fn query(&self, prompt: &str) -> Result<String, QueryFailure> {
        log::info!(
            "[LLM] Querying {} ({} chars, streaming={})",
            self.client.model(),
            prompt.len(),
            self.streaming
        );
        let reply = if self.streaming {
            tauri::async_runtime::block_on(self.ask_streaming(prompt))
        } else {
            tauri::async_runtime::block_on(self.ask(prompt))
        };
        reply.map(|text| text.trim().to_string())
    }
}
