//! OpenAI-compatible chat-completion client (LM Studio, llama-server, Ollama's
//! `/v1` endpoint, ...).
//!
//! One request per call, no retries. Every failure comes back as a
//! `QueryError` carrying the underlying cause.

use super::streaming::{FragmentStream, SseDecoder, SseEvent};
use super::QueryError;
use crate::settings::Settings;
use futures::stream::{self, StreamExt};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: [Message<'a>; 1],
    stream: bool,
}

#[derive(Debug, Serialize)]
struct Message<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: AssistantMessage,
}

#[derive(Debug, Deserialize)]
struct AssistantMessage {
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ModelList {
    data: Vec<ModelEntry>,
}

#[derive(Debug, Deserialize)]
struct ModelEntry {
    id: String,
}

pub struct ChatClient {
    http: reqwest::Client,
    base_url: String,
    model: String,
    api_key: String,
}

impl ChatClient {
    /// Build a client for the endpoint and model in `settings`.
    pub fn new(settings: &Settings) -> Result<Self, QueryError> {
        let mut builder = reqwest::Client::builder().timeout(settings.timeout());
        if is_loopback(&settings.base_url) {
            // Local model servers must not be routed through a system proxy.
            builder = builder.no_proxy();
        }

        Ok(Self {
            http: builder.build()?,
            base_url: settings.base_url.trim_end_matches('/').to_string(),
            model: settings.model_name.clone(),
            api_key: settings.api_key.clone(),
        })
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path)
    }

    async fn post_chat(&self, prompt: &str, stream: bool) -> Result<reqwest::Response, QueryError> {
        let request = ChatRequest {
            model: &self.model,
            messages: [Message {
                role: "user",
                content: prompt,
            }],
            stream,
        };

        let response = self
            .http
            .post(self.url("chat/completions"))
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await?;

        check_status(response).await
    }

    /// List the model ids the server offers. Used as the startup
    /// connectivity check.
    pub async fn list_models(&self) -> Result<Vec<String>, QueryError> {
        let response = self
            .http
            .get(self.url("models"))
            .bearer_auth(&self.api_key)
            .send()
            .await?;
        let response = check_status(response).await?;

        let list: ModelList = response
            .json()
            .await
            .map_err(|e| QueryError::Malformed(format!("bad model list: {}", e)))?;
        Ok(list.data.into_iter().map(|m| m.id).collect())
    }

    /// Blocking-style variant: one request, the whole reply at once.
    pub async fn ask(&self, prompt: &str) -> Result<String, QueryError> {
        let start = std::time::Instant::now();
        let response = self.post_chat(prompt, false).await?;

        let body: ChatResponse = response
            .json()
            .await
            .map_err(|e| QueryError::Malformed(format!("bad completion body: {}", e)))?;

        let content = body
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| QueryError::Malformed("response has no choices".to_string()))?
            .message
            .content
            .unwrap_or_default();

        log::info!(
            "[LLM] {} answered {} chars in {}ms",
            self.model,
            content.len(),
            start.elapsed().as_millis()
        );
        Ok(content)
    }

    /// Streaming variant: returns once the server has accepted the request;
    /// fragments then arrive through the returned stream.
    pub async fn ask_streaming(&self, prompt: &str) -> Result<FragmentStream, QueryError> {
        let response = self.post_chat(prompt, true).await?;
        Ok(fragment_stream(response))
    }
}

struct StreamState<S> {
    body: S,
    decoder: SseDecoder,
    pending: VecDeque<Result<String, QueryError>>,
    finished: bool,
}

fn fragment_stream(response: reqwest::Response) -> FragmentStream {
    let state = StreamState {
        body: response.bytes_stream(),
        decoder: SseDecoder::new(),
        pending: VecDeque::new(),
        finished: false,
    };

    let s = stream::unfold(state, |mut state| async move {
        loop {
            if let Some(item) = state.pending.pop_front() {
                if item.is_err() {
                    state.pending.clear();
                    state.finished = true;
                }
                return Some((item, state));
            }
            if state.finished {
                return None;
            }

            match state.body.next().await {
                Some(Ok(chunk)) => {
                    for event in state.decoder.push(&chunk) {
                        match event {
                            Ok(SseEvent::Fragment(text)) => state.pending.push_back(Ok(text)),
                            Ok(SseEvent::Done) => {
                                state.finished = true;
                                break;
                            }
                            Err(e) => state.pending.push_back(Err(e)),
                        }
                    }
                }
                Some(Err(e)) => {
                    state.pending.push_back(Err(QueryError::Transport(e)));
                }
                None => {
                    state.finished = true;
                    match state.decoder.finish() {
                        Ok(Some(SseEvent::Fragment(text))) => state.pending.push_back(Ok(text)),
                        Ok(_) => {}
                        Err(e) => state.pending.push_back(Err(e)),
                    }
                }
            }
        }
    });

    Box::pin(s)
}

async fn check_status(response: reqwest::Response) -> Result<reqwest::Response, QueryError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    log::error!("[LLM] API returned {}: {}", status, body);
    Err(QueryError::Status {
        status: status.as_u16(),
        body: body.trim().to_string(),
    })
}

fn is_loopback(base_url: &str) -> bool {
    reqwest::Url::parse(base_url)
        .ok()
        .and_then(|u| u.host_str().map(str::to_string))
        .map(|host| matches!(host.as_str(), "localhost" | "127.0.0.1" | "[::1]" | "::1"))
        .unwrap_or(false)
}
