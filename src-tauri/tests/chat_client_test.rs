//! Integration tests for the chat-completion client.
//!
//! A throwaway TCP listener plays the model server: it reads one HTTP
//! request, writes a canned response, and hands the raw request back to
//! the test.

use ocr_assistant_lib::llm::streaming::collect_reply;
use ocr_assistant_lib::llm::{ChatClient, QueryError};
use ocr_assistant_lib::settings::Settings;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;

// ── Fake server ─────────────────────────────────────────────────────

struct Captured {
    head: String,
    body: String,
}

impl Captured {
    fn json(&self) -> serde_json::Value {
        serde_json::from_str(&self.body).expect("request body is JSON")
    }
}

async fn read_request(stream: &mut tokio::net::TcpStream) -> Captured {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 4096];

    let header_end = loop {
        let n = stream.read(&mut chunk).await.unwrap();
        assert!(n > 0, "client closed before sending headers");
        buf.extend_from_slice(&chunk[..n]);
        if let Some(pos) = buf.windows(4).position(|w| w == b"\r\n\r\n") {
            break pos + 4;
        }
    };

    let head = String::from_utf8_lossy(&buf[..header_end]).to_string();
    let content_length = head
        .lines()
        .find_map(|l| {
            let (name, value) = l.split_once(':')?;
            name.eq_ignore_ascii_case("content-length")
                .then(|| value.trim().parse::<usize>().ok())
                .flatten()
        })
        .unwrap_or(0);

    while buf.len() < header_end + content_length {
        let n = stream.read(&mut chunk).await.unwrap();
        if n == 0 {
            break;
        }
        buf.extend_from_slice(&chunk[..n]);
    }

    Captured {
        head,
        body: String::from_utf8_lossy(&buf[header_end..]).to_string(),
    }
}

/// Serve one request. The response is written in `parts`, flushed between
/// each, and the connection is closed afterwards.
async fn serve_once(parts: Vec<String>) -> (Settings, JoinHandle<Captured>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let handle = tokio::spawn(async move {
        let (mut stream, _) = listener.accept().await.unwrap();
        let captured = read_request(&mut stream).await;
        // The client may hang up early (e.g. after a malformed chunk).
        for part in parts {
            if stream.write_all(part.as_bytes()).await.is_err() {
                break;
            }
            let _ = stream.flush().await;
            tokio::task::yield_now().await;
        }
        let _ = stream.shutdown().await;
        captured
    });

    let settings = Settings {
        base_url: format!("http://{}/v1", addr),
        model_name: "test-model".to_string(),
        timeout_secs: 10,
        ..Settings::default()
    };
    (settings, handle)
}

fn json_response(status: &str, body: &str) -> String {
    format!(
        "HTTP/1.1 {}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
        status,
        body.len(),
        body
    )
}

const SSE_HEAD: &str =
    "HTTP/1.1 200 OK\r\nContent-Type: text/event-stream\r\nConnection: close\r\n\r\n";

fn sse_delta(text: &str) -> String {
    format!(
        "data: {}\n\n",
        serde_json::json!({"choices": [{"index": 0, "delta": {"content": text}}]})
    )
}

// ── Blocking variant ────────────────────────────────────────────────

#[tokio::test]
async fn ask_sends_single_user_turn_and_returns_content() {
    let body = r#"{"choices":[{"index":0,"message":{"role":"assistant","content":"OK"}}]}"#;
    let (settings, server) = serve_once(vec![json_response("200 OK", body)]).await;

    let client = ChatClient::new(&settings).unwrap();
    let reply = client.ask("hello").await.unwrap();
    assert_eq!(reply, "OK");

    let request = server.await.unwrap();
    assert!(request.head.starts_with("POST /v1/chat/completions "));
    assert!(request
        .head
        .to_ascii_lowercase()
        .contains("authorization: bearer lm-studio"));
    assert_eq!(
        request.json(),
        serde_json::json!({
            "model": "test-model",
            "messages": [{"role": "user", "content": "hello"}],
            "stream": false
        })
    );
}

#[tokio::test]
async fn error_status_carries_code_and_body() {
    let (settings, server) = serve_once(vec![json_response(
        "500 Internal Server Error",
        r#"{"error":"model not loaded"}"#,
    )])
    .await;

    let err = ChatClient::new(&settings).unwrap().ask("hello").await.unwrap_err();
    server.await.unwrap();

    match err {
        QueryError::Status { status, body } => {
            assert_eq!(status, 500);
            assert!(body.contains("model not loaded"));
        }
        other => panic!("expected Status, got {:?}", other),
    }
}

#[tokio::test]
async fn body_without_choices_is_malformed() {
    let (settings, server) = serve_once(vec![json_response("200 OK", r#"{"choices":[]}"#)]).await;

    let err = ChatClient::new(&settings).unwrap().ask("hello").await.unwrap_err();
    server.await.unwrap();

    assert!(matches!(err, QueryError::Malformed(_)));
}

#[tokio::test]
async fn connection_refused_is_transport_error_with_cause() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let settings = Settings {
        base_url: format!("http://{}/v1", addr),
        timeout_secs: 5,
        ..Settings::default()
    };
    let err = ChatClient::new(&settings).unwrap().ask("hello").await.unwrap_err();

    assert!(matches!(err, QueryError::Transport(_)));
    let message = err.to_string().to_ascii_lowercase();
    assert!(message.contains("refused"), "cause missing from {:?}", message);
}

// ── Streaming variant ───────────────────────────────────────────────

#[tokio::test]
async fn streamed_fragments_concatenate_in_order() {
    let (settings, server) = serve_once(vec![
        SSE_HEAD.to_string(),
        ": keep-alive\n\n".to_string(),
        sse_delta("O"),
        sse_delta("K"),
        "data: [DONE]\n\n".to_string(),
    ])
    .await;

    let client = ChatClient::new(&settings).unwrap();
    let stream = client.ask_streaming("hello").await.unwrap();

    let mut fragments = Vec::new();
    let reply = collect_reply(stream, |f| fragments.push(f.to_string()))
        .await
        .unwrap();

    assert_eq!(reply, "OK");
    assert_eq!(fragments, vec!["O", "K"]);
    assert_eq!(server.await.unwrap().json()["stream"], serde_json::json!(true));
}

#[tokio::test]
async fn fragment_split_across_writes_is_reassembled() {
    let event = sse_delta("Hello");
    let (first, second) = event.split_at(event.len() / 2);
    let (settings, server) = serve_once(vec![
        SSE_HEAD.to_string(),
        first.to_string(),
        second.to_string(),
        "data: [DONE]\n\n".to_string(),
    ])
    .await;

    let stream = ChatClient::new(&settings)
        .unwrap()
        .ask_streaming("hello")
        .await
        .unwrap();
    let reply = collect_reply(stream, |_| {}).await.unwrap();
    server.await.unwrap();

    assert_eq!(reply, "Hello");
}

#[tokio::test]
async fn mid_stream_failure_keeps_partial_text() {
    let (settings, server) = serve_once(vec![
        SSE_HEAD.to_string(),
        sse_delta("He"),
        sse_delta("l"),
        "data: {\"choices\": [\n\n".to_string(),
        sse_delta("lo"),
    ])
    .await;

    let stream = ChatClient::new(&settings)
        .unwrap()
        .ask_streaming("hello")
        .await
        .unwrap();
    let failure = collect_reply(stream, |_| {}).await.unwrap_err();
    server.await.unwrap();

    assert_eq!(failure.partial, "Hel");
    assert!(matches!(failure.error, QueryError::Malformed(_)));
    assert!(!failure.to_string().is_empty());
}

#[tokio::test]
async fn streaming_rejects_error_status_before_any_fragment() {
    let (settings, server) =
        serve_once(vec![json_response("404 Not Found", r#"{"error":"no such model"}"#)]).await;

    let result = ChatClient::new(&settings)
        .unwrap()
        .ask_streaming("hello")
        .await;
    server.await.unwrap();

    assert!(matches!(result, Err(QueryError::Status { status: 404, .. })));
}

// ── Connectivity ────────────────────────────────────────────────────

#[tokio::test]
async fn list_models_returns_ids() {
    let body = r#"{"object":"list","data":[{"id":"test-model","object":"model"},{"id":"other"}]}"#;
    let (settings, server) = serve_once(vec![json_response("200 OK", body)]).await;

    let models = ChatClient::new(&settings).unwrap().list_models().await.unwrap();
    let request = server.await.unwrap();

    assert_eq!(models, vec!["test-model", "other"]);
    assert!(request.head.starts_with("GET /v1/models "));
}
