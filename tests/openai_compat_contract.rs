//! OpenAI-compatible provider contract tests.
//!
//! Verify the HTTP request format, SSE parsing, error mapping, and
//! failover across real HTTP backends served by wiremock.

use futures_util::StreamExt;
use haruko::conversation::{ConversationTurn, Message};
use haruko::provider::{
    OpenAiCompatConfig, OpenAiCompatProvider, ProviderChain, ProviderDescriptor, ProviderError,
    TextProvider, TextStream,
};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn provider(server: &MockServer, streaming: bool, api_key: Option<&str>) -> OpenAiCompatProvider {
    match OpenAiCompatProvider::new(OpenAiCompatConfig {
        base_url: format!("{}/v1", server.uri()),
        model: "test-model".into(),
        api_key: api_key.map(str::to_owned),
        streaming,
        max_tokens: None,
        temperature: None,
    }) {
        Ok(p) => p,
        Err(e) => unreachable!("valid provider config: {e}"),
    }
}

fn turn() -> ConversationTurn {
    ConversationTurn::new(vec![Message::system("be brief"), Message::user("Hello")])
}

fn sse(chunks: &[&str]) -> String {
    let mut body = String::new();
    for chunk in chunks {
        body.push_str(&format!(
            "data: {}\n\n",
            json!({"choices": [{"index": 0, "delta": {"content": chunk}}]})
        ));
    }
    body.push_str("data: [DONE]\n\n");
    body
}

async fn collect(stream: TextStream) -> (String, Vec<ProviderError>) {
    let items: Vec<Result<String, ProviderError>> = stream.collect().await;
    let mut text = String::new();
    let mut errors = Vec::new();
    for item in items {
        match item {
            Ok(fragment) => text.push_str(&fragment),
            Err(e) => errors.push(e),
        }
    }
    (text, errors)
}

// ────────────────────────────────────────────────────────────────────────────
// Request format
// ────────────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn streaming_request_carries_model_messages_and_auth() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .and(header("authorization", "Bearer secret"))
        .and(body_partial_json(json!({
            "model": "test-model",
            "stream": true,
            "messages": [
                {"role": "system", "content": "be brief"},
                {"role": "user", "content": "Hello"}
            ]
        })))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("content-type", "text/event-stream")
                .set_body_string(sse(&["Hi", " there"])),
        )
        .expect(1)
        .mount(&server)
        .await;

    let stream = match provider(&server, true, Some("secret")).invoke(&turn()).await {
        Ok(s) => s,
        Err(e) => unreachable!("request should succeed: {e}"),
    };
    let (text, errors) = collect(stream).await;
    assert_eq!(text, "Hi there");
    assert!(errors.is_empty());
}

#[tokio::test]
async fn non_streaming_yields_whole_completion() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .and(body_partial_json(json!({"stream": false})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "choices": [{
                "index": 0,
                "message": {"role": "assistant", "content": "All at once."},
                "finish_reason": "stop"
            }]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let stream = match provider(&server, false, None).invoke(&turn()).await {
        Ok(s) => s,
        Err(e) => unreachable!("request should succeed: {e}"),
    };
    let items: Vec<_> = stream.collect().await;
    assert_eq!(items.len(), 1);
    assert!(matches!(&items[0], Ok(text) if text == "All at once."));
}

// ────────────────────────────────────────────────────────────────────────────
// Error mapping
// ────────────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn rate_limit_is_retryable_http_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(429).set_body_json(json!({
            "error": {"message": "slow down", "type": "rate_limit"}
        })))
        .mount(&server)
        .await;

    let result = provider(&server, true, None).invoke(&turn()).await;
    match result {
        Err(e @ ProviderError::Http { status: 429, .. }) => {
            assert!(e.is_retryable());
            assert_eq!(e.code(), "HTTP_ERROR");
            assert_eq!(e.to_string(), "[HTTP_ERROR] HTTP 429: slow down");
        }
        Err(e) => unreachable!("expected HTTP 429, got {e}"),
        Ok(_) => unreachable!("expected HTTP 429, got a stream"),
    }
}

#[tokio::test]
async fn unauthorized_is_not_retryable() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(401).set_body_string("bad key"))
        .mount(&server)
        .await;

    match provider(&server, true, None).invoke(&turn()).await {
        Err(e) => {
            assert!(!e.is_retryable());
            assert!(matches!(e, ProviderError::Http { status: 401, ref message } if message == "bad key"));
        }
        Ok(_) => unreachable!("expected HTTP 401, got a stream"),
    }
}

#[tokio::test]
async fn upstream_error_chunk_ends_stream_after_partial_text() {
    let server = MockServer::start().await;
    let body = format!(
        "data: {}\n\ndata: {}\n\ndata: {}\n\n",
        json!({"choices": [{"delta": {"content": "Partial"}}]}),
        json!({"error": {"message": "overloaded"}}),
        json!({"choices": [{"delta": {"content": " never"}}]}),
    );
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_string(body))
        .mount(&server)
        .await;

    let stream = match provider(&server, true, None).invoke(&turn()).await {
        Ok(s) => s,
        Err(e) => unreachable!("stream should start: {e}"),
    };
    let (text, errors) = collect(stream).await;
    assert_eq!(text, "Partial");
    assert_eq!(errors.len(), 1);
    assert!(matches!(&errors[0], ProviderError::Stream(m) if m == "overloaded"));
}

// ────────────────────────────────────────────────────────────────────────────
// Failover over HTTP
// ────────────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn chain_fails_over_from_broken_backend() {
    let broken = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(503).set_body_string("maintenance"))
        .expect(1)
        .mount(&broken)
        .await;
    let healthy = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_string(sse(&["from", " backup"])))
        .expect(1)
        .mount(&healthy)
        .await;
    let unused = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_string(sse(&["unused"])))
        .expect(0)
        .mount(&unused)
        .await;

    let chain = ProviderChain::new(vec![
        ProviderDescriptor::new("unused", 30, Arc::new(provider(&unused, true, None))),
        ProviderDescriptor::new("broken", 10, Arc::new(provider(&broken, true, None))),
        ProviderDescriptor::new("healthy", 20, Arc::new(provider(&healthy, true, None))),
    ]);
    let (stream, name) = match chain.generate(&turn(), false).await {
        Ok(started) => started,
        Err(e) => unreachable!("healthy backend should commit: {e}"),
    };
    assert_eq!(name, "healthy");
    let (text, errors) = collect(stream).await;
    assert_eq!(text, "from backup");
    assert!(errors.is_empty());
}

#[tokio::test]
async fn slow_first_fragment_counts_as_failure() {
    let slow = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string(sse(&["too late"]))
                .set_delay(Duration::from_secs(2)),
        )
        .mount(&slow)
        .await;
    let fast = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_string(sse(&["fast"])))
        .mount(&fast)
        .await;

    let chain = ProviderChain::new(vec![
        ProviderDescriptor::new("slow", 1, Arc::new(provider(&slow, true, None)))
            .with_timeouts(Duration::from_millis(200), Duration::from_secs(5)),
        ProviderDescriptor::new("fast", 2, Arc::new(provider(&fast, true, None))),
    ]);
    let (stream, name) = match chain.generate(&turn(), false).await {
        Ok(started) => started,
        Err(e) => unreachable!("fast backend should commit: {e}"),
    };
    assert_eq!(name, "fast");
    assert_eq!(collect(stream).await.0, "fast");
}
