//! OpenAI-compatible chat completions backend.
//!
//! Works against any server speaking `POST {base_url}/chat/completions`
//! (OpenAI, Groq, Ollama, llama.cpp server, ...). Streaming mode parses
//! SSE `data:` chunks and yields each `choices[0].delta.content`.
//! Non-streaming mode yields the whole `choices[0].message.content` as a
//! single fragment.
//!
//! Images attached to a message are sent as base64 data URLs in the
//! multi-part content format.

use super::sse::SseLineParser;
use super::{ProviderError, TextProvider, TextStream};
use crate::conversation::{ConversationTurn, Message};
use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use bytes::Bytes;
use futures_util::{Stream, StreamExt};
use serde_json::{Value, json};
use std::collections::VecDeque;
use std::pin::Pin;

/// Connection settings for an [`OpenAiCompatProvider`].
#[derive(Debug, Clone)]
pub struct OpenAiCompatConfig {
    /// Base URL without the trailing `/chat/completions`.
    pub base_url: String,
    /// Model identifier.
    pub model: String,
    /// Bearer token, if the server requires one.
    pub api_key: Option<String>,
    /// Request SSE streaming.
    pub streaming: bool,
    /// Maximum tokens to generate.
    pub max_tokens: Option<u32>,
    /// Sampling temperature.
    pub temperature: Option<f64>,
}

/// reqwest-based OpenAI-compatible provider.
#[derive(Debug, Clone)]
pub struct OpenAiCompatProvider {
    client: reqwest::Client,
    config: OpenAiCompatConfig,
}

impl OpenAiCompatProvider {
    /// Create a provider.
    ///
    /// # Errors
    ///
    /// Returns [`ProviderError::Config`] if the base URL is empty or the
    /// HTTP client cannot be built.
    pub fn new(config: OpenAiCompatConfig) -> Result<Self, ProviderError> {
        if config.base_url.trim().is_empty() {
            return Err(ProviderError::Config("base_url must not be empty".into()));
        }
        let client = reqwest::Client::builder()
            .build()
            .map_err(|e| ProviderError::Config(format!("failed to build HTTP client: {e}")))?;
        Ok(Self { client, config })
    }

    fn endpoint(&self) -> String {
        format!(
            "{}/chat/completions",
            self.config.base_url.trim_end_matches('/')
        )
    }

    /// Build the JSON request body for `turn`.
    pub fn build_body(&self, turn: &ConversationTurn) -> Value {
        let messages: Vec<Value> = turn.messages().iter().map(encode_message).collect();
        let mut body = json!({
            "model": self.config.model,
            "messages": messages,
            "stream": self.config.streaming,
        });
        if let Some(max_tokens) = self.config.max_tokens {
            body["max_tokens"] = json!(max_tokens);
        }
        if let Some(temperature) = self.config.temperature {
            body["temperature"] = json!(temperature);
        }
        body
    }

    fn map_http_error(status: reqwest::StatusCode, body: &str) -> ProviderError {
        ProviderError::Http {
            status: status.as_u16(),
            message: extract_error_message(body),
        }
    }
}

fn encode_message(message: &Message) -> Value {
    if message.images.is_empty() {
        return json!({
            "role": message.role.to_string(),
            "content": message.content,
        });
    }
    let mut parts = vec![json!({ "type": "text", "text": message.content })];
    for image in &message.images {
        let url = format!(
            "data:{};base64,{}",
            image.media_type,
            STANDARD.encode(&image.data)
        );
        parts.push(json!({ "type": "image_url", "image_url": { "url": url } }));
    }
    json!({
        "role": message.role.to_string(),
        "content": parts,
    })
}

/// Extract `error.message` from an error body, falling back to the raw body.
fn extract_error_message(body: &str) -> String {
    serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|v| {
            v.get("error")
                .and_then(|e| e.get("message"))
                .and_then(|m| m.as_str())
                .map(String::from)
        })
        .unwrap_or_else(|| body.to_string())
}

/// Content delta of one streamed completions chunk, if any.
fn parse_delta(data: &str) -> Result<Option<String>, ProviderError> {
    let value: Value = serde_json::from_str(data)
        .map_err(|e| ProviderError::Stream(format!("invalid chunk JSON: {e}")))?;
    if let Some(message) = value.get("error").and_then(|e| e.get("message")) {
        return Err(ProviderError::Stream(
            message.as_str().unwrap_or("upstream error").to_owned(),
        ));
    }
    Ok(value
        .pointer("/choices/0/delta/content")
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
        .map(str::to_owned))
}

struct StreamState {
    bytes: Pin<Box<dyn Stream<Item = Result<Bytes, reqwest::Error>> + Send>>,
    parser: SseLineParser,
    queue: VecDeque<Result<String, ProviderError>>,
    finished: bool,
}

impl StreamState {
    fn enqueue(&mut self, data: &str) {
        match parse_delta(data) {
            Ok(Some(text)) => self.queue.push_back(Ok(text)),
            Ok(None) => {}
            Err(e) => {
                self.queue.push_back(Err(e));
                self.finished = true;
            }
        }
    }
}

fn text_stream(
    bytes: impl Stream<Item = Result<Bytes, reqwest::Error>> + Send + 'static,
) -> TextStream {
    Box::pin(futures_util::stream::unfold(
        StreamState {
            bytes: Box::pin(bytes),
            parser: SseLineParser::new(),
            queue: VecDeque::new(),
            finished: false,
        },
        |mut state| async move {
            loop {
                if let Some(item) = state.queue.pop_front() {
                    return Some((item, state));
                }
                if state.finished {
                    return None;
                }
                match state.bytes.next().await {
                    Some(Ok(chunk)) => {
                        for event in state.parser.push(&chunk) {
                            if event.is_done() {
                                state.finished = true;
                            } else {
                                state.enqueue(&event.data);
                            }
                            if state.finished {
                                break;
                            }
                        }
                    }
                    Some(Err(e)) => {
                        state.finished = true;
                        return Some((
                            Err(ProviderError::Stream(format!("stream read error: {e}"))),
                            state,
                        ));
                    }
                    None => {
                        state.finished = true;
                        if let Some(event) = state.parser.flush()
                            && !event.is_done()
                        {
                            state.enqueue(&event.data);
                        }
                    }
                }
            }
        },
    ))
}

#[async_trait]
impl TextProvider for OpenAiCompatProvider {
    async fn invoke(&self, turn: &ConversationTurn) -> Result<TextStream, ProviderError> {
        let body = self.build_body(turn);
        let mut request = self
            .client
            .post(self.endpoint())
            .header("Content-Type", "application/json");
        if let Some(key) = &self.config.api_key {
            request = request.header("Authorization", format!("Bearer {key}"));
        }

        let response = request
            .json(&body)
            .send()
            .await
            .map_err(|e| ProviderError::Request(format!("request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body_text = response.text().await.unwrap_or_default();
            return Err(Self::map_http_error(status, &body_text));
        }

        if self.config.streaming {
            return Ok(text_stream(response.bytes_stream()));
        }

        let value: Value = response
            .json()
            .await
            .map_err(|e| ProviderError::Stream(format!("invalid response JSON: {e}")))?;
        let content = value
            .pointer("/choices/0/message/content")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_owned();
        Ok(Box::pin(futures_util::stream::once(async move {
            Ok::<_, ProviderError>(content)
        })))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::conversation::ImageData;

    fn provider(streaming: bool) -> OpenAiCompatProvider {
        match OpenAiCompatProvider::new(OpenAiCompatConfig {
            base_url: "http://localhost:1/v1/".into(),
            model: "test-model".into(),
            api_key: None,
            streaming,
            max_tokens: Some(64),
            temperature: None,
        }) {
            Ok(p) => p,
            Err(e) => unreachable!("valid config: {e}"),
        }
    }

    #[test]
    fn endpoint_trims_trailing_slash() {
        assert_eq!(
            provider(true).endpoint(),
            "http://localhost:1/v1/chat/completions"
        );
    }

    #[test]
    fn empty_base_url_rejected() {
        let result = OpenAiCompatProvider::new(OpenAiCompatConfig {
            base_url: " ".into(),
            model: "m".into(),
            api_key: None,
            streaming: true,
            max_tokens: None,
            temperature: None,
        });
        assert!(matches!(result, Err(ProviderError::Config(_))));
    }

    #[test]
    fn body_plain_text_messages() {
        let turn = ConversationTurn::new(vec![Message::system("ctx"), Message::user("hi")]);
        let body = provider(false).build_body(&turn);
        assert_eq!(body["model"], "test-model");
        assert_eq!(body["stream"], false);
        assert_eq!(body["max_tokens"], 64);
        assert_eq!(body["messages"][0]["role"], "system");
        assert_eq!(body["messages"][1]["content"], "hi");
        assert!(body.get("temperature").is_none());
    }

    #[test]
    fn body_encodes_images_as_data_urls() {
        let turn = ConversationTurn::new(vec![
            Message::user("what is this?").with_images(vec![ImageData::png(vec![1u8, 2, 3])]),
        ]);
        let body = provider(true).build_body(&turn);
        let parts = &body["messages"][0]["content"];
        assert_eq!(parts[0]["type"], "text");
        assert_eq!(parts[1]["type"], "image_url");
        assert_eq!(parts[1]["image_url"]["url"], "data:image/png;base64,AQID");
    }

    #[test]
    fn delta_parsing() {
        let chunk = r#"{"choices":[{"delta":{"content":"Hi"}}]}"#;
        assert!(matches!(parse_delta(chunk), Ok(Some(ref s)) if s == "Hi"));
        let role_only = r#"{"choices":[{"delta":{"role":"assistant"}}]}"#;
        assert!(matches!(parse_delta(role_only), Ok(None)));
        assert!(parse_delta("not json").is_err());
        let upstream = r#"{"error":{"message":"overloaded"}}"#;
        assert!(matches!(parse_delta(upstream), Err(ProviderError::Stream(ref m)) if m == "overloaded"));
    }

    #[test]
    fn error_message_extraction() {
        assert_eq!(
            extract_error_message(r#"{"error":{"message":"bad key"}}"#),
            "bad key"
        );
        assert_eq!(extract_error_message("plain"), "plain");
    }

    #[tokio::test]
    async fn text_stream_yields_deltas_and_stops_at_done() {
        let chunks: Vec<Result<Bytes, reqwest::Error>> = vec![
            Ok(Bytes::from_static(
                b"data: {\"choices\":[{\"delta\":{\"content\":\"Hi\"}}]}\n\n",
            )),
            Ok(Bytes::from_static(
                b"data: {\"choices\":[{\"delta\":{\"content\":\" there\"}}]}\n\ndata: [DONE]\n\n",
            )),
        ];
        let stream = text_stream(futures_util::stream::iter(chunks));
        let items: Vec<_> = stream.collect().await;
        let texts: Vec<String> = items.into_iter().filter_map(Result::ok).collect();
        assert_eq!(texts, vec!["Hi".to_string(), " there".to_string()]);
    }
}
