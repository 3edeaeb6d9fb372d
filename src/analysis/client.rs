//! HTTP client for the Anthropic Messages API, streaming or not.

use async_trait::async_trait;
use futures_util::{stream, StreamExt};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;

use super::{Completion, DeltaStream};
use crate::config::Config;

const API_VERSION: &str = "2023-06-01";

/// Errors from LLM operations.
#[derive(Debug, thiserror::Error)]
pub enum LlmError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API error (status {status}): {message}")]
    Api { status: u16, message: String },

    #[error("rate limited (retry after {retry_after:?}s)")]
    RateLimited { retry_after: Option<u64> },

    #[error("stream error: {0}")]
    Stream(String),

    #[error("invalid response: {0}")]
    InvalidResponse(String),
}

// ── Wire types ───────────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
pub struct MessagesRequest {
    pub model: String,
    pub max_tokens: u32,
    pub messages: Vec<Message>,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub stream: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub role: String,
    pub content: String,
}

#[derive(Debug, Deserialize)]
pub struct MessagesResponse {
    pub content: Vec<ContentBlock>,
    pub stop_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ContentBlock {
    #[serde(rename = "type")]
    pub content_type: String,
    pub text: Option<String>,
}

impl MessagesResponse {
    /// Text of the first text block, if any.
    pub fn text(&self) -> Option<&str> {
        self.content
            .iter()
            .find(|b| b.content_type == "text")
            .and_then(|b| b.text.as_deref())
    }
}

// ── Server-sent events ───────────────────────────────────────────────────────

/// Turns raw SSE bytes into text deltas. Network chunks may end anywhere,
/// including inside a UTF-8 sequence, so incomplete lines are buffered.
#[derive(Debug, Default)]
pub struct SseDecoder {
    buffer: Vec<u8>,
}

impl SseDecoder {
    pub fn push(&mut self, bytes: &[u8]) -> Vec<Result<String, LlmError>> {
        self.buffer.extend_from_slice(bytes);
        let mut out = Vec::new();
        while let Some(pos) = self.buffer.iter().position(|&b| b == b'\n') {
            let line: Vec<u8> = self.buffer.drain(..=pos).collect();
            let line = String::from_utf8_lossy(&line);
            if let Some(item) = Self::event(line.trim_end()) {
                out.push(item);
            }
        }
        out
    }

    fn event(line: &str) -> Option<Result<String, LlmError>> {
        let data = line.strip_prefix("data:")?.trim_start();
        let v: Value = serde_json::from_str(data).ok()?;
        match v["type"].as_str()? {
            "content_block_delta" => {
                let text = v["delta"]["text"].as_str()?;
                (!text.is_empty()).then(|| Ok(text.to_string()))
            }
            "error" => {
                let message = v["error"]["message"].as_str().unwrap_or("unknown error");
                Some(Err(LlmError::Stream(message.to_string())))
            }
            _ => None,
        }
    }
}

// ── Client ───────────────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct AnthropicClient {
    http: Client,
    api_key: String,
    base_url: String,
    model: String,
    max_tokens: u32,
    stream: bool,
}

impl AnthropicClient {
    pub fn from_config(config: &Config) -> Result<Self, LlmError> {
        let http = Client::builder()
            .timeout(Duration::from_secs(600))
            .build()?;
        Ok(Self {
            http,
            api_key: config.api_key.clone().unwrap_or_default(),
            base_url: config.base_url.trim_end_matches('/').to_string(),
            model: config.model.clone(),
            max_tokens: config.max_tokens,
            stream: config.stream,
        })
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    fn request(&self, prompt: &str) -> MessagesRequest {
        MessagesRequest {
            model: self.model.clone(),
            max_tokens: self.max_tokens,
            messages: vec![Message {
                role: "user".into(),
                content: prompt.to_string(),
            }],
            stream: self.stream,
        }
    }

    async fn send(&self, request: &MessagesRequest) -> Result<reqwest::Response, LlmError> {
        let response = self
            .http
            .post(format!("{}/v1/messages", self.base_url))
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", API_VERSION)
            .header("content-type", "application/json")
            .json(request)
            .send()
            .await?;

        let status = response.status().as_u16();
        if status == 429 {
            let retry_after = response
                .headers()
                .get("retry-after")
                .and_then(|v| v.to_str().ok())
                .and_then(|s| s.parse::<u64>().ok());
            return Err(LlmError::RateLimited { retry_after });
        }
        if status >= 400 {
            let message = response.text().await.unwrap_or_else(|_| "(no body)".into());
            return Err(LlmError::Api { status, message });
        }
        Ok(response)
    }
}

#[async_trait]
impl Completion for AnthropicClient {
    async fn stream(&self, prompt: &str) -> Result<DeltaStream, LlmError> {
        let request = self.request(prompt);
        let response = self.send(&request).await?;

        if !request.stream {
            let body: MessagesResponse = response
                .json()
                .await
                .map_err(|e| LlmError::InvalidResponse(format!("failed to parse response: {e}")))?;
            let text = body
                .text()
                .ok_or_else(|| LlmError::InvalidResponse("no text block in response".into()))?
                .to_string();
            return Ok(stream::once(async move { Ok::<_, LlmError>(text) }).boxed());
        }

        let mut decoder = SseDecoder::default();
        let deltas = response.bytes_stream().flat_map(move |chunk| {
            let items = match chunk {
                Ok(bytes) => decoder.push(&bytes),
                Err(e) => vec![Err(LlmError::Http(e))],
            };
            stream::iter(items)
        });
        Ok(deltas.boxed())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn texts(items: Vec<Result<String, LlmError>>) -> Vec<String> {
        items.into_iter().map(|r| r.unwrap()).collect()
    }

    #[test]
    fn sse_deltas_are_extracted() {
        let mut dec = SseDecoder::default();
        let body = concat!(
            "event: message_start\n",
            "data: {\"type\":\"message_start\"}\n\n",
            "event: content_block_delta\n",
            "data: {\"type\":\"content_block_delta\",\"delta\":{\"type\":\"text_delta\",\"text\":\"<resp\"}}\n\n",
            "data: {\"type\":\"content_block_delta\",\"delta\":{\"type\":\"text_delta\",\"text\":\"onse>\"}}\n\n",
            "data: {\"type\":\"message_stop\"}\n\n",
        );
        assert_eq!(texts(dec.push(body.as_bytes())), vec!["<resp", "onse>"]);
    }

    #[test]
    fn sse_lines_split_across_chunks() {
        let line = "data: {\"type\":\"content_block_delta\",\"delta\":{\"type\":\"text_delta\",\"text\":\"caf\u{e9}\"}}\n";
        let bytes = line.as_bytes();
        let mut dec = SseDecoder::default();
        let mut out = Vec::new();
        // One byte at a time splits the two-byte 'é' too.
        for b in bytes {
            out.extend(texts(dec.push(std::slice::from_ref(b))));
        }
        assert_eq!(out, vec!["café"]);
    }

    #[test]
    fn sse_error_event_is_surfaced() {
        let mut dec = SseDecoder::default();
        let items = dec.push(b"data: {\"type\":\"error\",\"error\":{\"message\":\"overloaded\"}}\n");
        assert!(matches!(&items[..], [Err(LlmError::Stream(m))] if m == "overloaded"));
    }

    #[test]
    fn request_omits_stream_flag_when_off() {
        let config = Config {
            stream: false,
            ..Config::default()
        };
        let client = AnthropicClient::from_config(&config).unwrap();
        let v = serde_json::to_value(client.request("hi")).unwrap();
        assert!(v.get("stream").is_none());
        assert_eq!(v["max_tokens"], 8000);
        assert_eq!(v["messages"][0]["content"], "hi");
    }

    #[test]
    fn response_text_picks_first_text_block() {
        let resp: MessagesResponse = serde_json::from_str(
            r#"{"content":[{"type":"tool_use"},{"type":"text","text":"hello"}],"stop_reason":"end_turn"}"#,
        )
        .unwrap();
        assert_eq!(resp.text(), Some("hello"));
    }
}
