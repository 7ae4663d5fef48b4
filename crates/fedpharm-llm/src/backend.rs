//! LLM backend trait and concrete implementations.

use std::collections::VecDeque;

use async_trait::async_trait;
use base64::Engine as _;
use futures_util::stream::{self, BoxStream, Stream, StreamExt};
use serde::{Deserialize, Serialize};
use thiserror::Error;

// ── Error ─────────────────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum LlmError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("Serialization error: {0}")]
    Serde(#[from] serde_json::Error),
    #[error("Backend unavailable: {0}")]
    Unavailable(String),
    #[error("Operation not supported by {0}")]
    Unsupported(String),
    #[error("Could not decode response: {0}")]
    Decode(String),
    #[error("API error [{status}]: {message}")]
    ApiError { status: u16, message: String },
}

// ── Request / Response ────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub role: String,   // "system" | "user" | "assistant"
    pub content: String,
}

impl Message {
    pub fn user(content: impl Into<String>) -> Self {
        Self { role: "user".to_string(), content: content.into() }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmRequest {
    pub messages: Vec<Message>,
    pub model: Option<String>,
    pub max_tokens: Option<u32>,
    pub temperature: Option<f32>,
}

impl LlmRequest {
    /// Single user-turn request with backend defaults.
    pub fn prompt(text: impl Into<String>) -> Self {
        Self { messages: vec![Message::user(text)], model: None, max_tokens: None, temperature: None }
    }

    pub fn with_model(mut self, model: Option<String>) -> Self {
        self.model = model;
        self
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmResponse {
    pub content: String,
    pub model: String,
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
}

/// Streamed completion: text chunks in arrival order.
pub type TextStream = BoxStream<'static, Result<String, LlmError>>;

// ── Trait ─────────────────────────────────────────────────────────────────────

#[async_trait]
pub trait LlmBackend: Send + Sync {
    async fn complete(&self, req: LlmRequest) -> Result<LlmResponse, LlmError>;

    /// Streamed completion. Backends without native streaming yield the
    /// whole completion as one chunk.
    async fn complete_stream(&self, req: LlmRequest) -> Result<TextStream, LlmError> {
        let resp = self.complete(req).await?;
        Ok(stream::once(async move { Ok(resp.content) }).boxed())
    }

    /// Raw signed 16-bit little-endian PCM for `text`.
    async fn synthesize_speech(&self, _text: &str) -> Result<Vec<u8>, LlmError> {
        Err(LlmError::Unsupported(self.model_id().to_string()))
    }

    fn model_id(&self) -> &str;
    fn is_local(&self) -> bool;
}

// ── Helpers ───────────────────────────────────────────────────────────────────

fn parse_openai_response(json: &serde_json::Value, fallback_model: &str) -> LlmResponse {
    LlmResponse {
        content: json["choices"][0]["message"]["content"]
            .as_str()
            .unwrap_or("")
            .to_string(),
        model: json["model"]
            .as_str()
            .unwrap_or(fallback_model)
            .to_string(),
        prompt_tokens:     json["usage"]["prompt_tokens"].as_u64().unwrap_or(0) as u32,
        completion_tokens: json["usage"]["completion_tokens"].as_u64().unwrap_or(0) as u32,
    }
}

async fn check_response_status(resp: reqwest::Response) -> Result<serde_json::Value, LlmError> {
    let status = resp.status().as_u16();
    let body: serde_json::Value = resp.json().await?;
    if status >= 400 {
        let msg = body["error"]["message"]
            .as_str()
            .or_else(|| body["message"].as_str())
            .unwrap_or("unknown API error")
            .to_string();
        return Err(LlmError::ApiError { status, message: msg });
    }
    Ok(body)
}

fn gemini_text(json: &serde_json::Value) -> Option<String> {
    json["candidates"][0]["content"]["parts"][0]["text"]
        .as_str()
        .map(str::to_string)
}

// ── SSE decoding (Gemini `alt=sse`) ──────────────────────────────────────────

struct SseDecoder<S> {
    inner: S,
    buffer: Vec<u8>,
    ready: VecDeque<Result<String, LlmError>>,
    done: bool,
}

impl<S> SseDecoder<S> {
    fn drain_lines(&mut self) {
        // Decode complete lines only; a read may end mid-character.
        while let Some(pos) = self.buffer.iter().position(|&b| b == b'\n') {
            let raw: Vec<u8> = self.buffer.drain(..=pos).collect();
            let line = String::from_utf8_lossy(&raw);
            let Some(data) = line.trim().strip_prefix("data:") else { continue };
            match serde_json::from_str::<serde_json::Value>(data.trim()) {
                Ok(json) => {
                    if let Some(text) = gemini_text(&json).filter(|t| !t.is_empty()) {
                        self.ready.push_back(Ok(text));
                    }
                }
                Err(e) => self.ready.push_back(Err(LlmError::Serde(e))),
            }
        }
    }
}

/// Turn a byte stream of `data: {json}` lines into text chunks.
pub(crate) fn sse_text_stream<S, B>(bytes: S) -> TextStream
where
    S: Stream<Item = Result<B, reqwest::Error>> + Send + Unpin + 'static,
    B: AsRef<[u8]> + Send + 'static,
{
    let decoder = SseDecoder { inner: bytes, buffer: Vec::new(), ready: VecDeque::new(), done: false };
    stream::unfold(decoder, |mut st| async move {
        loop {
            if let Some(item) = st.ready.pop_front() {
                return Some((item, st));
            }
            if st.done {
                return None;
            }
            match st.inner.next().await {
                Some(Ok(chunk)) => {
                    st.buffer.extend_from_slice(chunk.as_ref());
                    st.drain_lines();
                }
                Some(Err(e)) => {
                    st.done = true;
                    return Some((Err(LlmError::Http(e)), st));
                }
                None => {
                    st.done = true;
                    st.buffer.push(b'\n');
                    st.drain_lines();
                }
            }
        }
    })
    .boxed()
}

// ── 1. Gemini ─────────────────────────────────────────────────────────────────

pub struct GeminiBackend {
    pub model: String,
    pub tts_model: String,
    pub voice: String,
    api_key: String,
    client: reqwest::Client,
}

impl GeminiBackend {
    pub fn new(api_key: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            model: model.into(),
            tts_model: "gemini-2.5-flash-preview-tts".to_string(),
            voice: "Kore".to_string(),
            client: reqwest::Client::new(),
        }
    }

    pub fn with_tts(mut self, model: impl Into<String>, voice: impl Into<String>) -> Self {
        self.tts_model = model.into();
        self.voice = voice.into();
        self
    }

    fn url(&self, model: &str, method: &str, extra: &str) -> String {
        format!(
            "https://generativelanguage.googleapis.com/v1beta/models/{}:{}?{}key={}",
            model, method, extra, self.api_key
        )
    }

    fn request_body(req: &LlmRequest) -> serde_json::Value {
        // System message → systemInstruction
        let system_text = req.messages.iter()
            .find(|m| m.role == "system")
            .map(|m| m.content.clone());

        let contents: Vec<serde_json::Value> = req.messages.iter()
            .filter(|m| m.role != "system")
            .map(|m| {
                let role = if m.role == "assistant" { "model" } else { "user" };
                serde_json::json!({
                    "role": role,
                    "parts": [{ "text": m.content }]
                })
            })
            .collect();

        let mut body = serde_json::json!({
            "contents": contents,
            "generationConfig": {
                "maxOutputTokens": req.max_tokens.unwrap_or(4096),
                "temperature":     req.temperature.unwrap_or(0.7),
            }
        });
        if let Some(sys) = system_text {
            body["systemInstruction"] = serde_json::json!({
                "parts": [{ "text": sys }]
            });
        }
        body
    }
}

#[async_trait]
impl LlmBackend for GeminiBackend {
    async fn complete(&self, req: LlmRequest) -> Result<LlmResponse, LlmError> {
        let model = req.model.as_deref().unwrap_or(&self.model);
        let url = self.url(model, "generateContent", "");
        let body = Self::request_body(&req);

        let resp = self.client.post(&url).json(&body).send().await?;
        let json = check_response_status(resp).await?;

        Ok(LlmResponse {
            content: gemini_text(&json).unwrap_or_default(),
            model: model.to_string(),
            prompt_tokens: json["usageMetadata"]["promptTokenCount"].as_u64().unwrap_or(0) as u32,
            completion_tokens: json["usageMetadata"]["candidatesTokenCount"].as_u64().unwrap_or(0) as u32,
        })
    }

    async fn complete_stream(&self, req: LlmRequest) -> Result<TextStream, LlmError> {
        let model = req.model.as_deref().unwrap_or(&self.model);
        let url = self.url(model, "streamGenerateContent", "alt=sse&");
        let body = Self::request_body(&req);

        let resp = self.client.post(&url).json(&body).send().await?;
        let status = resp.status().as_u16();
        if status >= 400 {
            let message = resp.text().await.unwrap_or_default();
            return Err(LlmError::ApiError { status, message });
        }
        Ok(sse_text_stream(Box::pin(resp.bytes_stream())))
    }

    async fn synthesize_speech(&self, text: &str) -> Result<Vec<u8>, LlmError> {
        let url = self.url(&self.tts_model, "generateContent", "");
        let body = serde_json::json!({
            "contents": [{ "parts": [{ "text": text }] }],
            "generationConfig": {
                "responseModalities": ["AUDIO"],
                "speechConfig": {
                    "voiceConfig": { "prebuiltVoiceConfig": { "voiceName": self.voice } }
                }
            }
        });

        let resp = self.client.post(&url).json(&body).send().await?;
        let json = check_response_status(resp).await?;
        let data = json["candidates"][0]["content"]["parts"][0]["inlineData"]["data"]
            .as_str()
            .ok_or_else(|| LlmError::Decode("response carried no audio payload".to_string()))?;
        base64::engine::general_purpose::STANDARD
            .decode(data)
            .map_err(|e| LlmError::Decode(e.to_string()))
    }

    fn model_id(&self) -> &str { &self.model }
    fn is_local(&self) -> bool { false }
}

// ── 2. Ollama (local) ─────────────────────────────────────────────────────────

pub struct OllamaBackend {
    pub base_url: String,
    pub model: String,
    client: reqwest::Client,
}

impl OllamaBackend {
    pub fn new(base_url: impl Into<String>, model: impl Into<String>) -> Self {
        Self { base_url: base_url.into(), model: model.into(), client: reqwest::Client::new() }
    }
}

#[async_trait]
impl LlmBackend for OllamaBackend {
    async fn complete(&self, req: LlmRequest) -> Result<LlmResponse, LlmError> {
        let url = format!("{}/v1/chat/completions", self.base_url);
        let body = serde_json::json!({
            "model":       req.model.as_deref().unwrap_or(&self.model),
            "messages":    req.messages,
            "max_tokens":  req.max_tokens.unwrap_or(4096),
            "temperature": req.temperature.unwrap_or(0.7),
        });
        let resp = self.client.post(&url).json(&body).send().await?;
        let json = check_response_status(resp).await?;
        Ok(parse_openai_response(&json, &self.model))
    }

    fn model_id(&self) -> &str { &self.model }
    fn is_local(&self) -> bool { true }
}

// ── 3. Disabled ───────────────────────────────────────────────────────────────

/// Stand-in used when no provider is configured.
pub struct DisabledBackend;

#[async_trait]
impl LlmBackend for DisabledBackend {
    async fn complete(&self, _req: LlmRequest) -> Result<LlmResponse, LlmError> {
        Err(LlmError::Unavailable("no LLM backend configured".to_string()))
    }

    async fn complete_stream(&self, _req: LlmRequest) -> Result<TextStream, LlmError> {
        Err(LlmError::Unavailable("no LLM backend configured".to_string()))
    }

    fn model_id(&self) -> &str { "disabled" }
    fn is_local(&self) -> bool { true }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gemini_backend_is_not_local() {
        let b = GeminiBackend::new("AIza-test", "gemini-2.5-flash");
        assert!(!b.is_local());
        assert_eq!(b.model_id(), "gemini-2.5-flash");
        assert_eq!(b.voice, "Kore");
    }

    #[test]
    fn test_ollama_is_local() {
        let b = OllamaBackend::new("http://localhost:11434", "llama3:8b");
        assert!(b.is_local());
    }

    #[test]
    fn test_gemini_system_message_moves_to_instruction() {
        let req = LlmRequest {
            messages: vec![
                Message { role: "system".into(), content: "be brief".into() },
                Message::user("hi"),
            ],
            model: None,
            max_tokens: None,
            temperature: None,
        };
        let body = GeminiBackend::request_body(&req);
        assert_eq!(body["systemInstruction"]["parts"][0]["text"], "be brief");
        assert_eq!(body["contents"].as_array().unwrap().len(), 1);
    }

    #[test]
    fn test_openai_response_parsing() {
        let json = serde_json::json!({
            "model": "llama3:8b",
            "choices": [{ "message": { "content": "ok" } }],
            "usage": { "prompt_tokens": 3, "completion_tokens": 1 }
        });
        let r = parse_openai_response(&json, "fallback");
        assert_eq!(r.content, "ok");
        assert_eq!(r.prompt_tokens, 3);
    }

    #[tokio::test]
    async fn test_sse_stream_splits_chunks_across_reads() {
        let frames: Vec<Result<Vec<u8>, reqwest::Error>> = vec![
            Ok(b"data: {\"candidates\":[{\"content\":{\"parts\":[{\"text\":\"Key \"}]}}]}\n\ndata: {\"cand".to_vec()),
            Ok(b"idates\":[{\"content\":{\"parts\":[{\"text\":\"findings\"}]}}]}\n\n".to_vec()),
        ];
        let chunks: Vec<String> = sse_text_stream(stream::iter(frames))
            .map(|r| r.unwrap())
            .collect()
            .await;
        assert_eq!(chunks, vec!["Key ".to_string(), "findings".to_string()]);
    }

    #[tokio::test]
    async fn test_sse_stream_keeps_multibyte_text_split_across_reads() {
        let frame = "data: {\"candidates\":[{\"content\":{\"parts\":[{\"text\":\"Café ✨\"}]}}]}\n\n".as_bytes();
        let split = frame.iter().position(|&b| b == 0xC3).unwrap() + 1;
        let frames: Vec<Result<Vec<u8>, reqwest::Error>> =
            vec![Ok(frame[..split].to_vec()), Ok(frame[split..].to_vec())];
        let chunks: Vec<String> = sse_text_stream(stream::iter(frames))
            .map(|r| r.unwrap())
            .collect()
            .await;
        assert_eq!(chunks, vec!["Café ✨".to_string()]);
    }

    #[tokio::test]
    async fn test_disabled_backend_fails() {
        let err = DisabledBackend.complete(LlmRequest::prompt("x")).await.unwrap_err();
        assert!(matches!(err, LlmError::Unavailable(_)));
        assert!(DisabledBackend.synthesize_speech("x").await.is_err());
    }
}
