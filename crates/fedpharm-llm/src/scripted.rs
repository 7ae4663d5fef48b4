//! Deterministic backend for tests and offline demos.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use futures_util::stream::{self, StreamExt};

use crate::backend::{LlmBackend, LlmError, LlmRequest, LlmResponse, TextStream};

#[derive(Default)]
pub struct ScriptedBackend {
    reply: Option<String>,
    chunks: Option<Vec<String>>,
    speech: Option<Vec<u8>>,
    fail_on: Option<String>,
    latency: Option<Duration>,
    calls: AtomicUsize,
    prompts: Mutex<Vec<String>>,
}

impl ScriptedBackend {
    /// Every completion returns `text`.
    pub fn replying(text: impl Into<String>) -> Self {
        Self { reply: Some(text.into()), ..Default::default() }
    }

    /// Every call fails.
    pub fn failing() -> Self {
        Self::default()
    }

    /// Fail requests whose prompt contains `needle`.
    pub fn fail_when_prompt_contains(mut self, needle: impl Into<String>) -> Self {
        self.fail_on = Some(needle.into());
        self
    }

    /// Streamed completions yield these chunks instead of the reply.
    pub fn with_chunks<I, S>(mut self, chunks: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.chunks = Some(chunks.into_iter().map(Into::into).collect());
        self
    }

    pub fn with_speech(mut self, pcm: Vec<u8>) -> Self {
        self.speech = Some(pcm);
        self
    }

    /// Sleep before answering (uses tokio time, so paused clocks apply).
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().map(|p| p.clone()).unwrap_or_default()
    }

    async fn enter(&self, prompt: &str) -> Result<(), LlmError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Ok(mut p) = self.prompts.lock() {
            p.push(prompt.to_string());
        }
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }
        match &self.fail_on {
            Some(needle) if prompt.contains(needle.as_str()) => {
                Err(LlmError::Unavailable(format!("scripted failure for '{needle}'")))
            }
            _ => Ok(()),
        }
    }

    fn reply(&self) -> Result<String, LlmError> {
        self.reply
            .clone()
            .ok_or_else(|| LlmError::Unavailable("scripted backend has no reply".to_string()))
    }
}

fn prompt_of(req: &LlmRequest) -> String {
    req.messages.iter().map(|m| m.content.as_str()).collect::<Vec<_>>().join("\n")
}

#[async_trait]
impl LlmBackend for ScriptedBackend {
    async fn complete(&self, req: LlmRequest) -> Result<LlmResponse, LlmError> {
        self.enter(&prompt_of(&req)).await?;
        let content = self.reply()?;
        Ok(LlmResponse {
            completion_tokens: content.split_whitespace().count() as u32,
            content,
            model: req.model.unwrap_or_else(|| "scripted".to_string()),
            prompt_tokens: 0,
        })
    }

    async fn complete_stream(&self, req: LlmRequest) -> Result<TextStream, LlmError> {
        self.enter(&prompt_of(&req)).await?;
        let chunks = match &self.chunks {
            Some(chunks) => chunks.clone(),
            None => vec![self.reply()?],
        };
        Ok(stream::iter(chunks.into_iter().map(Ok)).boxed())
    }

    async fn synthesize_speech(&self, text: &str) -> Result<Vec<u8>, LlmError> {
        self.enter(text).await?;
        self.speech
            .clone()
            .ok_or_else(|| LlmError::Unsupported("scripted".to_string()))
    }

    fn model_id(&self) -> &str { "scripted" }
    fn is_local(&self) -> bool { true }
}
