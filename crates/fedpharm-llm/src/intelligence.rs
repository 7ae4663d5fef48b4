//! Failure boundary between the simulation and the remote model.
//!
//! Every public method here either succeeds or returns a value the caller
//! can show as-is; remote errors are logged and audited, never surfaced
//! as panics.

use std::sync::Arc;
use std::time::Instant;

use futures_util::StreamExt;
use serde::{Deserialize, Serialize};
use tracing::{instrument, warn};

use crate::audio::{decode_pcm16, AudioClip, AudioFormat};
use crate::audit::LlmAuditEntry;
use crate::backend::{LlmBackend, LlmError, LlmRequest};
use crate::prompts::{summary_prompt, ADMET_PROMPT, KNOWLEDGE_PROMPT};
use crate::sections::{parse_sections, Section};

/// Shown in place of any report that could not be generated.
pub const FALLBACK_TEXT: &str = "data unavailable";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BiomedicalIntelligence {
    pub admet: String,
    pub knowledge: String,
    pub knowledge_sections: Vec<Section>,
    /// True when the fallback text was substituted.
    pub degraded: bool,
}

impl BiomedicalIntelligence {
    pub fn loaded(admet: String, knowledge: String) -> Self {
        let knowledge_sections = parse_sections(&knowledge);
        Self { admet, knowledge, knowledge_sections, degraded: false }
    }

    pub fn unavailable() -> Self {
        Self {
            admet: FALLBACK_TEXT.to_string(),
            knowledge: FALLBACK_TEXT.to_string(),
            knowledge_sections: Vec::new(),
            degraded: true,
        }
    }
}

pub struct IntelligenceService {
    backend: Arc<dyn LlmBackend>,
    audio: AudioFormat,
    summary_model: Option<String>,
}

impl IntelligenceService {
    pub fn new(backend: Arc<dyn LlmBackend>) -> Self {
        Self { backend, audio: AudioFormat::default(), summary_model: None }
    }

    pub fn with_audio_format(mut self, audio: AudioFormat) -> Self {
        self.audio = audio;
        self
    }

    /// Model override for chat summaries.
    pub fn with_summary_model(mut self, model: Option<String>) -> Self {
        self.summary_model = model;
        self
    }

    pub fn model_id(&self) -> &str {
        self.backend.model_id()
    }

    /// Run the ADMET and literature prompts concurrently. Both must succeed
    /// or the whole report falls back.
    #[instrument(skip(self), fields(model = self.backend.model_id()))]
    pub async fn fetch_biomedical_intelligence(&self) -> BiomedicalIntelligence {
        let (admet, knowledge) = tokio::join!(
            self.generate("admet", ADMET_PROMPT),
            self.generate("knowledge", KNOWLEDGE_PROMPT),
        );
        match (admet, knowledge) {
            (Ok(admet), Ok(knowledge)) => BiomedicalIntelligence::loaded(admet, knowledge),
            (admet, knowledge) => {
                for err in [admet.err(), knowledge.err()].into_iter().flatten() {
                    warn!(error = %err, "biomedical intelligence request failed");
                }
                BiomedicalIntelligence::unavailable()
            }
        }
    }

    /// Stream a summary of `transcript`, handing each chunk to `on_chunk`.
    /// Returns the concatenated text.
    #[instrument(skip_all, fields(model = self.backend.model_id()))]
    pub async fn summarize<F>(&self, transcript: &str, mut on_chunk: F) -> Result<String, LlmError>
    where
        F: FnMut(&str) + Send,
    {
        let t0 = Instant::now();
        let req = LlmRequest::prompt(summary_prompt(transcript)).with_model(self.summary_model.clone());
        let model = req.model.clone().unwrap_or_else(|| self.backend.model_id().to_string());

        let result = async {
            let mut stream = self.backend.complete_stream(req).await?;
            let mut full = String::new();
            while let Some(chunk) = stream.next().await {
                let chunk = chunk?;
                on_chunk(&chunk);
                full.push_str(&chunk);
            }
            Ok::<_, LlmError>(full)
        }
        .await;

        self.audit("summary", &model, 0, 0, result.as_deref().ok(), t0);
        result
    }

    /// Synthesise `text` and decode it into float frames.
    #[instrument(skip(self))]
    pub async fn speak(&self, text: &str) -> Result<AudioClip, LlmError> {
        let t0 = Instant::now();
        let result = match self.backend.synthesize_speech(text).await {
            Ok(pcm) => decode_pcm16(&pcm, self.audio),
            Err(e) => Err(e),
        };
        self.audit("speech", self.backend.model_id(), 0, 0, result.as_ref().ok().map(|_| text), t0);
        result
    }

    async fn generate(&self, purpose: &str, prompt: &str) -> Result<String, LlmError> {
        let t0 = Instant::now();
        match self.backend.complete(LlmRequest::prompt(prompt)).await {
            Ok(resp) => {
                self.audit(purpose, &resp.model, resp.prompt_tokens, resp.completion_tokens, Some(&resp.content), t0);
                Ok(resp.content)
            }
            Err(e) => {
                self.audit(purpose, self.backend.model_id(), 0, 0, None, t0);
                Err(e)
            }
        }
    }

    fn audit(&self, purpose: &str, model: &str, prompt_tokens: u32, completion_tokens: u32, output: Option<&str>, t0: Instant) {
        let latency_ms = t0.elapsed().as_millis() as u64;
        let local = self.backend.is_local();
        let entry = match output {
            Some(out) => LlmAuditEntry::new(purpose, model, local, prompt_tokens, completion_tokens, out, latency_ms),
            None => LlmAuditEntry::failed(purpose, model, local, latency_ms),
        };
        entry.record();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scripted::ScriptedBackend;

    const KNOWLEDGE: &str = "### Similar Compounds\n- Ibuprofen\n### FDA Approval Status\nPhase II";

    #[tokio::test]
    async fn test_fetch_success_parses_sections() {
        let backend = Arc::new(ScriptedBackend::replying(KNOWLEDGE));
        let svc = IntelligenceService::new(backend.clone());
        let report = svc.fetch_biomedical_intelligence().await;
        assert!(!report.degraded);
        assert_eq!(report.knowledge_sections.len(), 2);
        assert_eq!(backend.calls(), 2);
    }

    #[tokio::test]
    async fn test_one_failure_degrades_both() {
        let backend = ScriptedBackend::replying("profile").fail_when_prompt_contains("Literature");
        let svc = IntelligenceService::new(Arc::new(backend));
        let report = svc.fetch_biomedical_intelligence().await;
        assert_eq!(report, BiomedicalIntelligence::unavailable());
        assert_eq!(report.admet, FALLBACK_TEXT);
    }

    #[tokio::test]
    async fn test_summarize_streams_chunks() {
        let backend = ScriptedBackend::replying("unused").with_chunks(["**Key", " Findings**", "\n- IC50"]);
        let svc = IntelligenceService::new(Arc::new(backend));
        let mut seen = Vec::new();
        let full = svc
            .summarize("You: a\nLab: b", |c| seen.push(c.to_string()))
            .await
            .unwrap();
        assert_eq!(seen.len(), 3);
        assert_eq!(full, "**Key Findings**\n- IC50");
    }

    #[tokio::test]
    async fn test_summarize_failure() {
        let svc = IntelligenceService::new(Arc::new(ScriptedBackend::failing()));
        assert!(svc.summarize("You: a\nLab: b", |_| {}).await.is_err());
    }

    #[tokio::test]
    async fn test_speak_decodes_pcm() {
        let backend = ScriptedBackend::replying("").with_speech(vec![0x00, 0x40, 0x00, 0xC0]);
        let svc = IntelligenceService::new(Arc::new(backend));
        let clip = svc.speak("Hospital said: hi").await.unwrap();
        assert_eq!(clip.samples, vec![0.5, -0.5]);
        assert_eq!(clip.format.sample_rate, 24_000);
    }
}
