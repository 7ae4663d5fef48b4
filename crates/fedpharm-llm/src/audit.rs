//! Audit records for remote intelligence calls.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmAuditEntry {
    pub id: Uuid,
    pub purpose: String,
    pub model: String,
    pub local: bool,
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub output_hash: String,
    pub latency_ms: u64,
    pub succeeded: bool,
    pub called_at: chrono::DateTime<Utc>,
}

impl LlmAuditEntry {
    pub fn new(
        purpose: &str,
        model: &str,
        local: bool,
        prompt_tokens: u32,
        completion_tokens: u32,
        output: &str,
        latency_ms: u64,
    ) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(output.as_bytes());
        let output_hash = format!("{:x}", hasher.finalize());

        Self {
            id: Uuid::new_v4(),
            purpose: purpose.to_string(),
            model: model.to_string(),
            local,
            prompt_tokens,
            completion_tokens,
            output_hash,
            latency_ms,
            succeeded: true,
            called_at: Utc::now(),
        }
    }

    pub fn failed(purpose: &str, model: &str, local: bool, latency_ms: u64) -> Self {
        Self {
            succeeded: false,
            ..Self::new(purpose, model, local, 0, 0, "", latency_ms)
        }
    }

    /// Emit the record on the `fedpharm::audit` tracing target.
    pub fn record(&self) {
        tracing::info!(
            target: "fedpharm::audit",
            id = %self.id,
            purpose = %self.purpose,
            model = %self.model,
            local = self.local,
            prompt_tokens = self.prompt_tokens,
            completion_tokens = self.completion_tokens,
            output_hash = %self.output_hash,
            latency_ms = self.latency_ms,
            succeeded = self.succeeded,
            "llm call"
        );
    }
}
