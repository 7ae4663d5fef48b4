//! fedpharm-llm — remote intelligence for FedPharm-X.
//!
//! Backends:
//!   GeminiBackend: Google Gemini API (text, streamed text, speech)
//!   OllamaBackend: local Ollama (OpenAI-compatible, text only)
//!   DisabledBackend: no provider configured; every call fails cleanly
//!
//! `IntelligenceService` wraps a backend and is the failure boundary:
//! nothing it returns to the simulation core carries a remote error.

pub mod backend;
pub mod audio;
pub mod audit;
pub mod prompts;
pub mod sections;
pub mod intelligence;
pub mod scripted;

pub use backend::{LlmBackend, LlmError, LlmRequest, LlmResponse, Message, TextStream};
pub use intelligence::{BiomedicalIntelligence, IntelligenceService, FALLBACK_TEXT};
pub use audio::{AudioClip, AudioFormat};
