//! fedpharm-web — HTTP surface for FedPharm-X
//! Provides JSON endpoints for:
//!   - Participant uploads (file selection, submission, confirmation)
//!   - Training control and readiness
//!   - Collaboration chat, summaries and speech
//!   - Collaborator roster
//!   - Biomedical intelligence results
//! plus an SSE stream of live session events.

pub mod config;
pub mod error;
pub mod router;
pub mod handlers;
pub mod state;
pub mod sse;
