//! fedpharm-common — Shared types and errors used across all FedPharm-X crates.

pub mod error;
pub mod entities;

// Re-export commonly used types
pub use error::{FedPharmError, Result};
pub use entities::{
    ChartDataPoint, ChatMessage, ChatRole, Collaborator, CollaboratorRole, GlobalStatus,
    Institution, LogEntry, LogLevel, ModelArtifact, Optimizer, ParticipantId,
    ParticipantUploadState, SubmissionType,
};
