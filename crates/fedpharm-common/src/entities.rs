//! Core domain types shared by the simulator, the intelligence layer and the web surface.
//! Everything here is plain data; the state machines live in fedpharm-sim.

use std::fmt;
use std::str::FromStr;

use chrono::Local;
use serde::{Deserialize, Serialize};

use crate::error::FedPharmError;

// ---------------------------------------------------------------------------
// Optimizer / submission options
// ---------------------------------------------------------------------------

/// Simulated aggregation rule. `FedAdagrad` drives the early rounds,
/// `FedAdam` takes over from the switch round.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum Optimizer {
    FedAdagrad,
    FedAdam,
}

impl Optimizer {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::FedAdagrad => "FedAdagrad",
            Self::FedAdam => "FedAdam",
        }
    }
}

impl fmt::Display for Optimizer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "snake_case")]
pub enum SubmissionType {
    #[default]
    FullModel,
    ParametersOnly,
}

impl SubmissionType {
    pub fn label(&self) -> &'static str {
        match self {
            Self::FullModel => "Share Full Model",
            Self::ParametersOnly => "Parameters Only",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            Self::FullModel => "Includes model architecture and weights.",
            Self::ParametersOnly => "Includes only the trained model weights.",
        }
    }
}

// ---------------------------------------------------------------------------
// Participants
// ---------------------------------------------------------------------------

/// The fixed data-contributing roles. Every one of them must confirm an
/// upload before a training run can start.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "lowercase")]
pub enum ParticipantId {
    Hospital,
    Lab,
    Pharmacy,
}

impl ParticipantId {
    pub const ALL: [ParticipantId; 3] = [Self::Hospital, Self::Lab, Self::Pharmacy];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Hospital => "hospital",
            Self::Lab => "lab",
            Self::Pharmacy => "pharmacy",
        }
    }

    /// Display name used in logs and chat.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Hospital => "Hospital",
            Self::Lab => "Research Lab",
            Self::Pharmacy => "Pharmacy",
        }
    }

    pub fn domain(&self) -> &'static str {
        match self {
            Self::Hospital => "Oncology (EGFR/BRAF inhibitors)",
            Self::Lab => "Antiviral / Molecular Simulation",
            Self::Pharmacy => "Neuropharmacology",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            Self::Hospital => "Provide anonymized clinical trial and patient outcome data to improve drug efficacy and safety models.",
            Self::Lab => "Contribute pre-trained models and experimental data from in-silico and in-vitro studies.",
            Self::Pharmacy => "Share aggregated prescription data and patient demographic information stripped of all personal identifiers.",
        }
    }

    pub fn example_file(&self) -> &'static str {
        match self {
            Self::Hospital => "Client1.bin",
            Self::Lab => "Client2.bin",
            Self::Pharmacy => "Client3.bin",
        }
    }
}

impl fmt::Display for ParticipantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ParticipantId {
    type Err = FedPharmError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "hospital" => Ok(Self::Hospital),
            "lab" => Ok(Self::Lab),
            "pharmacy" => Ok(Self::Pharmacy),
            other => Err(FedPharmError::UnknownParticipant(other.to_string())),
        }
    }
}

/// Opaque stand-in for the model file a participant contributes.
/// Only the name is inspected (for the extension allow-list).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ModelArtifact {
    pub name: String,
    #[serde(default)]
    pub size_bytes: u64,
}

impl ModelArtifact {
    pub fn new(name: impl Into<String>, size_bytes: u64) -> Self {
        Self { name: name.into(), size_bytes }
    }

    /// Lower-cased extension including the leading dot, e.g. `.bin`.
    pub fn extension(&self) -> Option<String> {
        let lower = self.name.to_lowercase();
        lower.rfind('.').map(|idx| lower[idx..].to_string())
    }
}

/// Contribution record for one participant. Written once, by that
/// participant's upload wizard, and never reset within a session.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ParticipantUploadState {
    pub file: Option<ModelArtifact>,
    pub optimizer: Optimizer,
    pub submission_type: SubmissionType,
    pub version: String,
    pub is_uploaded: bool,
    pub audit_tx_id: Option<String>,
    pub is_compliant: bool,
}

impl Default for ParticipantUploadState {
    fn default() -> Self {
        Self {
            file: None,
            optimizer: Optimizer::FedAdam,
            submission_type: SubmissionType::FullModel,
            version: "v1.0.0".to_string(),
            is_uploaded: false,
            audit_tx_id: None,
            is_compliant: false,
        }
    }
}

// ---------------------------------------------------------------------------
// Training status
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct GlobalStatus {
    pub accuracy: f64,
    pub loss: f64,
    pub round: u32,
    pub active_optimizer: Optimizer,
}

impl Default for GlobalStatus {
    /// Status shown before the first run.
    fn default() -> Self {
        Self {
            accuracy: 0.0,
            loss: 2.3,
            round: 0,
            active_optimizer: Optimizer::FedAdagrad,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct ChartDataPoint {
    pub round: u32,
    pub accuracy: f64,
    pub loss: f64,
    pub optimizer: Optimizer,
}

// ---------------------------------------------------------------------------
// Log entries
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Info,
    Success,
    Warn,
    Error,
}

impl LogLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Info => "info",
            Self::Success => "success",
            Self::Warn => "warn",
            Self::Error => "error",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LogEntry {
    pub timestamp: String,
    pub level: LogLevel,
    pub message: String,
}

impl LogEntry {
    /// Stamp a new entry with the local wall-clock time (`HH:MM:SS`).
    pub fn now(level: LogLevel, message: impl Into<String>) -> Self {
        Self {
            timestamp: Local::now().format("%H:%M:%S").to_string(),
            level,
            message: message.into(),
        }
    }
}

// ---------------------------------------------------------------------------
// Collaboration
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum CollaboratorRole {
    ClinicalResearcher,
    Bioinformatician,
    Pharmacologist,
    LabTechnician,
    RegulatoryAffairs,
    MedicalDirector,
}

impl CollaboratorRole {
    pub fn label(&self) -> &'static str {
        match self {
            Self::ClinicalResearcher => "Clinical Researcher",
            Self::Bioinformatician => "Bioinformatician",
            Self::Pharmacologist => "Pharmacologist",
            Self::LabTechnician => "Lab Technician",
            Self::RegulatoryAffairs => "Regulatory Affairs",
            Self::MedicalDirector => "Medical Director",
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum Institution {
    Hospital,
    Lab,
    Pharmacy,
    Platform,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Collaborator {
    pub id: String,
    pub name: String,
    pub role: CollaboratorRole,
    pub institution: Institution,
    pub last_active: String,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum ChatRole {
    Hospital,
    Lab,
    Pharmacy,
    You,
    System,
}

impl ChatRole {
    /// Participant roles that can be simulated as typing.
    pub const PARTICIPANTS: [ChatRole; 3] = [Self::Hospital, Self::Lab, Self::Pharmacy];

    pub fn display_name(&self) -> &'static str {
        match self {
            Self::Hospital => ParticipantId::Hospital.name(),
            Self::Lab => ParticipantId::Lab.name(),
            Self::Pharmacy => ParticipantId::Pharmacy.name(),
            Self::You => "You",
            Self::System => "System",
        }
    }

    pub fn is_participant(&self) -> bool {
        matches!(self, Self::Hospital | Self::Lab | Self::Pharmacy)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChatMessage {
    pub role: ChatRole,
    pub message: String,
    pub timestamp: String,
}

impl ChatMessage {
    pub fn now(role: ChatRole, message: impl Into<String>) -> Self {
        Self {
            role,
            message: message.into(),
            timestamp: Local::now().format("%H:%M").to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_participant_round_trips_through_str() {
        for p in ParticipantId::ALL {
            assert_eq!(p.as_str().parse::<ParticipantId>().unwrap(), p);
        }
        assert!("clinic".parse::<ParticipantId>().is_err());
    }

    #[test]
    fn test_artifact_extension_is_lowercased() {
        assert_eq!(ModelArtifact::new("Weights.H5", 10).extension().as_deref(), Some(".h5"));
        assert_eq!(ModelArtifact::new("archive.tar.bin", 1).extension().as_deref(), Some(".bin"));
        assert_eq!(ModelArtifact::new("README", 1).extension(), None);
    }

    #[test]
    fn test_default_upload_state_is_not_uploaded() {
        let s = ParticipantUploadState::default();
        assert!(!s.is_uploaded);
        assert!(s.audit_tx_id.is_none());
        assert_eq!(s.version, "v1.0.0");
    }

    #[test]
    fn test_log_level_serialises_lowercase() {
        let json = serde_json::to_string(&LogLevel::Success).unwrap();
        assert_eq!(json, "\"success\"");
    }
}
