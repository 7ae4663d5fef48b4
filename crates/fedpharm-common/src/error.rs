use thiserror::Error;

#[derive(Debug, Error)]
pub enum FedPharmError {
    #[error("Invalid file type. Please use: {allowed}")]
    InvalidArtifact { allowed: String },

    #[error("Please select a model file to upload.")]
    MissingArtifact,

    #[error("Invalid transition: {0}")]
    InvalidTransition(String),

    #[error("Not all participants have contributed yet")]
    NotReady,

    #[error("Unknown participant: {0}")]
    UnknownParticipant(String),

    #[error("Unknown collaborator: {0}")]
    UnknownCollaborator(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Remote intelligence error: {0}")]
    Remote(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl FedPharmError {
    /// True for errors the user can fix by correcting their input.
    pub fn is_validation(&self) -> bool {
        matches!(self, Self::InvalidArtifact { .. } | Self::MissingArtifact)
    }
}

pub type Result<T> = std::result::Result<T, FedPharmError>;
