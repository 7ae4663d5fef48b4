pub mod participants;
pub mod training;
pub mod chat;
pub mod collaborators;
pub mod intelligence;

use fedpharm_common::{FedPharmError, ParticipantId};

use crate::error::ApiError;

/// Parse a participant path segment; unknown ids map to 404.
pub(crate) fn participant_id(raw: &str) -> Result<ParticipantId, ApiError> {
    raw.parse::<ParticipantId>().map_err(|_| FedPharmError::UnknownParticipant(raw.to_string()).into())
}
