//! Readiness gate: may a training run start?
//!
//! Derived on demand from current state, never stored.

use fedpharm_common::ParticipantUploadState;

use crate::simulator::SimulatorState;

/// True when no run is in progress or complete and every participant has
/// confirmed an upload.
pub fn is_ready<'a, I>(simulator: SimulatorState, participants: I) -> bool
where
    I: IntoIterator<Item = &'a ParticipantUploadState>,
{
    simulator == SimulatorState::Idle && participants.into_iter().all(|p| p.is_uploaded)
}
