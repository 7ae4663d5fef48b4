//! Participant catalogue and upload wizard endpoints.

use axum::{
    extract::{Path, State},
    Json,
};
use fedpharm_common::ModelArtifact;
use fedpharm_sim::audit::ContributionAudit;
use fedpharm_sim::session::ParticipantView;
use fedpharm_sim::upload::SubmissionForm;

use super::participant_id;
use crate::error::ApiError;
use crate::state::SharedState;

/// GET /api/participants
pub async fn api_participants(
    State(state): State<SharedState>,
) -> Result<Json<Vec<ParticipantView>>, ApiError> {
    let snapshot = state.session.snapshot().await?;
    Ok(Json(snapshot.participants))
}

/// GET /api/participants/{id}
pub async fn api_participant(
    State(state): State<SharedState>,
    Path(id): Path<String>,
) -> Result<Json<ParticipantView>, ApiError> {
    let id = participant_id(&id)?;
    let snapshot = state.session.snapshot().await?;
    let view = snapshot
        .participants
        .into_iter()
        .find(|p| p.id == id)
        .ok_or_else(|| ApiError::BadRequest(format!("participant {id} missing from snapshot")))?;
    Ok(Json(view))
}

/// POST /api/participants/{id}/file
pub async fn select_file(
    State(state): State<SharedState>,
    Path(id): Path<String>,
    Json(artifact): Json<ModelArtifact>,
) -> Result<Json<ParticipantView>, ApiError> {
    let id = participant_id(&id)?;
    state.session.select_file(id, artifact).await?;
    api_participant(State(state), Path(id.to_string())).await
}

/// POST /api/participants/{id}/submit
pub async fn submit_upload(
    State(state): State<SharedState>,
    Path(id): Path<String>,
    Json(form): Json<SubmissionForm>,
) -> Result<Json<ParticipantView>, ApiError> {
    let id = participant_id(&id)?;
    state.session.submit_upload(id, form).await?;
    api_participant(State(state), Path(id.to_string())).await
}

/// POST /api/participants/{id}/cancel
pub async fn cancel_upload(
    State(state): State<SharedState>,
    Path(id): Path<String>,
) -> Result<Json<ParticipantView>, ApiError> {
    let id = participant_id(&id)?;
    state.session.cancel_upload(id).await?;
    api_participant(State(state), Path(id.to_string())).await
}

/// POST /api/participants/{id}/confirm
pub async fn confirm_upload(
    State(state): State<SharedState>,
    Path(id): Path<String>,
) -> Result<Json<ContributionAudit>, ApiError> {
    let id = participant_id(&id)?;
    let audit = state.session.confirm_upload(id).await?;
    Ok(Json(audit))
}

/// POST /api/participants/{id}/close
pub async fn close_upload(
    State(state): State<SharedState>,
    Path(id): Path<String>,
) -> Result<Json<ParticipantView>, ApiError> {
    let id = participant_id(&id)?;
    state.session.close_upload(id).await?;
    api_participant(State(state), Path(id.to_string())).await
}
