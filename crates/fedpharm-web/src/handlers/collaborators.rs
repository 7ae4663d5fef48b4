//! Collaborator roster endpoints.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use fedpharm_common::Collaborator;
use fedpharm_sim::activity::CollaboratorDraft;

use crate::error::ApiError;
use crate::state::SharedState;

/// GET /api/collaborators
pub async fn api_collaborators(State(state): State<SharedState>) -> Result<Json<Vec<Collaborator>>, ApiError> {
    Ok(Json(state.session.snapshot().await?.collaborators))
}

/// POST /api/collaborators
pub async fn add_collaborator(
    State(state): State<SharedState>,
    Json(draft): Json<CollaboratorDraft>,
) -> Result<(StatusCode, Json<Collaborator>), ApiError> {
    if draft.name.trim().is_empty() {
        return Err(ApiError::BadRequest("Collaborator name must not be empty".into()));
    }
    let member = state.session.add_collaborator(draft).await?;
    Ok((StatusCode::CREATED, Json(member)))
}

/// DELETE /api/collaborators/{id}
pub async fn remove_collaborator(
    State(state): State<SharedState>,
    Path(id): Path<String>,
) -> Result<Json<Collaborator>, ApiError> {
    Ok(Json(state.session.remove_collaborator(id).await?))
}
