//! Training control, readiness and the full session snapshot.

use axum::{extract::State, Json};
use fedpharm_sim::SessionSnapshot;
use serde::{Deserialize, Serialize};

use crate::error::ApiError;
use crate::state::SharedState;

#[derive(Debug, Serialize)]
pub struct Readiness {
    pub ready: bool,
}

#[derive(Debug, Deserialize)]
pub struct Toggle {
    pub enabled: bool,
}

/// GET /api/session
pub async fn api_session(State(state): State<SharedState>) -> Result<Json<SessionSnapshot>, ApiError> {
    Ok(Json(state.session.snapshot().await?))
}

/// GET /api/readiness
pub async fn api_readiness(State(state): State<SharedState>) -> Result<Json<Readiness>, ApiError> {
    let ready = state.session.is_ready().await?;
    Ok(Json(Readiness { ready }))
}

/// PUT /api/training/privacy
pub async fn set_privacy(
    State(state): State<SharedState>,
    Json(toggle): Json<Toggle>,
) -> Result<Json<SessionSnapshot>, ApiError> {
    state.session.set_privacy_noise(toggle.enabled).await?;
    api_session(State(state)).await
}

/// POST /api/training/start
pub async fn start_training(State(state): State<SharedState>) -> Result<Json<SessionSnapshot>, ApiError> {
    state.session.start_training().await?;
    api_session(State(state)).await
}

/// POST /api/training/cancel
pub async fn cancel_training(State(state): State<SharedState>) -> Result<Json<SessionSnapshot>, ApiError> {
    state.session.cancel_training().await?;
    api_session(State(state)).await
}

/// POST /api/training/reset
pub async fn reset_training(State(state): State<SharedState>) -> Result<Json<SessionSnapshot>, ApiError> {
    state.session.reset_training().await?;
    api_session(State(state)).await
}
