//! Biomedical intelligence results.

use axum::{extract::State, Json};
use fedpharm_sim::IntelligenceState;

use crate::error::ApiError;
use crate::state::SharedState;

/// GET /api/intelligence
pub async fn api_intelligence(State(state): State<SharedState>) -> Result<Json<IntelligenceState>, ApiError> {
    Ok(Json(state.session.snapshot().await?.intelligence))
}
