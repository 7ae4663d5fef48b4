//! Collaboration chat endpoints.

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use fedpharm_common::{ChatMessage, ChatRole};
use serde::{Deserialize, Serialize};

use super::training::Toggle;
use crate::error::ApiError;
use crate::state::SharedState;

#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    #[serde(default = "default_role")]
    pub role: ChatRole,
    pub message: String,
}

fn default_role() -> ChatRole { ChatRole::You }

#[derive(Debug, Serialize)]
pub struct SummaryAccepted {
    /// False when there was too little history; a notice was posted instead.
    pub started: bool,
}

/// GET /api/chat
pub async fn api_chat(State(state): State<SharedState>) -> Result<Json<Vec<ChatMessage>>, ApiError> {
    Ok(Json(state.session.snapshot().await?.chat))
}

/// POST /api/chat — blank messages are accepted and ignored (204).
pub async fn chat_submit(
    State(state): State<SharedState>,
    Json(payload): Json<ChatRequest>,
) -> Result<Response, ApiError> {
    if payload.role == ChatRole::System {
        return Err(ApiError::BadRequest("System messages cannot be posted".into()));
    }
    match state.session.send_chat(payload.role, payload.message).await? {
        Some(message) => Ok((StatusCode::CREATED, Json(message)).into_response()),
        None => Ok(StatusCode::NO_CONTENT.into_response()),
    }
}

/// POST /api/chat/summary
pub async fn request_summary(State(state): State<SharedState>) -> Result<Json<SummaryAccepted>, ApiError> {
    let started = state.session.request_summary().await?;
    Ok(Json(SummaryAccepted { started }))
}

/// PUT /api/chat/tts
pub async fn set_tts(
    State(state): State<SharedState>,
    Json(toggle): Json<Toggle>,
) -> Result<StatusCode, ApiError> {
    state.session.set_tts(toggle.enabled).await?;
    Ok(StatusCode::NO_CONTENT)
}
