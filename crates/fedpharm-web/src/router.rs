//! Axum router — maps all URL paths to handlers.

use std::sync::Arc;

use axum::{
    routing::{delete, get, post, put},
    Router,
};
use tower_http::{compression::CompressionLayer, cors::CorsLayer, trace::TraceLayer};

use crate::handlers::{
    chat::{api_chat, chat_submit, request_summary, set_tts},
    collaborators::{add_collaborator, api_collaborators, remove_collaborator},
    intelligence::api_intelligence,
    participants::{
        api_participant, api_participants, cancel_upload, close_upload, confirm_upload, select_file,
        submit_upload,
    },
    training::{api_readiness, api_session, cancel_training, reset_training, set_privacy, start_training},
};
use crate::sse::sse_handler;
use crate::state::{AppState, SharedState};

/// Build and return the full Axum router.
pub fn build_router(state: AppState) -> Router {
    let shared: SharedState = Arc::new(state);

    Router::new()
        // SSE streaming
        .route("/api/events", get(sse_handler))

        // Session
        .route("/api/session",   get(api_session))
        .route("/api/readiness", get(api_readiness))

        // Participants / upload wizard
        .route("/api/participants",              get(api_participants))
        .route("/api/participants/{id}",         get(api_participant))
        .route("/api/participants/{id}/file",    post(select_file))
        .route("/api/participants/{id}/submit",  post(submit_upload))
        .route("/api/participants/{id}/cancel",  post(cancel_upload))
        .route("/api/participants/{id}/confirm", post(confirm_upload))
        .route("/api/participants/{id}/close",   post(close_upload))

        // Training
        .route("/api/training/start",   post(start_training))
        .route("/api/training/cancel",  post(cancel_training))
        .route("/api/training/reset",   post(reset_training))
        .route("/api/training/privacy", put(set_privacy))

        // Chat
        .route("/api/chat",         get(api_chat).post(chat_submit))
        .route("/api/chat/summary", post(request_summary))
        .route("/api/chat/tts",     put(set_tts))

        // Collaborators
        .route("/api/collaborators",      get(api_collaborators).post(add_collaborator))
        .route("/api/collaborators/{id}", delete(remove_collaborator))

        // Intelligence
        .route("/api/intelligence", get(api_intelligence))

        // Middleware
        .layer(CorsLayer::permissive())
        .layer(CompressionLayer::new())
        .layer(TraceLayer::new_for_http())
        .with_state(shared)
}
