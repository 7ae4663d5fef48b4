//! Shared application state for the web server.

use std::sync::Arc;

use fedpharm_sim::{SessionEvent, SessionHandle};
use tokio::sync::broadcast;

/// Shared state injected into every Axum handler.
#[derive(Clone)]
pub struct AppState {
    pub session: SessionHandle,
}

impl AppState {
    pub fn new(session: SessionHandle) -> Self {
        Self { session }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.session.subscribe()
    }
}

pub type SharedState = Arc<AppState>;
