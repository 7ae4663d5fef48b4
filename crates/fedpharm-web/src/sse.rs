//! Server-Sent Events (SSE) streaming for live session updates.
//!
//! Each frame is named after the event's `type` tag, so browsers can
//! `addEventListener("chart", ...)` per kind. A client that falls behind the
//! broadcast buffer gets a `lagged` frame carrying the number of skipped
//! events and should refetch `/api/session`.

use std::convert::Infallible;
use std::time::Duration;

use axum::extract::State;
use axum::response::sse::{Event, KeepAlive, Sse};
use fedpharm_sim::SessionEvent;
use futures_util::Stream;
use tokio_stream::wrappers::errors::BroadcastStreamRecvError;
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::StreamExt;
use tracing::warn;

use crate::state::SharedState;

pub async fn sse_handler(
    State(state): State<SharedState>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let rx = state.subscribe();
    let stream = BroadcastStream::new(rx).filter_map(|result| match result {
        Ok(event) => session_frame(&event).map(Ok),
        Err(BroadcastStreamRecvError::Lagged(skipped)) => {
            warn!(skipped, "SSE client lagged behind the session");
            Some(Ok(Event::default().event("lagged").data(skipped.to_string())))
        }
    });

    Sse::new(stream).keep_alive(
        KeepAlive::new()
            .interval(Duration::from_secs(15))
            .text("ping"),
    )
}

fn session_frame(event: &SessionEvent) -> Option<Event> {
    match serde_json::to_string(event) {
        Ok(data) => Some(Event::default().event(event.kind()).data(data)),
        Err(e) => {
            warn!(kind = event.kind(), error = %e, "Dropping unserialisable session event");
            None
        }
    }
}
