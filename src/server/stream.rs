//! Server-Sent Events feed of discovery events.
//!
//! Each connection is one publisher subscription. Events are named after
//! their kind and carry the JSON record. Dropping the connection closes
//! the subscription; the publisher notices on its next send.

use std::convert::Infallible;
use std::time::Duration;

use axum::{
    extract::{Query, State},
    response::sse::{Event, KeepAlive, Sse},
    routing::get,
    Router,
};
use futures::stream::{Stream, StreamExt};
use serde::Deserialize;

use super::state::AppState;
use crate::crawler::DiscoveryEvent;

/// Query params for the stream endpoint.
#[derive(Debug, Default, Deserialize)]
pub struct StreamQuery {
    /// Informational scope label; does not filter events.
    #[serde(default)]
    pub scope: String,
}

/// Create the discovery stream router.
pub fn create_stream_router(state: AppState) -> Router {
    Router::new()
        .route("/api/v1/files/stream", get(stream_handler))
        .with_state(state)
}

async fn stream_handler(
    State(state): State<AppState>,
    Query(query): Query<StreamQuery>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let subscription = state.publisher.subscribe(query.scope);
    tracing::info!(subscriber = %subscription.id(), "New discovery stream connection");

    let events = subscription
        .into_stream()
        .map(|event| Ok(to_sse_event(&event)))
        .take_until(state.shutdown.clone().cancelled_owned());

    Sse::new(events).keep_alive(
        KeepAlive::new()
            .interval(Duration::from_secs(15))
            .text("keep-alive"),
    )
}

/// Render one discovery event as an SSE frame.
fn to_sse_event(event: &DiscoveryEvent) -> Event {
    match serde_json::to_string(event) {
        Ok(data) => Event::default().event(event.kind()).data(data),
        Err(e) => {
            tracing::error!(path = event.path(), error = %e, "Failed to encode event");
            Event::default().comment("encoding error")
        }
    }
}
