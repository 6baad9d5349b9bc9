//! Server-sent events feed of job lifecycle events.
//!
//! # Design
//! - A client resuming with `Last-Event-ID` first receives the buffered events
//!   newer than that id, then the live feed.
//! - Lagged subscribers skip the dropped events and keep streaming.

use std::convert::Infallible;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::State,
    http::HeaderMap,
    response::sse::{self, KeepAlive, Sse},
};
use structura_events::{EventBus, EventEnvelope, EventId};
use tokio_stream::{Stream, StreamExt};
use tracing::{debug, error, warn};

use crate::http::constants::{HEADER_LAST_EVENT_ID, SSE_KEEP_ALIVE_SECS};
use crate::state::ApiState;

pub(crate) async fn stream_events(
    State(state): State<Arc<ApiState>>,
    headers: HeaderMap,
) -> Sse<impl Stream<Item = Result<sse::Event, Infallible>> + Send> {
    let last_id = last_event_id(&headers);
    debug!(last_event_id = ?last_id, "event stream opened");
    Sse::new(event_sse_stream(state.events.clone(), last_id)).keep_alive(
        KeepAlive::new()
            .interval(Duration::from_secs(SSE_KEEP_ALIVE_SECS))
            .text("keep-alive"),
    )
}

fn last_event_id(headers: &HeaderMap) -> Option<EventId> {
    headers
        .get(HEADER_LAST_EVENT_ID)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.trim().parse::<EventId>().ok())
}

pub(crate) fn event_sse_stream(
    bus: EventBus,
    since: Option<EventId>,
) -> impl Stream<Item = Result<sse::Event, Infallible>> + Send {
    bus.subscribe(since).filter_map(|item| match item {
        Ok(envelope) => to_sse_event(&envelope).map(Ok),
        Err(err) => {
            warn!(error = %err, "event subscriber lagged; events skipped");
            None
        }
    })
}

fn to_sse_event(envelope: &EventEnvelope) -> Option<sse::Event> {
    match sse::Event::default()
        .id(envelope.id.to_string())
        .event(envelope.event.kind())
        .json_data(envelope)
    {
        Ok(event) => Some(event),
        Err(err) => {
            error!(error = %err, "failed to serialise SSE event payload");
            None
        }
    }
}
