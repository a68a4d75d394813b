use std::convert::Infallible;
use std::time::Duration;

use axum::extract::State;
use axum::response::sse::{Event, KeepAlive, Sse};
use futures_util::Stream;
use tracing::warn;

use crate::AppState;

/// GET /api/pins/stream — long-lived SSE connection carrying one
/// `event: pins` frame per newly created pin.
///
/// Per connection: register with the hub, send a comment preamble so
/// EventSource opens cleanly, then forward hub messages until the client
/// disconnects. Dropping the stream drops the subscription, which
/// unregisters the channel — no stale subscribers survive a disconnect.
/// There is no catch-up: a reconnecting client sees only pins created
/// after it resubscribed.
pub async fn pins_stream(
    State(state): State<AppState>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let mut sub = state.hub.subscribe();

    let stream = async_stream::stream! {
        yield Ok(Event::default().comment("ok"));

        while let Some(pin) = sub.recv().await {
            match Event::default().event("pins").json_data(&pin) {
                Ok(event) => yield Ok(event),
                Err(e) => warn!("Dropping unserializable pin event: {}", e),
            }
        }
    };

    Sse::new(stream).keep_alive(
        KeepAlive::new()
            .interval(Duration::from_secs(15))
            .text("ping"),
    )
}
