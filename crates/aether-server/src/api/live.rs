//! GET /api/agents/live — Server-Sent Events feed of agent snapshots.
//!
//! Each connection gets a `snapshot` event with the full agent list right
//! away, then another after every registry change. Closing the connection
//! drops the feed and unsubscribes it.

use std::convert::Infallible;

use axum::{
    extract::State,
    response::sse::{Event, KeepAlive, Sse},
    routing::get,
    Router,
};
use tokio_stream::StreamExt;

use aether_core::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new().route("/live", get(live_agents))
}

async fn live_agents(
    State(state): State<AppState>,
) -> Sse<impl tokio_stream::Stream<Item = Result<Event, Infallible>>> {
    let feed = state.broadcaster.subscribe();
    tracing::debug!(
        "[Live] Subscriber connected ({} active)",
        state.broadcaster.subscriber_count()
    );

    let stream = feed.into_stream().map(|snapshot| {
        let data = serde_json::to_string(&snapshot).unwrap_or_else(|_| "{}".to_string());
        Ok(Event::default().event("snapshot").data(data))
    });

    Sse::new(stream).keep_alive(KeepAlive::default())
}
