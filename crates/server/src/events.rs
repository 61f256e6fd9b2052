//! Server-sent change notifications

use std::convert::Infallible;

use api_types::event::{CHANGE, RESYNC};
use axum::{
    extract::State,
    response::sse::{Event, KeepAlive, Sse},
};
use futures::{Stream, stream};
use tokio::sync::broadcast::error::RecvError;

use crate::{convert, server::ServerState};

/// One SSE stream per connected client.
///
/// Each committed write arrives as a `change` event. A subscriber that fell
/// behind gets a single `resync` event and is expected to refetch everything.
pub async fn subscribe(
    State(state): State<ServerState>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let receiver = state.engine.broadcaster().subscribe();

    let stream = stream::unfold(receiver, |mut receiver| async move {
        let event = match receiver.recv().await {
            Ok(change) => match Event::default()
                .event(CHANGE)
                .json_data(convert::event(change))
            {
                Ok(event) => event,
                Err(err) => {
                    tracing::warn!("failed to encode change event: {err}");
                    Event::default().event(RESYNC).data("{}")
                }
            },
            Err(RecvError::Lagged(skipped)) => {
                tracing::warn!(skipped, "event subscriber lagged, asking it to resync");
                Event::default().event(RESYNC).data("{}")
            }
            Err(RecvError::Closed) => return None,
        };
        Some((Ok(event), receiver))
    });

    Sse::new(stream).keep_alive(KeepAlive::default())
}
