use std::{convert::Infallible, time::Duration};

use async_stream::stream;
use axum::response::sse::{Event, KeepAlive, Sse};
use futures::{Stream, StreamExt};
use tokio::sync::broadcast::{self, error::RecvError};
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tracing::info;

use crate::{
    dto::{room::RoomStatusResponse, sse::ServerEvent},
    error::ServiceError,
    services::room_service,
    state::SharedState,
};

/// Subscribe to the change feed of room `key`, returning the current snapshot as well.
///
/// Subscribing before reading guarantees no committed change falls between the two.
pub async fn subscribe_room(
    state: &SharedState,
    key: &str,
) -> Result<(RoomStatusResponse, broadcast::Receiver<ServerEvent>), ServiceError> {
    let receiver = state.subscribe_room(key);
    match room_service::room_status(state, key).await {
        Ok(status) => Ok((status, receiver)),
        Err(err) => {
            drop(receiver);
            state.release_room_feed(key);
            Err(err)
        }
    }
}

/// Convert a room feed into an SSE response: the initial snapshot first, then
/// every committed change, releasing the feed once the client disconnects.
pub fn to_sse_stream(
    state: SharedState,
    room_key: String,
    initial: ServerEvent,
    mut receiver: broadcast::Receiver<ServerEvent>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    // small bounded channel between forwarder and response
    let (tx, rx) = mpsc::channel::<Result<Event, Infallible>>(8);

    tokio::spawn(async move {
        let mut events = Box::pin(stream! {
            yield initial;
            loop {
                match receiver.recv().await {
                    Ok(payload) => yield payload,
                    Err(RecvError::Closed) => break,
                    // Skip lagged messages but keep the stream alive.
                    Err(RecvError::Lagged(_)) => continue,
                }
            }
        });

        loop {
            tokio::select! {
                _ = tx.closed() => break,
                next = events.next() => {
                    let Some(payload) = next else { break };
                    if tx.send(Ok(to_event(payload))).await.is_err() {
                        break;
                    }
                }
            }
        }

        drop(events);
        state.release_room_feed(&room_key);
        info!(room_key = %room_key, "room SSE stream disconnected");
    });

    // response stream reads from mpsc; when client disconnects axum drops this stream
    let stream = ReceiverStream::new(rx);
    Sse::new(stream).keep_alive(
        KeepAlive::new()
            .interval(Duration::from_secs(15))
            .text("keep-alive"),
    )
}

fn to_event(payload: ServerEvent) -> Event {
    let mut event = Event::default().data(payload.data);
    if let Some(name) = payload.event {
        event = event.event(name);
    }
    event
}
