use std::{convert::Infallible, time::Duration};

use axum::response::sse::{Event, KeepAlive, Sse};
use futures::{Stream, StreamExt, stream::BoxStream};
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tracing::{info, warn};

use crate::{
    dao::room_store::{CHANGE_EVENT, StoreChange},
    dto::sse::{Handshake, ServerEvent},
    error::ServiceError,
    state::SharedState,
};

/// SSE event name of the first message on every stream.
pub const HANDSHAKE_EVENT: &str = "handshake";

/// Open the store change feed of one room along with its handshake payload.
pub async fn subscribe_room(
    state: &SharedState,
    room_id: String,
) -> Result<(BoxStream<'static, StoreChange>, ServerEvent), ServiceError> {
    let store = state.require_room_store().await?;
    if store.find_room(room_id.clone()).await?.is_none() {
        return Err(ServiceError::NotFound(format!("room `{room_id}`")));
    }

    let handshake = ServerEvent::json(
        Some(HANDSHAKE_EVENT.to_string()),
        &Handshake {
            room_id: room_id.clone(),
            message: "room stream connected".into(),
            degraded: state.is_degraded().await,
        },
    )
    .map_err(|err| ServiceError::InvalidInput(err.to_string()))?;

    Ok((store.subscribe(room_id), handshake))
}

/// Convert a store change feed into an SSE response, sending the handshake first and
/// stopping the forwarder once the client disconnects.
pub fn to_sse_stream(
    room_id: String,
    handshake: ServerEvent,
    mut changes: BoxStream<'static, StoreChange>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let (tx, rx) = mpsc::channel::<Result<Event, Infallible>>(8);

    tokio::spawn(async move {
        if tx.send(Ok(to_event(handshake))).await.is_err() {
            return;
        }

        loop {
            tokio::select! {
                _ = tx.closed() => break,
                next = changes.next() => {
                    let Some(change) = next else {
                        warn!(room_id = %room_id, "store change feed ended");
                        break;
                    };
                    let payload = match ServerEvent::json(Some(CHANGE_EVENT.to_string()), &change) {
                        Ok(payload) => payload,
                        Err(err) => {
                            warn!(
                                room_id = %room_id,
                                error = %err,
                                "failed to encode store change"
                            );
                            continue;
                        }
                    };
                    if tx.send(Ok(to_event(payload))).await.is_err() {
                        break;
                    }
                }
            }
        }

        info!(room_id = %room_id, "room SSE stream disconnected");
    });

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
