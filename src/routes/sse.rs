use std::convert::Infallible;

use axum::{
    Router,
    extract::{Path, State},
    response::sse::{Event, Sse},
    routing::get,
};
use futures::Stream;
use tracing::info;

use crate::{error::AppError, services::sse_service, state::SharedState};

#[utoipa::path(
    get,
    path = "/rooms/{id}/events",
    tag = "sse",
    params(("id" = String, Path, description = "Six-digit room code")),
    responses(
        (
            status = 200,
            description = "Room change stream",
            content_type = "text/event-stream",
            body = String
        ),
        (status = 404, description = "Unknown room", body = crate::dto::room::ErrorBody)
    )
)]
/// Stream row-level changes of one room: a `handshake` event, then `store.change` events.
pub async fn room_stream(
    State(state): State<SharedState>,
    Path(id): Path<String>,
) -> Result<Sse<impl Stream<Item = Result<Event, Infallible>>>, AppError> {
    let (changes, handshake) = sse_service::subscribe_room(&state, id.clone()).await?;
    info!(room_id = %id, "New room SSE connection");
    Ok(sse_service::to_sse_stream(id, handshake, changes))
}

/// Configure the SSE endpoints.
pub fn router() -> Router<SharedState> {
    Router::<SharedState>::new().route("/rooms/{id}/events", get(room_stream))
}
