use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post, put},
};
use axum_valid::Valid;
use uuid::Uuid;

use crate::{
    dao::models::{PlayerEntity, RoomEntity},
    dto::room::{DeletedResponse, ErrorBody, UpdateRoomRequest},
    error::AppError,
    services::room_service,
    state::SharedState,
};

/// Row-level endpoints consumed by the HTTP room store of remote clients.
pub fn router() -> Router<SharedState> {
    Router::new()
        .route("/rooms", post(create_room))
        .route(
            "/rooms/{id}",
            get(get_room).put(update_room).delete(delete_room),
        )
        .route("/rooms/{id}/players", get(list_players).post(add_player))
        .route(
            "/rooms/{id}/players/{player_id}",
            put(update_player).delete(delete_player),
        )
}

/// Create a room row; the code must not be taken yet.
#[utoipa::path(
    post,
    path = "/rooms",
    tag = "rooms",
    request_body = RoomEntity,
    responses(
        (status = 201, description = "Room created", body = RoomEntity),
        (status = 400, description = "Invalid room row", body = ErrorBody),
        (status = 409, description = "Room code already taken", body = ErrorBody)
    )
)]
pub async fn create_room(
    State(state): State<SharedState>,
    Valid(Json(room)): Valid<Json<RoomEntity>>,
) -> Result<(StatusCode, Json<RoomEntity>), AppError> {
    let created = room_service::create_room(&state, room).await?;
    Ok((StatusCode::CREATED, Json(created)))
}

/// Read a room row.
#[utoipa::path(
    get,
    path = "/rooms/{id}",
    tag = "rooms",
    params(("id" = String, Path, description = "Six-digit room code")),
    responses(
        (status = 200, description = "Room", body = RoomEntity),
        (status = 404, description = "Unknown room", body = ErrorBody)
    )
)]
pub async fn get_room(
    State(state): State<SharedState>,
    Path(id): Path<String>,
) -> Result<Json<RoomEntity>, AppError> {
    Ok(Json(room_service::get_room(&state, id).await?))
}

/// Replace a room row guarded by the version the writer read.
#[utoipa::path(
    put,
    path = "/rooms/{id}",
    tag = "rooms",
    params(("id" = String, Path, description = "Six-digit room code")),
    request_body = UpdateRoomRequest,
    responses(
        (status = 200, description = "Stored room with its new version", body = RoomEntity),
        (status = 404, description = "Unknown room", body = ErrorBody),
        (status = 409, description = "Version mismatch", body = ErrorBody)
    )
)]
pub async fn update_room(
    State(state): State<SharedState>,
    Path(id): Path<String>,
    Valid(Json(request)): Valid<Json<UpdateRoomRequest>>,
) -> Result<Json<RoomEntity>, AppError> {
    Ok(Json(room_service::update_room(&state, id, request).await?))
}

/// Delete a room and every player row in it.
#[utoipa::path(
    delete,
    path = "/rooms/{id}",
    tag = "rooms",
    params(("id" = String, Path, description = "Six-digit room code")),
    responses((status = 204, description = "Room deleted"))
)]
pub async fn delete_room(
    State(state): State<SharedState>,
    Path(id): Path<String>,
) -> Result<StatusCode, AppError> {
    room_service::delete_room(&state, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// List a room's players in join order.
#[utoipa::path(
    get,
    path = "/rooms/{id}/players",
    tag = "rooms",
    params(("id" = String, Path, description = "Six-digit room code")),
    responses(
        (status = 200, description = "Players", body = [PlayerEntity]),
        (status = 404, description = "Unknown room", body = ErrorBody)
    )
)]
pub async fn list_players(
    State(state): State<SharedState>,
    Path(id): Path<String>,
) -> Result<Json<Vec<PlayerEntity>>, AppError> {
    Ok(Json(room_service::list_players(&state, id).await?))
}

/// Insert a player row.
#[utoipa::path(
    post,
    path = "/rooms/{id}/players",
    tag = "rooms",
    params(("id" = String, Path, description = "Six-digit room code")),
    request_body = PlayerEntity,
    responses(
        (status = 201, description = "Player added", body = PlayerEntity),
        (status = 404, description = "Unknown room", body = ErrorBody),
        (status = 409, description = "Room full or player already present", body = ErrorBody)
    )
)]
pub async fn add_player(
    State(state): State<SharedState>,
    Path(id): Path<String>,
    Valid(Json(player)): Valid<Json<PlayerEntity>>,
) -> Result<(StatusCode, Json<PlayerEntity>), AppError> {
    let player = room_service::add_player(&state, id, player).await?;
    Ok((StatusCode::CREATED, Json(player)))
}

/// Replace a player row.
#[utoipa::path(
    put,
    path = "/rooms/{id}/players/{player_id}",
    tag = "rooms",
    params(
        ("id" = String, Path, description = "Six-digit room code"),
        ("player_id" = Uuid, Path, description = "Player identifier")
    ),
    request_body = PlayerEntity,
    responses(
        (status = 200, description = "Player updated", body = PlayerEntity),
        (status = 404, description = "Unknown player", body = ErrorBody)
    )
)]
pub async fn update_player(
    State(state): State<SharedState>,
    Path((id, player_id)): Path<(String, Uuid)>,
    Valid(Json(player)): Valid<Json<PlayerEntity>>,
) -> Result<Json<PlayerEntity>, AppError> {
    Ok(Json(
        room_service::update_player(&state, id, player_id, player).await?,
    ))
}

/// Remove a player row.
#[utoipa::path(
    delete,
    path = "/rooms/{id}/players/{player_id}",
    tag = "rooms",
    params(
        ("id" = String, Path, description = "Six-digit room code"),
        ("player_id" = Uuid, Path, description = "Player identifier")
    ),
    responses((status = 200, description = "Whether a row was removed", body = DeletedResponse))
)]
pub async fn delete_player(
    State(state): State<SharedState>,
    Path((id, player_id)): Path<(String, Uuid)>,
) -> Result<Json<DeletedResponse>, AppError> {
    let deleted = room_service::delete_player(&state, id, player_id).await?;
    Ok(Json(DeletedResponse { deleted }))
}
