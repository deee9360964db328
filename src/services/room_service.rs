//! Relay between the REST routes and the room store. The host keeps no game logic: rows
//! arrive validated by the extractors, and only ids and room capacity are checked here.

use tracing::{debug, info};
use uuid::Uuid;

use crate::{
    dao::models::{PlayerEntity, RoomEntity},
    dto::room::UpdateRoomRequest,
    error::ServiceError,
    state::SharedState,
};

/// Insert a new room row. The stored version always starts at zero.
pub async fn create_room(
    state: &SharedState,
    room: RoomEntity,
) -> Result<RoomEntity, ServiceError> {
    let store = state.require_room_store().await?;
    let created = store.create_room(room).await?;
    info!(room_id = %created.id, "room created");
    Ok(created)
}

/// Fetch a room row.
pub async fn get_room(state: &SharedState, id: String) -> Result<RoomEntity, ServiceError> {
    let store = state.require_room_store().await?;
    store
        .find_room(id.clone())
        .await?
        .ok_or_else(|| ServiceError::NotFound(format!("room `{id}`")))
}

/// Replace a room row when the caller's `expected_version` still matches.
pub async fn update_room(
    state: &SharedState,
    id: String,
    request: UpdateRoomRequest,
) -> Result<RoomEntity, ServiceError> {
    if request.room.id != id {
        return Err(ServiceError::InvalidInput(format!(
            "body room id `{}` does not match path `{id}`",
            request.room.id
        )));
    }
    let store = state.require_room_store().await?;
    let stored = store
        .update_room(request.room, request.expected_version)
        .await?;
    debug!(room_id = %stored.id, version = stored.version, phase = ?stored.phase, "room updated");
    Ok(stored)
}

/// Remove a room and its players.
pub async fn delete_room(state: &SharedState, id: String) -> Result<(), ServiceError> {
    let store = state.require_room_store().await?;
    store.delete_room(id.clone()).await?;
    info!(room_id = %id, "room deleted");
    Ok(())
}

/// List the players of an existing room in join order.
pub async fn list_players(
    state: &SharedState,
    room_id: String,
) -> Result<Vec<PlayerEntity>, ServiceError> {
    let store = state.require_room_store().await?;
    if store.find_room(room_id.clone()).await?.is_none() {
        return Err(ServiceError::NotFound(format!("room `{room_id}`")));
    }
    Ok(store.list_players(room_id).await?)
}

/// Add a player row, refusing rooms that are already at capacity.
pub async fn add_player(
    state: &SharedState,
    room_id: String,
    player: PlayerEntity,
) -> Result<PlayerEntity, ServiceError> {
    ensure_same_room(&room_id, &player)?;
    let store = state.require_room_store().await?;
    if store.find_room(room_id.clone()).await?.is_none() {
        return Err(ServiceError::NotFound(format!("room `{room_id}`")));
    }

    let players = store.list_players(room_id.clone()).await?;
    let max_players = state.config().max_players();
    if players.len() >= max_players && !players.iter().any(|p| p.id == player.id) {
        return Err(ServiceError::Conflict(format!(
            "room `{room_id}` already holds {max_players} players"
        )));
    }

    store.insert_player(player.clone()).await?;
    info!(room_id = %room_id, player_id = %player.id, name = %player.name, "player joined");
    Ok(player)
}

/// Replace an existing player row.
pub async fn update_player(
    state: &SharedState,
    room_id: String,
    player_id: Uuid,
    player: PlayerEntity,
) -> Result<PlayerEntity, ServiceError> {
    ensure_same_room(&room_id, &player)?;
    if player.id != player_id {
        return Err(ServiceError::InvalidInput(format!(
            "body player id `{}` does not match path `{player_id}`",
            player.id
        )));
    }
    let store = state.require_room_store().await?;
    store.update_player(player.clone()).await?;
    Ok(player)
}

/// Remove a player row, reporting whether it existed.
pub async fn delete_player(
    state: &SharedState,
    room_id: String,
    player_id: Uuid,
) -> Result<bool, ServiceError> {
    let store = state.require_room_store().await?;
    let deleted = store.delete_player(room_id.clone(), player_id).await?;
    if deleted {
        info!(room_id = %room_id, player_id = %player_id, "player left");
    }
    Ok(deleted)
}

fn ensure_same_room(room_id: &str, player: &PlayerEntity) -> Result<(), ServiceError> {
    if player.room_id != room_id {
        return Err(ServiceError::InvalidInput(format!(
            "body room id `{}` does not match path `{room_id}`",
            player.room_id
        )));
    }
    Ok(())
}
