#[cfg(feature = "couch-store")]
pub mod couchdb;
#[cfg(feature = "http-store")]
pub mod http;
pub mod memory;

use futures::{future::BoxFuture, stream::BoxStream};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::dao::models::{PlayerEntity, RoomEntity};
use crate::dao::storage::StorageResult;

/// SSE event name the store host uses for [`StoreChange`] payloads.
pub const CHANGE_EVENT: &str = "store.change";

/// Collection touched by a change notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum ChangeTable {
    /// The room row itself.
    Rooms,
    /// One of the room's player rows.
    Players,
}

/// Kind of row-level change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum ChangeKind {
    /// Row created.
    Insert,
    /// Row modified.
    Update,
    /// Row removed.
    Delete,
}

/// Row-level change notification, scoped to one room.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct StoreChange {
    /// Room the changed row belongs to.
    pub room_id: String,
    /// Changed collection.
    pub table: ChangeTable,
    /// Change kind.
    pub kind: ChangeKind,
}

impl StoreChange {
    /// Build a change notification.
    pub fn new(room_id: impl Into<String>, table: ChangeTable, kind: ChangeKind) -> Self {
        Self {
            room_id: room_id.into(),
            table,
            kind,
        }
    }
}

/// Abstraction over the shared room/player store.
///
/// Stores offer no transactions. The only guarantees are a unique room id on creation and
/// a version check on room updates, which lets a client detect that it lost a race.
pub trait RoomStore: Send + Sync {
    /// Insert a new room; fails with a conflict when the id is already taken.
    fn create_room(&self, room: RoomEntity) -> BoxFuture<'static, StorageResult<RoomEntity>>;
    /// Read a room by id.
    fn find_room(&self, id: String) -> BoxFuture<'static, StorageResult<Option<RoomEntity>>>;
    /// Replace a room if its stored version still equals `expected_version`; the stored
    /// copy (with its bumped version) is returned.
    fn update_room(
        &self,
        room: RoomEntity,
        expected_version: u64,
    ) -> BoxFuture<'static, StorageResult<RoomEntity>>;
    /// Remove a room and all of its players.
    fn delete_room(&self, id: String) -> BoxFuture<'static, StorageResult<()>>;
    /// Insert a player row; fails with a conflict when the player already exists.
    fn insert_player(&self, player: PlayerEntity) -> BoxFuture<'static, StorageResult<()>>;
    /// Replace an existing player row.
    fn update_player(&self, player: PlayerEntity) -> BoxFuture<'static, StorageResult<()>>;
    /// Remove a player row, returning whether it existed.
    fn delete_player(
        &self,
        room_id: String,
        player_id: Uuid,
    ) -> BoxFuture<'static, StorageResult<bool>>;
    /// List a room's players ordered by join order.
    fn list_players(&self, room_id: String)
    -> BoxFuture<'static, StorageResult<Vec<PlayerEntity>>>;
    /// Stream of row-level changes for one room. The stream ends when the backend drops it.
    fn subscribe(&self, room_id: String) -> BoxStream<'static, StoreChange>;
    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>>;
    fn try_reconnect(&self) -> BoxFuture<'static, StorageResult<()>>;
}
