//! Process-local [`RoomStore`] used by the store host's default backend and by tests.

use std::{future::ready, sync::Arc};

use dashmap::DashMap;
use futures::{StreamExt, future::BoxFuture, stream::BoxStream};
use indexmap::IndexMap;
use tokio::sync::broadcast;
use tokio_stream::wrappers::BroadcastStream;
use tracing::debug;
use uuid::Uuid;

use crate::dao::{
    models::{PlayerEntity, RoomEntity},
    room_store::{ChangeKind, ChangeTable, RoomStore, StoreChange},
    storage::{StorageError, StorageResult},
};

const CHANGE_CAPACITY: usize = 256;

struct RoomRecord {
    room: RoomEntity,
    players: IndexMap<Uuid, PlayerEntity>,
}

struct Inner {
    rooms: DashMap<String, RoomRecord>,
    changes: broadcast::Sender<StoreChange>,
}

/// In-memory store; every room and its players live under one map entry so that each
/// write is atomic per room.
#[derive(Clone)]
pub struct MemoryRoomStore {
    inner: Arc<Inner>,
}

impl Default for MemoryRoomStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryRoomStore {
    /// Empty store.
    pub fn new() -> Self {
        let (changes, _receiver) = broadcast::channel(CHANGE_CAPACITY);
        Self {
            inner: Arc::new(Inner {
                rooms: DashMap::new(),
                changes,
            }),
        }
    }

    /// Number of rooms currently held.
    pub fn room_count(&self) -> usize {
        self.inner.rooms.len()
    }

    fn notify(&self, room_id: &str, table: ChangeTable, kind: ChangeKind) {
        let _ = self
            .inner
            .changes
            .send(StoreChange::new(room_id, table, kind));
    }

    fn create_room_now(&self, mut room: RoomEntity) -> StorageResult<RoomEntity> {
        use dashmap::mapref::entry::Entry;

        room.version = 0;
        match self.inner.rooms.entry(room.id.clone()) {
            Entry::Occupied(_) => {
                return Err(StorageError::conflict(format!(
                    "room `{}` already exists",
                    room.id
                )));
            }
            Entry::Vacant(slot) => {
                slot.insert(RoomRecord {
                    room: room.clone(),
                    players: IndexMap::new(),
                });
            }
        }
        self.notify(&room.id, ChangeTable::Rooms, ChangeKind::Insert);
        Ok(room)
    }

    fn update_room_now(
        &self,
        mut room: RoomEntity,
        expected_version: u64,
    ) -> StorageResult<RoomEntity> {
        {
            let mut record = self
                .inner
                .rooms
                .get_mut(&room.id)
                .ok_or_else(|| StorageError::not_found(format!("room `{}`", room.id)))?;
            if record.room.version != expected_version {
                return Err(StorageError::conflict(format!(
                    "room `{}` is at version {} (expected {expected_version})",
                    room.id, record.room.version
                )));
            }
            room.version = expected_version + 1;
            record.room = room.clone();
        }
        self.notify(&room.id, ChangeTable::Rooms, ChangeKind::Update);
        Ok(room)
    }

    fn delete_room_now(&self, id: &str) -> StorageResult<()> {
        if self.inner.rooms.remove(id).is_some() {
            debug!(room = id, "room removed from memory store");
            self.notify(id, ChangeTable::Rooms, ChangeKind::Delete);
        }
        Ok(())
    }

    fn insert_player_now(&self, player: PlayerEntity) -> StorageResult<()> {
        {
            let mut record = self
                .inner
                .rooms
                .get_mut(&player.room_id)
                .ok_or_else(|| StorageError::not_found(format!("room `{}`", player.room_id)))?;
            if record.players.contains_key(&player.id) {
                return Err(StorageError::conflict(format!(
                    "player `{}` already in room `{}`",
                    player.id, player.room_id
                )));
            }
            record.players.insert(player.id, player.clone());
        }
        self.notify(&player.room_id, ChangeTable::Players, ChangeKind::Insert);
        Ok(())
    }

    fn update_player_now(&self, player: PlayerEntity) -> StorageResult<()> {
        {
            let mut record = self
                .inner
                .rooms
                .get_mut(&player.room_id)
                .ok_or_else(|| StorageError::not_found(format!("room `{}`", player.room_id)))?;
            let slot = record
                .players
                .get_mut(&player.id)
                .ok_or_else(|| StorageError::not_found(format!("player `{}`", player.id)))?;
            *slot = player.clone();
        }
        self.notify(&player.room_id, ChangeTable::Players, ChangeKind::Update);
        Ok(())
    }

    fn delete_player_now(&self, room_id: &str, player_id: Uuid) -> bool {
        let removed = self
            .inner
            .rooms
            .get_mut(room_id)
            .and_then(|mut record| record.players.shift_remove(&player_id))
            .is_some();
        if removed {
            self.notify(room_id, ChangeTable::Players, ChangeKind::Delete);
        }
        removed
    }

    fn list_players_now(&self, room_id: &str) -> Vec<PlayerEntity> {
        let mut players: Vec<PlayerEntity> = self
            .inner
            .rooms
            .get(room_id)
            .map(|record| record.players.values().cloned().collect())
            .unwrap_or_default();
        players.sort_by_key(|player| player.player_order);
        players
    }
}

impl RoomStore for MemoryRoomStore {
    fn create_room(&self, room: RoomEntity) -> BoxFuture<'static, StorageResult<RoomEntity>> {
        Box::pin(ready(self.create_room_now(room)))
    }

    fn find_room(&self, id: String) -> BoxFuture<'static, StorageResult<Option<RoomEntity>>> {
        let room = self.inner.rooms.get(&id).map(|record| record.room.clone());
        Box::pin(ready(Ok(room)))
    }

    fn update_room(
        &self,
        room: RoomEntity,
        expected_version: u64,
    ) -> BoxFuture<'static, StorageResult<RoomEntity>> {
        Box::pin(ready(self.update_room_now(room, expected_version)))
    }

    fn delete_room(&self, id: String) -> BoxFuture<'static, StorageResult<()>> {
        Box::pin(ready(self.delete_room_now(&id)))
    }

    fn insert_player(&self, player: PlayerEntity) -> BoxFuture<'static, StorageResult<()>> {
        Box::pin(ready(self.insert_player_now(player)))
    }

    fn update_player(&self, player: PlayerEntity) -> BoxFuture<'static, StorageResult<()>> {
        Box::pin(ready(self.update_player_now(player)))
    }

    fn delete_player(
        &self,
        room_id: String,
        player_id: Uuid,
    ) -> BoxFuture<'static, StorageResult<bool>> {
        Box::pin(ready(Ok(self.delete_player_now(&room_id, player_id))))
    }

    fn list_players(
        &self,
        room_id: String,
    ) -> BoxFuture<'static, StorageResult<Vec<PlayerEntity>>> {
        Box::pin(ready(Ok(self.list_players_now(&room_id))))
    }

    fn subscribe(&self, room_id: String) -> BoxStream<'static, StoreChange> {
        BroadcastStream::new(self.inner.changes.subscribe())
            .filter_map(move |item| {
                let change = match item {
                    Ok(change) if change.room_id == room_id => Some(change),
                    Ok(_) => None,
                    // Missed notifications still mean "something changed".
                    Err(_) => Some(StoreChange::new(
                        room_id.clone(),
                        ChangeTable::Rooms,
                        ChangeKind::Update,
                    )),
                };
                ready(change)
            })
            .boxed()
    }

    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>> {
        Box::pin(ready(Ok(())))
    }

    fn try_reconnect(&self) -> BoxFuture<'static, StorageResult<()>> {
        Box::pin(ready(Ok(())))
    }
}

#[cfg(test)]
mod tests {
    use std::time::SystemTime;

    use super::*;
    use crate::state::state_machine::GamePhase;

    fn room(id: &str) -> RoomEntity {
        RoomEntity {
            id: id.into(),
            phase: GamePhase::Lobby,
            theme: String::new(),
            host_id: Uuid::new_v4(),
            current_player_index: 0,
            attack_count: 0,
            attacked_kanas: Vec::new(),
            winner_id: None,
            version: 0,
            created_at: SystemTime::now(),
        }
    }

    fn player(room_id: &str, order: u32) -> PlayerEntity {
        PlayerEntity {
            id: Uuid::new_v4(),
            room_id: room_id.into(),
            name: format!("P{order}"),
            player_order: order,
            display_word: Vec::new(),
            revealed_indices: Vec::new(),
            is_eliminated: false,
            is_winner: false,
        }
    }

    #[tokio::test]
    async fn duplicate_room_ids_conflict() {
        let store = MemoryRoomStore::new();
        store.create_room(room("123456")).await.unwrap();
        let err = store.create_room(room("123456")).await.unwrap_err();
        assert!(err.is_conflict());
    }

    #[tokio::test]
    async fn stale_room_writes_are_rejected() {
        let store = MemoryRoomStore::new();
        let created = store.create_room(room("123456")).await.unwrap();

        let mut first = created.clone();
        first.theme = "animals".into();
        let stored = store.update_room(first, created.version).await.unwrap();
        assert_eq!(stored.version, created.version + 1);

        let mut second = created.clone();
        second.theme = "food".into();
        let err = store.update_room(second, created.version).await.unwrap_err();
        assert!(err.is_conflict());

        let current = store.find_room("123456".into()).await.unwrap().unwrap();
        assert_eq!(current.theme, "animals");
    }

    #[tokio::test]
    async fn players_are_listed_in_join_order() {
        let store = MemoryRoomStore::new();
        store.create_room(room("000001")).await.unwrap();
        let late = player("000001", 2);
        let early = player("000001", 1);
        store.insert_player(late.clone()).await.unwrap();
        store.insert_player(early.clone()).await.unwrap();

        let listed = store.list_players("000001".into()).await.unwrap();
        assert_eq!(listed, vec![early.clone(), late]);

        assert!(store.delete_player("000001".into(), early.id).await.unwrap());
        assert!(!store.delete_player("000001".into(), early.id).await.unwrap());
    }

    #[tokio::test]
    async fn deleting_a_room_drops_its_players() {
        let store = MemoryRoomStore::new();
        store.create_room(room("000002")).await.unwrap();
        store.insert_player(player("000002", 1)).await.unwrap();
        store.delete_room("000002".into()).await.unwrap();

        assert!(store.find_room("000002".into()).await.unwrap().is_none());
        assert!(store.list_players("000002".into()).await.unwrap().is_empty());
        assert_eq!(store.room_count(), 0);
    }

    #[tokio::test]
    async fn subscribers_only_see_their_room() {
        let store = MemoryRoomStore::new();
        let mut changes = store.subscribe("000003".into());

        store.create_room(room("000004")).await.unwrap();
        store.create_room(room("000003")).await.unwrap();

        let change = changes.next().await.unwrap();
        assert_eq!(
            change,
            StoreChange::new("000003", ChangeTable::Rooms, ChangeKind::Insert)
        );
    }
}
