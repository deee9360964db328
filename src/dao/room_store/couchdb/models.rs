use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::dao::models::{PlayerEntity, RoomEntity};

pub const ROOM_PREFIX: &str = "room::";
pub const PLAYER_PREFIX: &str = "player::";
pub const END_SUFFIX: &str = "\u{ffff}";

#[derive(Debug, Deserialize)]
pub struct AllDocsResponse {
    pub rows: Vec<AllDocsRow>,
}

#[derive(Debug, Deserialize)]
pub struct AllDocsRow {
    pub id: String,
    #[serde(default)]
    pub doc: Option<Value>,
}

/// Response of a successful document write.
#[derive(Debug, Deserialize)]
pub struct WriteResponse {
    pub rev: String,
}

#[derive(Debug, Deserialize)]
pub struct ChangesResponse {
    pub results: Vec<ChangeRow>,
    pub last_seq: Value,
}

#[derive(Debug, Deserialize)]
pub struct ChangeRow {
    pub id: String,
    #[serde(default)]
    pub deleted: bool,
    #[serde(default)]
    pub changes: Vec<ChangeRev>,
}

#[derive(Debug, Deserialize)]
pub struct ChangeRev {
    pub rev: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CouchRoomDocument {
    #[serde(rename = "_id")]
    pub id: String,
    #[serde(rename = "_rev", skip_serializing_if = "Option::is_none")]
    pub rev: Option<String>,
    #[serde(flatten)]
    pub room: RoomEntity,
}

impl CouchRoomDocument {
    pub fn from_entity(room: RoomEntity, rev: Option<String>) -> Self {
        Self {
            id: room_doc_id(&room.id),
            rev,
            room,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CouchPlayerDocument {
    #[serde(rename = "_id")]
    pub id: String,
    #[serde(rename = "_rev", skip_serializing_if = "Option::is_none")]
    pub rev: Option<String>,
    #[serde(flatten)]
    pub player: PlayerEntity,
}

impl CouchPlayerDocument {
    pub fn from_entity(player: PlayerEntity, rev: Option<String>) -> Self {
        Self {
            id: player_doc_id(&player.room_id, player.id),
            rev,
            player,
        }
    }
}

pub fn room_doc_id(room_id: &str) -> String {
    format!("{ROOM_PREFIX}{room_id}")
}

pub fn player_doc_id(room_id: &str, player_id: Uuid) -> String {
    format!("{}{}", player_prefix(room_id), player_id)
}

pub fn player_prefix(room_id: &str) -> String {
    format!("{PLAYER_PREFIX}{room_id}::")
}

/// Room a document id belongs to, for either document kind.
pub fn room_of_doc_id(doc_id: &str) -> Option<&str> {
    if let Some(room) = doc_id.strip_prefix(ROOM_PREFIX) {
        return Some(room);
    }
    doc_id
        .strip_prefix(PLAYER_PREFIX)
        .and_then(|rest| rest.split_once("::"))
        .map(|(room, _)| room)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn document_ids_map_back_to_their_room() {
        let player = Uuid::new_v4();
        assert_eq!(room_of_doc_id(&room_doc_id("123456")), Some("123456"));
        assert_eq!(
            room_of_doc_id(&player_doc_id("123456", player)),
            Some("123456")
        );
        assert_eq!(room_of_doc_id("_design/x"), None);
        assert!(player_doc_id("123456", player).starts_with(&player_prefix("123456")));
    }
}
