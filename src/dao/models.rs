use serde::{Deserialize, Serialize};
use std::time::SystemTime;
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use crate::{
    dto::validation::{validate_reveal_column, validate_room_code, validate_word_column},
    state::state_machine::GamePhase,
};

/// Room row shared by every client of a game.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, ToSchema, Validate)]
pub struct RoomEntity {
    /// Six-digit room code, unique across the store.
    #[validate(custom(function = "validate_room_code"))]
    pub id: String,
    /// Current phase.
    pub phase: GamePhase,
    /// Theme chosen by the host.
    #[validate(length(max = 64))]
    pub theme: String,
    /// Player allowed to start and restart.
    pub host_id: Uuid,
    /// Index of the player whose action it is.
    #[validate(range(max = 3))]
    pub current_player_index: u32,
    /// Actions already taken in the current turn.
    #[validate(range(max = 1))]
    pub attack_count: u8,
    /// Every kana attacked so far, in attack order.
    #[schema(value_type = Vec<String>)]
    pub attacked_kanas: Vec<char>,
    /// Winner of the last battle.
    #[serde(default)]
    pub winner_id: Option<Uuid>,
    /// Store-managed revision; incremented on every accepted room write.
    #[serde(default)]
    pub version: u64,
    /// Creation timestamp.
    #[schema(value_type = Object)]
    pub created_at: SystemTime,
}

/// Player row; words and reveal bitmaps are stored as fixed seven-slot columns (or empty
/// before the word is submitted).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, ToSchema, Validate)]
pub struct PlayerEntity {
    /// Stable player identifier.
    pub id: Uuid,
    /// Room the player belongs to.
    #[validate(custom(function = "validate_room_code"))]
    pub room_id: String,
    /// Display name.
    #[validate(length(min = 1, max = 32))]
    pub name: String,
    /// Join sequence.
    pub player_order: u32,
    /// Canonical word padded with `×`.
    #[schema(value_type = Vec<String>)]
    #[validate(custom(function = "validate_word_column"))]
    pub display_word: Vec<char>,
    /// Reveal bitmap parallel to `display_word`.
    #[validate(custom(function = "validate_reveal_column"))]
    pub revealed_indices: Vec<bool>,
    /// Whole word revealed.
    pub is_eliminated: bool,
    /// Last survivor.
    pub is_winner: bool,
}
