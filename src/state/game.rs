use std::{fmt, str::FromStr, time::SystemTime};

use indexmap::IndexSet;
use rand::Rng;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    dao::models::{PlayerEntity, RoomEntity},
    error::GameError,
    state::{
        state_machine::GamePhase,
        turn::MAX_ACTIONS_PER_TURN,
        word::{WORD_SLOTS, WordBoard},
    },
};

/// Stable identifier of a player (one per local identity).
pub type PlayerId = Uuid;

/// Number of digits in a room code.
pub const ROOM_CODE_LEN: usize = 6;

/// Short, human-shareable room identifier made of six digits.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct RoomCode(String);

impl RoomCode {
    /// Draw a random code; collisions are handled by the caller against the store.
    pub fn random(rng: &mut impl Rng) -> Self {
        Self(format!("{:06}", rng.random_range(0..1_000_000u32)))
    }

    /// Borrow the code as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl FromStr for RoomCode {
    type Err = GameError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let value = value.trim();
        if value.len() == ROOM_CODE_LEN && value.chars().all(|c| c.is_ascii_digit()) {
            Ok(Self(value.to_string()))
        } else {
            Err(GameError::Validation(format!(
                "room code must be {ROOM_CODE_LEN} digits (got `{value}`)"
            )))
        }
    }
}

impl TryFrom<String> for RoomCode {
    type Error = GameError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<RoomCode> for String {
    fn from(value: RoomCode) -> Self {
        value.0
    }
}

impl fmt::Display for RoomCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Shared room record, the single serialization point between clients.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Room {
    /// Six-digit room code.
    pub id: RoomCode,
    /// Current phase of the game.
    pub phase: GamePhase,
    /// Theme words should relate to.
    pub theme: String,
    /// Player allowed to start and restart the game.
    pub host_id: PlayerId,
    /// Index (in join order) of the player whose action it is during battle.
    pub current_player_index: usize,
    /// Actions already taken in the current turn (0 or 1).
    pub attack_count: u8,
    /// Every kana attacked so far, in attack order.
    pub attacked_kanas: IndexSet<char>,
    /// Survivor of the last battle, if any.
    pub winner_id: Option<PlayerId>,
    /// Store-managed revision, bumped on every room write.
    pub version: u64,
    /// Creation timestamp.
    pub created_at: SystemTime,
}

impl Room {
    /// Fresh lobby owned by `host_id`.
    pub fn new(id: RoomCode, host_id: PlayerId) -> Self {
        Self {
            id,
            phase: GamePhase::Lobby,
            theme: String::new(),
            host_id,
            current_player_index: 0,
            attack_count: 0,
            attacked_kanas: IndexSet::new(),
            winner_id: None,
            version: 0,
            created_at: SystemTime::now(),
        }
    }

    /// Clear every field that only has meaning during a battle.
    pub fn reset_battle(&mut self) {
        self.current_player_index = 0;
        self.attack_count = 0;
        self.attacked_kanas.clear();
        self.winner_id = None;
    }
}

/// A participant of a room.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Player {
    /// Stable identifier.
    pub id: PlayerId,
    /// Room the player belongs to.
    pub room_id: RoomCode,
    /// Display name.
    pub name: String,
    /// Join sequence; fixes turn order and host precedence.
    pub order: u32,
    /// Secret word, `None` until submitted during the input phase.
    pub word: Option<WordBoard>,
    /// Whole word revealed.
    pub is_eliminated: bool,
    /// Last survivor of the battle.
    pub is_winner: bool,
}

impl Player {
    /// Newly joined player without a word.
    pub fn new(id: PlayerId, room_id: RoomCode, name: String, order: u32) -> Self {
        Self {
            id,
            room_id,
            name,
            order,
            word: None,
            is_eliminated: false,
            is_winner: false,
        }
    }

    /// Whether a word has been submitted.
    pub fn has_word(&self) -> bool {
        self.word.is_some()
    }

    /// Drop the word and every battle flag.
    pub fn reset_battle(&mut self) {
        self.word = None;
        self.is_eliminated = false;
        self.is_winner = false;
    }
}

/// Category of a battle log line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogKind {
    /// Turn bookkeeping (miss, bonus action, phase changes).
    Info,
    /// Someone attacked a kana.
    Attack,
    /// A player had slots revealed.
    Damage,
    /// A player dropped out or the battle ended.
    Elimination,
}

/// One battle log line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GameLog {
    /// Unique identifier (for list rendering).
    pub id: Uuid,
    /// Human readable line.
    pub message: String,
    /// Category.
    pub kind: LogKind,
}

impl GameLog {
    /// Build a log line with a fresh identifier.
    pub fn new(kind: LogKind, message: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            message: message.into(),
            kind,
        }
    }
}

/// Authoritative picture of a room: the room record plus its players in join order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoomSnapshot {
    /// Room record.
    pub room: Room,
    /// Players sorted by `order`.
    pub players: Vec<Player>,
}

impl RoomSnapshot {
    /// Build a snapshot, sorting players by join order.
    pub fn new(room: Room, mut players: Vec<Player>) -> Self {
        players.sort_by_key(|player| player.order);
        Self { room, players }
    }

    /// Look a player up by identifier.
    pub fn player(&self, id: PlayerId) -> Option<&Player> {
        self.players.iter().find(|player| player.id == id)
    }

    /// Position of a player in turn order.
    pub fn player_index(&self, id: PlayerId) -> Option<usize> {
        self.players.iter().position(|player| player.id == id)
    }

    /// Player whose action it is, if the index is in range.
    pub fn current_player(&self) -> Option<&Player> {
        self.players.get(self.room.current_player_index)
    }
}

/// Everything one client knows about a room: the snapshot it renders and its local log.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GameState {
    /// Room record.
    pub room: Room,
    /// Players in join order.
    pub players: Vec<Player>,
    /// Battle log, newest entry first.
    pub logs: Vec<GameLog>,
}

impl GameState {
    /// Wrap a snapshot with an empty log.
    pub fn from_snapshot(snapshot: RoomSnapshot) -> Self {
        Self {
            room: snapshot.room,
            players: snapshot.players,
            logs: Vec::new(),
        }
    }

    /// Drop the log, keeping room and players.
    pub fn snapshot(&self) -> RoomSnapshot {
        RoomSnapshot {
            room: self.room.clone(),
            players: self.players.clone(),
        }
    }

    /// Prepend entries that are already ordered newest-first.
    pub fn push_logs(&mut self, entries: Vec<GameLog>) {
        if entries.is_empty() {
            return;
        }
        let mut logs = entries;
        logs.append(&mut self.logs);
        self.logs = logs;
    }
}

impl From<RoomEntity> for Room {
    fn from(value: RoomEntity) -> Self {
        Self {
            id: RoomCode(value.id),
            phase: value.phase,
            theme: value.theme,
            host_id: value.host_id,
            current_player_index: value.current_player_index as usize,
            attack_count: value.attack_count.min(MAX_ACTIONS_PER_TURN - 1),
            attacked_kanas: value.attacked_kanas.into_iter().collect(),
            winner_id: value.winner_id,
            version: value.version,
            created_at: value.created_at,
        }
    }
}

impl From<Room> for RoomEntity {
    fn from(value: Room) -> Self {
        Self {
            id: value.id.0,
            phase: value.phase,
            theme: value.theme,
            host_id: value.host_id,
            current_player_index: value.current_player_index as u32,
            attack_count: value.attack_count,
            attacked_kanas: value.attacked_kanas.into_iter().collect(),
            winner_id: value.winner_id,
            version: value.version,
            created_at: value.created_at,
        }
    }
}

impl From<PlayerEntity> for Player {
    fn from(value: PlayerEntity) -> Self {
        let word = board_from_columns(&value.display_word, &value.revealed_indices);
        Self {
            id: value.id,
            room_id: RoomCode(value.room_id),
            name: value.name,
            order: value.player_order,
            word,
            is_eliminated: value.is_eliminated,
            is_winner: value.is_winner,
        }
    }
}

impl From<Player> for PlayerEntity {
    fn from(value: Player) -> Self {
        let (display_word, revealed_indices) = match value.word {
            Some(board) => (board.slots().to_vec(), board.revealed().to_vec()),
            None => (Vec::new(), Vec::new()),
        };
        Self {
            id: value.id,
            room_id: value.room_id.0,
            name: value.name,
            player_order: value.order,
            display_word,
            revealed_indices,
            is_eliminated: value.is_eliminated,
            is_winner: value.is_winner,
        }
    }
}

/// Storage keeps fixed-length columns; anything that is not a full seven-slot word reads
/// back as "no word yet".
fn board_from_columns(display_word: &[char], revealed: &[bool]) -> Option<WordBoard> {
    let slots: [char; WORD_SLOTS] = display_word.try_into().ok()?;
    let revealed: [bool; WORD_SLOTS] = revealed.try_into().unwrap_or([false; WORD_SLOTS]);
    Some(WordBoard::from_parts(slots, revealed))
}
