//! Merge of the authoritative room snapshot with this client's optimistic overlay.
//!
//! The rendered view is always `reduce(remote, overlay)`. Remote data wins: the overlay
//! only lives until a snapshot proves the write landed (or lost), and every field that is
//! not covered by the overlay comes straight from the last remote fetch.

use tracing::debug;

use crate::state::{
    battle::{replay_attacks, resolve_attack},
    game::{GameLog, GameState, LogKind, Player, PlayerId, RoomSnapshot},
    state_machine::GamePhase,
    transitions::advance_if_all_submitted,
    turn::next_turn,
    word::{WORD_SLOTS, WordBoard},
};

/// Local change shown before the store confirms it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OptimisticPatch {
    /// Whole room state after a room-level action (start, attack, restart, theme).
    Room(RoomSnapshot),
    /// One player's freshly submitted word; only that player row changes.
    Word {
        /// Owner of the word.
        player_id: PlayerId,
        /// Board built from the submitted word.
        board: WordBoard,
    },
}

/// Overlay entry together with the remote room version it was computed from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingChange {
    /// Remote room version the change was based on.
    pub base_version: u64,
    /// Change to show until it settles.
    pub patch: OptimisticPatch,
}

impl PendingChange {
    /// Whether `remote` makes the overlay obsolete.
    fn is_settled_by(&self, remote: &RoomSnapshot) -> bool {
        if remote.room.version > self.base_version {
            return true;
        }
        match &self.patch {
            OptimisticPatch::Room(_) => false,
            OptimisticPatch::Word { player_id, .. } => remote
                .player(*player_id)
                .is_none_or(|player| player.has_word()),
        }
    }
}

/// Rendered room state: remote snapshot with the overlay on top.
pub fn reduce(remote: &RoomSnapshot, overlay: Option<&PendingChange>) -> RoomSnapshot {
    let Some(pending) = overlay else {
        return remote.clone();
    };

    match &pending.patch {
        OptimisticPatch::Room(local) => local.clone(),
        OptimisticPatch::Word { player_id, board } => {
            let mut state = GameState::from_snapshot(remote.clone());
            if let Some(player) = state
                .players
                .iter_mut()
                .find(|player| player.id == *player_id && !player.has_word())
            {
                player.word = Some(board.clone());
            }
            advance_if_all_submitted(state).snapshot()
        }
    }
}

/// Log lines describing how the room moved from `prev` to `next`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LogDelta {
    /// The log must be cleared first (a new game or a restart was observed).
    pub reset: bool,
    /// Entries to prepend, newest first.
    pub entries: Vec<GameLog>,
}

/// Describe the forward progress between two views as log lines.
///
/// Only progress produces entries: a reverted overlay (fewer reveals, an earlier phase)
/// never does.
pub fn derive_logs(prev: &RoomSnapshot, next: &RoomSnapshot) -> LogDelta {
    let mut delta = LogDelta::default();
    // Built oldest-first, reversed at the end.
    let mut entries = Vec::new();

    let (before, after) = (prev.room.phase, next.room.phase);
    if before == GamePhase::Lobby && after != GamePhase::Lobby {
        delta.reset = true;
        entries.push(GameLog::new(
            LogKind::Info,
            format!("Game start! Theme: {}", next.room.theme),
        ));
    } else if before != GamePhase::Lobby && after == GamePhase::Lobby {
        delta.reset = true;
        return delta;
    }

    if matches!(before, GamePhase::Lobby | GamePhase::Input)
        && matches!(after, GamePhase::Battle | GamePhase::GameOver)
    {
        entries.push(GameLog::new(
            LogKind::Info,
            "Every word is in. Battle begins!",
        ));
    }

    entries.extend(replay_new_attacks(prev, next));

    if before != GamePhase::GameOver && after == GamePhase::GameOver {
        let winner = next
            .room
            .winner_id
            .and_then(|id| next.player(id))
            .map(|player| player.name.clone());
        let message = match winner {
            Some(name) => format!("{name} wins!"),
            None => "Everyone is out. It's a draw!".to_string(),
        };
        entries.push(GameLog::new(LogKind::Elimination, message));
    }

    entries.reverse();
    delta.entries = entries;
    delta
}

/// Log lines for every kana in `next` that `prev` had not seen, oldest first.
///
/// The attacks are re-resolved in order on a scratch roster that starts from what `prev`
/// showed, so each one is credited to whoever held the turn at that point even when a
/// single fetch covers several turns.
fn replay_new_attacks(prev: &RoomSnapshot, next: &RoomSnapshot) -> Vec<GameLog> {
    let fresh: Vec<char> = next
        .room
        .attacked_kanas
        .iter()
        .copied()
        .filter(|kana| !prev.room.attacked_kanas.contains(kana))
        .collect();
    if fresh.is_empty() {
        return Vec::new();
    }

    let mut players: Vec<Player> = next
        .players
        .iter()
        .cloned()
        .map(|mut player| {
            if let Some(board) = player.word.as_mut() {
                *board = WordBoard::from_parts(*board.slots(), [false; WORD_SLOTS]);
            }
            player.is_eliminated = false;
            player
        })
        .collect();
    replay_attacks(&mut players, prev.room.attacked_kanas.iter().copied());

    let (mut current, mut attack_count) = if prev.room.phase == GamePhase::Battle {
        let index = prev
            .current_player()
            .and_then(|player| players.iter().position(|p| p.id == player.id))
            .unwrap_or(0);
        (index, prev.room.attack_count)
    } else {
        (0, 0)
    };

    let mut entries = Vec::new();
    let mut bonus_for = None;
    for kana in fresh {
        let mut resolution = resolve_attack(&players, current, kana);
        resolution.logs.reverse();
        entries.append(&mut resolution.logs);

        let turn = next_turn(&resolution.players, current, attack_count, resolution.hit);
        bonus_for = if turn.bonus {
            resolution.players.get(current).map(|player| player.name.clone())
        } else {
            None
        };
        players = resolution.players;
        current = turn.next_index;
        attack_count = turn.attack_count;
    }

    if next.room.phase == GamePhase::Battle
        && let Some(name) = bonus_for
    {
        entries.push(GameLog::new(
            LogKind::Info,
            format!("{name} may attack again!"),
        ));
    }
    entries
}

/// Per-room client state: last remote snapshot, pending overlay and the local log.
#[derive(Debug, Clone)]
pub struct Reconciler {
    remote: RoomSnapshot,
    overlay: Option<PendingChange>,
    view: GameState,
}

impl Reconciler {
    /// Start from a freshly fetched snapshot.
    pub fn new(remote: RoomSnapshot) -> Self {
        let remote = repaired(remote);
        let view = GameState::from_snapshot(remote.clone());
        Self {
            remote,
            overlay: None,
            view,
        }
    }

    /// What the client renders.
    pub fn view(&self) -> &GameState {
        &self.view
    }

    /// Last accepted remote snapshot.
    pub fn remote(&self) -> &RoomSnapshot {
        &self.remote
    }

    /// Pending overlay, if any.
    pub fn overlay(&self) -> Option<&PendingChange> {
        self.overlay.as_ref()
    }

    /// Show `patch` immediately; `logs` is the local log after the action.
    pub fn apply_local(&mut self, patch: OptimisticPatch, logs: Vec<GameLog>) {
        self.overlay = Some(PendingChange {
            base_version: self.remote.room.version,
            patch,
        });
        self.rebuild(logs);
    }

    /// Forget the overlay after a failed or lost write; the view falls back to remote.
    pub fn drop_overlay(&mut self) {
        if self.overlay.take().is_some() {
            let logs = self.view.logs.clone();
            self.rebuild(logs);
        }
    }

    /// Accept a fetched snapshot. Returns whether it was applied; a snapshot older than the
    /// one already held is ignored so a late poll can never regress the view.
    pub fn apply_remote(&mut self, snapshot: RoomSnapshot) -> bool {
        if snapshot.room.id != self.remote.room.id {
            debug!(
                expected = %self.remote.room.id,
                got = %snapshot.room.id,
                "ignoring snapshot of another room"
            );
            return false;
        }
        if snapshot.room.version < self.remote.room.version {
            debug!(
                room_id = %snapshot.room.id,
                held = self.remote.room.version,
                got = snapshot.room.version,
                "ignoring stale snapshot"
            );
            return false;
        }

        let prev = self.view.snapshot();
        self.remote = repaired(snapshot);
        if self
            .overlay
            .as_ref()
            .is_some_and(|pending| pending.is_settled_by(&self.remote))
        {
            self.overlay = None;
        }

        let next = reduce(&self.remote, self.overlay.as_ref());
        let delta = derive_logs(&prev, &next);
        let mut logs = if delta.reset {
            Vec::new()
        } else {
            self.view.logs.clone()
        };
        let mut entries = delta.entries;
        entries.append(&mut logs);
        self.rebuild(entries);
        true
    }

    fn rebuild(&mut self, logs: Vec<GameLog>) {
        let snapshot = reduce(&self.remote, self.overlay.as_ref());
        self.view = GameState {
            room: snapshot.room,
            players: snapshot.players,
            logs,
        };
    }
}

/// Re-apply the room's attacked kana to boards whose rows lag behind the room row.
fn repaired(mut snapshot: RoomSnapshot) -> RoomSnapshot {
    if matches!(
        snapshot.room.phase,
        GamePhase::Battle | GamePhase::GameOver
    ) {
        let kanas: Vec<char> = snapshot.room.attacked_kanas.iter().copied().collect();
        replay_attacks(&mut snapshot.players, kanas);
    }
    snapshot
}
