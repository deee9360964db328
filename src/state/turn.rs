//! Turn scheduling: bonus actions after a hit and skipping eliminated players.

use crate::state::game::Player;

/// Actions a player may take in one turn (the regular attack plus one bonus).
pub const MAX_ACTIONS_PER_TURN: u8 = 2;

/// Where the turn goes after an attack.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TurnOutcome {
    /// Index of the player who acts next.
    pub next_index: usize,
    /// Actions already used by that player in the current turn.
    pub attack_count: u8,
    /// The same player keeps the turn for a bonus action.
    pub bonus: bool,
}

/// Compute who acts next.
///
/// A hit grants one bonus action while `attack_count` is below the limit; otherwise the
/// turn passes to the following player. Eliminated players are always skipped, so a
/// player who knocked themselves out loses their bonus action.
pub fn next_turn(players: &[Player], current: usize, attack_count: u8, hit: bool) -> TurnOutcome {
    let count = players.len();
    if count == 0 {
        return TurnOutcome {
            next_index: 0,
            attack_count: 0,
            bonus: false,
        };
    }

    // Stored rows are not trusted to keep the count in range.
    let used = attack_count.saturating_add(1);
    if hit && used < MAX_ACTIONS_PER_TURN {
        let candidate = current % count;
        if !players[candidate].is_eliminated {
            return TurnOutcome {
                next_index: candidate,
                attack_count: used,
                bonus: true,
            };
        }
        return TurnOutcome {
            next_index: skip_eliminated(players, candidate),
            attack_count: 0,
            bonus: false,
        };
    }

    TurnOutcome {
        next_index: skip_eliminated(players, (current + 1) % count),
        attack_count: 0,
        bonus: false,
    }
}

/// First non-eliminated index at or after `start`, wrapping, bounded by one lap.
///
/// When everybody is eliminated the search gives up and returns where it stopped.
pub fn skip_eliminated(players: &[Player], start: usize) -> usize {
    let count = players.len();
    if count == 0 {
        return 0;
    }

    let mut index = start % count;
    for _ in 0..count {
        if !players[index].is_eliminated {
            break;
        }
        index = (index + 1) % count;
    }
    index
}
