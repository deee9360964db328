//! Attack resolution: applies one kana to every board and reports what changed.

use crate::state::game::{GameLog, LogKind, Player};

/// Result of resolving a single attack.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttackResolution {
    /// Players with updated reveal bitmaps and elimination flags.
    pub players: Vec<Player>,
    /// At least one slot, on any board, was newly revealed.
    pub hit: bool,
    /// Log lines produced by the attack, newest first.
    pub logs: Vec<GameLog>,
}

/// Apply `kana` to every player's board, the attacker's included.
///
/// Already revealed slots stay revealed and matching slots become revealed; a player whose
/// real word is now fully visible is eliminated. Running the same kana twice leaves the
/// boards unchanged, which is what makes a retried write harmless.
pub fn resolve_attack(players: &[Player], attacker_index: usize, kana: char) -> AttackResolution {
    let attacker = players
        .get(attacker_index)
        .map(|player| player.name.as_str())
        .unwrap_or("someone");

    // Built oldest-first, reversed at the end.
    let mut logs = vec![GameLog::new(
        LogKind::Attack,
        format!("{attacker} attacks with \"{kana}\""),
    )];
    let mut hit = false;

    let players = players
        .iter()
        .cloned()
        .map(|mut player| {
            if let Some(board) = player.word.as_mut() {
                if board.reveal(kana) > 0 {
                    hit = true;
                    logs.push(GameLog::new(
                        LogKind::Damage,
                        format!("{} takes a hit!", player.name),
                    ));
                }
                player.is_eliminated = board.is_fully_revealed();
            }
            player
        })
        .collect();

    if !hit {
        logs.push(GameLog::new(LogKind::Info, "Miss!"));
    }

    logs.reverse();
    AttackResolution { players, hit, logs }
}

/// Re-apply every kana attacked so far and recompute elimination.
///
/// Reveals only ever grow, so this repairs a board whose row was written before the room
/// recorded a later attack.
pub fn replay_attacks<I>(players: &mut [Player], kanas: I)
where
    I: IntoIterator<Item = char>,
    I::IntoIter: Clone,
{
    let kanas = kanas.into_iter();
    for player in players.iter_mut() {
        if let Some(board) = player.word.as_mut() {
            for kana in kanas.clone() {
                board.reveal(kana);
            }
            player.is_eliminated = board.is_fully_revealed();
        }
    }
}

#[cfg(test)]
mod tests {
    use uuid::Uuid;

    use super::*;
    use crate::state::{game::RoomCode, word::WordBoard};

    fn player(name: &str, order: u32, word: &str) -> Player {
        let room: RoomCode = "424242".parse().unwrap();
        let mut player = Player::new(Uuid::new_v4(), room, name.into(), order);
        player.word = Some(WordBoard::from_raw(word).unwrap());
        player
    }

    fn revealed(player: &Player) -> [bool; 7] {
        *player.word.as_ref().unwrap().revealed()
    }

    #[test]
    fn tanuki_scenario() {
        let players = vec![player("Aki", 0, "たぬき"), player("Ren", 1, "さくら")];

        let first = resolve_attack(&players, 1, 'き');
        assert!(first.hit);
        assert_eq!(
            revealed(&first.players[0]),
            [false, false, true, false, false, false, false]
        );

        let second = resolve_attack(&first.players, 1, 'ぬ');
        assert_eq!(
            revealed(&second.players[0]),
            [false, true, true, false, false, false, false]
        );
        assert!(!second.players[0].is_eliminated);

        let third = resolve_attack(&second.players, 1, 'た');
        assert!(third.players[0].is_eliminated);
        assert!(!third.players[1].is_eliminated);
    }

    #[test]
    fn resolution_is_idempotent() {
        let players = vec![player("Aki", 0, "こねこ"), player("Ren", 1, "ねずみ")];
        let once = resolve_attack(&players, 0, 'ね');
        let twice = resolve_attack(&once.players, 0, 'ね');

        for (a, b) in once.players.iter().zip(twice.players.iter()) {
            assert_eq!(a.word, b.word);
            assert_eq!(a.is_eliminated, b.is_eliminated);
        }
        assert!(once.hit);
        assert!(!twice.hit);
    }

    #[test]
    fn reveals_never_flip_back() {
        let mut players = vec![player("Aki", 0, "あいす"), player("Ren", 1, "うみ")];
        let sequence = ['い', 'か', 'み', 'い', 'あ', 'ん', 'う'];
        let mut previous: Vec<[bool; 7]> = players.iter().map(revealed).collect();

        for kana in sequence {
            players = resolve_attack(&players, 0, kana).players;
            let current: Vec<[bool; 7]> = players.iter().map(revealed).collect();
            for (before, after) in previous.iter().zip(current.iter()) {
                for (b, a) in before.iter().zip(after.iter()) {
                    assert!(!*b || *a, "slot was un-revealed by `{kana}`");
                }
            }
            previous = current;
        }
    }

    #[test]
    fn padding_does_not_block_elimination() {
        let players = vec![player("Aki", 0, "ねこ")];
        let after = resolve_attack(&players, 0, 'ね');
        assert!(!after.players[0].is_eliminated);
        let after = resolve_attack(&after.players, 0, 'こ');
        assert!(after.players[0].is_eliminated);
        assert_eq!(after.players[0].word.as_ref().unwrap().revealed_count(), 2);
    }

    #[test]
    fn attacker_can_hit_themselves() {
        let players = vec![player("Aki", 0, "そら"), player("Ren", 1, "うみ")];
        let result = resolve_attack(&players, 0, 'そ');
        assert!(result.hit);
        assert_eq!(result.players[0].word.as_ref().unwrap().revealed_count(), 1);
    }

    #[test]
    fn logs_are_newest_first() {
        let players = vec![player("Aki", 0, "かき"), player("Ren", 1, "かに")];
        let result = resolve_attack(&players, 0, 'か');
        let kinds: Vec<_> = result.logs.iter().map(|log| log.kind).collect();
        assert_eq!(kinds, [LogKind::Damage, LogKind::Damage, LogKind::Attack]);
        assert_eq!(result.logs[0].message, "Ren takes a hit!");
    }

    #[test]
    fn miss_is_logged() {
        let players = vec![player("Aki", 0, "かき"), player("Ren", 1, "かに")];
        let result = resolve_attack(&players, 0, 'ん');
        assert!(!result.hit);
        let kinds: Vec<_> = result.logs.iter().map(|log| log.kind).collect();
        assert_eq!(kinds, [LogKind::Info, LogKind::Attack]);
    }

    #[test]
    fn replay_restores_lagging_boards() {
        let mut players = vec![player("Aki", 0, "たぬき"), player("Ren", 1, "さくら")];
        replay_attacks(&mut players, ['た', 'ぬ', 'き', 'ら']);
        assert!(players[0].is_eliminated);
        assert_eq!(
            revealed(&players[1]),
            [false, false, true, false, false, false, false]
        );

        let before = players.clone();
        replay_attacks(&mut players, ['た', 'ぬ', 'き', 'ら']);
        assert_eq!(players, before);
    }
}
