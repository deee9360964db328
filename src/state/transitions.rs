//! Side-effect-free game actions.
//!
//! Each function takes the current [`GameState`], checks that the acting player may do
//! what they ask, and returns the next state. Nothing here touches the store: the client
//! writes the result and reconciles it with whatever the store says afterwards.

use crate::{
    error::GameError,
    state::{
        battle::resolve_attack,
        game::{GameLog, GameState, LogKind, PlayerId},
        outcome::{Outcome, evaluate},
        state_machine::{GamePhase, PhaseEvent},
        turn::{next_turn, skip_eliminated},
        word::{WordBoard, attack_target},
    },
};

/// Players needed before the host can start.
pub const MIN_PLAYERS: usize = 2;
/// Theme used when the host leaves the field blank.
pub const DEFAULT_THEME: &str = "なんでも";

/// Whether a kana has been uncovered somewhere, attacked without effect, or is still open.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KanaStatus {
    /// Visible on at least one board.
    Hit,
    /// Attacked, but nobody had it.
    Miss,
    /// Still available.
    Neutral,
}

fn ensure_host(state: &GameState, actor: PlayerId) -> Result<(), GameError> {
    if state.room.host_id != actor {
        return Err(GameError::NotHost);
    }
    Ok(())
}

fn ensure_phase(state: &GameState, expected: GamePhase) -> Result<(), GameError> {
    if state.room.phase != expected {
        return Err(GameError::WrongPhase {
            expected,
            actual: state.room.phase,
        });
    }
    Ok(())
}

/// Reset every battle-only field of the room and its players.
pub fn reset_battle(state: &mut GameState) {
    state.room.reset_battle();
    for player in &mut state.players {
        player.reset_battle();
    }
    state.logs.clear();
}

/// Host-only: change the theme while in the lobby.
pub fn set_theme(state: &GameState, actor: PlayerId, theme: &str) -> Result<GameState, GameError> {
    ensure_host(state, actor)?;
    if state.room.phase != GamePhase::Lobby {
        return Err(GameError::GameAlreadyStarted);
    }

    let theme = theme.trim();
    let mut next = state.clone();
    next.room.theme = if theme.is_empty() {
        DEFAULT_THEME.to_string()
    } else {
        theme.to_string()
    };
    Ok(next)
}

/// Host-only: LOBBY → INPUT.
pub fn start_game(state: &GameState, actor: PlayerId) -> Result<GameState, GameError> {
    ensure_host(state, actor)?;
    let phase = state.room.phase.apply(PhaseEvent::StartGame)?;
    if state.players.len() < MIN_PLAYERS {
        return Err(GameError::NotEnoughPlayers {
            required: MIN_PLAYERS,
            actual: state.players.len(),
        });
    }

    let mut next = state.clone();
    reset_battle(&mut next);
    next.room.phase = phase;
    next.push_logs(vec![GameLog::new(
        LogKind::Info,
        format!("Game start! Theme: {}", next.room.theme),
    )]);
    Ok(next)
}

/// Record `raw` as the acting player's word, then auto-advance if everyone is ready.
pub fn submit_word(
    state: &GameState,
    actor: PlayerId,
    raw: &str,
) -> Result<GameState, GameError> {
    ensure_phase(state, GamePhase::Input)?;

    let board = WordBoard::from_raw(raw)?;

    let mut next = state.clone();
    let player = next
        .players
        .iter_mut()
        .find(|player| player.id == actor)
        .ok_or(GameError::UnknownPlayer)?;
    if player.has_word() {
        return Err(GameError::WordAlreadySubmitted);
    }
    player.word = Some(board);

    Ok(advance_if_all_submitted(next))
}

/// INPUT → BATTLE once every current player has a word.
///
/// Callers must pass the freshest player set they know of; a stale list can miss a
/// player who joined or left.
pub fn advance_if_all_submitted(mut state: GameState) -> GameState {
    if state.room.phase != GamePhase::Input
        || state.players.is_empty()
        || !state.players.iter().all(|player| player.has_word())
    {
        return state;
    }

    if let Ok(phase) = state.room.phase.apply(PhaseEvent::AllWordsSubmitted) {
        state.room.phase = phase;
        state.room.current_player_index = 0;
        state.room.attack_count = 0;
        state.push_logs(vec![GameLog::new(
            LogKind::Info,
            "Every word is in. Battle begins!",
        )]);
    }
    state
}

/// Resolve an attack by `actor`, then advance the turn and check for a winner.
pub fn attack(state: &GameState, actor: PlayerId, kana: char) -> Result<GameState, GameError> {
    ensure_phase(state, GamePhase::Battle)?;

    let attacker_index = state
        .players
        .iter()
        .position(|player| player.id == actor)
        .ok_or(GameError::UnknownPlayer)?;
    if attacker_index != state.room.current_player_index {
        return Err(GameError::NotYourTurn);
    }

    let kana = attack_target(kana)?;
    if state.room.attacked_kanas.contains(&kana) {
        return Err(GameError::KanaAlreadyAttacked(kana));
    }

    let resolution = resolve_attack(&state.players, attacker_index, kana);
    let turn = next_turn(
        &resolution.players,
        state.room.current_player_index,
        state.room.attack_count,
        resolution.hit,
    );

    let mut next = state.clone();
    next.players = resolution.players;
    next.push_logs(resolution.logs);
    next.room.attacked_kanas.insert(kana);
    next.room.current_player_index = turn.next_index;
    next.room.attack_count = turn.attack_count;

    if turn.bonus {
        let message = format!("{} may attack again!", next.players[attacker_index].name);
        next.push_logs(vec![GameLog::new(LogKind::Info, message)]);
    }

    conclude_if_decided(&mut next)?;
    Ok(next)
}

/// Move to GAMEOVER when at most one player is left, crowning the survivor.
fn conclude_if_decided(next: &mut GameState) -> Result<(), GameError> {
    let outcome = evaluate(&next.players);
    if !outcome.is_terminal() {
        return Ok(());
    }

    next.room.phase = next.room.phase.apply(PhaseEvent::LastPlayerStanding)?;
    match outcome {
        Outcome::Winner(index) => {
            let winner = &mut next.players[index];
            winner.is_winner = true;
            next.room.winner_id = Some(winner.id);
            let message = format!("{} wins!", winner.name);
            next.push_logs(vec![GameLog::new(LogKind::Elimination, message)]);
        }
        Outcome::Draw => {
            next.room.winner_id = None;
            next.push_logs(vec![GameLog::new(
                LogKind::Elimination,
                "Everyone is out. It's a draw!",
            )]);
        }
        Outcome::Continue => {}
    }
    Ok(())
}

/// Take `leaving` out of the room and repair what depended on them.
///
/// The host role moves to the lowest join order. During input the remaining players may
/// now all have words; during battle the turn index is shifted so it keeps pointing at
/// the same player (or the next one if the leaver was acting) and the outcome is
/// re-evaluated.
pub fn remove_player(state: &GameState, leaving: PlayerId) -> Result<GameState, GameError> {
    let mut next = state.clone();
    let Some(index) = next.players.iter().position(|player| player.id == leaving) else {
        return Ok(next);
    };
    let left = next.players.remove(index);
    if next.players.is_empty() {
        return Ok(next);
    }

    if next.room.host_id == leaving
        && let Some(heir) = next.players.iter().min_by_key(|player| player.order)
    {
        next.room.host_id = heir.id;
    }
    next.push_logs(vec![GameLog::new(
        LogKind::Info,
        format!("{} left the room", left.name),
    )]);

    match next.room.phase {
        GamePhase::Input => Ok(advance_if_all_submitted(next)),
        GamePhase::Battle => {
            let mut current = next.room.current_player_index;
            if index < current {
                current -= 1;
            } else if index == current {
                next.room.attack_count = 0;
            }
            next.room.current_player_index = skip_eliminated(&next.players, current);
            conclude_if_decided(&mut next)?;
            Ok(next)
        }
        _ => Ok(next),
    }
}

/// Host-only: GAMEOVER → LOBBY, keeping the room code and the players.
pub fn restart(state: &GameState, actor: PlayerId) -> Result<GameState, GameError> {
    ensure_host(state, actor)?;
    let phase = state.room.phase.apply(PhaseEvent::Restart)?;

    let mut next = state.clone();
    reset_battle(&mut next);
    next.room.theme.clear();
    next.room.phase = phase;
    Ok(next)
}

/// Status of `kana` on the shared keyboard.
pub fn kana_status(state: &GameState, kana: char) -> KanaStatus {
    let shown = state
        .players
        .iter()
        .filter_map(|player| player.word.as_ref())
        .any(|board| board.shows(kana));

    if shown {
        KanaStatus::Hit
    } else if state.room.attacked_kanas.contains(&kana) {
        KanaStatus::Miss
    } else {
        KanaStatus::Neutral
    }
}

#[cfg(test)]
mod tests {
    use uuid::Uuid;

    use super::*;
    use crate::state::game::{Player, Room, RoomCode, RoomSnapshot};

    fn lobby(count: usize) -> GameState {
        let code: RoomCode = "123456".parse().unwrap();
        let players: Vec<Player> = (0..count)
            .map(|order| {
                Player::new(
                    Uuid::new_v4(),
                    code.clone(),
                    format!("P{order}"),
                    order as u32,
                )
            })
            .collect();
        let room = Room::new(code, players[0].id);
        GameState::from_snapshot(RoomSnapshot::new(room, players))
    }

    fn in_battle(words: &[&str]) -> GameState {
        let state = lobby(words.len());
        let host = state.room.host_id;
        let mut state = start_game(&state, host).unwrap();
        for (index, word) in words.iter().enumerate() {
            let id = state.players[index].id;
            state = submit_word(&state, id, word).unwrap();
        }
        assert_eq!(state.room.phase, GamePhase::Battle);
        state
    }

    fn current(state: &GameState) -> PlayerId {
        state.players[state.room.current_player_index].id
    }

    #[test]
    fn start_requires_host_and_two_players() {
        let solo = lobby(1);
        let host = solo.room.host_id;
        assert!(matches!(
            start_game(&solo, host),
            Err(GameError::NotEnoughPlayers { .. })
        ));

        let duo = lobby(2);
        let guest = duo.players[1].id;
        assert!(matches!(start_game(&duo, guest), Err(GameError::NotHost)));

        let started = start_game(&duo, duo.room.host_id).unwrap();
        assert_eq!(started.room.phase, GamePhase::Input);
    }

    #[test]
    fn input_auto_advances_to_battle() {
        let state = lobby(2);
        let state = start_game(&state, state.room.host_id).unwrap();
        let (first, second) = (state.players[0].id, state.players[1].id);

        let state = submit_word(&state, first, "ねこ").unwrap();
        assert_eq!(state.room.phase, GamePhase::Input);

        let state = submit_word(&state, second, "いぬ").unwrap();
        assert_eq!(state.room.phase, GamePhase::Battle);
        assert_eq!(state.room.current_player_index, 0);
    }

    #[test]
    fn invalid_word_leaves_state_untouched() {
        let state = lobby(2);
        let state = start_game(&state, state.room.host_id).unwrap();
        let first = state.players[0].id;
        assert!(matches!(
            submit_word(&state, first, "ねこねこねこねこ"),
            Err(GameError::Validation(_))
        ));
        assert!(!state.players[0].has_word());
    }

    #[test]
    fn word_cannot_be_submitted_twice() {
        let state = lobby(3);
        let state = start_game(&state, state.room.host_id).unwrap();
        let first = state.players[0].id;
        let state = submit_word(&state, first, "ねこ").unwrap();
        assert!(matches!(
            submit_word(&state, first, "いぬ"),
            Err(GameError::WordAlreadySubmitted)
        ));
    }

    #[test]
    fn hit_grants_bonus_then_passes_turn() {
        let state = in_battle(&["たぬき", "きつね"]);
        let attacker = current(&state);

        let state = attack(&state, attacker, 'き').unwrap();
        assert_eq!(current(&state), attacker);
        assert_eq!(state.room.attack_count, 1);
        assert_eq!(state.logs[0].message, "P0 may attack again!");

        let state = attack(&state, attacker, 'ね').unwrap();
        assert_ne!(current(&state), attacker);
        assert_eq!(state.room.attack_count, 0);
    }

    #[test]
    fn attacked_kana_cannot_be_reused() {
        let state = in_battle(&["たぬき", "きつね"]);
        let first = current(&state);
        let state = attack(&state, first, 'ん').unwrap();
        let second = current(&state);
        assert!(matches!(
            attack(&state, second, 'ん'),
            Err(GameError::KanaAlreadyAttacked('ん'))
        ));
    }

    #[test]
    fn voiced_attack_targets_base_kana() {
        let state = in_battle(&["かめ", "そら"]);
        let first = current(&state);
        let state = attack(&state, first, 'が').unwrap();
        assert!(state.room.attacked_kanas.contains(&'か'));
        assert_eq!(kana_status(&state, 'か'), KanaStatus::Hit);
    }

    #[test]
    fn only_current_player_may_attack() {
        let state = in_battle(&["たぬき", "きつね"]);
        let other = state.players[1].id;
        assert!(matches!(
            attack(&state, other, 'た'),
            Err(GameError::NotYourTurn)
        ));
    }

    #[test]
    fn last_survivor_wins() {
        let mut state = in_battle(&["かき", "かに", "もも"]);
        // Kana unique to the first two boards.
        for kana in ['か', 'き', 'に'] {
            let actor = current(&state);
            state = attack(&state, actor, kana).unwrap();
        }

        assert_eq!(state.room.phase, GamePhase::GameOver);
        assert!(state.players[2].is_winner);
        assert_eq!(state.room.winner_id, Some(state.players[2].id));
        assert_eq!(state.logs[0].kind, LogKind::Elimination);
    }

    #[test]
    fn simultaneous_elimination_is_a_draw() {
        let state = in_battle(&["ああ", "ああ"]);
        let actor = current(&state);
        let state = attack(&state, actor, 'あ').unwrap();
        assert_eq!(state.room.phase, GamePhase::GameOver);
        assert!(state.room.winner_id.is_none());
        assert!(state.players.iter().all(|player| !player.is_winner));
    }

    #[test]
    fn restart_resets_everything_but_players() {
        let state = in_battle(&["ああ", "いい"]);
        let actor = current(&state);
        let state = attack(&state, actor, 'あ').unwrap();
        assert_eq!(state.room.phase, GamePhase::GameOver);

        let host = state.room.host_id;
        let state = restart(&state, host).unwrap();
        assert_eq!(state.room.phase, GamePhase::Lobby);
        assert!(state.room.theme.is_empty());
        assert!(state.room.attacked_kanas.is_empty());
        assert!(state.room.winner_id.is_none());
        assert!(state.logs.is_empty());
        assert_eq!(state.players.len(), 2);
        assert!(state.players.iter().all(|p| !p.has_word() && !p.is_winner));
    }

    #[test]
    fn theme_only_changes_in_lobby() {
        let state = lobby(2);
        let host = state.room.host_id;
        let themed = set_theme(&state, host, "  animals ").unwrap();
        assert_eq!(themed.room.theme, "animals");

        let started = start_game(&themed, host).unwrap();
        assert!(set_theme(&started, host, "food").is_err());
    }

    #[test]
    fn blank_theme_falls_back_to_default() {
        let state = lobby(2);
        let host = state.room.host_id;
        let themed = set_theme(&state, host, "   ").unwrap();
        assert_eq!(themed.room.theme, DEFAULT_THEME);
    }

    #[test]
    fn leaving_host_hands_over_to_lowest_order() {
        let state = lobby(3);
        let host = state.room.host_id;
        let next = remove_player(&state, host).unwrap();
        assert_eq!(next.players.len(), 2);
        assert_eq!(next.room.host_id, state.players[1].id);
    }

    #[test]
    fn leaving_during_input_can_start_the_battle() {
        let state = lobby(3);
        let state = start_game(&state, state.room.host_id).unwrap();
        let ids: Vec<_> = state.players.iter().map(|player| player.id).collect();
        let (first, second, third) = (ids[0], ids[1], ids[2]);
        let state = submit_word(&state, first, "ねこ").unwrap();
        let state = submit_word(&state, second, "いぬ").unwrap();

        let next = remove_player(&state, third).unwrap();
        assert_eq!(next.room.phase, GamePhase::Battle);
    }

    #[test]
    fn leaving_during_battle_keeps_turn_on_same_player() {
        let mut state = in_battle(&["ねこ", "いぬ", "とり"]);
        state.room.current_player_index = 2;
        let acting = current(&state);

        let next = remove_player(&state, state.players[0].id).unwrap();
        assert_eq!(current(&next), acting);
        assert_eq!(next.room.phase, GamePhase::Battle);
    }

    #[test]
    fn leaving_duel_crowns_the_opponent() {
        let state = in_battle(&["ねこ", "いぬ"]);
        let stayer = state.players[1].id;
        let next = remove_player(&state, state.players[0].id).unwrap();
        assert_eq!(next.room.phase, GamePhase::GameOver);
        assert_eq!(next.room.winner_id, Some(stayer));
        assert!(next.players[0].is_winner);
    }
}
