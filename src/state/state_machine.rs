use serde::{Deserialize, Serialize};
use thiserror::Error;
use utoipa::ToSchema;

/// High-level phases a room can be in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "UPPERCASE")]
pub enum GamePhase {
    /// Players gather and the host picks a theme.
    Lobby,
    /// Every player privately submits a word.
    Input,
    /// Players take turns attacking kana.
    Battle,
    /// A winner (or a draw) has been declared; waiting for the host to restart.
    GameOver,
}

/// Events that move a room between phases.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PhaseEvent {
    /// Host starts the game from the lobby.
    StartGame,
    /// Every current player has submitted a word.
    AllWordsSubmitted,
    /// At most one player is left standing.
    LastPlayerStanding,
    /// Host sends everybody back to the lobby.
    Restart,
}

/// Error returned when attempting to apply an invalid transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("invalid transition: {event:?} cannot be applied while in {from:?}")]
pub struct InvalidTransition {
    /// The phase the room was in when the invalid event was received.
    pub from: GamePhase,
    /// The event that cannot be applied from this phase.
    pub event: PhaseEvent,
}

impl GamePhase {
    /// Compute the phase reached by applying `event`, if the transition is valid.
    pub fn apply(self, event: PhaseEvent) -> Result<GamePhase, InvalidTransition> {
        let next = match (self, event) {
            (GamePhase::Lobby, PhaseEvent::StartGame) => GamePhase::Input,
            (GamePhase::Input, PhaseEvent::AllWordsSubmitted) => GamePhase::Battle,
            (GamePhase::Battle, PhaseEvent::LastPlayerStanding) => GamePhase::GameOver,
            (GamePhase::GameOver, PhaseEvent::Restart) => GamePhase::Lobby,
            (from, event) => return Err(InvalidTransition { from, event }),
        };
        Ok(next)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn full_happy_path_through_game() {
        let mut phase = GamePhase::Lobby;
        for (event, expected) in [
            (PhaseEvent::StartGame, GamePhase::Input),
            (PhaseEvent::AllWordsSubmitted, GamePhase::Battle),
            (PhaseEvent::LastPlayerStanding, GamePhase::GameOver),
            (PhaseEvent::Restart, GamePhase::Lobby),
        ] {
            phase = phase.apply(event).unwrap();
            assert_eq!(phase, expected);
        }
    }

    #[test]
    fn invalid_transition_returns_error() {
        let err = GamePhase::Lobby
            .apply(PhaseEvent::AllWordsSubmitted)
            .unwrap_err();
        assert_eq!(err.from, GamePhase::Lobby);
        assert_eq!(err.event, PhaseEvent::AllWordsSubmitted);
    }

    #[test]
    fn phases_cannot_go_backwards() {
        assert!(GamePhase::Battle.apply(PhaseEvent::StartGame).is_err());
        assert!(GamePhase::Input.apply(PhaseEvent::Restart).is_err());
        assert!(GamePhase::GameOver.apply(PhaseEvent::StartGame).is_err());
    }

    #[test]
    fn phase_serializes_as_uppercase() {
        assert_eq!(
            serde_json::to_string(&GamePhase::GameOver).unwrap(),
            "\"GAMEOVER\""
        );
        assert_eq!(
            serde_json::from_str::<GamePhase>("\"LOBBY\"").unwrap(),
            GamePhase::Lobby
        );
    }
}
