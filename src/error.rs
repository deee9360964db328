use axum::{Json, http::StatusCode, response::IntoResponse};
use thiserror::Error;
use validator::ValidationErrors;

use crate::{
    dao::storage::StorageError,
    dto::room::ErrorBody,
    state::state_machine::{GamePhase, InvalidTransition},
};

/// Failures surfaced to a player by the game rules or the room lifecycle.
#[derive(Debug, Error)]
pub enum GameError {
    /// Input was rejected before any state changed (bad word, bad kana, bad room code).
    #[error("{0}")]
    Validation(String),
    /// No room exists under the requested code.
    #[error("room not found")]
    RoomNotFound,
    /// The room already holds the maximum number of players.
    #[error("room is full")]
    RoomFull,
    /// Players can only join while the room is in the lobby.
    #[error("game already started")]
    GameAlreadyStarted,
    /// Every random room code drawn was already taken.
    #[error("could not allocate a free room code after {attempts} attempts")]
    RoomCodeExhausted {
        /// Codes tried.
        attempts: u32,
    },
    /// Every attempt to repair the room on the way out lost a race with another writer.
    #[error("could not leave the room cleanly after {attempts} attempts")]
    LeaveContended {
        /// Repair writes tried.
        attempts: u32,
    },
    /// The client is not currently inside a room.
    #[error("not in a room")]
    NotInRoom,
    /// Only the host may perform this action.
    #[error("only the host can do that")]
    NotHost,
    /// At least two players are needed to start.
    #[error("at least {required} players are required (got {actual})")]
    NotEnoughPlayers {
        /// Minimum player count.
        required: usize,
        /// Current player count.
        actual: usize,
    },
    /// It is another player's turn.
    #[error("it is not your turn")]
    NotYourTurn,
    /// The acting player is not part of the room.
    #[error("player is not in this room")]
    UnknownPlayer,
    /// This kana was already attacked by someone.
    #[error("`{0}` has already been attacked")]
    KanaAlreadyAttacked(char),
    /// The player already submitted a word for this round.
    #[error("word already submitted")]
    WordAlreadySubmitted,
    /// The action belongs to another phase.
    #[error("not allowed during {actual:?} (requires {expected:?})")]
    WrongPhase {
        /// Phase the action requires.
        expected: GamePhase,
        /// Phase the room is in.
        actual: GamePhase,
    },
    /// The phase change is not valid from the room's current phase.
    #[error(transparent)]
    InvalidTransition(#[from] InvalidTransition),
    /// No backing store is configured; multiplayer is disabled.
    #[error("room store unavailable")]
    StoreUnavailable,
    /// The backing store failed.
    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Errors that can occur in service layer operations.
#[derive(Debug, Error)]
pub enum ServiceError {
    /// Storage backend is unavailable.
    #[error("storage unavailable")]
    Unavailable(#[source] StorageError),
    /// Application is running in degraded mode without storage.
    #[error("storage unavailable (degraded mode)")]
    Degraded,
    /// Invalid input provided by the client.
    #[error("invalid input: {0}")]
    InvalidInput(String),
    /// The write conflicts with the stored state.
    #[error("conflict: {0}")]
    Conflict(String),
    /// Requested resource was not found.
    #[error("not found: {0}")]
    NotFound(String),
}

impl From<StorageError> for ServiceError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::Conflict { message } => ServiceError::Conflict(message),
            StorageError::NotFound { message } => ServiceError::NotFound(message),
            other => ServiceError::Unavailable(other),
        }
    }
}

impl From<ValidationErrors> for GameError {
    fn from(err: ValidationErrors) -> Self {
        GameError::Validation(err.to_string())
    }
}

impl From<ValidationErrors> for AppError {
    fn from(err: ValidationErrors) -> Self {
        AppError::BadRequest(format!("validation failed: {}", err))
    }
}

/// Application-level errors that are converted to HTTP responses.
#[derive(Debug, Error)]
pub enum AppError {
    /// Bad request with invalid input.
    #[error("bad request: {0}")]
    BadRequest(String),
    /// Requested resource not found.
    #[error("not found: {0}")]
    NotFound(String),
    /// Conflict with current state.
    #[error("conflict: {0}")]
    Conflict(String),
    /// Service unavailable or degraded.
    #[error("service unavailable: {0}")]
    ServiceUnavailable(String),
}

impl From<ServiceError> for AppError {
    fn from(err: ServiceError) -> Self {
        match err {
            ServiceError::Unavailable(source) => AppError::ServiceUnavailable(source.to_string()),
            ServiceError::Degraded => AppError::ServiceUnavailable("degraded mode".into()),
            ServiceError::InvalidInput(message) => AppError::BadRequest(message),
            ServiceError::Conflict(message) => AppError::Conflict(message),
            ServiceError::NotFound(message) => AppError::NotFound(message),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> axum::response::Response {
        let status = match &self {
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::ServiceUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
        };

        let payload = Json(ErrorBody {
            message: self.to_string(),
        });

        (status, payload).into_response()
    }
}
