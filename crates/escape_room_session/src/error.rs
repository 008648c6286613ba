//! Workflow error types.

use derive_more::Display;

use crate::{Action, ApiError, UserId};

/// An action was invoked out of order.
#[derive(Debug, Clone, PartialEq, Eq, Display)]
pub enum PreconditionError {
    /// No user exists in this session.
    #[display("no user")]
    NoUser,

    /// The game request names a different user than the session's.
    #[display("no user: request is for user {requested}, session user is {current}")]
    UserMismatch {
        /// User id carried by the request.
        requested: UserId,
        /// User id of the session.
        current: UserId,
    },

    /// No game has been started.
    #[display("no game")]
    NoGame,

    /// No puzzle is active.
    #[display("no puzzle")]
    NoPuzzle,
}

impl std::error::Error for PreconditionError {}

/// Error returned by a [`SessionWorkflow`](crate::SessionWorkflow) action.
///
/// Every variant leaves the session usable; retrying is always allowed.
#[derive(Debug, Clone, PartialEq, Eq, Display)]
pub enum WorkflowError {
    /// Action invoked out of order. No backend call was made.
    #[display("Precondition failed: {}", _0)]
    Precondition(PreconditionError),

    /// Creating the user failed.
    #[display("User creation failed: {}", _0)]
    UserCreation(ApiError),

    /// Creating the game failed.
    #[display("Game creation failed: {}", _0)]
    GameCreation(ApiError),

    /// Generating a puzzle failed.
    #[display("Puzzle generation failed: {}", _0)]
    PuzzleGeneration(ApiError),

    /// Checking the answer failed.
    #[display("Answer check failed: {}", _0)]
    AnswerCheck(ApiError),

    /// The same action is already waiting on the backend.
    #[display("{} is already in progress", _0)]
    InFlight(Action),

    /// The session was reset or moved on while the call was pending; its result was dropped.
    #[display("{} result discarded: session changed while the request was pending", _0)]
    Discarded(Action),
}

impl std::error::Error for WorkflowError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Precondition(err) => Some(err),
            Self::UserCreation(err)
            | Self::GameCreation(err)
            | Self::PuzzleGeneration(err)
            | Self::AnswerCheck(err) => Some(err),
            Self::InFlight(_) | Self::Discarded(_) => None,
        }
    }
}

impl From<PreconditionError> for WorkflowError {
    fn from(err: PreconditionError) -> Self {
        Self::Precondition(err)
    }
}

impl WorkflowError {
    /// Returns the underlying backend error, if this was a backend failure.
    pub fn api_error(&self) -> Option<&ApiError> {
        match self {
            Self::UserCreation(err)
            | Self::GameCreation(err)
            | Self::PuzzleGeneration(err)
            | Self::AnswerCheck(err) => Some(err),
            _ => None,
        }
    }

    /// Returns a message suitable for showing to the player.
    pub fn user_message(&self) -> String {
        match self {
            Self::Precondition(PreconditionError::NoUser)
            | Self::Precondition(PreconditionError::UserMismatch { .. }) => {
                "Create a user before starting a game.".to_string()
            }
            Self::Precondition(PreconditionError::NoGame) => {
                "Start a game before asking for a puzzle.".to_string()
            }
            Self::Precondition(PreconditionError::NoPuzzle) => {
                "There is no puzzle to answer yet.".to_string()
            }
            Self::UserCreation(err)
            | Self::GameCreation(err)
            | Self::PuzzleGeneration(err)
            | Self::AnswerCheck(err) => err.message(),
            Self::InFlight(action) => format!("Still waiting on {}.", action),
            Self::Discarded(_) => "The session was reset; the response was ignored.".to_string(),
        }
    }
}
