//! Contract between the session workflow and the backend.
//!
//! The workflow only sees this trait; the HTTP binding lives in the
//! `escape_room` crate and tests substitute scripted fakes.

use std::sync::Arc;

use derive_more::Display;
use serde::{Deserialize, Serialize};

use crate::{AnswerSubmission, Credentials, GameId, GameRequest, Puzzle, User, Verdict};

/// Backend operations the session workflow depends on.
#[async_trait::async_trait]
pub trait ApiClient: Send + Sync {
    /// Creates a user account.
    async fn create_user(&self, credentials: &Credentials) -> Result<User, ApiError>;

    /// Creates a game and returns its id.
    async fn create_game(&self, request: &GameRequest) -> Result<GameId, ApiError>;

    /// Generates the next puzzle for a game.
    async fn generate_puzzle(&self, game_id: GameId) -> Result<Puzzle, ApiError>;

    /// Checks an answer against the puzzle's hidden solution.
    async fn check_answer(&self, submission: &AnswerSubmission) -> Result<Verdict, ApiError>;
}

#[async_trait::async_trait]
impl<T: ApiClient + ?Sized> ApiClient for Arc<T> {
    async fn create_user(&self, credentials: &Credentials) -> Result<User, ApiError> {
        (**self).create_user(credentials).await
    }

    async fn create_game(&self, request: &GameRequest) -> Result<GameId, ApiError> {
        (**self).create_game(request).await
    }

    async fn generate_puzzle(&self, game_id: GameId) -> Result<Puzzle, ApiError> {
        (**self).generate_puzzle(game_id).await
    }

    async fn check_answer(&self, submission: &AnswerSubmission) -> Result<Verdict, ApiError> {
        (**self).check_answer(submission).await
    }
}

/// Failure of a backend call, keeping the transport-level distinction.
#[derive(Debug, Clone, PartialEq, Eq, Display, Serialize, Deserialize)]
pub enum ApiError {
    /// The request was sent but no response arrived (refused, timed out, reset).
    #[display("No response from server: {message}")]
    NoResponse {
        /// Transport error description.
        message: String,
    },

    /// The server answered with a non-success status.
    #[display("Server returned {status}: {}", detail.as_deref().unwrap_or("no detail"))]
    Status {
        /// HTTP status code.
        status: u16,
        /// Detail reported by the server, if any.
        detail: Option<String>,
    },

    /// The request could not be built or the response could not be understood.
    #[display("Request failed: {message}")]
    Local {
        /// Local error description.
        message: String,
    },
}

impl std::error::Error for ApiError {}

impl ApiError {
    /// Creates a no-response error.
    pub fn no_response(message: impl Into<String>) -> Self {
        Self::NoResponse {
            message: message.into(),
        }
    }

    /// Creates an error-status error.
    pub fn status(status: u16, detail: Option<String>) -> Self {
        Self::Status { status, detail }
    }

    /// Creates a local error.
    pub fn local(message: impl Into<String>) -> Self {
        Self::Local {
            message: message.into(),
        }
    }

    /// Returns true if the server produced a response.
    pub fn response_received(&self) -> bool {
        matches!(self, Self::Status { .. })
    }

    /// Returns the HTTP status, if a response was received.
    pub fn status_code(&self) -> Option<u16> {
        match self {
            Self::Status { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Returns the server-reported detail, if any.
    pub fn detail(&self) -> Option<&str> {
        match self {
            Self::Status { detail, .. } => detail.as_deref(),
            _ => None,
        }
    }

    /// Returns a message suitable for showing to the player.
    ///
    /// Prefers the server detail and falls back to a description of the
    /// failure kind.
    pub fn message(&self) -> String {
        match self {
            Self::Status {
                detail: Some(detail),
                ..
            } => detail.clone(),
            Self::Status {
                status,
                detail: None,
            } => format!("The server rejected the request (HTTP {})", status),
            Self::NoResponse { .. } => {
                "The server did not respond. Check your connection and try again.".to_string()
            }
            Self::Local { message } => format!("The request could not be completed: {}", message),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn message_prefers_server_detail() {
        let err = ApiError::status(404, Some("game not found".into()));
        assert_eq!(err.message(), "game not found");
        assert!(err.response_received());
        assert_eq!(err.status_code(), Some(404));
    }

    #[test]
    fn no_response_has_fallback_message() {
        let err = ApiError::no_response("connection refused");
        assert!(!err.response_received());
        assert!(err.detail().is_none());
        assert!(err.message().contains("did not respond"));
        assert_eq!(err.to_string(), "No response from server: connection refused");
    }
}
