//! Client-side session state.

use derive_getters::Getters;
use serde::{Deserialize, Serialize};

use crate::{Feedback, Game, Puzzle, User};

/// Coarse position of a session in the workflow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, strum::Display)]
#[strum(serialize_all = "snake_case")]
pub enum Phase {
    /// No user yet.
    NoUser,
    /// User exists, no game.
    HasUser,
    /// Game exists, awaiting a puzzle.
    HasGame,
    /// A puzzle is active.
    HasPuzzle,
}

/// Everything the client knows about the current session.
///
/// Ordering holds at all times: a puzzle implies a game, a game implies a user.
#[derive(Debug, Clone, Default, PartialEq, Eq, Getters, Serialize, Deserialize)]
pub struct SessionState {
    user: Option<User>,
    game: Option<Game>,
    puzzle: Option<Puzzle>,
    last_feedback: Option<Feedback>,
}

impl SessionState {
    /// Creates an empty session, optionally seeded with a known user.
    pub fn with_user(user: Option<User>) -> Self {
        Self {
            user,
            ..Self::default()
        }
    }

    /// Returns the current phase.
    pub fn phase(&self) -> Phase {
        match (&self.user, &self.game, &self.puzzle) {
            (_, Some(_), Some(_)) => Phase::HasPuzzle,
            (_, Some(_), None) => Phase::HasGame,
            (Some(_), None, _) => Phase::HasUser,
            (None, None, _) => Phase::NoUser,
        }
    }

    pub(crate) fn set_user(&mut self, user: User) {
        self.user = Some(user);
    }

    pub(crate) fn set_game(&mut self, game: Game) {
        self.game = Some(game);
        self.puzzle = None;
        self.last_feedback = None;
    }

    pub(crate) fn set_puzzle(&mut self, puzzle: Puzzle) {
        self.puzzle = Some(puzzle);
        self.last_feedback = None;
    }

    pub(crate) fn record_feedback(&mut self, feedback: Feedback) {
        if feedback == Feedback::Correct {
            self.puzzle = None;
        }
        self.last_feedback = Some(feedback);
    }

    pub(crate) fn clear(&mut self) {
        *self = Self::default();
    }
}
