//! Domain types exchanged between the session workflow and the backend.

use derive_getters::Getters;
use derive_more::{Display, From};
use derive_new::new;
use serde::{Deserialize, Serialize};
use strum::{EnumIter, IntoEnumIterator};
use tracing::instrument;

/// Backend-assigned user identifier.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Display, From, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct UserId(pub i64);

/// Backend-assigned game identifier.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Display, From, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct GameId(pub i64);

/// Backend-assigned puzzle identifier.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Display, From, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct PuzzleId(pub i64);

/// Sign-up details sent when creating a user.
#[derive(Clone, PartialEq, Eq, Getters, Serialize, Deserialize, new)]
pub struct Credentials {
    username: String,
    email: String,
    password: String,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("email", &self.email)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// A player account as known to the backend.
#[derive(Debug, Clone, PartialEq, Eq, Getters, Serialize, Deserialize, new)]
pub struct User {
    id: UserId,
    username: String,
    email: String,
}

/// Puzzle difficulty. Travels over the wire as its integer level.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, EnumIter, Serialize, Deserialize,
)]
#[serde(into = "u8", try_from = "u8")]
pub enum Difficulty {
    /// Level 1.
    Easy = 1,
    /// Level 2.
    Medium = 2,
    /// Level 3.
    Hard = 3,
}

impl Difficulty {
    /// Returns the integer level used by the backend.
    pub fn level(self) -> u8 {
        self as u8
    }

    /// Returns the lowercase display name.
    pub fn name(self) -> &'static str {
        match self {
            Self::Easy => "easy",
            Self::Medium => "medium",
            Self::Hard => "hard",
        }
    }
}

impl From<Difficulty> for u8 {
    fn from(difficulty: Difficulty) -> Self {
        difficulty.level()
    }
}

impl TryFrom<u8> for Difficulty {
    type Error = InvalidDifficulty;

    fn try_from(level: u8) -> Result<Self, Self::Error> {
        Self::iter()
            .find(|d| d.level() == level)
            .ok_or_else(|| InvalidDifficulty(level.to_string()))
    }
}

impl std::str::FromStr for Difficulty {
    type Err = InvalidDifficulty;

    /// Accepts either the level (`1`..`3`) or the name, case-insensitively.
    #[instrument]
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        if let Ok(level) = trimmed.parse::<u8>() {
            return Self::try_from(level);
        }
        Self::iter()
            .find(|d| d.name().eq_ignore_ascii_case(trimmed))
            .ok_or_else(|| InvalidDifficulty(s.to_string()))
    }
}

impl std::fmt::Display for Difficulty {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Rejected difficulty value.
#[derive(Debug, Clone, PartialEq, Eq, Display)]
#[display("Invalid difficulty '{}': expected 1-3 or easy/medium/hard", _0)]
pub struct InvalidDifficulty(pub String);

impl std::error::Error for InvalidDifficulty {}

/// Parameters for creating a game.
#[derive(Debug, Clone, PartialEq, Eq, Getters, Serialize, Deserialize, new)]
pub struct GameRequest {
    user_id: UserId,
    theme: String,
    difficulty: Difficulty,
    age_group: String,
}

/// A game created by the backend.
#[derive(Debug, Clone, PartialEq, Eq, Getters, Serialize, Deserialize)]
pub struct Game {
    id: GameId,
    user_id: UserId,
    theme: String,
    difficulty: Difficulty,
    age_group: String,
}

impl Game {
    /// Builds a game from its backend id and the request that produced it.
    pub fn from_request(id: GameId, request: GameRequest) -> Self {
        Self {
            id,
            user_id: request.user_id,
            theme: request.theme,
            difficulty: request.difficulty,
            age_group: request.age_group,
        }
    }
}

/// A puzzle presented to the player. The answer stays on the backend.
#[derive(Debug, Clone, PartialEq, Eq, Getters, Serialize, Deserialize, new)]
pub struct Puzzle {
    id: PuzzleId,
    question: String,
    #[serde(default)]
    hints: Option<String>,
}

/// An answer attempt for a puzzle.
#[derive(Debug, Clone, PartialEq, Eq, Getters, Serialize, Deserialize, new)]
pub struct AnswerSubmission {
    puzzle_id: PuzzleId,
    answer: String,
}

/// The backend's judgement of an answer.
#[derive(Debug, Clone, PartialEq, Eq, Getters, Serialize, Deserialize, new)]
pub struct Verdict {
    correct: bool,
    /// Optional human-readable feedback, e.g. "Incorrect. Try again! You're close!".
    message: Option<String>,
}

impl Verdict {
    /// Maps the verdict to the feedback recorded in session state.
    pub fn feedback(&self) -> Feedback {
        if self.correct {
            Feedback::Correct
        } else {
            Feedback::Incorrect
        }
    }
}

/// Outcome of the last answer submission.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Feedback {
    /// The answer solved the puzzle.
    #[display("correct")]
    Correct,
    /// The answer was wrong; the puzzle stays active.
    #[display("incorrect")]
    Incorrect,
}
