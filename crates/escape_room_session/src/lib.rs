//! Client-side session workflow for the escape room puzzle game.
//!
//! The backend owns puzzle generation and answer checking. This crate owns
//! the order in which a client may ask for them: a user before a game, a
//! game before a puzzle, a puzzle before an answer.
//!
//! # Example
//!
//! ```no_run
//! use escape_room_session::{ApiClient, Credentials, Difficulty, GameRequest, PersistedSession, SessionWorkflow};
//!
//! # async fn example(client: impl ApiClient) -> Result<(), escape_room_session::WorkflowError> {
//! let workflow = SessionWorkflow::new(client, PersistedSession::default());
//! let user = workflow
//!     .ensure_user(&Credentials::new("ada".into(), "ada@example.com".into(), "pw".into()))
//!     .await?;
//! workflow
//!     .start_game(GameRequest::new(*user.id(), "space".into(), Difficulty::Medium, "teen".into()))
//!     .await?;
//! let puzzle = workflow.next_puzzle().await?;
//! println!("{}", puzzle.question());
//! let verdict = workflow.submit_answer("4").await?;
//! println!("correct: {}", verdict.correct());
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![forbid(unsafe_code)]

mod api;
mod error;
mod observer;
mod persist;
mod state;
mod types;
mod workflow;

pub use api::{ApiClient, ApiError};
pub use error::{PreconditionError, WorkflowError};
pub use observer::{Action, SessionObserver, TracingObserver};
pub use persist::{KeyValueStore, MemoryStore, PersistedSession, SESSION_KEY, StoreError};
pub use state::{Phase, SessionState};
pub use types::{
    AnswerSubmission, Credentials, Difficulty, Feedback, Game, GameId, GameRequest,
    InvalidDifficulty, Puzzle, PuzzleId, User, UserId, Verdict,
};
pub use workflow::SessionWorkflow;
