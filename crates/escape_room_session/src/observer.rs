//! Observer hook for workflow telemetry.

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::{SessionState, WorkflowError};

/// The four workflow transitions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, strum::Display)]
#[strum(serialize_all = "snake_case")]
pub enum Action {
    /// Create (or reuse) the session user.
    EnsureUser,
    /// Create a game.
    StartGame,
    /// Request the next puzzle.
    NextPuzzle,
    /// Submit an answer for the active puzzle.
    SubmitAnswer,
}

/// Receives workflow events. All methods default to no-ops.
pub trait SessionObserver: Send + Sync {
    /// An action passed its preconditions and is about to call the backend.
    fn action_started(&self, _action: Action) {}

    /// An action completed and the state was updated.
    fn action_succeeded(&self, _action: Action, _state: &SessionState) {}

    /// An action failed; the state is unchanged.
    fn action_failed(&self, _action: Action, _error: &WorkflowError) {}

    /// A backend result arrived for a session that has since been reset.
    fn result_discarded(&self, _action: Action) {}
}

/// Observer that emits structured `tracing` events.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingObserver;

impl SessionObserver for TracingObserver {
    fn action_started(&self, action: Action) {
        debug!(%action, "Workflow action started");
    }

    fn action_succeeded(&self, action: Action, state: &SessionState) {
        info!(
            %action,
            phase = %state.phase(),
            user_id = ?state.user().as_ref().map(|u| *u.id()),
            game_id = ?state.game().as_ref().map(|g| *g.id()),
            puzzle_id = ?state.puzzle().as_ref().map(|p| *p.id()),
            feedback = ?state.last_feedback(),
            "Workflow action succeeded"
        );
    }

    fn action_failed(&self, action: Action, error: &WorkflowError) {
        warn!(%action, error = %error, "Workflow action failed");
    }

    fn result_discarded(&self, action: Action) {
        warn!(%action, "Discarding result for a session that changed");
    }
}
