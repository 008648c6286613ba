//! The session workflow state machine.
//!
//! ```text
//! NoUser --ensure_user--> HasUser --start_game--> HasGame --next_puzzle--> HasPuzzle
//!                                                    ^                        |
//!                                                    +--- submit (correct) ---+
//!                                                         submit (incorrect) keeps HasPuzzle
//! ```
//!
//! Each action checks its precondition against the current state, makes at
//! most one backend call, and applies the result atomically. A failed action
//! leaves the state exactly as it was.

use std::collections::HashSet;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tracing::{debug, info, instrument};

use crate::{
    Action, AnswerSubmission, ApiClient, Credentials, Game, GameRequest, Phase, PersistedSession,
    PreconditionError, Puzzle, SessionObserver, SessionState, TracingObserver, User, Verdict,
    WorkflowError,
};

/// Drives one game-playing session against a backend.
///
/// All actions take `&self`; the workflow can be shared behind an [`Arc`]
/// between UI tasks. State is guarded by a mutex that is never held across
/// a backend call.
pub struct SessionWorkflow<C> {
    client: C,
    state: Mutex<SessionState>,
    /// Advanced by [`SessionWorkflow::reset`]; results from an older epoch are dropped.
    epoch: AtomicU64,
    /// Serializes user creation so concurrent callers share one attempt.
    user_gate: tokio::sync::Mutex<()>,
    in_flight: Mutex<HashSet<Action>>,
    observer: Arc<dyn SessionObserver>,
}

impl<C> std::fmt::Debug for SessionWorkflow<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionWorkflow")
            .field(
                "state",
                &*self.state.lock().unwrap_or_else(PoisonError::into_inner),
            )
            .field("epoch", &self.epoch.load(Ordering::SeqCst))
            .finish_non_exhaustive()
    }
}

/// Clears an action's in-flight flag when dropped, including on cancellation.
struct FlightGuard<'a> {
    flights: &'a Mutex<HashSet<Action>>,
    action: Action,
}

impl Drop for FlightGuard<'_> {
    fn drop(&mut self) {
        self.flights
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&self.action);
    }
}

impl<C: ApiClient> SessionWorkflow<C> {
    /// Creates a workflow. A persisted user puts the session straight into
    /// [`Phase::HasUser`].
    #[instrument(skip(client, persisted), fields(persisted_user = persisted.user().is_some()))]
    pub fn new(client: C, persisted: PersistedSession) -> Self {
        info!("Creating session workflow");
        Self {
            client,
            state: Mutex::new(SessionState::with_user(persisted.user().clone())),
            epoch: AtomicU64::new(0),
            user_gate: tokio::sync::Mutex::new(()),
            in_flight: Mutex::new(HashSet::new()),
            observer: Arc::new(TracingObserver),
        }
    }

    /// Replaces the observer.
    pub fn with_observer(mut self, observer: Arc<dyn SessionObserver>) -> Self {
        self.observer = observer;
        self
    }

    /// Returns the backend client.
    pub fn client(&self) -> &C {
        &self.client
    }

    /// Returns a snapshot of the session state.
    pub fn state(&self) -> SessionState {
        self.lock_state().clone()
    }

    /// Returns the current phase.
    pub fn phase(&self) -> Phase {
        self.lock_state().phase()
    }

    /// Returns the value to hand to the session store.
    pub fn persisted(&self) -> PersistedSession {
        PersistedSession::new(self.lock_state().user().clone())
    }

    /// Returns true if a call for `action` is pending.
    pub fn is_in_flight(&self, action: Action) -> bool {
        self.in_flight
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .contains(&action)
    }

    /// Discards the session. Results of calls still pending are ignored on arrival.
    #[instrument(skip(self))]
    pub fn reset(&self) {
        let mut state = self.lock_state();
        let epoch = self.epoch.fetch_add(1, Ordering::SeqCst) + 1;
        state.clear();
        info!(epoch, "Session reset");
    }

    /// Returns the session user, creating it on first use.
    ///
    /// Concurrent calls made before a user exists wait for a single creation
    /// attempt and all receive its user. [`Action::EnsureUser`] reports as in
    /// flight while that attempt is pending.
    ///
    /// # Errors
    ///
    /// [`WorkflowError::UserCreation`] if the backend call fails; the session
    /// stays in [`Phase::NoUser`].
    #[instrument(skip(self, credentials), fields(username = %credentials.username()))]
    pub async fn ensure_user(&self, credentials: &Credentials) -> Result<User, WorkflowError> {
        let action = Action::EnsureUser;

        if let Some(user) = self.lock_state().user().clone() {
            debug!(user_id = %user.id(), "User already exists");
            return Ok(user);
        }

        let _gate = self.user_gate.lock().await;

        // Another caller may have created the user while we waited.
        let epoch = {
            let state = self.lock_state();
            if let Some(user) = state.user().clone() {
                debug!(user_id = %user.id(), "Joined pending user creation");
                return Ok(user);
            }
            self.epoch.load(Ordering::SeqCst)
        };

        // Waiters queue on the gate, so the flag is always free here.
        let _flight = self.begin(action)?;
        self.observer.action_started(action);
        let user = match self.client.create_user(credentials).await {
            Ok(user) => user,
            Err(e) => return Err(self.fail(action, WorkflowError::UserCreation(e))),
        };

        self.commit(action, epoch, |state| {
            state.set_user(user.clone());
            Some(user)
        })
    }

    /// Creates a game for the session user.
    ///
    /// # Errors
    ///
    /// - [`WorkflowError::Precondition`] if there is no user or the request
    ///   names another user. The backend is not called.
    /// - [`WorkflowError::InFlight`] if a game creation is already pending.
    /// - [`WorkflowError::GameCreation`] if the backend call fails.
    #[instrument(skip(self), fields(user_id = %request.user_id(), difficulty = %request.difficulty()))]
    pub async fn start_game(&self, request: GameRequest) -> Result<Game, WorkflowError> {
        let action = Action::StartGame;

        let (epoch, user_id) = self.precondition(action, |state| {
            let user = state.user().as_ref().ok_or(PreconditionError::NoUser)?;
            if user.id() != request.user_id() {
                return Err(PreconditionError::UserMismatch {
                    requested: *request.user_id(),
                    current: *user.id(),
                });
            }
            Ok(*user.id())
        })?;
        let _flight = self.begin(action)?;

        self.observer.action_started(action);
        let game_id = match self.client.create_game(&request).await {
            Ok(id) => id,
            Err(e) => return Err(self.fail(action, WorkflowError::GameCreation(e))),
        };

        let game = Game::from_request(game_id, request);
        self.commit(action, epoch, |state| {
            if state.user().as_ref().map(|u| *u.id()) != Some(user_id) {
                return None;
            }
            state.set_game(game.clone());
            Some(game)
        })
    }

    /// Requests the next puzzle for the current game.
    ///
    /// # Errors
    ///
    /// - [`WorkflowError::Precondition`] if no game has been started.
    /// - [`WorkflowError::InFlight`] if a puzzle request is already pending.
    /// - [`WorkflowError::PuzzleGeneration`] if the backend call fails; any
    ///   previous puzzle remains active.
    #[instrument(skip(self))]
    pub async fn next_puzzle(&self) -> Result<Puzzle, WorkflowError> {
        let action = Action::NextPuzzle;

        let (epoch, game_id) = self.precondition(action, |state| {
            state
                .game()
                .as_ref()
                .map(|g| *g.id())
                .ok_or(PreconditionError::NoGame)
        })?;
        let _flight = self.begin(action)?;

        self.observer.action_started(action);
        let puzzle = match self.client.generate_puzzle(game_id).await {
            Ok(puzzle) => puzzle,
            Err(e) => return Err(self.fail(action, WorkflowError::PuzzleGeneration(e))),
        };

        self.commit(action, epoch, |state| {
            if state.game().as_ref().map(|g| *g.id()) != Some(game_id) {
                return None;
            }
            state.set_puzzle(puzzle.clone());
            Some(puzzle)
        })
    }

    /// Submits an answer for the active puzzle.
    ///
    /// A correct answer clears the puzzle; an incorrect one keeps it active.
    ///
    /// # Errors
    ///
    /// - [`WorkflowError::Precondition`] if no puzzle is active.
    /// - [`WorkflowError::InFlight`] if a submission is already pending.
    /// - [`WorkflowError::AnswerCheck`] if the backend call fails; the puzzle
    ///   stays active.
    #[instrument(skip(self, answer))]
    pub async fn submit_answer(&self, answer: impl Into<String>) -> Result<Verdict, WorkflowError> {
        let action = Action::SubmitAnswer;

        let (epoch, puzzle_id) = self.precondition(action, |state| {
            state
                .puzzle()
                .as_ref()
                .map(|p| *p.id())
                .ok_or(PreconditionError::NoPuzzle)
        })?;
        let _flight = self.begin(action)?;

        let submission = AnswerSubmission::new(puzzle_id, answer.into());
        self.observer.action_started(action);
        let verdict = match self.client.check_answer(&submission).await {
            Ok(verdict) => verdict,
            Err(e) => return Err(self.fail(action, WorkflowError::AnswerCheck(e))),
        };

        self.commit(action, epoch, |state| {
            if state.puzzle().as_ref().map(|p| *p.id()) != Some(puzzle_id) {
                return None;
            }
            state.record_feedback(verdict.feedback());
            Some(verdict)
        })
    }

    fn lock_state(&self) -> MutexGuard<'_, SessionState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Evaluates a precondition and captures the epoch it was checked in.
    fn precondition<T>(
        &self,
        action: Action,
        check: impl FnOnce(&SessionState) -> Result<T, PreconditionError>,
    ) -> Result<(u64, T), WorkflowError> {
        let result = {
            let state = self.lock_state();
            check(&state).map(|value| (self.epoch.load(Ordering::SeqCst), value))
        };
        result.map_err(|e| self.fail(action, e.into()))
    }

    fn begin(&self, action: Action) -> Result<FlightGuard<'_>, WorkflowError> {
        let inserted = self
            .in_flight
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(action);
        if !inserted {
            return Err(self.fail(action, WorkflowError::InFlight(action)));
        }
        Ok(FlightGuard {
            flights: &self.in_flight,
            action,
        })
    }

    /// Applies a backend result if the session has not moved on since the
    /// precondition was checked. `apply` returns `None` when the entity the
    /// call was made for is no longer current.
    fn commit<T>(
        &self,
        action: Action,
        epoch: u64,
        apply: impl FnOnce(&mut SessionState) -> Option<T>,
    ) -> Result<T, WorkflowError> {
        let mut state = self.lock_state();
        let applied = if self.epoch.load(Ordering::SeqCst) == epoch {
            apply(&mut state)
        } else {
            None
        };

        match applied {
            Some(value) => {
                let snapshot = state.clone();
                drop(state);
                self.observer.action_succeeded(action, &snapshot);
                Ok(value)
            }
            None => {
                drop(state);
                self.observer.result_discarded(action);
                Err(WorkflowError::Discarded(action))
            }
        }
    }

    fn fail(&self, action: Action, error: WorkflowError) -> WorkflowError {
        self.observer.action_failed(action, &error);
        error
    }
}
