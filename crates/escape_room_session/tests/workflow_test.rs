//! Tests for the session workflow state machine.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use escape_room_session::{
    Action, AnswerSubmission, ApiClient, ApiError, Credentials, Difficulty, Feedback, GameId,
    GameRequest, MemoryStore, PersistedSession, Phase, PreconditionError, Puzzle, PuzzleId,
    SessionObserver, SessionState, SessionWorkflow, User, UserId, Verdict, WorkflowError,
};

/// Backend double that replays scripted responses and records every call.
#[derive(Default)]
struct ScriptedBackend {
    calls: Mutex<Vec<&'static str>>,
    users: Mutex<VecDeque<Result<User, ApiError>>>,
    games: Mutex<VecDeque<Result<GameId, ApiError>>>,
    puzzles: Mutex<VecDeque<Result<Puzzle, ApiError>>>,
    verdicts: Mutex<VecDeque<Result<Verdict, ApiError>>>,
    /// Held by a test to keep calls pending.
    pause: tokio::sync::Mutex<()>,
}

impl ScriptedBackend {
    fn user(self, response: Result<User, ApiError>) -> Self {
        self.users.lock().unwrap().push_back(response);
        self
    }

    fn game(self, response: Result<GameId, ApiError>) -> Self {
        self.games.lock().unwrap().push_back(response);
        self
    }

    fn puzzle(self, response: Result<Puzzle, ApiError>) -> Self {
        self.puzzles.lock().unwrap().push_back(response);
        self
    }

    fn verdict(self, response: Result<Verdict, ApiError>) -> Self {
        self.verdicts.lock().unwrap().push_back(response);
        self
    }

    fn calls(&self, op: &str) -> usize {
        self.calls.lock().unwrap().iter().filter(|c| **c == op).count()
    }

    fn total_calls(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    async fn respond<T>(
        &self,
        op: &'static str,
        queue: &Mutex<VecDeque<Result<T, ApiError>>>,
    ) -> Result<T, ApiError> {
        self.calls.lock().unwrap().push(op);
        let _ = self.pause.lock().await;
        queue
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(ApiError::local(format!("unscripted {op}"))))
    }
}

#[async_trait::async_trait]
impl ApiClient for ScriptedBackend {
    async fn create_user(&self, _credentials: &Credentials) -> Result<User, ApiError> {
        self.respond("create_user", &self.users).await
    }

    async fn create_game(&self, _request: &GameRequest) -> Result<GameId, ApiError> {
        self.respond("create_game", &self.games).await
    }

    async fn generate_puzzle(&self, _game_id: GameId) -> Result<Puzzle, ApiError> {
        self.respond("generate_puzzle", &self.puzzles).await
    }

    async fn check_answer(&self, _submission: &AnswerSubmission) -> Result<Verdict, ApiError> {
        self.respond("check_answer", &self.verdicts).await
    }
}

/// Observer that records event names.
#[derive(Default)]
struct RecordingObserver {
    events: Mutex<Vec<String>>,
}

impl SessionObserver for RecordingObserver {
    fn action_started(&self, action: Action) {
        self.events.lock().unwrap().push(format!("started:{action}"));
    }

    fn action_succeeded(&self, action: Action, _state: &SessionState) {
        self.events.lock().unwrap().push(format!("succeeded:{action}"));
    }

    fn action_failed(&self, action: Action, _error: &WorkflowError) {
        self.events.lock().unwrap().push(format!("failed:{action}"));
    }

    fn result_discarded(&self, action: Action) {
        self.events.lock().unwrap().push(format!("discarded:{action}"));
    }
}

fn credentials() -> Credentials {
    Credentials::new("a".into(), "a@x.com".into(), "p".into())
}

fn user7() -> User {
    User::new(UserId(7), "a".into(), "a@x.com".into())
}

fn space_game(user_id: i64) -> GameRequest {
    GameRequest::new(UserId(user_id), "space".into(), Difficulty::Medium, "teen".into())
}

fn puzzle100() -> Puzzle {
    Puzzle::new(PuzzleId(100), "2+2?".into(), None)
}

fn workflow(backend: ScriptedBackend) -> SessionWorkflow<Arc<ScriptedBackend>> {
    SessionWorkflow::new(Arc::new(backend), PersistedSession::default())
}

#[tokio::test]
async fn test_full_session_solves_puzzle() {
    let wf = workflow(
        ScriptedBackend::default()
            .user(Ok(user7()))
            .game(Ok(GameId(42)))
            .puzzle(Ok(puzzle100()))
            .verdict(Ok(Verdict::new(true, Some("Correct!".into())))),
    );

    let user = wf.ensure_user(&credentials()).await.expect("user");
    assert_eq!(*user.id(), UserId(7));

    let game = wf.start_game(space_game(7)).await.expect("game");
    assert_eq!(*game.id(), GameId(42));
    assert_eq!(game.theme(), "space");

    let puzzle = wf.next_puzzle().await.expect("puzzle");
    assert_eq!(puzzle.question(), "2+2?");

    let verdict = wf.submit_answer("4").await.expect("verdict");
    assert!(*verdict.correct());

    let state = wf.state();
    assert!(state.puzzle().is_none());
    assert_eq!(*state.last_feedback(), Some(Feedback::Correct));
    assert_eq!(state.game().as_ref().map(|g| *g.id()), Some(GameId(42)));
    assert_eq!(wf.phase(), Phase::HasGame);
    assert_eq!(wf.client().total_calls(), 4);
}

#[tokio::test]
async fn test_start_game_without_user_makes_no_call() {
    let wf = workflow(ScriptedBackend::default().game(Ok(GameId(42))));

    let err = wf.start_game(space_game(7)).await.unwrap_err();
    assert_eq!(err, WorkflowError::Precondition(PreconditionError::NoUser));
    assert_eq!(wf.client().total_calls(), 0);
    assert_eq!(wf.state(), SessionState::default());
}

#[tokio::test]
async fn test_start_game_for_other_user_is_rejected() {
    let wf = workflow(ScriptedBackend::default().user(Ok(user7())));
    wf.ensure_user(&credentials()).await.expect("user");

    let err = wf.start_game(space_game(8)).await.unwrap_err();
    assert!(matches!(
        err,
        WorkflowError::Precondition(PreconditionError::UserMismatch { .. })
    ));
    assert_eq!(wf.client().calls("create_game"), 0);
    assert_eq!(wf.phase(), Phase::HasUser);
}

#[tokio::test]
async fn test_next_puzzle_requires_game() {
    let wf = workflow(ScriptedBackend::default().user(Ok(user7())));
    wf.ensure_user(&credentials()).await.expect("user");

    let err = wf.next_puzzle().await.unwrap_err();
    assert_eq!(err, WorkflowError::Precondition(PreconditionError::NoGame));
    assert_eq!(wf.client().calls("generate_puzzle"), 0);
}

#[tokio::test]
async fn test_submit_answer_requires_puzzle() {
    let wf = workflow(
        ScriptedBackend::default()
            .user(Ok(user7()))
            .game(Ok(GameId(42))),
    );
    wf.ensure_user(&credentials()).await.expect("user");
    wf.start_game(space_game(7)).await.expect("game");

    let err = wf.submit_answer("4").await.unwrap_err();
    assert_eq!(err, WorkflowError::Precondition(PreconditionError::NoPuzzle));
    assert_eq!(wf.client().calls("check_answer"), 0);
}

#[tokio::test]
async fn test_ensure_user_twice_creates_once() {
    let wf = workflow(ScriptedBackend::default().user(Ok(user7())));

    let first = wf.ensure_user(&credentials()).await.expect("first");
    let second = wf.ensure_user(&credentials()).await.expect("second");
    assert_eq!(first, second);
    assert_eq!(wf.client().calls("create_user"), 1);
}

#[tokio::test]
async fn test_concurrent_ensure_user_is_coalesced() {
    let wf = workflow(ScriptedBackend::default().user(Ok(user7())));
    let creds = credentials();
    let held = wf.client().pause.lock().await;

    let (a, b, ()) = tokio::join!(wf.ensure_user(&creds), wf.ensure_user(&creds), async {
        tokio::task::yield_now().await;
        drop(held);
    });

    assert_eq!(a.expect("a"), user7());
    assert_eq!(b.expect("b"), user7());
    assert_eq!(wf.client().calls("create_user"), 1);
}

#[tokio::test]
async fn test_pending_user_creation_is_in_flight() {
    let wf = workflow(ScriptedBackend::default().user(Ok(user7())));
    let creds = credentials();
    assert!(!wf.is_in_flight(Action::EnsureUser));
    let held = wf.client().pause.lock().await;

    let (a, b, ()) = tokio::join!(wf.ensure_user(&creds), wf.ensure_user(&creds), async {
        tokio::task::yield_now().await;
        assert!(wf.is_in_flight(Action::EnsureUser));
        drop(held);
    });

    assert_eq!(a.expect("a"), user7());
    assert_eq!(b.expect("b"), user7());
    assert!(!wf.is_in_flight(Action::EnsureUser));
}

#[tokio::test]
async fn test_failed_user_creation_can_be_retried() {
    let wf = workflow(
        ScriptedBackend::default()
            .user(Err(ApiError::no_response("connection refused")))
            .user(Ok(user7())),
    );

    let err = wf.ensure_user(&credentials()).await.unwrap_err();
    assert!(matches!(err, WorkflowError::UserCreation(ApiError::NoResponse { .. })));
    assert_eq!(wf.phase(), Phase::NoUser);

    wf.ensure_user(&credentials()).await.expect("retry");
    assert_eq!(wf.phase(), Phase::HasUser);
}

#[tokio::test]
async fn test_game_creation_failure_keeps_state() {
    let wf = workflow(
        ScriptedBackend::default()
            .user(Ok(user7()))
            .game(Err(ApiError::status(422, Some("theme too long".into())))),
    );
    wf.ensure_user(&credentials()).await.expect("user");
    let before = wf.state();

    let err = wf.start_game(space_game(7)).await.unwrap_err();
    match &err {
        WorkflowError::GameCreation(api) => assert_eq!(api.detail(), Some("theme too long")),
        other => panic!("unexpected error: {other:?}"),
    }
    assert_eq!(err.user_message(), "theme too long");
    assert_eq!(wf.state(), before);
}

#[tokio::test]
async fn test_puzzle_failure_keeps_previous_puzzle() {
    let wf = workflow(
        ScriptedBackend::default()
            .user(Ok(user7()))
            .game(Ok(GameId(42)))
            .puzzle(Ok(puzzle100()))
            .puzzle(Err(ApiError::status(404, Some("game not found".into())))),
    );
    wf.ensure_user(&credentials()).await.expect("user");
    wf.start_game(space_game(7)).await.expect("game");
    wf.next_puzzle().await.expect("first puzzle");

    let err = wf.next_puzzle().await.unwrap_err();
    let api = err.api_error().expect("backend error");
    assert!(matches!(err, WorkflowError::PuzzleGeneration(_)));
    assert_eq!(api.detail(), Some("game not found"));
    assert!(api.response_received());
    assert_eq!(wf.state().puzzle(), &Some(puzzle100()));
}

#[tokio::test]
async fn test_incorrect_answer_keeps_puzzle() {
    let wf = workflow(
        ScriptedBackend::default()
            .user(Ok(user7()))
            .game(Ok(GameId(42)))
            .puzzle(Ok(puzzle100()))
            .verdict(Ok(Verdict::new(false, Some("Incorrect. Try again!".into())))),
    );
    wf.ensure_user(&credentials()).await.expect("user");
    wf.start_game(space_game(7)).await.expect("game");
    wf.next_puzzle().await.expect("puzzle");

    let verdict = wf.submit_answer("5").await.expect("verdict");
    assert!(!*verdict.correct());

    let state = wf.state();
    assert_eq!(state.puzzle(), &Some(puzzle100()));
    assert_eq!(*state.last_feedback(), Some(Feedback::Incorrect));
}

#[tokio::test]
async fn test_answer_check_failure_keeps_puzzle() {
    let wf = workflow(
        ScriptedBackend::default()
            .user(Ok(user7()))
            .game(Ok(GameId(42)))
            .puzzle(Ok(puzzle100()))
            .verdict(Err(ApiError::local("invalid JSON"))),
    );
    wf.ensure_user(&credentials()).await.expect("user");
    wf.start_game(space_game(7)).await.expect("game");
    wf.next_puzzle().await.expect("puzzle");

    let err = wf.submit_answer("4").await.unwrap_err();
    assert!(matches!(err, WorkflowError::AnswerCheck(ApiError::Local { .. })));
    assert_eq!(wf.phase(), Phase::HasPuzzle);
    assert!(wf.state().last_feedback().is_none());
}

#[tokio::test]
async fn test_new_puzzle_clears_feedback() {
    let wf = workflow(
        ScriptedBackend::default()
            .user(Ok(user7()))
            .game(Ok(GameId(42)))
            .puzzle(Ok(puzzle100()))
            .verdict(Ok(Verdict::new(true, None)))
            .puzzle(Ok(Puzzle::new(PuzzleId(101), "3+3?".into(), Some("double three".into())))),
    );
    wf.ensure_user(&credentials()).await.expect("user");
    wf.start_game(space_game(7)).await.expect("game");
    wf.next_puzzle().await.expect("puzzle");
    wf.submit_answer("4").await.expect("verdict");

    let next = wf.next_puzzle().await.expect("next puzzle");
    assert_eq!(*next.id(), PuzzleId(101));
    assert!(wf.state().last_feedback().is_none());
}

#[tokio::test]
async fn test_duplicate_start_game_is_rejected_while_pending() {
    let wf = workflow(
        ScriptedBackend::default()
            .user(Ok(user7()))
            .game(Ok(GameId(42))),
    );
    wf.ensure_user(&credentials()).await.expect("user");
    let held = wf.client().pause.lock().await;

    let (first, second, ()) = tokio::join!(
        wf.start_game(space_game(7)),
        async {
            assert!(wf.is_in_flight(Action::StartGame));
            wf.start_game(space_game(7)).await
        },
        async {
            tokio::task::yield_now().await;
            drop(held);
        }
    );

    assert_eq!(*first.expect("first").id(), GameId(42));
    assert_eq!(second.unwrap_err(), WorkflowError::InFlight(Action::StartGame));
    assert_eq!(wf.client().calls("create_game"), 1);
    assert!(!wf.is_in_flight(Action::StartGame));
}

#[tokio::test]
async fn test_reset_discards_pending_result() {
    let wf = workflow(
        ScriptedBackend::default()
            .user(Ok(user7()))
            .game(Ok(GameId(42)))
            .puzzle(Ok(puzzle100())),
    );
    wf.ensure_user(&credentials()).await.expect("user");
    wf.start_game(space_game(7)).await.expect("game");
    let held = wf.client().pause.lock().await;

    let (result, ()) = tokio::join!(wf.next_puzzle(), async {
        tokio::task::yield_now().await;
        wf.reset();
        drop(held);
    });

    assert_eq!(result.unwrap_err(), WorkflowError::Discarded(Action::NextPuzzle));
    assert_eq!(wf.state(), SessionState::default());
}

#[tokio::test]
async fn test_reset_allows_new_user() {
    let wf = workflow(
        ScriptedBackend::default()
            .user(Ok(user7()))
            .user(Ok(User::new(UserId(8), "b".into(), "b@x.com".into()))),
    );
    wf.ensure_user(&credentials()).await.expect("user");
    wf.reset();
    let user = wf.ensure_user(&credentials()).await.expect("second user");
    assert_eq!(*user.id(), UserId(8));
    assert_eq!(wf.client().calls("create_user"), 2);
}

#[tokio::test]
async fn test_persisted_user_skips_creation() {
    let store = MemoryStore::new();
    PersistedSession::new(Some(user7())).save(&store).expect("save");

    let persisted = PersistedSession::load(&store).expect("load");
    let wf = SessionWorkflow::new(Arc::new(ScriptedBackend::default()), persisted);
    assert_eq!(wf.phase(), Phase::HasUser);

    let user = wf.ensure_user(&credentials()).await.expect("user");
    assert_eq!(user, user7());
    assert_eq!(wf.client().total_calls(), 0);
    assert_eq!(wf.persisted().user(), &Some(user7()));
}

#[tokio::test]
async fn test_observer_sees_each_outcome() {
    let observer = Arc::new(RecordingObserver::default());
    let wf = workflow(ScriptedBackend::default().user(Err(ApiError::status(500, None))))
        .with_observer(observer.clone());

    let _ = wf.next_puzzle().await;
    let _ = wf.ensure_user(&credentials()).await;

    let events = observer.events.lock().unwrap().clone();
    assert_eq!(
        events,
        ["failed:next_puzzle", "started:ensure_user", "failed:ensure_user"]
    );
}

#[tokio::test]
async fn test_workflow_debug_shows_state() {
    let wf = workflow(ScriptedBackend::default().user(Ok(user7())));
    wf.ensure_user(&credentials()).await.expect("user");

    let debug = format!("{:?}", wf);
    assert!(debug.starts_with("SessionWorkflow"), "{debug}");
    assert!(debug.contains("a@x.com"), "{debug}");
    assert!(debug.contains("epoch: 0"), "{debug}");
}
