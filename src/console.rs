//! Line-oriented console that drives a session workflow.

use derive_more::Display;
use escape_room_session::{
    ApiClient, Credentials, Difficulty, GameRequest, InvalidDifficulty, KeyValueStore,
    PreconditionError, SessionWorkflow, WorkflowError,
};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};
use tracing::{debug, info, instrument, warn};

const HELP: &str = "\
Commands:
  user <username> <email> <password>   create your player (once per session)
  game <difficulty> <age_group> [theme] start a game (difficulty: 1-3 or easy/medium/hard)
  puzzle                               get the next puzzle
  answer <text>                        answer the current puzzle
  status                               show the session
  reset                                forget the session and start over
  help                                 show this list
  quit                                 leave";

/// A parsed console command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConsoleCommand {
    /// Create the session user.
    User(Credentials),
    /// Start a game.
    Game {
        /// Requested difficulty.
        difficulty: Difficulty,
        /// Target age group.
        age_group: String,
        /// Free-text theme, possibly empty.
        theme: String,
    },
    /// Request the next puzzle.
    Puzzle,
    /// Answer the current puzzle.
    Answer(String),
    /// Show the session.
    Status,
    /// Discard the session.
    Reset,
    /// Show help.
    Help,
    /// Leave the console.
    Quit,
}

/// Error parsing a console line.
#[derive(Debug, Clone, PartialEq, Eq, Display)]
pub enum ParseError {
    /// Blank line.
    #[display("Empty command")]
    Empty,
    /// Unrecognized command word.
    #[display("Unknown command '{}'. Type 'help' for a list.", _0)]
    Unknown(String),
    /// Wrong arguments for a known command.
    #[display("Usage: {}", _0)]
    Usage(&'static str),
    /// Bad difficulty value.
    #[display("{}", _0)]
    Difficulty(InvalidDifficulty),
}

impl std::error::Error for ParseError {}

impl ConsoleCommand {
    /// Parses one input line.
    #[instrument]
    pub fn parse(line: &str) -> Result<Self, ParseError> {
        let line = line.trim();
        let (word, rest) = match line.split_once(char::is_whitespace) {
            Some((word, rest)) => (word, rest.trim()),
            None => (line, ""),
        };

        match word.to_ascii_lowercase().as_str() {
            "" => Err(ParseError::Empty),
            "user" => {
                let parts: Vec<&str> = rest.split_whitespace().collect();
                match parts.as_slice() {
                    [username, email, password] => Ok(Self::User(Credentials::new(
                        username.to_string(),
                        email.to_string(),
                        password.to_string(),
                    ))),
                    _ => Err(ParseError::Usage("user <username> <email> <password>")),
                }
            }
            "game" => {
                let mut parts = rest.splitn(3, char::is_whitespace);
                let (Some(difficulty), Some(age_group)) = (
                    parts.next().filter(|s| !s.is_empty()),
                    parts.next().filter(|s| !s.is_empty()),
                ) else {
                    return Err(ParseError::Usage("game <difficulty> <age_group> [theme]"));
                };
                let difficulty = difficulty.parse().map_err(ParseError::Difficulty)?;
                Ok(Self::Game {
                    difficulty,
                    age_group: age_group.to_string(),
                    theme: parts.next().unwrap_or("").trim().to_string(),
                })
            }
            "puzzle" | "next" => Ok(Self::Puzzle),
            "answer" if rest.is_empty() => Err(ParseError::Usage("answer <text>")),
            "answer" => Ok(Self::Answer(rest.to_string())),
            "status" => Ok(Self::Status),
            "reset" => Ok(Self::Reset),
            "help" | "?" => Ok(Self::Help),
            "quit" | "exit" => Ok(Self::Quit),
            other => Err(ParseError::Unknown(other.to_string())),
        }
    }
}

/// Result of executing one command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Step {
    /// Print the text and keep reading.
    Continue(String),
    /// Leave the console.
    Quit,
}

/// Console front end over a [`SessionWorkflow`].
///
/// The persisted session is written to the store after every change of user.
pub struct Console<C> {
    workflow: SessionWorkflow<C>,
    store: Box<dyn KeyValueStore>,
}

impl<C: ApiClient> Console<C> {
    /// Creates a console.
    pub fn new(workflow: SessionWorkflow<C>, store: Box<dyn KeyValueStore>) -> Self {
        Self { workflow, store }
    }

    /// Returns the workflow.
    pub fn workflow(&self) -> &SessionWorkflow<C> {
        &self.workflow
    }

    /// Reads commands from `input` until it ends or the player quits.
    #[instrument(skip_all)]
    pub async fn run<R, W>(&self, input: R, mut output: W) -> anyhow::Result<()>
    where
        R: AsyncBufRead + Unpin,
        W: AsyncWrite + Unpin,
    {
        info!("Console started");
        output
            .write_all(format!("Escape room. {}\n", self.status()).as_bytes())
            .await?;
        output.write_all(b"Type 'help' for commands.\n> ").await?;
        output.flush().await?;

        let mut lines = input.lines();
        while let Some(line) = lines.next_line().await? {
            let step = match ConsoleCommand::parse(&line) {
                Ok(command) => self.execute(command).await,
                Err(ParseError::Empty) => Step::Continue(String::new()),
                Err(e) => Step::Continue(e.to_string()),
            };

            match step {
                Step::Quit => break,
                Step::Continue(text) => {
                    if !text.is_empty() {
                        output.write_all(text.as_bytes()).await?;
                        output.write_all(b"\n").await?;
                    }
                    output.write_all(b"> ").await?;
                    output.flush().await?;
                }
            }
        }

        output.write_all(b"Goodbye.\n").await?;
        output.flush().await?;
        info!("Console finished");
        Ok(())
    }

    /// Executes one command against the workflow.
    #[instrument(skip(self))]
    pub async fn execute(&self, command: ConsoleCommand) -> Step {
        let text = match command {
            ConsoleCommand::User(credentials) => match self.workflow.ensure_user(&credentials).await {
                Ok(user) => {
                    let note = self.save();
                    format!("Playing as {} (user {}).{}", user.username(), user.id(), note)
                }
                Err(e) => failure(&e),
            },
            ConsoleCommand::Game {
                difficulty,
                age_group,
                theme,
            } => {
                let Some(user_id) = self.workflow.state().user().as_ref().map(|u| *u.id()) else {
                    return Step::Continue(failure(&PreconditionError::NoUser.into()));
                };
                let request = GameRequest::new(user_id, theme, difficulty, age_group);
                match self.workflow.start_game(request).await {
                    Ok(game) => format!(
                        "Game {} started ({} difficulty{}). Type 'puzzle' for your first puzzle.",
                        game.id(),
                        game.difficulty(),
                        if game.theme().is_empty() {
                            String::new()
                        } else {
                            format!(", theme '{}'", game.theme())
                        }
                    ),
                    Err(e) => failure(&e),
                }
            }
            ConsoleCommand::Puzzle => match self.workflow.next_puzzle().await {
                Ok(puzzle) => match puzzle.hints() {
                    Some(hint) if !hint.is_empty() => {
                        format!("Puzzle {}: {}\nHint: {}", puzzle.id(), puzzle.question(), hint)
                    }
                    _ => format!("Puzzle {}: {}", puzzle.id(), puzzle.question()),
                },
                Err(e) => failure(&e),
            },
            ConsoleCommand::Answer(answer) => match self.workflow.submit_answer(answer).await {
                Ok(verdict) => {
                    let headline = if *verdict.correct() {
                        "Correct! Type 'puzzle' for the next one."
                    } else {
                        "Incorrect. Try again."
                    };
                    match verdict.message() {
                        Some(message) if !message.is_empty() => format!("{} ({})", headline, message),
                        _ => headline.to_string(),
                    }
                }
                Err(e) => failure(&e),
            },
            ConsoleCommand::Status => self.status(),
            ConsoleCommand::Reset => {
                self.workflow.reset();
                let note = self.save();
                format!("Session reset.{}", note)
            }
            ConsoleCommand::Help => HELP.to_string(),
            ConsoleCommand::Quit => return Step::Quit,
        };
        Step::Continue(text)
    }

    /// Describes the current session.
    pub fn status(&self) -> String {
        let state = self.workflow.state();
        let mut lines = vec![format!("Phase: {}", state.phase())];
        if let Some(user) = state.user() {
            lines.push(format!("User: {} ({})", user.username(), user.id()));
        }
        if let Some(game) = state.game() {
            lines.push(format!(
                "Game: {} ({}, age group '{}')",
                game.id(),
                game.difficulty(),
                game.age_group()
            ));
        }
        if let Some(puzzle) = state.puzzle() {
            lines.push(format!("Puzzle: {}", puzzle.question()));
        }
        if let Some(feedback) = state.last_feedback() {
            lines.push(format!("Last answer: {}", feedback));
        }
        lines.join("\n")
    }

    /// Saves the persisted session, returning a note for the player on failure.
    fn save(&self) -> String {
        match self.workflow.persisted().save(self.store.as_ref()) {
            Ok(()) => {
                debug!("Session saved");
                String::new()
            }
            Err(e) => {
                warn!(error = %e, "Failed to save session");
                format!(" (session not saved: {})", e.message)
            }
        }
    }
}

fn failure(error: &WorkflowError) -> String {
    match error {
        WorkflowError::Precondition(_) => error.user_message(),
        _ => format!("Error: {}", error.user_message()),
    }
}
