//! Escape Room - terminal client
//!
//! Plays the escape room puzzle game against the REST backend.

#![warn(missing_docs)]

mod cli;

use anyhow::{Context, Result};
use clap::Parser;
use cli::{Cli, Command, UsersCommand};
use escape_room::{ClientConfig, Console, FileSessionStore, HttpApiClient, UserUpdate};
use escape_room_session::{Credentials, PersistedSession, SessionWorkflow, User, UserId};
use tracing::{info, instrument};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let config = load_config(&cli)?;

    match cli.command {
        Command::Play {
            username,
            email,
            password,
        } => {
            let credentials = match (username, email, password) {
                (Some(u), Some(e), Some(p)) => Some(Credentials::new(u, e, p)),
                _ => None,
            };
            run_play(config, credentials).await
        }
        Command::Users { action } => run_users(config, action).await,
    }
}

/// Resolves configuration: file, then environment, then `--api-url`.
fn load_config(cli: &Cli) -> Result<ClientConfig> {
    let config = ClientConfig::load(cli.config.as_deref())?;
    let config = config.override_api_url(cli.api_url.clone())?;
    info!(api_url = %config.api_url(), "Using backend");
    Ok(config)
}

/// Run the interactive console
#[instrument(skip_all, fields(api_url = %config.api_url()))]
async fn run_play(config: ClientConfig, credentials: Option<Credentials>) -> Result<()> {
    let store = FileSessionStore::new(config.session_file());
    let persisted = PersistedSession::load(&store)
        .with_context(|| format!("Failed to load session from {}", store.path().display()))?;

    let client = HttpApiClient::new(&config)?;
    let workflow = SessionWorkflow::new(client, persisted);
    let console = Console::new(workflow, Box::new(store));

    if let Some(credentials) = credentials {
        let step = console
            .execute(escape_room::ConsoleCommand::User(credentials))
            .await;
        if let escape_room::Step::Continue(text) = step {
            println!("{}", text);
        }
    }

    let stdin = tokio::io::BufReader::new(tokio::io::stdin());
    console.run(stdin, tokio::io::stdout()).await
}

/// Run a user management command
#[instrument(skip_all, fields(api_url = %config.api_url()))]
async fn run_users(config: ClientConfig, action: UsersCommand) -> Result<()> {
    let client = HttpApiClient::new(&config)?;

    match action {
        UsersCommand::List => {
            let users = client.list_users().await?;
            if users.is_empty() {
                println!("No users.");
            }
            for user in &users {
                print_user(user);
            }
        }
        UsersCommand::Show { id } => {
            let user = client.get_user(UserId(id)).await?;
            print_user(&user);
        }
        UsersCommand::Update {
            id,
            username,
            email,
            password,
        } => {
            let update = UserUpdate::new(username, email, password);
            if update.is_empty() {
                anyhow::bail!("Nothing to update: pass --username, --email or --password");
            }
            let user = client.update_user(UserId(id), &update).await?;
            print_user(&user);
        }
        UsersCommand::Delete { id } => {
            client.delete_user(UserId(id)).await?;
            println!("Deleted user {}.", id);
        }
    }

    Ok(())
}

fn print_user(user: &User) {
    println!("{:>6}  {:<20}  {}", user.id(), user.username(), user.email());
}
