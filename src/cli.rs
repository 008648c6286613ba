//! Command-line interface for escape_room.

use clap::{Parser, Subcommand};

/// Escape Room - play puzzle games served by the escape room backend
#[derive(Parser, Debug)]
#[command(name = "escape_room")]
#[command(about = "Terminal client for the escape room puzzle service", long_about = None)]
#[command(version)]
pub struct Cli {
    /// Path to a TOML config file
    #[arg(long, global = true)]
    pub config: Option<std::path::PathBuf>,

    /// Backend URL (overrides config file and ESCAPE_ROOM_API_URL)
    #[arg(long, global = true)]
    pub api_url: Option<String>,

    /// Subcommand to run
    #[command(subcommand)]
    pub command: Command,
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Play interactively in the terminal
    Play {
        /// Create (or reuse) this user on start; requires --email and --password
        #[arg(long, requires_all = ["email", "password"])]
        username: Option<String>,

        /// Email for --username
        #[arg(long, requires_all = ["username", "password"])]
        email: Option<String>,

        /// Password for --username
        #[arg(long, requires_all = ["username", "email"])]
        password: Option<String>,
    },

    /// Manage users on the backend
    Users {
        /// User operation
        #[command(subcommand)]
        action: UsersCommand,
    },
}

/// User management operations
#[derive(Subcommand, Debug)]
pub enum UsersCommand {
    /// List all users
    List,

    /// Show one user
    Show {
        /// User id
        id: i64,
    },

    /// Update a user's details
    Update {
        /// User id
        id: i64,

        /// New username
        #[arg(long)]
        username: Option<String>,

        /// New email
        #[arg(long)]
        email: Option<String>,

        /// New password
        #[arg(long)]
        password: Option<String>,
    },

    /// Delete a user
    Delete {
        /// User id
        id: i64,
    },
}
