//! Escape room client - terminal front end for the escape room puzzle service
//!
//! The session rules live in [`escape_room_session`]; this crate binds them
//! to the REST backend and to a terminal.
//!
//! # Architecture
//!
//! - **Client**: [`HttpApiClient`], the reqwest binding of the backend contract
//! - **Config**: [`ClientConfig`], TOML file plus environment override
//! - **Store**: [`FileSessionStore`], where the session user is remembered
//! - **Console**: [`Console`], a line-oriented player over the workflow
//!
//! # Example
//!
//! ```no_run
//! use escape_room::{ClientConfig, FileSessionStore, HttpApiClient};
//! use escape_room_session::{PersistedSession, SessionWorkflow};
//!
//! # async fn example() -> anyhow::Result<()> {
//! let config = ClientConfig::load(None)?;
//! let store = FileSessionStore::new(config.session_file());
//! let persisted = PersistedSession::load(&store)?;
//! let workflow = SessionWorkflow::new(HttpApiClient::new(&config)?, persisted);
//! println!("{}", workflow.phase());
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![forbid(unsafe_code)]

mod client;
mod config;
mod console;
mod store;

pub use client::{HttpApiClient, UserUpdate};
pub use config::{API_URL_ENV, ClientConfig, ConfigError};
pub use console::{Console, ConsoleCommand, ParseError, Step};
pub use store::FileSessionStore;
