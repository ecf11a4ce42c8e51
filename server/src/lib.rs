//! # Worms Game Server
//!
//! Authoritative server for the worms line-drawing game. Clients send a small
//! heartbeat datagram every 20 ms; the server answers each one with every
//! event of the current game the client has not confirmed yet, and pushes
//! new events to all clients as rounds are played.
//!
//! ## Module Organization
//!
//! - [`config`]: command line options and their validation
//! - [`session`]: per-address sessions, admission and idle eviction
//! - [`event_log`]: append-only event log, bundling into datagrams and sending
//! - [`game`]: deterministic generator and the game state machine
//! - [`scheduler`]: waits for ready players and paces rounds
//! - [`network`]: shared state, UDP listener and task wiring
//!
//! ## Concurrency
//!
//! A listener task and a scheduler task share one [`network::ServerState`]
//! behind a single `tokio::sync::Mutex`. The listener wakes the scheduler
//! through a `Notify` whenever the start condition holds after a datagram.
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use server::config::ServerConfig;
//! use server::network::Server;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), server::ServerError> {
//!     let server = Server::new(ServerConfig::default()).await?;
//!     server.run().await
//! }
//! ```

pub mod config;
pub mod event_log;
pub mod game;
pub mod network;
pub mod scheduler;
pub mod session;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("invalid configuration: {0}")]
    Config(#[from] config::ConfigError),
    #[error("socket error: {0}")]
    Io(#[from] std::io::Error),
    #[error("event encoding failed: {0}")]
    Wire(#[from] shared::WireError),
    #[error("server task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}
