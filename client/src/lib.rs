//! # Worms Game Client
//!
//! Bridges the game server and a GUI process. Three tasks run side by side:
//!
//! - the heartbeat sends the steering direction and the next expected event
//!   number to the server every 20 ms
//! - the key reader turns GUI key lines into a steering direction
//! - the forwarder decodes server datagrams and writes the rendered lines to
//!   the GUI
//!
//! The tasks only share a [`state::SyncState`] of two atomic counters.
//!
//! ## Module Organization
//!
//! - [`config`]: command line options
//! - [`decoder`]: game tracking and event validation
//! - [`gui`]: the text protocol of the GUI
//! - [`heartbeat`]: periodic client datagrams
//! - [`network`]: socket setup and task wiring
//! - [`state`]: the shared counters
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use client::config::ClientConfig;
//! use client::network::Client;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), client::ClientError> {
//!     let config = ClientConfig {
//!         server_host: "localhost".into(),
//!         server_port: 2021,
//!         player_name: "amy".into(),
//!         gui_host: "localhost".into(),
//!         gui_port: 20210,
//!     };
//!     Client::connect(&config).await?.run().await
//! }
//! ```

pub mod config;
pub mod decoder;
pub mod gui;
pub mod heartbeat;
pub mod network;
pub mod state;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("invalid configuration: {0}")]
    Config(#[from] config::ConfigError),
    #[error("bad server response: {0}")]
    Protocol(#[from] decoder::ProtocolError),
    #[error("could not encode heartbeat: {0}")]
    Encode(#[from] shared::WireError),
    #[error("could not resolve {0}")]
    Resolve(String),
    #[error("GUI closed the connection")]
    GuiClosed,
    #[error("socket error: {0}")]
    Io(#[from] std::io::Error),
    #[error("client task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}
