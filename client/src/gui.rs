//! Line protocol spoken with the GUI process over TCP.
//!
//! The client writes `NEW_GAME`, `PIXEL` and `PLAYER_ELIMINATED` lines and
//! reads key events, one per line. Unknown lines from the GUI are ignored.

use crate::state::SyncState;
use crate::ClientError;
use log::debug;
use std::fmt;
use std::io;
use std::sync::Arc;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};

/// One line sent to the GUI.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GuiCommand {
    NewGame {
        maxx: u32,
        maxy: u32,
        player_names: Vec<String>,
    },
    Pixel {
        x: u32,
        y: u32,
        player_name: String,
    },
    PlayerEliminated {
        player_name: String,
    },
}

impl fmt::Display for GuiCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GuiCommand::NewGame {
                maxx,
                maxy,
                player_names,
            } => {
                write!(f, "NEW_GAME {} {}", maxx, maxy)?;
                for name in player_names {
                    write!(f, " {}", name)?;
                }
                Ok(())
            }
            GuiCommand::Pixel { x, y, player_name } => {
                write!(f, "PIXEL {} {} {}", x, y, player_name)
            }
            GuiCommand::PlayerEliminated { player_name } => {
                write!(f, "PLAYER_ELIMINATED {}", player_name)
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyEvent {
    LeftDown,
    LeftUp,
    RightDown,
    RightUp,
}

impl KeyEvent {
    /// Parses one line without its newline. A trailing carriage return is tolerated.
    pub fn from_line(line: &[u8]) -> Option<Self> {
        let line = line.strip_suffix(b"\r").unwrap_or(line);
        match line {
            b"LEFT_KEY_DOWN" => Some(KeyEvent::LeftDown),
            b"LEFT_KEY_UP" => Some(KeyEvent::LeftUp),
            b"RIGHT_KEY_DOWN" => Some(KeyEvent::RightDown),
            b"RIGHT_KEY_UP" => Some(KeyEvent::RightUp),
            _ => None,
        }
    }
}

/// Applies key events from the GUI until it disconnects.
pub async fn read_keys<R>(reader: R, sync: Arc<SyncState>) -> Result<(), ClientError>
where
    R: AsyncBufRead + Unpin,
{
    let mut lines = reader.split(b'\n');
    while let Some(line) = lines.next_segment().await? {
        match KeyEvent::from_line(&line) {
            Some(key) => sync.apply_key(key),
            None => debug!("Ignoring GUI line {:?}", String::from_utf8_lossy(&line)),
        }
    }
    Err(ClientError::GuiClosed)
}

/// Writes commands as newline-terminated lines in a single write.
pub async fn send_commands<W>(writer: &mut W, commands: &[GuiCommand]) -> io::Result<()>
where
    W: AsyncWrite + Unpin,
{
    let mut text = String::new();
    for command in commands {
        text.push_str(&command.to_string());
        text.push('\n');
    }
    writer.write_all(text.as_bytes()).await?;
    writer.flush().await
}
