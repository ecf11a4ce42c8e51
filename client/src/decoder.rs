//! Turns server datagrams into GUI commands.
//!
//! The decoder tracks one game at a time and accepts only the event it
//! expects next, so duplicated, reordered and replayed datagrams are all
//! harmless. A frame with a bad length or checksum ends processing of its
//! datagram. Events of a known kind that make no sense are fatal.

use crate::gui::GuiCommand;
use crate::state::SyncState;
use log::{debug, info};
use shared::protocol::split_game_id;
use shared::{EventData, Frame, Frames, WireError, MAX_SERVER_DATAGRAM_LEN};
use std::sync::Arc;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("server datagram of {0} bytes exceeds {}", MAX_SERVER_DATAGRAM_LEN)]
    Oversized(usize),
    #[error("pixel ({x}, {y}) lies outside the {maxx}x{maxy} board")]
    PixelOutOfBounds { x: u32, y: u32, maxx: u32, maxy: u32 },
    #[error("unknown player number {0}")]
    UnknownPlayer(u8),
    #[error(transparent)]
    Malformed(#[from] WireError),
}

pub struct Decoder {
    sync: Arc<SyncState>,
    current_game: Option<u32>,
    finished_game: Option<u32>,
    maxx: u32,
    maxy: u32,
    player_names: Vec<String>,
}

impl Decoder {
    pub fn new(sync: Arc<SyncState>) -> Self {
        Self {
            sync,
            current_game: None,
            finished_game: None,
            maxx: 0,
            maxy: 0,
            player_names: Vec::new(),
        }
    }

    pub fn current_game(&self) -> Option<u32> {
        self.current_game
    }

    pub fn finished_game(&self) -> Option<u32> {
        self.finished_game
    }

    pub fn next_expected_event_no(&self) -> u32 {
        self.sync.next_expected_event_no()
    }

    pub fn process_datagram(&mut self, datagram: &[u8]) -> Result<Vec<GuiCommand>, ProtocolError> {
        if datagram.len() > MAX_SERVER_DATAGRAM_LEN {
            return Err(ProtocolError::Oversized(datagram.len()));
        }
        let Some((game_id, events)) = split_game_id(datagram) else {
            return Ok(Vec::new());
        };
        if self.finished_game == Some(game_id) {
            return Ok(Vec::new());
        }
        if self.current_game != Some(game_id) {
            info!("Tracking game {}", game_id);
            self.current_game = Some(game_id);
            self.sync.set_next_expected_event_no(0);
        }

        let mut commands = Vec::new();
        for frame in Frames::new(events) {
            let frame = match frame {
                Ok(frame) => frame,
                Err(e) => {
                    debug!("Dropping rest of datagram for game {}: {}", game_id, e);
                    break;
                }
            };

            let expected = self.sync.next_expected_event_no();
            if frame.event_no != expected {
                continue;
            }
            self.sync.set_next_expected_event_no(expected.wrapping_add(1));

            if let Some(command) = self.apply(game_id, &frame)? {
                commands.push(command);
            }
        }
        Ok(commands)
    }

    fn apply(
        &mut self,
        game_id: u32,
        frame: &Frame<'_>,
    ) -> Result<Option<GuiCommand>, ProtocolError> {
        let Some(data) = frame.data()? else {
            debug!("Skipping event {} of unknown type {}", frame.event_no, frame.event_type);
            return Ok(None);
        };

        let command = match data {
            EventData::NewGame {
                maxx,
                maxy,
                player_names,
            } => {
                self.maxx = maxx;
                self.maxy = maxy;
                self.player_names = player_names.clone();
                Some(GuiCommand::NewGame {
                    maxx,
                    maxy,
                    player_names,
                })
            }
            EventData::Pixel { player_number, x, y } => {
                if x >= self.maxx || y >= self.maxy {
                    return Err(ProtocolError::PixelOutOfBounds {
                        x,
                        y,
                        maxx: self.maxx,
                        maxy: self.maxy,
                    });
                }
                Some(GuiCommand::Pixel {
                    x,
                    y,
                    player_name: self.player_name(player_number)?,
                })
            }
            EventData::PlayerEliminated { player_number } => Some(GuiCommand::PlayerEliminated {
                player_name: self.player_name(player_number)?,
            }),
            EventData::GameOver => {
                info!("Game {} over", game_id);
                self.finished_game = Some(game_id);
                self.current_game = None;
                None
            }
        };
        Ok(command)
    }

    fn player_name(&self, player_number: u8) -> Result<String, ProtocolError> {
        self.player_names
            .get(usize::from(player_number))
            .cloned()
            .ok_or(ProtocolError::UnknownPlayer(player_number))
    }
}
