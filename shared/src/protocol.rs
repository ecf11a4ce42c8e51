//! Wire format of the worms protocol.
//!
//! All integers are big-endian with fixed width. Fixed-size headers are
//! plain structs run through a bincode configuration that matches this
//! layout; variable-length parts (player names) are appended by hand.
//!
//! Client to server: `session_id(8) turn_direction(1) next_expected_event_no(4) name(0..=20)`.
//!
//! Server to client: `game_id(4)` followed by framed events, each
//! `len(4) event_no(4) event_type(1) payload crc32(4)` where `len` counts
//! `event_no`, `event_type` and the payload, and the crc covers everything
//! from `len` up to the end of the payload.

use crate::crc::{crc32, verify};
use crate::{
    CLIENT_HEADER_SIZE, EVENT_FRAME_OVERHEAD, EVENT_HEADER_SIZE, EVENT_NO_TYPE_SIZE,
    GAME_ID_SIZE, MAX_CLIENT_DATAGRAM_LEN,
};
use bincode::Options;
use serde::{Deserialize, Serialize};
use thiserror::Error;

fn wire_options() -> impl Options {
    bincode::DefaultOptions::new()
        .with_big_endian()
        .with_fixint_encoding()
        .allow_trailing_bytes()
}

#[derive(Debug, Error)]
pub enum WireError {
    #[error("datagram too short: need {needed} bytes, got {available}")]
    Truncated { needed: usize, available: usize },
    #[error("client datagram of {0} bytes is longer than allowed")]
    Oversized(usize),
    #[error("invalid turn direction {0}")]
    InvalidDirection(u8),
    #[error("player name contains a non-printable byte")]
    InvalidName,
    #[error("event length {0} does not fit the datagram")]
    BadLength(u32),
    #[error("checksum mismatch: frame carries {expected:#010x}, computed {actual:#010x}")]
    ChecksumMismatch { expected: u32, actual: u32 },
    #[error("malformed {kind} payload of {len} bytes")]
    MalformedPayload { kind: &'static str, len: usize },
    #[error(transparent)]
    Codec(#[from] bincode::Error),
}

/// Direction a player is currently steering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[repr(u8)]
pub enum TurnDirection {
    #[default]
    Straight = 0,
    Right = 1,
    Left = 2,
}

impl TryFrom<u8> for TurnDirection {
    type Error = WireError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(TurnDirection::Straight),
            1 => Ok(TurnDirection::Right),
            2 => Ok(TurnDirection::Left),
            other => Err(WireError::InvalidDirection(other)),
        }
    }
}

impl From<TurnDirection> for u8 {
    fn from(direction: TurnDirection) -> Self {
        direction as u8
    }
}

#[derive(Serialize, Deserialize)]
struct ClientHeader {
    session_id: u64,
    turn_direction: u8,
    next_expected_event_no: u32,
}

/// Heartbeat a client sends every 20 ms.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientMessage {
    pub session_id: u64,
    pub turn_direction: TurnDirection,
    pub next_expected_event_no: u32,
    /// Empty for observers.
    pub player_name: String,
}

impl ClientMessage {
    pub fn encode(&self) -> Result<Vec<u8>, WireError> {
        let header = ClientHeader {
            session_id: self.session_id,
            turn_direction: self.turn_direction.into(),
            next_expected_event_no: self.next_expected_event_no,
        };
        let mut buf = wire_options().serialize(&header)?;
        buf.extend_from_slice(self.player_name.as_bytes());
        Ok(buf)
    }

    /// Parses and validates a client datagram.
    ///
    /// The name is whatever follows the header; it must be at most 20
    /// printable ASCII characters and the direction must be 0, 1 or 2.
    pub fn decode(buf: &[u8]) -> Result<Self, WireError> {
        if buf.len() < CLIENT_HEADER_SIZE {
            return Err(WireError::Truncated {
                needed: CLIENT_HEADER_SIZE,
                available: buf.len(),
            });
        }
        if buf.len() > MAX_CLIENT_DATAGRAM_LEN {
            return Err(WireError::Oversized(buf.len()));
        }

        let header: ClientHeader = wire_options().deserialize(&buf[..CLIENT_HEADER_SIZE])?;
        let turn_direction = TurnDirection::try_from(header.turn_direction)?;

        let name = &buf[CLIENT_HEADER_SIZE..];
        if !name.iter().all(u8::is_ascii_graphic) {
            return Err(WireError::InvalidName);
        }
        let player_name = String::from_utf8(name.to_vec()).map_err(|_| WireError::InvalidName)?;

        Ok(ClientMessage {
            session_id: header.session_id,
            turn_direction,
            next_expected_event_no: header.next_expected_event_no,
            player_name,
        })
    }
}

#[derive(Serialize, Deserialize)]
struct EventHeader {
    len: u32,
    event_no: u32,
    event_type: u8,
}

#[derive(Serialize, Deserialize)]
struct BoardSize {
    maxx: u32,
    maxy: u32,
}

#[derive(Serialize, Deserialize)]
struct PixelPayload {
    player_number: u8,
    x: u32,
    y: u32,
}

/// Kind-specific content of an event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventData {
    NewGame {
        maxx: u32,
        maxy: u32,
        player_names: Vec<String>,
    },
    Pixel {
        player_number: u8,
        x: u32,
        y: u32,
    },
    PlayerEliminated {
        player_number: u8,
    },
    GameOver,
}

impl EventData {
    pub const NEW_GAME: u8 = 0;
    pub const PIXEL: u8 = 1;
    pub const PLAYER_ELIMINATED: u8 = 2;
    pub const GAME_OVER: u8 = 3;

    const PIXEL_PAYLOAD_LEN: usize = 9;
    const BOARD_SIZE_LEN: usize = 8;

    pub fn event_type(&self) -> u8 {
        match self {
            EventData::NewGame { .. } => Self::NEW_GAME,
            EventData::Pixel { .. } => Self::PIXEL,
            EventData::PlayerEliminated { .. } => Self::PLAYER_ELIMINATED,
            EventData::GameOver => Self::GAME_OVER,
        }
    }

    fn encode_payload(&self) -> Result<Vec<u8>, WireError> {
        let payload = match self {
            EventData::NewGame {
                maxx,
                maxy,
                player_names,
            } => {
                let mut buf = wire_options().serialize(&BoardSize {
                    maxx: *maxx,
                    maxy: *maxy,
                })?;
                for name in player_names {
                    buf.extend_from_slice(name.as_bytes());
                    buf.push(0);
                }
                buf
            }
            EventData::Pixel {
                player_number,
                x,
                y,
            } => wire_options().serialize(&PixelPayload {
                player_number: *player_number,
                x: *x,
                y: *y,
            })?,
            EventData::PlayerEliminated { player_number } => vec![*player_number],
            EventData::GameOver => Vec::new(),
        };
        Ok(payload)
    }

    /// Decodes a payload of a known event kind; unknown kinds yield `Ok(None)`.
    ///
    /// A payload whose length does not match its kind is an error.
    pub fn decode(event_type: u8, payload: &[u8]) -> Result<Option<Self>, WireError> {
        let data = match event_type {
            Self::NEW_GAME => {
                if payload.len() < Self::BOARD_SIZE_LEN {
                    return Err(malformed("NEW_GAME", payload));
                }
                let size: BoardSize = wire_options().deserialize(payload)?;
                EventData::NewGame {
                    maxx: size.maxx,
                    maxy: size.maxy,
                    player_names: decode_names(&payload[Self::BOARD_SIZE_LEN..])
                        .ok_or_else(|| malformed("NEW_GAME", payload))?,
                }
            }
            Self::PIXEL => {
                if payload.len() != Self::PIXEL_PAYLOAD_LEN {
                    return Err(malformed("PIXEL", payload));
                }
                let pixel: PixelPayload = wire_options().deserialize(payload)?;
                EventData::Pixel {
                    player_number: pixel.player_number,
                    x: pixel.x,
                    y: pixel.y,
                }
            }
            Self::PLAYER_ELIMINATED => match payload {
                [player_number] => EventData::PlayerEliminated {
                    player_number: *player_number,
                },
                _ => return Err(malformed("PLAYER_ELIMINATED", payload)),
            },
            Self::GAME_OVER => {
                if !payload.is_empty() {
                    return Err(malformed("GAME_OVER", payload));
                }
                EventData::GameOver
            }
            _ => return Ok(None),
        };
        Ok(Some(data))
    }
}

fn malformed(kind: &'static str, payload: &[u8]) -> WireError {
    WireError::MalformedPayload {
        kind,
        len: payload.len(),
    }
}

/// Splits null-terminated names. Every name must be non-empty printable ASCII.
fn decode_names(bytes: &[u8]) -> Option<Vec<String>> {
    let Some((&0, body)) = bytes.split_last() else {
        return bytes.is_empty().then(Vec::new);
    };
    body.split(|&b| b == 0)
        .map(|name| {
            if name.is_empty() || !name.iter().all(u8::is_ascii_graphic) {
                return None;
            }
            String::from_utf8(name.to_vec()).ok()
        })
        .collect()
}

/// A framed, checksummed event ready to be copied into datagrams.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedEvent {
    event_no: u32,
    bytes: Vec<u8>,
}

impl EncodedEvent {
    pub fn new(event_no: u32, data: &EventData) -> Result<Self, WireError> {
        let payload = data.encode_payload()?;
        let header = EventHeader {
            len: (EVENT_NO_TYPE_SIZE + payload.len()) as u32,
            event_no,
            event_type: data.event_type(),
        };
        let mut bytes = wire_options().serialize(&header)?;
        bytes.extend_from_slice(&payload);
        let checksum = crc32(&bytes);
        bytes.extend_from_slice(&checksum.to_be_bytes());
        Ok(EncodedEvent { event_no, bytes })
    }

    pub fn event_no(&self) -> u32 {
        self.event_no
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

/// Splits the game id prefix off a server datagram.
pub fn split_game_id(datagram: &[u8]) -> Option<(u32, &[u8])> {
    if datagram.len() < GAME_ID_SIZE {
        return None;
    }
    let game_id: u32 = wire_options().deserialize(datagram).ok()?;
    Some((game_id, &datagram[GAME_ID_SIZE..]))
}

/// One checksum-valid event frame borrowed from a datagram.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Frame<'a> {
    pub event_no: u32,
    pub event_type: u8,
    pub payload: &'a [u8],
}

impl Frame<'_> {
    pub fn data(&self) -> Result<Option<EventData>, WireError> {
        EventData::decode(self.event_type, self.payload)
    }
}

/// Iterates over the event frames that follow the game id.
///
/// Iteration ends when fewer bytes than a minimal frame remain. A frame
/// whose length or checksum is wrong yields one error and ends iteration,
/// since nothing after it can be located reliably.
pub struct Frames<'a> {
    rest: &'a [u8],
}

impl<'a> Frames<'a> {
    pub fn new(events: &'a [u8]) -> Self {
        Frames { rest: events }
    }

    fn split_frame(buf: &'a [u8]) -> Result<(Frame<'a>, &'a [u8]), WireError> {
        let header: EventHeader = wire_options().deserialize(&buf[..EVENT_HEADER_SIZE])?;
        let len = header.len as usize;
        // len field plus everything it counts
        let covered = len.saturating_add(4);
        if len < EVENT_NO_TYPE_SIZE || covered.saturating_add(4) > buf.len() {
            return Err(WireError::BadLength(header.len));
        }

        let expected: u32 = wire_options().deserialize(&buf[covered..])?;
        let checked = &buf[..covered];
        if !verify(checked, expected) {
            return Err(WireError::ChecksumMismatch {
                expected,
                actual: crc32(checked),
            });
        }

        let frame = Frame {
            event_no: header.event_no,
            event_type: header.event_type,
            payload: &buf[EVENT_HEADER_SIZE..covered],
        };
        Ok((frame, &buf[covered + 4..]))
    }
}

impl<'a> Iterator for Frames<'a> {
    type Item = Result<Frame<'a>, WireError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.rest.len() < EVENT_FRAME_OVERHEAD {
            return None;
        }
        match Self::split_frame(self.rest) {
            Ok((frame, rest)) => {
                self.rest = rest;
                Some(Ok(frame))
            }
            Err(e) => {
                self.rest = &[];
                Some(Err(e))
            }
        }
    }
}
