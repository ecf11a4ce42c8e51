//! Protocol definitions shared by the worms server and client.
//!
//! The server streams an append-only log of checksummed events over UDP and
//! every client periodically reports the next event number it expects. Both
//! ends agree on the byte layout defined in [`protocol`] and on the CRC-32
//! computed by [`crc`].

pub mod crc;
pub mod protocol;

pub use crc::crc32;
pub use protocol::{
    ClientMessage, EncodedEvent, EventData, Frame, Frames, TurnDirection, WireError,
};

pub const DEFAULT_SERVER_PORT: u16 = 2021;
pub const DEFAULT_GUI_PORT: u16 = 20210;
pub const DEFAULT_GUI_SERVER: &str = "localhost";

pub const MAX_PLAYER_NAME_LENGTH: usize = 20;
/// Upper bound for every datagram the server produces.
pub const MAX_SERVER_DATAGRAM_LEN: usize = 550;

/// session_id(8) + turn_direction(1) + next_expected_event_no(4)
pub const CLIENT_HEADER_SIZE: usize = 13;
pub const MAX_CLIENT_DATAGRAM_LEN: usize = CLIENT_HEADER_SIZE + MAX_PLAYER_NAME_LENGTH;

pub const GAME_ID_SIZE: usize = 4;
/// event_no(4) + event_type(1), counted by the `len` field together with the payload
pub const EVENT_NO_TYPE_SIZE: usize = 5;
/// len(4) + event_no(4) + event_type(1)
pub const EVENT_HEADER_SIZE: usize = 9;
/// Bytes a framed event adds on top of its payload: header plus trailing crc.
pub const EVENT_FRAME_OVERHEAD: usize = EVENT_HEADER_SIZE + 4;
