//! Append-only event log of the current game and datagram bundling.
//!
//! Events are framed and checksummed once, when appended. Delivery is
//! fire and forget: whoever asks for events gets every event from the
//! requested number to the end of the log, packed greedily into datagrams
//! of at most [`MAX_SERVER_DATAGRAM_LEN`] bytes.

use crate::session::PeerAddr;
use log::{debug, warn};
use shared::{EncodedEvent, EventData, WireError, MAX_SERVER_DATAGRAM_LEN};
use std::io;
use std::net::SocketAddr;

/// Non-blocking datagram output.
pub trait DatagramSink {
    fn send_datagram(&self, datagram: &[u8], target: SocketAddr) -> io::Result<usize>;
}

impl DatagramSink for tokio::net::UdpSocket {
    fn send_datagram(&self, datagram: &[u8], target: SocketAddr) -> io::Result<usize> {
        self.try_send_to(datagram, target)
    }
}

/// Sends one datagram. A full socket buffer drops it; any other error is returned.
fn deliver<S: DatagramSink + ?Sized>(
    sink: &S,
    datagram: &[u8],
    target: PeerAddr,
) -> io::Result<()> {
    match sink.send_datagram(datagram, target.into()) {
        Ok(_) => Ok(()),
        Err(e) if e.kind() == io::ErrorKind::WouldBlock => {
            debug!("Dropped {} byte datagram to {}", datagram.len(), target);
            Ok(())
        }
        Err(e) => Err(e),
    }
}

#[derive(Debug, Default)]
pub struct EventLog {
    game_id: u32,
    events: Vec<EncodedEvent>,
}

impl EventLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Empties the log for a new game.
    pub fn reset(&mut self, game_id: u32) {
        self.game_id = game_id;
        self.events.clear();
    }

    pub fn game_id(&self) -> u32 {
        self.game_id
    }

    /// Appends an event under the next free number and returns that number.
    pub fn append(&mut self, data: &EventData) -> Result<u32, WireError> {
        let event_no = self.events.len() as u32;
        self.events.push(EncodedEvent::new(event_no, data)?);
        Ok(event_no)
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn events(&self) -> &[EncodedEvent] {
        &self.events
    }

    /// Writes the game id and as many events from `start` as fit into `buf`.
    ///
    /// Returns the number of events written so the caller can continue
    /// from `start + consumed`.
    pub fn bundle(&self, start: usize, buf: &mut Vec<u8>) -> usize {
        buf.clear();
        buf.extend_from_slice(&self.game_id.to_be_bytes());

        let mut consumed = 0;
        for event in self.events.iter().skip(start) {
            if buf.len() + event.len() > MAX_SERVER_DATAGRAM_LEN {
                break;
            }
            buf.extend_from_slice(event.as_bytes());
            consumed += 1;
        }
        consumed
    }

    fn for_each_datagram<F>(&self, start: usize, mut send: F) -> io::Result<()>
    where
        F: FnMut(&[u8]) -> io::Result<()>,
    {
        let mut next = start;
        let mut buf = Vec::with_capacity(MAX_SERVER_DATAGRAM_LEN);
        while next < self.events.len() {
            let consumed = self.bundle(next, &mut buf);
            if consumed == 0 {
                warn!(
                    "Event {} does not fit into a {} byte datagram",
                    next, MAX_SERVER_DATAGRAM_LEN
                );
                break;
            }
            next += consumed;
            send(&buf)?;
        }
        Ok(())
    }

    /// Replays events `start..` to a single client.
    pub fn send_to_one<S: DatagramSink + ?Sized>(
        &self,
        sink: &S,
        target: PeerAddr,
        start: usize,
    ) -> io::Result<()> {
        self.for_each_datagram(start, |datagram| deliver(sink, datagram, target))
    }

    /// Sends events `start..` to every target.
    pub fn broadcast<S: DatagramSink + ?Sized>(
        &self,
        sink: &S,
        targets: &[PeerAddr],
        start: usize,
    ) -> io::Result<()> {
        self.for_each_datagram(start, |datagram| {
            targets
                .iter()
                .try_for_each(|target| deliver(sink, datagram, *target))
        })
    }
}
