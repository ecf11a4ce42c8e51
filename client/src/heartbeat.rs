//! Periodic client to server datagram carrying the steering direction and
//! the next event the client needs.

use crate::state::SyncState;
use crate::ClientError;
use shared::ClientMessage;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};
use tokio::net::UdpSocket;
use tokio::time::{interval, Duration, MissedTickBehavior};

pub const HEARTBEAT_INTERVAL: Duration = Duration::from_millis(20);

/// Session id derived from the wall clock, in microseconds since the epoch.
pub fn session_id_from_clock() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_micros() as u64)
        .unwrap_or_default()
}

#[derive(Debug, Clone)]
pub struct Heartbeat {
    session_id: u64,
    player_name: String,
}

impl Heartbeat {
    pub fn new(session_id: u64, player_name: String) -> Self {
        Self {
            session_id,
            player_name,
        }
    }

    pub fn session_id(&self) -> u64 {
        self.session_id
    }

    pub fn message(&self, sync: &SyncState) -> ClientMessage {
        ClientMessage {
            session_id: self.session_id,
            turn_direction: sync.turn_direction(),
            next_expected_event_no: sync.next_expected_event_no(),
            player_name: self.player_name.clone(),
        }
    }

    /// Sends a heartbeat every [`HEARTBEAT_INTERVAL`] over a connected socket.
    ///
    /// A slow send delays the next tick instead of causing a burst.
    pub async fn run(
        self,
        socket: Arc<UdpSocket>,
        sync: Arc<SyncState>,
    ) -> Result<(), ClientError> {
        let mut ticker = interval(HEARTBEAT_INTERVAL);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            ticker.tick().await;
            let datagram = self.message(&sync).encode()?;
            socket.send(&datagram).await?;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gui::KeyEvent;
    use shared::TurnDirection;

    #[test]
    fn test_message_reflects_shared_state() {
        let sync = SyncState::new();
        let heartbeat = Heartbeat::new(99, "amy".into());
        sync.apply_key(KeyEvent::LeftDown);
        sync.set_next_expected_event_no(12);

        let message = heartbeat.message(&sync);
        assert_eq!(message.session_id, 99);
        assert_eq!(message.turn_direction, TurnDirection::Left);
        assert_eq!(message.next_expected_event_no, 12);
        assert_eq!(message.player_name, "amy");
    }

    #[test]
    fn test_session_id_is_recent_microseconds() {
        let id = session_id_from_clock();
        // later than 2020-01-01
        assert!(id > 1_577_836_800_000_000);
    }

    #[tokio::test]
    async fn test_sends_periodically_with_latest_state() {
        let server = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let client = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        client.connect(server.local_addr().unwrap()).await.unwrap();

        let sync = Arc::new(SyncState::new());
        let heartbeat = Heartbeat::new(5, String::new());
        let task = tokio::spawn(heartbeat.run(Arc::new(client), Arc::clone(&sync)));

        let mut buf = [0u8; 64];
        let len = server.recv(&mut buf).await.unwrap();
        let first = ClientMessage::decode(&buf[..len]).unwrap();
        assert_eq!(first.session_id, 5);
        assert!(first.player_name.is_empty());

        sync.set_next_expected_event_no(7);
        let mut latest = first;
        while latest.next_expected_event_no != 7 {
            let len = tokio::time::timeout(Duration::from_secs(1), server.recv(&mut buf))
                .await
                .unwrap()
                .unwrap();
            latest = ClientMessage::decode(&buf[..len]).unwrap();
        }
        task.abort();
    }
}
