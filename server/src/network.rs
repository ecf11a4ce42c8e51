//! Server network layer: shared state, datagram listener and task wiring.

use crate::config::ServerConfig;
use crate::event_log::DatagramSink;
use crate::game::{GameState, Phase};
use crate::scheduler;
use crate::session::{Admission, PeerAddr, SessionTable};
use crate::ServerError;
use log::{debug, info};
use shared::ClientMessage;
use std::io;
use std::net::{Ipv6Addr, SocketAddr};
use std::sync::Arc;
use tokio::net::UdpSocket;
use tokio::sync::{Mutex, Notify};
use tokio::time::{Duration, Instant};

/// Larger than any valid client datagram so oversized ones are noticed.
const LISTEN_BUFFER_SIZE: usize = 64;

/// Everything the listener and the scheduler share, guarded by one lock.
pub struct ServerState {
    pub sessions: SessionTable,
    pub game: GameState,
}

impl ServerState {
    pub fn new(config: &ServerConfig) -> Self {
        Self {
            sessions: SessionTable::default(),
            game: GameState::new(config),
        }
    }

    /// Applies one client datagram and replays the requested events to its sender.
    ///
    /// Malformed datagrams are ignored and yield `None`.
    pub fn handle_datagram<S: DatagramSink + ?Sized>(
        &mut self,
        addr: SocketAddr,
        datagram: &[u8],
        now: Instant,
        sink: &S,
    ) -> io::Result<Option<Admission>> {
        self.sessions.evict_idle(now);

        let message = match ClientMessage::decode(datagram) {
            Ok(message) => message,
            Err(e) => {
                debug!("Ignoring datagram from {}: {}", addr, e);
                return Ok(None);
            }
        };

        let peer = PeerAddr::from(addr);
        let admission = self.sessions.admit_or_update(peer, &message, now);
        if admission.wants_replay() {
            self.game
                .log()
                .send_to_one(sink, peer, message.next_expected_event_no as usize)?;
        }
        Ok(Some(admission))
    }

    /// All named players are ready, there are at least two, and no game runs.
    pub fn ready_to_start(&self) -> bool {
        self.game.phase() != Phase::Playing && self.sessions.ready_to_start()
    }

    /// Starts a game and sends its opening events to every session.
    ///
    /// Returns whether the game is still running afterwards.
    pub fn start_game<S: DatagramSink + ?Sized>(&mut self, sink: &S) -> Result<bool, ServerError> {
        let step = self.game.start(&mut self.sessions)?;
        self.game
            .log()
            .broadcast(sink, &self.sessions.addresses(), step.first_event)?;
        Ok(step.playing)
    }

    /// Plays one round and broadcasts what it produced.
    pub fn play_round<S: DatagramSink + ?Sized>(
        &mut self,
        sink: &S,
        now: Instant,
    ) -> Result<bool, ServerError> {
        self.sessions.evict_idle(now);
        let step = self.game.play_round(&mut self.sessions)?;
        self.game
            .log()
            .broadcast(sink, &self.sessions.addresses(), step.first_event)?;
        Ok(step.playing)
    }
}

/// Receives client datagrams until the socket fails.
async fn listen(
    socket: Arc<UdpSocket>,
    state: Arc<Mutex<ServerState>>,
    wakeup: Arc<Notify>,
) -> Result<(), ServerError> {
    let mut buffer = [0u8; LISTEN_BUFFER_SIZE];
    loop {
        let (len, addr) = socket.recv_from(&mut buffer).await?;
        let mut state = state.lock().await;
        state.handle_datagram(addr, &buffer[..len], Instant::now(), socket.as_ref())?;
        if state.ready_to_start() {
            wakeup.notify_one();
        }
    }
}

/// Game server owning the socket and the shared state.
pub struct Server {
    socket: Arc<UdpSocket>,
    state: Arc<Mutex<ServerState>>,
    wakeup: Arc<Notify>,
    round_duration: Duration,
}

impl Server {
    /// Binds the configured port on every IPv6 and IPv4 address.
    pub async fn new(config: ServerConfig) -> Result<Self, ServerError> {
        let addr = SocketAddr::from((Ipv6Addr::UNSPECIFIED, config.port));
        Self::bind(addr, config).await
    }

    pub async fn bind(addr: SocketAddr, config: ServerConfig) -> Result<Self, ServerError> {
        let socket = UdpSocket::bind(addr).await?;
        info!("Server listening on {}", socket.local_addr()?);
        info!(
            "Board {}x{}, turning speed {}, {} rounds per second, seed {}",
            config.width, config.height, config.turning_speed, config.rounds_per_second, config.seed
        );

        Ok(Server {
            socket: Arc::new(socket),
            state: Arc::new(Mutex::new(ServerState::new(&config))),
            wakeup: Arc::new(Notify::new()),
            round_duration: config.round_duration(),
        })
    }

    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.socket.local_addr()
    }

    /// Runs the listener and the scheduler until either fails.
    pub async fn run(self) -> Result<(), ServerError> {
        let listener = tokio::spawn(listen(
            Arc::clone(&self.socket),
            Arc::clone(&self.state),
            Arc::clone(&self.wakeup),
        ));
        let scheduler = tokio::spawn(scheduler::run(
            Arc::clone(&self.state),
            Arc::clone(&self.socket),
            Arc::clone(&self.wakeup),
            self.round_duration,
        ));

        tokio::select! {
            result = listener => result?,
            result = scheduler => result?,
        }
    }
}
