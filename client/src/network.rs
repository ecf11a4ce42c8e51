//! Client wiring: resolves both peers and runs the heartbeat, the GUI key
//! reader and the event forwarder side by side.

use crate::config::ClientConfig;
use crate::decoder::Decoder;
use crate::gui::{read_keys, send_commands};
use crate::heartbeat::{session_id_from_clock, Heartbeat};
use crate::state::SyncState;
use crate::ClientError;
use log::info;
use std::net::{Ipv4Addr, Ipv6Addr, SocketAddr};
use std::sync::Arc;
use tokio::io::{AsyncWrite, BufReader};
use tokio::net::{lookup_host, TcpStream, UdpSocket};

/// Room for more than the largest valid server datagram.
const RECEIVE_BUFFER_SIZE: usize = 600;

/// Receives server datagrams and writes what they render to the GUI.
pub async fn forward_events<W>(
    socket: &UdpSocket,
    decoder: &mut Decoder,
    gui: &mut W,
) -> Result<(), ClientError>
where
    W: AsyncWrite + Unpin,
{
    let mut buffer = [0u8; RECEIVE_BUFFER_SIZE];
    loop {
        let len = socket.recv(&mut buffer).await?;
        let commands = decoder.process_datagram(&buffer[..len])?;
        if !commands.is_empty() {
            send_commands(gui, &commands).await?;
        }
    }
}

pub struct Client {
    socket: Arc<UdpSocket>,
    gui: TcpStream,
    sync: Arc<SyncState>,
    heartbeat: Heartbeat,
}

impl Client {
    /// Connects the UDP socket to the game server and opens the GUI stream.
    pub async fn connect(config: &ClientConfig) -> Result<Self, ClientError> {
        let server_addr = lookup_host((config.server_host.as_str(), config.server_port))
            .await?
            .next()
            .ok_or_else(|| ClientError::Resolve(config.server_host.clone()))?;
        let local_addr: SocketAddr = if server_addr.is_ipv4() {
            (Ipv4Addr::UNSPECIFIED, 0).into()
        } else {
            (Ipv6Addr::UNSPECIFIED, 0).into()
        };
        let socket = UdpSocket::bind(local_addr).await?;
        socket.connect(server_addr).await?;
        info!("Game server at {}", server_addr);

        let gui = TcpStream::connect((config.gui_host.as_str(), config.gui_port)).await?;
        gui.set_nodelay(true)?;
        info!("GUI at {}", gui.peer_addr()?);

        Ok(Self::from_parts(
            socket,
            gui,
            session_id_from_clock(),
            config.player_name.clone(),
        ))
    }

    /// Builds a client from already connected sockets.
    pub fn from_parts(
        socket: UdpSocket,
        gui: TcpStream,
        session_id: u64,
        player_name: String,
    ) -> Self {
        Self {
            socket: Arc::new(socket),
            gui,
            sync: Arc::new(SyncState::new()),
            heartbeat: Heartbeat::new(session_id, player_name),
        }
    }

    /// Runs until one of the tasks fails; the GUI closing counts as failure.
    pub async fn run(self) -> Result<(), ClientError> {
        info!("Session {}", self.heartbeat.session_id());
        let (gui_reader, mut gui_writer) = self.gui.into_split();

        let heartbeat = tokio::spawn(
            self.heartbeat
                .run(Arc::clone(&self.socket), Arc::clone(&self.sync)),
        );
        let keys = tokio::spawn(read_keys(BufReader::new(gui_reader), Arc::clone(&self.sync)));
        let events = {
            let socket = Arc::clone(&self.socket);
            let mut decoder = Decoder::new(Arc::clone(&self.sync));
            tokio::spawn(
                async move { forward_events(&socket, &mut decoder, &mut gui_writer).await },
            )
        };

        tokio::select! {
            result = heartbeat => result?,
            result = keys => result?,
            result = events => result?,
        }
    }
}
