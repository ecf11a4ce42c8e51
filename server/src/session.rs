//! Player sessions keyed by network address.
//!
//! Sessions live in a slot store. The connection table holds one reference
//! to a slot and a running game holds another for each participant, so a
//! session that is evicted or replaced mid-game keeps moving until the game
//! ends and only then frees its slot.
//!
//! Admission rules, checked for every valid heartbeat:
//! - unknown address: admit unless the name is taken or the table is full
//! - known address with a different session id: drop the old session, then
//!   admit as if the address were unknown
//! - known address and session id but a different name: ignore
//! - otherwise: refresh the session and replay events to it

use log::{debug, info};
use shared::{ClientMessage, TurnDirection};
use std::collections::HashMap;
use std::fmt;
use std::net::{Ipv4Addr, Ipv6Addr, SocketAddr};
use tokio::time::{Duration, Instant};

pub const MAX_SESSIONS: usize = 25;
pub const MAX_IDLE_TIME: Duration = Duration::from_secs(2);

/// Address of a peer. Equality and hashing only look at the ip and port.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PeerAddr {
    V4 { ip: Ipv4Addr, port: u16 },
    V6 { ip: Ipv6Addr, port: u16 },
}

impl From<SocketAddr> for PeerAddr {
    fn from(addr: SocketAddr) -> Self {
        match addr {
            SocketAddr::V4(v4) => PeerAddr::V4 {
                ip: *v4.ip(),
                port: v4.port(),
            },
            SocketAddr::V6(v6) => PeerAddr::V6 {
                ip: *v6.ip(),
                port: v6.port(),
            },
        }
    }
}

impl From<PeerAddr> for SocketAddr {
    fn from(addr: PeerAddr) -> Self {
        match addr {
            PeerAddr::V4 { ip, port } => SocketAddr::new(ip.into(), port),
            PeerAddr::V6 { ip, port } => SocketAddr::new(ip.into(), port),
        }
    }
}

impl fmt::Display for PeerAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        SocketAddr::from(*self).fmt(f)
    }
}

/// State of one connected client, including its worm while a game runs.
#[derive(Debug, Clone)]
pub struct Session {
    pub session_id: u64,
    /// Empty for observers, who never join a game.
    pub name: String,
    pub last_seen: Instant,
    pub turn_direction: TurnDirection,
    /// Set once a named player has steered since the last game ended.
    pub ready: bool,
    pub eliminated: bool,
    pub x: f64,
    pub y: f64,
    /// Degrees in `0..360`.
    pub heading: u32,
}

impl Session {
    pub fn new(session_id: u64, name: String, turn_direction: TurnDirection, now: Instant) -> Self {
        let mut session = Self {
            session_id,
            name,
            last_seen: now,
            turn_direction: TurnDirection::Straight,
            ready: false,
            eliminated: false,
            x: 0.0,
            y: 0.0,
            heading: 0,
        };
        session.set_direction(turn_direction);
        session
    }

    pub fn set_direction(&mut self, turn_direction: TurnDirection) {
        self.turn_direction = turn_direction;
        if turn_direction != TurnDirection::Straight && !self.name.is_empty() {
            self.ready = true;
        }
    }

    pub fn is_named(&self) -> bool {
        !self.name.is_empty()
    }

    pub fn is_idle(&self, now: Instant, timeout: Duration) -> bool {
        now.saturating_duration_since(self.last_seen) > timeout
    }

    /// Clears per-game flags; the player has to steer again to be ready.
    pub fn game_ended(&mut self) {
        self.eliminated = false;
        self.ready = false;
    }
}

/// Stable handle to a session slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SessionKey(usize);

#[derive(Debug)]
struct Slot {
    session: Session,
    holders: usize,
}

/// Slot allocator with a holder count per slot.
#[derive(Debug, Default)]
pub struct SessionStore {
    slots: Vec<Option<Slot>>,
    free: Vec<usize>,
}

impl SessionStore {
    fn insert(&mut self, session: Session) -> SessionKey {
        let slot = Some(Slot {
            session,
            holders: 1,
        });
        match self.free.pop() {
            Some(index) => {
                self.slots[index] = slot;
                SessionKey(index)
            }
            None => {
                self.slots.push(slot);
                SessionKey(self.slots.len() - 1)
            }
        }
    }

    /// Registers one more collection holding `key`.
    pub fn retain(&mut self, key: SessionKey) {
        if let Some(Some(slot)) = self.slots.get_mut(key.0) {
            slot.holders += 1;
        }
    }

    /// Drops one holder of `key` and frees the slot when none remain.
    pub fn release(&mut self, key: SessionKey) {
        let Some(entry) = self.slots.get_mut(key.0) else {
            return;
        };
        let freed = match entry {
            Some(slot) => {
                slot.holders -= 1;
                slot.holders == 0
            }
            None => false,
        };
        if freed {
            *entry = None;
            self.free.push(key.0);
        }
    }

    pub fn get(&self, key: SessionKey) -> Option<&Session> {
        self.slots.get(key.0)?.as_ref().map(|slot| &slot.session)
    }

    pub fn get_mut(&mut self, key: SessionKey) -> Option<&mut Session> {
        self.slots.get_mut(key.0)?.as_mut().map(|slot| &mut slot.session)
    }

    /// Number of occupied slots.
    pub fn live(&self) -> usize {
        self.slots.iter().filter(|slot| slot.is_some()).count()
    }
}

/// Result of feeding one heartbeat to the table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    New,
    Reconnected,
    Updated,
    NameTaken,
    Full,
    NameMismatch,
}

impl Admission {
    /// True when the sender should get the events it asked for.
    pub fn wants_replay(self) -> bool {
        matches!(
            self,
            Admission::New | Admission::Reconnected | Admission::Updated
        )
    }
}

pub struct SessionTable {
    store: SessionStore,
    connections: HashMap<PeerAddr, SessionKey>,
    max_sessions: usize,
    idle_timeout: Duration,
}

impl SessionTable {
    pub fn new(max_sessions: usize, idle_timeout: Duration) -> Self {
        Self {
            store: SessionStore::default(),
            connections: HashMap::new(),
            max_sessions,
            idle_timeout,
        }
    }

    pub fn store(&self) -> &SessionStore {
        &self.store
    }

    pub fn store_mut(&mut self) -> &mut SessionStore {
        &mut self.store
    }

    pub fn admit_or_update(
        &mut self,
        addr: PeerAddr,
        message: &ClientMessage,
        now: Instant,
    ) -> Admission {
        let Some(&key) = self.connections.get(&addr) else {
            return self.admit(addr, message, now);
        };
        let Some(session) = self.store.get_mut(key) else {
            self.connections.remove(&addr);
            return self.admit(addr, message, now);
        };

        if session.session_id != message.session_id {
            info!(
                "Session {} from {} replaced by session {}",
                session.session_id, addr, message.session_id
            );
            self.remove(addr);
            return match self.admit(addr, message, now) {
                Admission::New => Admission::Reconnected,
                other => other,
            };
        }

        if session.name != message.player_name {
            debug!(
                "Ignoring heartbeat from {}: name {:?} does not match {:?}",
                addr, message.player_name, session.name
            );
            return Admission::NameMismatch;
        }

        session.set_direction(message.turn_direction);
        session.last_seen = now;
        Admission::Updated
    }

    fn admit(&mut self, addr: PeerAddr, message: &ClientMessage, now: Instant) -> Admission {
        if !message.player_name.is_empty() && !self.name_is_free(&message.player_name) {
            debug!("Rejecting {}: name {:?} taken", addr, message.player_name);
            return Admission::NameTaken;
        }
        if self.connections.len() >= self.max_sessions {
            debug!("Rejecting {}: table full", addr);
            return Admission::Full;
        }

        let session = Session::new(
            message.session_id,
            message.player_name.clone(),
            message.turn_direction,
            now,
        );
        let key = self.store.insert(session);
        self.connections.insert(addr, key);
        info!(
            "Session {} connected from {} as {:?}",
            message.session_id, addr, message.player_name
        );
        Admission::New
    }

    fn name_is_free(&self, name: &str) -> bool {
        !self.sessions().any(|s| s.is_named() && s.name == name)
    }

    fn sessions(&self) -> impl Iterator<Item = &Session> + '_ {
        self.connections
            .values()
            .filter_map(|key| self.store.get(*key))
    }

    pub fn remove(&mut self, addr: PeerAddr) -> bool {
        match self.connections.remove(&addr) {
            Some(key) => {
                self.store.release(key);
                true
            }
            None => false,
        }
    }

    /// Drops every session idle for longer than the timeout.
    pub fn evict_idle(&mut self, now: Instant) -> Vec<PeerAddr> {
        let idle: Vec<PeerAddr> = self
            .connections
            .iter()
            .filter(|(_, key)| {
                self.store
                    .get(**key)
                    .map_or(true, |s| s.is_idle(now, self.idle_timeout))
            })
            .map(|(addr, _)| *addr)
            .collect();

        for addr in &idle {
            info!("Session from {} timed out", addr);
            self.remove(*addr);
        }
        idle
    }

    pub fn get(&self, addr: PeerAddr) -> Option<&Session> {
        self.store.get(*self.connections.get(&addr)?)
    }

    /// Sessions with a name.
    pub fn connected_players(&self) -> usize {
        self.sessions().filter(|s| s.is_named()).count()
    }

    pub fn ready_players(&self) -> usize {
        self.sessions().filter(|s| s.is_named() && s.ready).count()
    }

    /// Every named player is ready and there are at least two of them.
    pub fn ready_to_start(&self) -> bool {
        let connected = self.connected_players();
        connected > 1 && connected == self.ready_players()
    }

    /// Keys of named sessions ordered by name.
    pub fn players_by_name(&self) -> Vec<SessionKey> {
        let mut players: Vec<(&str, SessionKey)> = self
            .connections
            .values()
            .filter_map(|key| {
                let session = self.store.get(*key)?;
                session.is_named().then_some((session.name.as_str(), *key))
            })
            .collect();
        players.sort_by(|a, b| a.0.cmp(b.0));
        players.into_iter().map(|(_, key)| key).collect()
    }

    pub fn addresses(&self) -> Vec<PeerAddr> {
        self.connections.keys().copied().collect()
    }

    pub fn len(&self) -> usize {
        self.connections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.connections.is_empty()
    }
}

impl Default for SessionTable {
    fn default() -> Self {
        Self::new(MAX_SESSIONS, MAX_IDLE_TIME)
    }
}
