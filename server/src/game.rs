//! Authoritative game simulation.
//!
//! A game snapshots every named session (sorted by name) when it starts,
//! spawns each worm at a pseudo-random cell and then moves all surviving
//! worms once per round. Every observable change is appended to the
//! [`EventLog`]; callers broadcast whatever a step appended.

use crate::config::ServerConfig;
use crate::event_log::EventLog;
use crate::session::{Session, SessionKey, SessionTable};
use log::{debug, info};
use rand::RngCore;
use shared::{EventData, TurnDirection, WireError};

pub const RANDOM_MULTIPLIER: u64 = 279_410_273;
pub const RANDOM_MODULUS: u64 = 4_294_967_291;

/// Multiplicative congruential generator shared by all games of a server run.
#[derive(Debug, Clone)]
pub struct GameRng {
    state: u32,
}

impl GameRng {
    pub fn new(seed: u32) -> Self {
        Self { state: seed }
    }

    /// Returns the current state and advances it.
    pub fn draw(&mut self) -> u32 {
        let current = self.state;
        self.state = (u64::from(current) * RANDOM_MULTIPLIER % RANDOM_MODULUS) as u32;
        current
    }
}

impl RngCore for GameRng {
    fn next_u32(&mut self) -> u32 {
        self.draw()
    }

    fn next_u64(&mut self) -> u64 {
        (u64::from(self.draw()) << 32) | u64::from(self.draw())
    }

    fn fill_bytes(&mut self, dest: &mut [u8]) {
        for chunk in dest.chunks_mut(4) {
            let bytes = self.draw().to_be_bytes();
            chunk.copy_from_slice(&bytes[..chunk.len()]);
        }
    }

    fn try_fill_bytes(&mut self, dest: &mut [u8]) -> Result<(), rand::Error> {
        self.fill_bytes(dest);
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Idle,
    Playing,
    Finished,
}

/// Outcome of starting a game or playing a round.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Step {
    /// Number of the first event this step appended.
    pub first_event: usize,
    pub playing: bool,
}

/// Integer cell containing a continuous position.
fn cell_of(x: f64, y: f64) -> (i64, i64) {
    (x.floor() as i64, y.floor() as i64)
}

/// Turns the worm according to its direction, then moves it one unit.
pub fn move_worm(worm: &mut Session, turning_speed: u32) {
    let turn = match worm.turn_direction {
        TurnDirection::Straight => 0,
        TurnDirection::Right => i64::from(turning_speed),
        TurnDirection::Left => -i64::from(turning_speed),
    };
    worm.heading = (i64::from(worm.heading) + turn).rem_euclid(360) as u32;

    let radians = f64::from(worm.heading).to_radians();
    worm.x += radians.cos();
    worm.y += radians.sin();
}

pub struct GameState<R = GameRng> {
    rng: R,
    width: u32,
    height: u32,
    turning_speed: u32,
    phase: Phase,
    players: Vec<SessionKey>,
    board: Vec<bool>,
    active_players: usize,
    log: EventLog,
}

impl GameState<GameRng> {
    pub fn new(config: &ServerConfig) -> Self {
        Self::with_rng(config, GameRng::new(config.seed))
    }
}

impl<R: RngCore> GameState<R> {
    pub fn with_rng(config: &ServerConfig, rng: R) -> Self {
        Self {
            rng,
            width: config.width,
            height: config.height,
            turning_speed: config.turning_speed,
            phase: Phase::Idle,
            players: Vec::new(),
            board: Vec::new(),
            active_players: 0,
            log: EventLog::new(),
        }
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn game_id(&self) -> u32 {
        self.log.game_id()
    }

    pub fn log(&self) -> &EventLog {
        &self.log
    }

    /// Participants of the running game in turn order.
    pub fn participants(&self) -> &[SessionKey] {
        &self.players
    }

    pub fn active_players(&self) -> usize {
        self.active_players
    }

    pub fn is_occupied(&self, x: u32, y: u32) -> bool {
        let index = (y as usize) * (self.width as usize) + x as usize;
        self.board.get(index).copied().unwrap_or(false)
    }

    /// Returns the cell if it lies on the board and is still free.
    fn free_cell(&self, x: i64, y: i64) -> Option<(u32, u32)> {
        let x = u32::try_from(x).ok().filter(|&x| x < self.width)?;
        let y = u32::try_from(y).ok().filter(|&y| y < self.height)?;
        (!self.is_occupied(x, y)).then_some((x, y))
    }

    fn claim(&mut self, player: usize, x: u32, y: u32) -> Result<(), WireError> {
        let width = self.width as usize;
        self.board[(y as usize) * width + x as usize] = true;
        self.log.append(&EventData::Pixel {
            player_number: player as u8,
            x,
            y,
        })?;
        Ok(())
    }

    fn eliminate(&mut self, player: usize) -> Result<(), WireError> {
        self.active_players -= 1;
        self.log.append(&EventData::PlayerEliminated {
            player_number: player as u8,
        })?;
        debug!(
            "Player {} eliminated, {} still playing",
            player, self.active_players
        );
        Ok(())
    }

    fn finish(&mut self, sessions: &mut SessionTable) -> Result<(), WireError> {
        self.log.append(&EventData::GameOver)?;
        self.release_players(sessions);
        self.phase = Phase::Finished;
        info!(
            "Game {} over after {} events",
            self.log.game_id(),
            self.log.len()
        );
        Ok(())
    }

    fn release_players(&mut self, sessions: &mut SessionTable) {
        let store = sessions.store_mut();
        for key in self.players.drain(..) {
            if let Some(player) = store.get_mut(key) {
                player.game_ended();
            }
            store.release(key);
        }
    }

    /// Starts a new game with every named session and spawns the worms.
    ///
    /// The previous game's log and board are discarded only here, so a
    /// finished game stays available for replay until the next one begins.
    pub fn start(&mut self, sessions: &mut SessionTable) -> Result<Step, WireError> {
        self.release_players(sessions);
        self.board.clear();
        self.board
            .resize(self.width as usize * self.height as usize, false);

        self.players = sessions.players_by_name();
        self.active_players = self.players.len();
        let store = sessions.store_mut();
        for &key in &self.players {
            store.retain(key);
        }

        let game_id = self.rng.next_u32();
        self.log.reset(game_id);
        self.phase = Phase::Playing;

        let player_names: Vec<String> = self
            .players
            .iter()
            .filter_map(|&key| store.get(key))
            .map(|player| player.name.clone())
            .collect();
        info!("Starting game {} with {:?}", game_id, player_names);
        self.log.append(&EventData::NewGame {
            maxx: self.width,
            maxy: self.height,
            player_names,
        })?;

        for index in 0..self.players.len() {
            let x = self.rng.next_u32() % self.width;
            let y = self.rng.next_u32() % self.height;
            let heading = self.rng.next_u32() % 360;

            let Some(player) = store.get_mut(self.players[index]) else {
                continue;
            };
            player.x = f64::from(x) + 0.5;
            player.y = f64::from(y) + 0.5;
            player.heading = heading;
            player.eliminated = false;

            if self.is_occupied(x, y) {
                player.eliminated = true;
                self.eliminate(index)?;
            } else {
                self.claim(index, x, y)?;
            }
        }

        if self.active_players <= 1 {
            self.finish(sessions)?;
        }
        Ok(Step {
            first_event: 0,
            playing: self.phase == Phase::Playing,
        })
    }

    /// Moves every surviving worm once, in snapshot order.
    ///
    /// The round stops at the elimination that leaves a single survivor.
    pub fn play_round(&mut self, sessions: &mut SessionTable) -> Result<Step, WireError> {
        let first_event = self.log.len();
        if self.phase != Phase::Playing {
            return Ok(Step {
                first_event,
                playing: false,
            });
        }

        for index in 0..self.players.len() {
            let Some(player) = sessions.store_mut().get_mut(self.players[index]) else {
                continue;
            };
            if player.eliminated {
                continue;
            }

            let before = cell_of(player.x, player.y);
            move_worm(player, self.turning_speed);
            let (x, y) = cell_of(player.x, player.y);
            if (x, y) == before {
                continue;
            }

            match self.free_cell(x, y) {
                Some((x, y)) => self.claim(index, x, y)?,
                None => {
                    player.eliminated = true;
                    self.eliminate(index)?;
                    if self.active_players <= 1 {
                        self.finish(sessions)?;
                        return Ok(Step {
                            first_event,
                            playing: false,
                        });
                    }
                }
            }
        }

        Ok(Step {
            first_event,
            playing: true,
        })
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::session::PeerAddr;
    use assert_approx_eq::assert_approx_eq;
    use rand::rngs::mock::StepRng;
    use shared::{ClientMessage, Frames};
    use std::net::SocketAddr;
    use tokio::time::Instant;

    pub(crate) fn peer(port: u16) -> PeerAddr {
        SocketAddr::from(([127, 0, 0, 1], port)).into()
    }

    /// Admits named sessions on ports 1.. and marks them ready.
    pub(crate) fn ready_table(names: &[&str]) -> SessionTable {
        let mut table = SessionTable::default();
        let now = Instant::now();
        for (i, name) in names.iter().enumerate() {
            let port = i as u16 + 1;
            let mut message = ClientMessage {
                session_id: u64::from(port),
                turn_direction: TurnDirection::Right,
                next_expected_event_no: 0,
                player_name: name.to_string(),
            };
            table.admit_or_update(peer(port), &message, now);
            message.turn_direction = TurnDirection::Straight;
            table.admit_or_update(peer(port), &message, now);
        }
        table
    }

    fn config(width: u32, height: u32) -> ServerConfig {
        ServerConfig {
            width,
            height,
            ..ServerConfig::default()
        }
    }

    fn logged_events<R: RngCore>(game: &GameState<R>) -> Vec<EventData> {
        game.log()
            .events()
            .iter()
            .map(|event| {
                let frame = Frames::new(event.as_bytes()).next().unwrap().unwrap();
                frame.data().unwrap().unwrap()
            })
            .collect()
    }

    fn worm<'a>(table: &'a mut SessionTable, port: u16) -> &'a mut Session {
        let key = table
            .players_by_name()
            .into_iter()
            .find(|&key| table.store().get(key).map(|s| s.session_id) == Some(u64::from(port)))
            .unwrap();
        table.store_mut().get_mut(key).unwrap()
    }

    #[test]
    fn test_rng_sequence() {
        let mut rng = GameRng::new(1);
        assert_eq!(rng.draw(), 1);
        assert_eq!(rng.draw(), 279_410_273);
        let expected = (279_410_273u64 * RANDOM_MULTIPLIER % RANDOM_MODULUS) as u32;
        assert_eq!(rng.next_u32(), expected);

        let mut again = GameRng::new(1);
        let replay: Vec<u32> = (0..3).map(|_| again.draw()).collect();
        assert_eq!(replay, vec![1, 279_410_273, expected]);
    }

    #[test]
    fn test_start_emits_new_game_with_sorted_names() {
        let mut table = ready_table(&["zed", "amy"]);
        let mut game = GameState::new(&ServerConfig::default());
        assert_eq!(game.phase(), Phase::Idle);

        let step = game.start(&mut table).unwrap();
        assert!(step.playing);
        assert_eq!(game.phase(), Phase::Playing);
        assert_eq!(game.game_id(), 1);
        assert_eq!(game.participants().len(), 2);

        let events = logged_events(&game);
        assert_eq!(
            events[0],
            EventData::NewGame {
                maxx: 640,
                maxy: 480,
                player_names: vec!["amy".into(), "zed".into()],
            }
        );
        assert_eq!(events.len(), 3);
        assert!(matches!(events[1], EventData::Pixel { player_number: 0, .. }));
        assert!(matches!(events[2], EventData::Pixel { player_number: 1, .. }));
    }

    #[test]
    fn test_spawn_position_follows_draws() {
        let mut table = ready_table(&["amy", "bob"]);
        let mut game = GameState::with_rng(&config(100, 50), StepRng::new(10, 100));
        game.start(&mut table).unwrap();

        // draws: game id 10, then amy 110/210/310, bob 410/510/610 lands on amy
        assert_eq!(game.game_id(), 10);
        let amy = worm(&mut table, 1);
        assert_approx_eq!(amy.x, 10.5);
        assert_approx_eq!(amy.y, 10.5);
        assert_eq!(amy.heading, 310);
        let bob = worm(&mut table, 2);
        assert_approx_eq!(bob.x, 10.5);
        assert_approx_eq!(bob.y, 10.5);
        assert_eq!(bob.heading, 250);
    }

    #[test]
    fn test_spawn_collision_eliminates_later_player() {
        let mut table = ready_table(&["amy", "bob", "cat"]);
        let mut game = GameState::with_rng(&config(10, 10), StepRng::new(0, 0));
        let step = game.start(&mut table).unwrap();

        assert!(!step.playing);
        assert_eq!(game.phase(), Phase::Finished);
        assert_eq!(game.active_players(), 1);
        let events = logged_events(&game);
        assert_eq!(
            &events[1..],
            &[
                EventData::Pixel {
                    player_number: 0,
                    x: 0,
                    y: 0
                },
                EventData::PlayerEliminated { player_number: 1 },
                EventData::PlayerEliminated { player_number: 2 },
                EventData::GameOver,
            ]
        );
        // flags are reset for the next game
        assert_eq!(table.ready_players(), 0);
        assert!(game.participants().is_empty());
    }

    #[test]
    fn test_spawn_collision_with_survivors_keeps_playing() {
        let mut table = ready_table(&["amy", "bob", "cat"]);
        let draws = [5, 1, 1, 0, 1, 1, 0, 7, 7, 0];
        let mut game = GameState::with_rng(&config(10, 10), ScriptedRng::new(&draws));
        let step = game.start(&mut table).unwrap();

        assert!(step.playing);
        assert_eq!(game.game_id(), 5);
        assert_eq!(game.active_players(), 2);
        let events = logged_events(&game);
        assert_eq!(events[2], EventData::PlayerEliminated { player_number: 1 });
        assert_eq!(
            events[3],
            EventData::Pixel {
                player_number: 2,
                x: 7,
                y: 7
            }
        );
    }

    /// Replays a fixed list of draws.
    pub(crate) struct ScriptedRng {
        draws: Vec<u32>,
        next: usize,
    }

    impl ScriptedRng {
        pub(crate) fn new(draws: &[u32]) -> Self {
            Self {
                draws: draws.to_vec(),
                next: 0,
            }
        }
    }

    impl RngCore for ScriptedRng {
        fn next_u32(&mut self) -> u32 {
            let draw = self.draws[self.next % self.draws.len()];
            self.next += 1;
            draw
        }

        fn next_u64(&mut self) -> u64 {
            u64::from(self.next_u32())
        }

        fn fill_bytes(&mut self, dest: &mut [u8]) {
            dest.fill(0);
        }

        fn try_fill_bytes(&mut self, dest: &mut [u8]) -> Result<(), rand::Error> {
            self.fill_bytes(dest);
            Ok(())
        }
    }

    fn two_worm_game() -> (GameState<ScriptedRng>, SessionTable) {
        let mut table = ready_table(&["amy", "bob"]);
        let mut game = GameState::with_rng(
            &config(20, 20),
            ScriptedRng::new(&[9, 2, 2, 0, 10, 10, 90]),
        );
        game.start(&mut table).unwrap();
        (game, table)
    }

    #[test]
    fn test_sub_pixel_motion_emits_nothing() {
        let (mut game, mut table) = two_worm_game();
        for port in [1, 2] {
            let w = worm(&mut table, port);
            w.x = f64::from(w.x.floor() as u32) + 0.1;
            w.y = f64::from(w.y.floor() as u32) + 0.1;
            w.heading = 45;
        }
        let before = game.log().len();
        let step = game.play_round(&mut table).unwrap();

        assert!(step.playing);
        assert_eq!(step.first_event, before);
        assert_eq!(game.log().len(), before);
        assert_approx_eq!(worm(&mut table, 1).x, 2.1 + 45f64.to_radians().cos());
    }

    #[test]
    fn test_moving_into_new_cell_claims_it() {
        let (mut game, mut table) = two_worm_game();
        // amy heads east from (2.5, 2.5), bob south from (10.5, 10.5)
        let step = game.play_round(&mut table).unwrap();
        assert!(step.playing);

        let events = logged_events(&game);
        assert_eq!(
            &events[step.first_event..],
            &[
                EventData::Pixel {
                    player_number: 0,
                    x: 3,
                    y: 2
                },
                EventData::Pixel {
                    player_number: 1,
                    x: 10,
                    y: 11
                },
            ]
        );
        assert!(game.is_occupied(3, 2));
        assert!(game.is_occupied(2, 2));
    }

    #[test]
    fn test_leaving_board_ends_game_immediately() {
        let (mut game, mut table) = two_worm_game();
        {
            let amy = worm(&mut table, 1);
            amy.x = 0.5;
            amy.y = 0.5;
            amy.heading = 180;
        }
        let bob_before = worm(&mut table, 2).x;

        let step = game.play_round(&mut table).unwrap();
        assert!(!step.playing);
        assert_eq!(game.phase(), Phase::Finished);
        let events = logged_events(&game);
        assert_eq!(
            &events[step.first_event..],
            &[
                EventData::PlayerEliminated { player_number: 0 },
                EventData::GameOver
            ]
        );
        // bob was not moved in the final round
        assert_approx_eq!(worm(&mut table, 2).x, bob_before);
    }

    #[test]
    fn test_running_into_trail_eliminates() {
        let (mut game, mut table) = two_worm_game();
        {
            // bob sits just below amy's spawn cell and heads up into it
            let bob = worm(&mut table, 2);
            bob.x = 2.5;
            bob.y = 3.5;
            bob.heading = 270;
        }
        let step = game.play_round(&mut table).unwrap();
        assert!(!step.playing);
        let events = logged_events(&game);
        assert!(events.contains(&EventData::PlayerEliminated { player_number: 1 }));
        assert_eq!(events.last(), Some(&EventData::GameOver));
    }

    #[test]
    fn test_heading_wraps() {
        let mut worm = Session::new(1, "amy".into(), TurnDirection::Left, Instant::now());
        worm.heading = 3;
        move_worm(&mut worm, 6);
        assert_eq!(worm.heading, 357);

        worm.turn_direction = TurnDirection::Right;
        move_worm(&mut worm, 6);
        move_worm(&mut worm, 6);
        assert_eq!(worm.heading, 9);
    }

    #[test]
    fn test_whole_game_numbers_events_densely() {
        let mut table = ready_table(&["amy", "bob", "cat"]);
        let mut game = GameState::new(&ServerConfig {
            seed: 12345,
            ..config(30, 30)
        });
        let mut step = game.start(&mut table).unwrap();
        let mut rounds = 0;
        while step.playing {
            step = game.play_round(&mut table).unwrap();
            rounds += 1;
            assert!(rounds < 10_000);
        }

        let numbers: Vec<u32> = game.log().events().iter().map(|e| e.event_no()).collect();
        assert_eq!(numbers, (0..game.log().len() as u32).collect::<Vec<_>>());
        assert_eq!(logged_events(&game).last(), Some(&EventData::GameOver));
        assert_eq!(game.active_players(), 1);

        // finished games stay put until the next start
        let after = game.play_round(&mut table).unwrap();
        assert!(!after.playing);
        assert_eq!(after.first_event, game.log().len());
    }

    #[test]
    fn test_same_seed_same_game() {
        let run = || {
            let mut table = ready_table(&["amy", "bob"]);
            let mut game = GameState::new(&ServerConfig {
                seed: 777,
                ..config(40, 40)
            });
            let mut step = game.start(&mut table).unwrap();
            while step.playing {
                step = game.play_round(&mut table).unwrap();
            }
            logged_events(&game)
        };
        assert_eq!(run(), run());
    }

    #[test]
    fn test_evicted_player_keeps_playing() {
        let (mut game, mut table) = two_worm_game();
        table.remove(peer(2));
        assert_eq!(table.connected_players(), 1);

        let step = game.play_round(&mut table).unwrap();
        let events = logged_events(&game);
        assert!(events[step.first_event..]
            .iter()
            .any(|e| matches!(e, EventData::Pixel { player_number: 1, .. })));
        assert_eq!(table.store().live(), 2);
    }
}
