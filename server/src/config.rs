//! Command line options and their validated form.

use clap::Parser;
use rand::Rng;
use shared::DEFAULT_SERVER_PORT;
use std::time::Duration;
use thiserror::Error;

pub const MAX_BOARD_DIMENSION: u32 = 4000;
pub const MAX_TURNING_SPEED: u32 = 359;
pub const MAX_ROUNDS_PER_SECOND: u32 = 200;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("port must be non-zero")]
    Port,
    #[error("seed {0} is outside 1..=4294967295")]
    Seed(u64),
    #[error("turning speed {0} is outside 1..={}", MAX_TURNING_SPEED)]
    TurningSpeed(u32),
    #[error("rounds per second {0} is outside 1..={}", MAX_ROUNDS_PER_SECOND)]
    RoundsPerSecond(u32),
    #[error("width {0} is outside 1..={}", MAX_BOARD_DIMENSION)]
    Width(u32),
    #[error("height {0} is outside 1..={}", MAX_BOARD_DIMENSION)]
    Height(u32),
}

/// Raw server options. `--help` has no short form since `-h` is the board height.
#[derive(Parser, Debug, Clone)]
#[command(author, version, about, disable_help_flag = true)]
pub struct ServerArgs {
    /// UDP port to listen on (IPv4 and IPv6)
    #[arg(short = 'p', long, default_value_t = DEFAULT_SERVER_PORT)]
    pub port: u16,

    /// Seed of the game generator; random when omitted
    #[arg(short = 's', long)]
    pub seed: Option<u64>,

    /// Degrees a worm turns per round
    #[arg(short = 't', long, default_value_t = 6)]
    pub turning_speed: u32,

    /// Simulation rounds per second
    #[arg(short = 'v', long, default_value_t = 50)]
    pub rounds_per_second: u32,

    /// Board width in pixels
    #[arg(short = 'w', long, default_value_t = 640)]
    pub width: u32,

    /// Board height in pixels
    #[arg(short = 'h', long, default_value_t = 480)]
    pub height: u32,

    /// Print help
    #[arg(long, action = clap::ArgAction::Help)]
    pub help: Option<bool>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    pub port: u16,
    pub seed: u32,
    pub turning_speed: u32,
    pub rounds_per_second: u32,
    pub width: u32,
    pub height: u32,
}

impl ServerConfig {
    /// Time budget of a single simulation round.
    pub fn round_duration(&self) -> Duration {
        Duration::from_micros(1_000_000 / u64::from(self.rounds_per_second))
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: DEFAULT_SERVER_PORT,
            seed: 1,
            turning_speed: 6,
            rounds_per_second: 50,
            width: 640,
            height: 480,
        }
    }
}

impl TryFrom<ServerArgs> for ServerConfig {
    type Error = ConfigError;

    fn try_from(args: ServerArgs) -> Result<Self, Self::Error> {
        if args.port == 0 {
            return Err(ConfigError::Port);
        }
        let seed = match args.seed {
            Some(seed) => u32::try_from(seed)
                .ok()
                .filter(|&s| s != 0)
                .ok_or(ConfigError::Seed(seed))?,
            None => rand::thread_rng().gen_range(1..=u32::MAX),
        };
        if !(1..=MAX_TURNING_SPEED).contains(&args.turning_speed) {
            return Err(ConfigError::TurningSpeed(args.turning_speed));
        }
        if !(1..=MAX_ROUNDS_PER_SECOND).contains(&args.rounds_per_second) {
            return Err(ConfigError::RoundsPerSecond(args.rounds_per_second));
        }
        if !(1..=MAX_BOARD_DIMENSION).contains(&args.width) {
            return Err(ConfigError::Width(args.width));
        }
        if !(1..=MAX_BOARD_DIMENSION).contains(&args.height) {
            return Err(ConfigError::Height(args.height));
        }

        Ok(ServerConfig {
            port: args.port,
            seed,
            turning_speed: args.turning_speed,
            rounds_per_second: args.rounds_per_second,
            width: args.width,
            height: args.height,
        })
    }
}
