//! Command line options of the client.

use clap::Parser;
use shared::{DEFAULT_GUI_PORT, DEFAULT_GUI_SERVER, DEFAULT_SERVER_PORT, MAX_PLAYER_NAME_LENGTH};
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("player name of {0} bytes is longer than {}", MAX_PLAYER_NAME_LENGTH)]
    NameTooLong(usize),
    #[error("player name may only contain printable ASCII characters without spaces")]
    InvalidName,
    #[error("{0} port must be non-zero")]
    Port(&'static str),
}

#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
pub struct ClientArgs {
    /// Game server host name or address
    pub game_server: String,

    /// Player name; leave empty to watch without playing
    #[arg(short = 'n', long, default_value = "")]
    pub player_name: String,

    /// Game server UDP port
    #[arg(short = 'p', long, default_value_t = DEFAULT_SERVER_PORT)]
    pub server_port: u16,

    /// GUI host name or address
    #[arg(short = 'i', long, default_value = DEFAULT_GUI_SERVER)]
    pub gui_server: String,

    /// GUI TCP port
    #[arg(short = 'r', long, default_value_t = DEFAULT_GUI_PORT)]
    pub gui_port: u16,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    pub server_host: String,
    pub server_port: u16,
    pub player_name: String,
    pub gui_host: String,
    pub gui_port: u16,
}

impl TryFrom<ClientArgs> for ClientConfig {
    type Error = ConfigError;

    fn try_from(args: ClientArgs) -> Result<Self, Self::Error> {
        if args.player_name.len() > MAX_PLAYER_NAME_LENGTH {
            return Err(ConfigError::NameTooLong(args.player_name.len()));
        }
        if !args.player_name.bytes().all(|b| b.is_ascii_graphic()) {
            return Err(ConfigError::InvalidName);
        }
        if args.server_port == 0 {
            return Err(ConfigError::Port("server"));
        }
        if args.gui_port == 0 {
            return Err(ConfigError::Port("GUI"));
        }

        Ok(ClientConfig {
            server_host: args.game_server,
            server_port: args.server_port,
            player_name: args.player_name,
            gui_host: args.gui_server,
            gui_port: args.gui_port,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Result<ClientConfig, ConfigError> {
        let mut argv = vec!["worms-client"];
        argv.extend_from_slice(args);
        ClientConfig::try_from(ClientArgs::try_parse_from(argv).unwrap())
    }

    #[test]
    fn test_defaults() {
        let config = parse(&["example.com"]).unwrap();
        assert_eq!(
            config,
            ClientConfig {
                server_host: "example.com".into(),
                server_port: 2021,
                player_name: String::new(),
                gui_host: "localhost".into(),
                gui_port: 20210,
            }
        );
    }

    #[test]
    fn test_all_options() {
        let config = parse(&[
            "::1", "-n", "amy", "-p", "3000", "-i", "gui.local", "-r", "4000",
        ])
        .unwrap();
        assert_eq!(config.server_host, "::1");
        assert_eq!(config.player_name, "amy");
        assert_eq!(config.server_port, 3000);
        assert_eq!(config.gui_host, "gui.local");
        assert_eq!(config.gui_port, 4000);
    }

    #[test]
    fn test_server_is_required() {
        assert!(ClientArgs::try_parse_from(["worms-client"]).is_err());
    }

    #[test]
    fn test_invalid_values() {
        let long = "x".repeat(21);
        assert_eq!(parse(&["host", "-n", &long]), Err(ConfigError::NameTooLong(21)));
        assert!(parse(&["host", "-n", &"x".repeat(20)]).is_ok());
        assert_eq!(parse(&["host", "-n", "a b"]), Err(ConfigError::InvalidName));
        assert_eq!(parse(&["host", "-p", "0"]), Err(ConfigError::Port("server")));
        assert_eq!(parse(&["host", "-r", "0"]), Err(ConfigError::Port("GUI")));
    }
}
