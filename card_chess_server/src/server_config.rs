use std::time::Duration;

use card_chess::clock::TimeControl;
use card_chess::server::ServerOptions;
use serde::{Deserialize, Serialize};

use crate::network;


#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ServerConfig {
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_starting_time", with = "humantime_serde")]
    pub starting_time: Duration,
    #[serde(default, with = "humantime_serde")]
    pub increment: Duration,
    #[serde(default = "default_reconnect_grace", with = "humantime_serde")]
    pub reconnect_grace: Duration,
}

fn default_port() -> u16 { network::DEFAULT_PORT }
fn default_starting_time() -> Duration { Duration::from_secs(600) }
fn default_reconnect_grace() -> Duration { Duration::from_secs(60) }

impl Default for ServerConfig {
    fn default() -> Self {
        ServerConfig {
            port: default_port(),
            starting_time: default_starting_time(),
            increment: Duration::ZERO,
            reconnect_grace: default_reconnect_grace(),
        }
    }
}

impl ServerConfig {
    pub fn server_options(&self) -> ServerOptions {
        ServerOptions {
            time_control: TimeControl {
                starting_time: self.starting_time,
                increment: self.increment,
            },
            reconnect_grace: self.reconnect_grace,
        }
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn yaml_config_with_defaults() {
        let config: ServerConfig =
            serde_yaml::from_str("port: 9000\nstarting_time: 3m\nincrement: 2s\n").unwrap();
        assert_eq!(config.port, 9000);
        assert_eq!(config.starting_time, Duration::from_secs(180));
        assert_eq!(config.increment, Duration::from_secs(2));
        assert_eq!(config.reconnect_grace, Duration::from_secs(60));
    }

    #[test]
    fn unknown_fields_rejected() {
        assert!(serde_yaml::from_str::<ServerConfig>("prot: 9000\n").is_err());
    }
}
