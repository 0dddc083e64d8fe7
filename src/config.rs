//! Command line and environment configuration of the two binaries.

use crate::directory::DuplicatePolicy;
use crate::peer_connection::{MediaOptions, Options, DEFAULT_STUN_SERVERS};
use crate::protocol::JoinRoom;
use clap::Parser;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};

pub const DEFAULT_RELAY_PORT: u16 = 8001;

#[derive(Debug, Clone, Parser)]
#[command(name = "callroom-relay")]
#[command(
    about = "Signaling relay pairing two WebRTC peers through a room code",
    long_about = None
)]
pub struct RelayConfig {
    /// Address to listen on.
    #[arg(long, env = "CALLROOM_HOST", default_value_t = IpAddr::V4(Ipv4Addr::UNSPECIFIED))]
    pub host: IpAddr,
    /// WebSocket port. Use 0 to pick a free one.
    #[arg(long, env = "CALLROOM_PORT", default_value_t = DEFAULT_RELAY_PORT)]
    pub port: u16,
    /// What to do when an email joins while another connection still holds it.
    #[arg(
        long,
        env = "CALLROOM_DUPLICATE_EMAIL",
        value_enum,
        default_value_t = DuplicatePolicy::Evict
    )]
    pub duplicate_email: DuplicatePolicy,
}

impl RelayConfig {
    pub fn addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }

    /// Loopback relay on an ephemeral port.
    pub fn local() -> Self {
        RelayConfig {
            host: IpAddr::V4(Ipv4Addr::LOCALHOST),
            port: 0,
            duplicate_email: DuplicatePolicy::default(),
        }
    }
}

impl Default for RelayConfig {
    fn default() -> Self {
        RelayConfig {
            host: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            port: DEFAULT_RELAY_PORT,
            duplicate_email: DuplicatePolicy::default(),
        }
    }
}

#[derive(Debug, Clone, Parser)]
#[command(name = "callroom-call")]
#[command(
    about = "Joins a room and negotiates a call with whoever else is in it",
    long_about = None
)]
pub struct CallConfig {
    /// WebSocket URL of the relay.
    #[arg(long, env = "CALLROOM_RELAY_URL", default_value = "ws://127.0.0.1:8001")]
    pub relay: String,
    /// Room code shared with the other participant.
    #[arg(long, env = "CALLROOM_ROOM")]
    pub room: String,
    /// Identifier the other participant uses to reach us.
    #[arg(long, env = "CALLROOM_EMAIL")]
    pub email: String,
    /// STUN server URL, may be repeated.
    #[arg(long = "stun", default_values_t = DEFAULT_STUN_SERVERS.iter().map(|s| s.to_string()))]
    pub stun_servers: Vec<String>,
    /// Do not negotiate an audio slot.
    #[arg(long)]
    pub no_audio: bool,
    /// Do not negotiate a video slot.
    #[arg(long)]
    pub no_video: bool,
}

impl CallConfig {
    pub fn join_request(&self) -> JoinRoom {
        JoinRoom::new(self.room.clone(), self.email.clone())
    }

    pub fn options(&self) -> Options {
        Options::with_ice_servers(&self.stun_servers).with_media(MediaOptions {
            audio: !self.no_audio,
            video: !self.no_video,
        })
    }
}

#[cfg(test)]
mod test {
    use crate::config::{CallConfig, RelayConfig, DEFAULT_RELAY_PORT};
    use crate::directory::DuplicatePolicy;
    use crate::peer_connection::DEFAULT_STUN_SERVERS;
    use clap::Parser;

    #[test]
    fn relay_defaults() {
        let config = RelayConfig::try_parse_from(["callroom-relay"]).unwrap();
        assert_eq!(config.port, DEFAULT_RELAY_PORT);
        assert_eq!(config.duplicate_email, DuplicatePolicy::Evict);
        assert_eq!(config.addr().to_string(), "0.0.0.0:8001");
    }

    #[test]
    fn relay_flags() {
        let config = RelayConfig::try_parse_from([
            "callroom-relay",
            "--host",
            "127.0.0.1",
            "--port",
            "9000",
            "--duplicate-email",
            "reject",
        ])
        .unwrap();
        assert_eq!(config.addr().to_string(), "127.0.0.1:9000");
        assert_eq!(config.duplicate_email, DuplicatePolicy::Reject);
    }

    #[test]
    fn call_flags() {
        let config = CallConfig::try_parse_from([
            "callroom-call",
            "--room",
            "R7",
            "--email",
            "a@x.com",
            "--no-video",
        ])
        .unwrap();
        assert_eq!(config.stun_servers.len(), DEFAULT_STUN_SERVERS.len());
        let options = config.options();
        assert!(options.media.audio);
        assert!(!options.media.video);
        assert!(config.join_request().validate().is_ok());
    }

    #[test]
    fn call_requires_room_and_email() {
        assert!(CallConfig::try_parse_from(["callroom-call", "--room", "R7"]).is_err());
    }
}
