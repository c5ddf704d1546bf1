use std::net::SocketAddr;
use std::time::Duration;

use anyhow::bail;

use crate::peer::SessionKeying;
use crate::protocol::HANDSHAKE_REQUEST_LEN;

#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// the address the server's single UDP socket is bound to
    pub bind_addr: SocketAddr,

    /// Passed to every reliability session on creation. The admission handshake itself does
    ///  not (and can not) check it.
    pub shared_secret: Option<Vec<u8>>,

    pub session_keying: SessionKeying,

    /// The largest datagram accepted, inclusive. Larger datagrams are dropped by the receive
    ///  loop.
    pub max_datagram_size: usize,

    /// Sessions without traffic for longer than this are evicted. `None` means sessions are
    ///  never evicted and live until they are replaced by a new handshake.
    pub session_idle_timeout: Option<Duration>,
    /// how often idle sessions are looked for, if there is a timeout
    pub eviction_interval: Duration,
}

impl ServerConfig {
    pub fn new(bind_addr: SocketAddr) -> ServerConfig {
        ServerConfig {
            bind_addr,
            shared_secret: None,
            session_keying: SessionKeying::AddressAndPort,
            max_datagram_size: 1500,
            session_idle_timeout: None,
            eviction_interval: Duration::from_secs(1),
        }
    }

    pub fn default_localhost() -> ServerConfig {
        ServerConfig::new(SocketAddr::from(([127, 0, 0, 1], 1001)))
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        if self.max_datagram_size <= HANDSHAKE_REQUEST_LEN {
            bail!("max datagram size of {} bytes is too small", self.max_datagram_size);
        }
        if self.session_idle_timeout.is_some() && self.eviction_interval.is_zero() {
            bail!("eviction interval must be positive when a session idle timeout is configured");
        }
        if let Some(secret) = &self.shared_secret {
            if secret.is_empty() {
                bail!("shared secret must not be empty - leave it out instead");
            }
        }
        Ok(())
    }
}
