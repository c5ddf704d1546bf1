use std::fmt::{Debug, Formatter};
use std::net::{IpAddr, SocketAddr};

/// Determines which part of a sender's address identifies its session.
///
/// Keying by address only means that all peers behind a shared IP address (e.g. NAT) share a
///  single session, and a handshake from any of them replaces the session of the others. That
///  is supported for compatibility with clients that change their source port, but it must be
///  chosen explicitly.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Default)]
pub enum SessionKeying {
    #[default]
    AddressAndPort,
    AddressOnly,
}

/// The key of a peer's entry in the session table
#[derive(Copy, Clone, Eq, PartialEq, Hash)]
pub enum PeerKey {
    Socket(SocketAddr),
    Ip(IpAddr),
}

impl Debug for PeerKey {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            PeerKey::Socket(addr) => write!(f, "[{}]", addr),
            PeerKey::Ip(ip) => write!(f, "[{}:*]", ip),
        }
    }
}

impl PeerKey {
    pub fn new(addr: SocketAddr, keying: SessionKeying) -> PeerKey {
        match keying {
            SessionKeying::AddressAndPort => PeerKey::Socket(addr),
            SessionKeying::AddressOnly => PeerKey::Ip(addr.ip()),
        }
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;
    use super::*;

    #[rstest]
    #[case::same_port_full(SessionKeying::AddressAndPort, "1.2.3.4:5", "1.2.3.4:5", true)]
    #[case::other_port_full(SessionKeying::AddressAndPort, "1.2.3.4:5", "1.2.3.4:6", false)]
    #[case::other_ip_full(SessionKeying::AddressAndPort, "1.2.3.4:5", "1.2.3.5:5", false)]
    #[case::same_port_ip(SessionKeying::AddressOnly, "1.2.3.4:5", "1.2.3.4:5", true)]
    #[case::other_port_ip(SessionKeying::AddressOnly, "1.2.3.4:5", "1.2.3.4:6", true)]
    #[case::other_ip_ip(SessionKeying::AddressOnly, "1.2.3.4:5", "1.2.3.5:5", false)]
    fn test_key_equality(#[case] keying: SessionKeying, #[case] a: &str, #[case] b: &str, #[case] expected: bool) {
        let a = PeerKey::new(a.parse().unwrap(), keying);
        let b = PeerKey::new(b.parse().unwrap(), keying);
        assert_eq!(a == b, expected);
    }

    #[rstest]
    #[case::socket(SessionKeying::AddressAndPort, "[127.0.0.1:1001]")]
    #[case::ip(SessionKeying::AddressOnly, "[127.0.0.1:*]")]
    fn test_debug(#[case] keying: SessionKeying, #[case] expected: &str) {
        let key = PeerKey::new("127.0.0.1:1001".parse().unwrap(), keying);
        assert_eq!(format!("{:?}", key), expected);
    }
}
