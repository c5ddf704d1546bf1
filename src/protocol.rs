use num_enum::{IntoPrimitive, TryFromPrimitive};

/// An admission request is a datagram of exactly this length. Every datagram with a different
///  length is session traffic for the sender's reliability session.
pub const HANDSHAKE_REQUEST_LEN: usize = 2;

/// Protocol level message ids that the session front-end itself interprets. All other ids are
///  application packet types and are routed through the handler registry.
#[repr(u8)]
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, TryFromPrimitive, IntoPrimitive)]
pub enum MessageId {
    OpenConnectionRequest = 0x05,
    OpenConnectionReply = 0x06,
}

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum DatagramKind {
    /// a well-formed admission request
    Handshake,
    /// a datagram of handshake length with an opcode we do not know - ignored
    UnknownControl(u8),
    SessionTraffic,
}

impl DatagramKind {
    pub fn classify(buf: &[u8]) -> DatagramKind {
        if buf.len() != HANDSHAKE_REQUEST_LEN {
            return DatagramKind::SessionTraffic;
        }

        match MessageId::try_from_primitive(buf[0]) {
            Ok(MessageId::OpenConnectionRequest) => DatagramKind::Handshake,
            _ => DatagramKind::UnknownControl(buf[0]),
        }
    }
}

pub fn handshake_reply() -> [u8; 1] {
    [MessageId::OpenConnectionReply.into()]
}
