//! The session front-end of a reliable-UDP (RakNet style) server.
//!
//! A [server::Server] owns a single UDP socket. Peers are admitted through a minimal handshake,
//!  and every admitted peer gets a session holding its own reliability session. All other
//!  datagrams are session traffic: they are handed to the sender's reliability session, and the
//!  application frames it decodes are dispatched to handlers registered for the frame's packet
//!  type.
//!
//! ## Wire format
//!
//! ```ascii
//! open connection request: exactly 2 bytes
//!   0: OPEN_CONNECTION_REQUEST (0x05)
//!   1: ignored
//!
//! open connection reply: exactly 1 byte, sent to the requester's address and port
//!   0: OPEN_CONNECTION_REPLY (0x06)
//!
//! session traffic: any datagram whose length is not 2, passed on whole to the reliability
//!  session. Each frame it decodes starts with the packet type (u8):
//!   0: packet type
//!   1: payload, handed to the packet type's handlers
//! ```
//!
//! A datagram of exactly 2 bytes is always a control datagram, never session traffic. So with
//!  [reliability::PassThroughSessionFactory], where a datagram is one frame, a packet type with
//!  a single payload byte can not be delivered: the payload must be empty or at least 2 bytes.
//!  Reliability sessions that add their own framing do not have this limitation.
//!
//! Reliability (ordering, fragmentation, acks, resends) is not part of this crate. It is plugged
//!  in through [reliability::ReliabilitySessionFactory].

pub mod config;
pub mod frame_reader;
pub mod handler_registry;
pub mod peer;
pub mod protocol;
pub mod reliability;
pub mod send_socket;
pub mod server;
pub mod session_table;
