//! The interface to the per-peer reliability engine.
//!
//! Ordering, fragmentation, acknowledgement and retransmission happen inside a
//!  [ReliabilitySession], which is opaque to the server: the server hands it every session
//!  datagram of its peer and gets back the application frames that this datagram completed.
//!  One physical datagram can complete zero, one or many frames.

use std::fmt::{Debug, Formatter};
use std::net::SocketAddr;
use std::sync::Arc;

use bytes::Bytes;
use tracing::trace;

use crate::frame_reader::FrameReader;
use crate::send_socket::SendSocket;

/// The frames decoded from a single datagram. This is pull-driven and finite, and it is only
///  valid for the call that produced it: the server always drains it completely before handling
///  the next datagram, since frames that are not pulled would be lost.
///
/// A decode error ends processing of the datagram; frames yielded before it are still delivered.
pub type FrameSequence<'a> = Box<dyn Iterator<Item = anyhow::Result<FrameReader>> + Send + 'a>;

/// Everything a reliability session is constructed with
#[derive(Clone)]
pub struct SessionContext {
    pub peer_addr: SocketAddr,
    /// the server's socket, for the session's own acks / resends
    pub socket: Arc<dyn SendSocket>,
    /// A connection password is a concern of the reliability layer's connection setup; the
    ///  two-byte admission handshake has no room for one. The server only passes it through.
    pub shared_secret: Option<Arc<[u8]>>,
}

impl Debug for SessionContext {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "SessionContext{{peer_addr:{:?}, has_secret:{}}}", self.peer_addr, self.shared_secret.is_some())
    }
}

pub trait ReliabilitySession: Send + 'static {
    fn handle_data(&mut self, datagram: Bytes) -> FrameSequence<'_>;
}

/// Creates a fresh reliability session when a peer completes the admission handshake
pub trait ReliabilitySessionFactory: Send + Sync + 'static {
    fn create(&self, ctx: SessionContext) -> Box<dyn ReliabilitySession>;
}


/// A reliability 'engine' without any reliability: each datagram is exactly one frame. This is
///  for running the server without an external engine, e.g. for testing and in the demo.
pub struct PassThroughSession {
    peer_addr: SocketAddr,
}

impl ReliabilitySession for PassThroughSession {
    fn handle_data(&mut self, datagram: Bytes) -> FrameSequence<'_> {
        trace!("passing through {} bytes from {:?}", datagram.len(), self.peer_addr);
        if datagram.is_empty() {
            return Box::new(std::iter::empty());
        }
        Box::new(std::iter::once(Ok(FrameReader::new(datagram))))
    }
}

#[derive(Debug, Default)]
pub struct PassThroughSessionFactory;

impl ReliabilitySessionFactory for PassThroughSessionFactory {
    fn create(&self, ctx: SessionContext) -> Box<dyn ReliabilitySession> {
        Box::new(PassThroughSession { peer_addr: ctx.peer_addr })
    }
}
