use std::fmt::{Debug, Formatter};
use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::anyhow;
use async_trait::async_trait;
use rustc_hash::FxHashMap;
use tracing::{debug, warn};

use crate::frame_reader::FrameReader;

/// Application code that handles received packets of one or more packet types.
///
/// This is called from the central receive loop and holds it up: a slow handler delays all
///  other peers' packets. Non-trivial work should be offloaded, but it is up to the handler
///  implementation to decide and do this.
#[async_trait]
pub trait PacketHandler: Send + Sync + 'static {
    /// `packet` is positioned immediately *after* the packet type tag. Returning an error does
    ///  not affect other handlers or other packets; it is logged.
    async fn on_packet(&self, packet: FrameReader, sender: SocketAddr) -> anyhow::Result<()>;
}

/// Wraps a plain (synchronous) closure as a [PacketHandler]
pub struct FnPacketHandler<F> {
    f: F,
}

impl<F> FnPacketHandler<F>
where F: Fn(FrameReader, SocketAddr) -> anyhow::Result<()> + Send + Sync + 'static
{
    pub fn new(f: F) -> FnPacketHandler<F> {
        FnPacketHandler { f }
    }
}

#[async_trait]
impl<F> PacketHandler for FnPacketHandler<F>
where F: Fn(FrameReader, SocketAddr) -> anyhow::Result<()> + Send + Sync + 'static
{
    async fn on_packet(&self, packet: FrameReader, sender: SocketAddr) -> anyhow::Result<()> {
        (self.f)(packet, sender)
    }
}


/// Returned on registration, for deregistering a specific handler later
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
pub struct HandlerId {
    pub packet_type: u8,
    seq: u64,
}

/// Handlers by packet type tag. There can be any number of handlers per tag; they are invoked
///  in the order of their registration.
#[derive(Default)]
pub struct HandlerRegistry {
    handlers: FxHashMap<u8, Vec<(HandlerId, Arc<dyn PacketHandler>)>>,
    next_seq: u64,
}

impl Debug for HandlerRegistry {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let mut counts = self.handlers.iter()
            .map(|(tag, handlers)| (*tag, handlers.len()))
            .collect::<Vec<_>>();
        counts.sort();
        write!(f, "HandlerRegistry{{{:?}}}", counts)
    }
}

impl HandlerRegistry {
    pub fn register(&mut self, packet_type: u8, handler: Arc<dyn PacketHandler>) -> HandlerId {
        let id = HandlerId { packet_type, seq: self.next_seq };
        self.next_seq += 1;

        debug!("registering handler {:?}", id);
        self.handlers.entry(packet_type)
            .or_default()
            .push((id, handler));
        id
    }

    pub fn register_fn<F>(&mut self, packet_type: u8, f: F) -> HandlerId
    where F: Fn(FrameReader, SocketAddr) -> anyhow::Result<()> + Send + Sync + 'static
    {
        self.register(packet_type, Arc::new(FnPacketHandler::new(f)))
    }

    pub fn deregister(&mut self, id: HandlerId) -> anyhow::Result<()> {
        let handlers = self.handlers.get_mut(&id.packet_type)
            .ok_or_else(|| anyhow!("deregistering a handler that was not previously registered: {:?}", id))?;

        let len_before = handlers.len();
        handlers.retain(|(h, _)| h != &id);
        if handlers.len() == len_before {
            return Err(anyhow!("deregistering a handler that was not previously registered: {:?}", id));
        }

        if handlers.is_empty() {
            self.handlers.remove(&id.packet_type);
        }
        Ok(())
    }

    /// removes all handlers for a packet type, returning how many there were
    pub fn deregister_all(&mut self, packet_type: u8) -> usize {
        self.handlers.remove(&packet_type)
            .map(|handlers| handlers.len())
            .unwrap_or(0)
    }

    pub fn has_handler(&self, packet_type: u8) -> bool {
        self.handler_count(packet_type) > 0
    }

    pub fn handler_count(&self, packet_type: u8) -> usize {
        self.handlers.get(&packet_type)
            .map(|handlers| handlers.len())
            .unwrap_or(0)
    }

    /// A snapshot of the handlers for a packet type, in registration order. Dispatching from
    ///  a snapshot allows handlers to (de)register while the registry's lock is released.
    pub fn handlers_for(&self, packet_type: u8) -> Vec<Arc<dyn PacketHandler>> {
        self.handlers.get(&packet_type)
            .map(|handlers| handlers.iter().map(|(_, h)| h.clone()).collect())
            .unwrap_or_default()
    }
}

/// Invokes each of the handlers in turn with its own copy of the packet. A failing handler is
///  reported, and the remaining handlers are still called.
pub async fn dispatch(handlers: &[Arc<dyn PacketHandler>], packet_type: u8, packet: &FrameReader, sender: SocketAddr) {
    for handler in handlers {
        if let Err(e) = handler.on_packet(packet.clone(), sender).await {
            warn!("handler for packet id {} failed on packet from {:?}: {:#}", packet_type, sender, e);
        }
    }
}
