use std::fmt::{Debug, Formatter};
use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::anyhow;
use bytes::Bytes;
use tokio::net::UdpSocket;
use tokio::select;
use tokio::sync::{broadcast, Mutex, RwLock};
use tokio::time::{interval, Instant, Interval, MissedTickBehavior};
use tracing::{debug, error, info, span, trace, warn, Instrument, Level};
use uuid::Uuid;

use crate::config::ServerConfig;
use crate::frame_reader::FrameReader;
use crate::handler_registry::{dispatch, HandlerId, HandlerRegistry, PacketHandler};
use crate::peer::PeerKey;
use crate::protocol::{handshake_reply, DatagramKind};
use crate::reliability::{FrameSequence, ReliabilitySessionFactory, SessionContext};
use crate::send_socket::SendSocket;
use crate::session_table::{Session, SessionTable};

/// The server is where the session front-end comes together: it owns the UDP socket, admits
///  peers through the open-connection handshake, keeps one session per admitted peer, and routes
///  the frames decoded by a peer's reliability session to the handlers registered for their
///  packet type.
///
/// Datagrams are handled strictly one at a time by [Server::recv_loop]. Handlers are awaited
///  inline, so a handler that blocks stalls the server for all peers.
pub struct Server {
    config: Arc<ServerConfig>,
    receive_socket: Option<Arc<UdpSocket>>,
    send_socket: Arc<dyn SendSocket>,
    shared_secret: Option<Arc<[u8]>>,
    session_factory: Arc<dyn ReliabilitySessionFactory>,
    sessions: Mutex<SessionTable>,
    handlers: RwLock<HandlerRegistry>,
    cancel_sender: broadcast::Sender<()>,
}

impl Debug for Server {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "Server{{bind_addr:{:?}}}", self.config.bind_addr)
    }
}

impl Server {
    /// Binds the server's socket. Failure to bind is reported and returned - there is no retry.
    pub async fn bind(config: Arc<ServerConfig>, session_factory: Arc<dyn ReliabilitySessionFactory>) -> anyhow::Result<Server> {
        config.validate()?;

        let socket = match UdpSocket::bind(config.bind_addr).await {
            Ok(socket) => Arc::new(socket),
            Err(e) => {
                error!("error binding UDP socket to {:?}: {}", config.bind_addr, e);
                return Err(e.into());
            }
        };
        info!("listening on {:?}", socket.local_addr()?);

        let mut server = Self::with_socket(config, Arc::new(socket.clone()), session_factory)?;
        server.receive_socket = Some(socket);
        Ok(server)
    }

    /// Creates a server that sends through a given socket but has no socket of its own to
    ///  receive from. Datagrams are fed to it through [Server::handle_datagram] or
    ///  [Server::on_datagram].
    pub fn with_socket(config: Arc<ServerConfig>, send_socket: Arc<dyn SendSocket>, session_factory: Arc<dyn ReliabilitySessionFactory>) -> anyhow::Result<Server> {
        config.validate()?;

        let shared_secret: Option<Arc<[u8]>> = config.shared_secret
            .as_ref()
            .map(|s| Arc::from(s.as_slice()));
        if shared_secret.is_some() {
            info!("shared secret is configured - it is passed on to reliability sessions");
        }
        else {
            debug!("no shared secret configured");
        }

        let (cancel_sender, _) = broadcast::channel(1);

        Ok(Server {
            config,
            receive_socket: None,
            send_socket,
            shared_secret,
            session_factory,
            sessions: Default::default(),
            handlers: Default::default(),
            cancel_sender,
        })
    }

    pub fn local_addr(&self) -> anyhow::Result<SocketAddr> {
        self.send_socket.local_addr()
    }

    pub async fn register_handler(&self, packet_type: u8, handler: Arc<dyn PacketHandler>) -> HandlerId {
        self.handlers.write().await
            .register(packet_type, handler)
    }

    pub async fn register_handler_fn<F>(&self, packet_type: u8, f: F) -> HandlerId
    where F: Fn(FrameReader, SocketAddr) -> anyhow::Result<()> + Send + Sync + 'static
    {
        self.handlers.write().await
            .register_fn(packet_type, f)
    }

    pub async fn deregister_handler(&self, id: HandlerId) -> anyhow::Result<()> {
        self.handlers.write().await
            .deregister(id)
    }

    pub async fn has_handler(&self, packet_type: u8) -> bool {
        self.handlers.read().await
            .has_handler(packet_type)
    }

    /// whether there is a session for this address (under the configured keying)
    pub async fn is_connected(&self, addr: SocketAddr) -> bool {
        self.sessions.lock().await
            .contains(&self.peer_key(addr))
    }

    pub async fn session_count(&self) -> usize {
        self.sessions.lock().await
            .len()
    }

    fn peer_key(&self, addr: SocketAddr) -> PeerKey {
        PeerKey::new(addr, self.config.session_keying)
    }

    pub fn cancel_recv_loop(&self) {
        match self.cancel_sender.send(()) {
            Ok(_) => info!("canceling receive loop"),
            Err(_) => debug!("call to cancel_recv_loop while no receive loop is running"),
        }
    }

    pub async fn recv_loop(&self) -> anyhow::Result<()> {
        let socket = self.receive_socket.clone()
            .ok_or_else(|| anyhow!("server was created without a socket to receive from"))?;

        let mut cancel_receiver = self.cancel_sender.subscribe();
        let mut eviction_ticker = self.config.session_idle_timeout.map(|_| {
            let mut ticker = interval(self.config.eviction_interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            ticker
        });

        // one byte of headroom: a datagram filling the buffer is larger than the maximum
        let mut buf = vec![0u8; self.config.max_datagram_size + 1];

        info!("starting receive loop");
        loop {
            select! {
                r = socket.recv_from(&mut buf) => {
                    let (num_read, from) = match r {
                        Ok(x) => x,
                        Err(e) => {
                            error!("socket error: {}", e);
                            continue;
                        }
                    };

                    if num_read > self.config.max_datagram_size {
                        warn!("received a datagram from {:?} exceeding max datagram size of {} bytes - dropping", from, self.config.max_datagram_size);
                        continue;
                    }

                    let correlation_id = Uuid::new_v4();
                    let span = span!(Level::TRACE, "datagram_received", ?correlation_id);
                    self.on_datagram(Bytes::copy_from_slice(&buf[..num_read]), from)
                        .instrument(span)
                        .await;
                }
                _ = cancel_receiver.recv() => {
                    info!("shutting down receive loop");
                    break;
                }
                _ = Self::next_eviction_tick(&mut eviction_ticker) => {
                    self.evict_idle_sessions().await;
                }
            }
        }
        Ok(())
    }

    async fn next_eviction_tick(ticker: &mut Option<Interval>) {
        match ticker {
            Some(ticker) => { ticker.tick().await; }
            None => std::future::pending().await,
        }
    }

    /// Removes sessions that were idle for longer than the configured timeout. This is called
    ///  periodically by the receive loop; without a configured timeout it does nothing.
    pub async fn evict_idle_sessions(&self) -> Vec<PeerKey> {
        let Some(max_idle) = self.config.session_idle_timeout else {
            return Vec::new();
        };

        let evicted = self.sessions.lock().await
            .evict_idle(Instant::now(), max_idle);
        if !evicted.is_empty() {
            info!("evicted {} idle session(s): {:?}", evicted.len(), evicted);
        }
        evicted
    }

    /// This is the boundary at which failures handling a datagram are contained: they are
    ///  reported, and the datagram is discarded. Neither the receive loop nor other peers'
    ///  sessions are affected.
    pub async fn on_datagram(&self, datagram: Bytes, from: SocketAddr) {
        trace!("received datagram from {:?}: {:?}", from, datagram.as_ref());

        if let Err(e) = self.handle_datagram(datagram, from).await {
            error!("error handling datagram from {:?} - dropping: {:?}", from, e);
        }
    }

    pub async fn handle_datagram(&self, datagram: Bytes, from: SocketAddr) -> anyhow::Result<()> {
        match DatagramKind::classify(&datagram) {
            DatagramKind::Handshake => {
                self.on_open_connection_request(from).await;
                Ok(())
            }
            DatagramKind::UnknownControl(message_id) => {
                trace!("ignoring two-byte datagram with unknown message id {} from {:?}", message_id, from);
                Ok(())
            }
            DatagramKind::SessionTraffic => {
                self.on_session_traffic(datagram, from).await
            }
        }
    }

    async fn on_open_connection_request(&self, from: SocketAddr) {
        let reliability = self.session_factory.create(SessionContext {
            peer_addr: from,
            socket: self.send_socket.clone(),
            shared_secret: self.shared_secret.clone(),
        });

        let prev = self.sessions.lock().await
            .insert(self.peer_key(from), Session::new(from, reliability, Instant::now()));
        if let Some(prev) = prev {
            debug!("session of {:?} (created {:?} ago) replaced by new handshake from {:?}", prev.peer_addr, prev.created_at.elapsed(), from);
        }

        self.send_socket.do_send_packet(from, &handshake_reply()).await;
        info!("{:?} has connected", from);
    }

    async fn on_session_traffic(&self, datagram: Bytes, from: SocketAddr) -> anyhow::Result<()> {
        // the session table is locked only while frames are decoded, so handlers can call back
        //  into the server
        let (frames, decode_result) = {
            let mut sessions = self.sessions.lock().await;
            let Some(session) = sessions.get_mut(&self.peer_key(from)) else {
                warn!("an unconnected client {:?} sent us a message - dropping", from);
                return Ok(());
            };

            session.touch(Instant::now());
            Self::drain(session.reliability.handle_data(datagram))
        };

        trace!("decoded {} frame(s) from datagram from {:?}", frames.len(), from);
        for frame in frames {
            self.dispatch_frame(frame, from).await?;
        }
        decode_result
    }

    /// Pulls all frames from the sequence. The sequence ends at the first decode error, which is
    ///  returned along with the frames decoded before it.
    fn drain(frames: FrameSequence<'_>) -> (Vec<FrameReader>, anyhow::Result<()>) {
        let mut result = Vec::new();
        for frame in frames {
            match frame {
                Ok(frame) => result.push(frame),
                Err(e) => return (result, Err(e)),
            }
        }
        (result, Ok(()))
    }

    async fn dispatch_frame(&self, mut frame: FrameReader, from: SocketAddr) -> anyhow::Result<()> {
        let packet_type = frame.read_u8()?;

        let handlers = self.handlers.read().await
            .handlers_for(packet_type);

        if handlers.is_empty() {
            warn!("no handler found for packet id {} from {:?} - dropping. Did you register any handlers?", packet_type, from);
            return Ok(());
        }

        dispatch(&handlers, packet_type, &frame, from).await;
        Ok(())
    }
}
