use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;

use async_trait::async_trait;
use clap::Parser;
use clap_derive::Parser;
use raknet_server::config::ServerConfig;
use raknet_server::frame_reader::FrameReader;
use raknet_server::handler_registry::PacketHandler;
use raknet_server::peer::SessionKeying;
use raknet_server::reliability::PassThroughSessionFactory;
use raknet_server::server::Server;
use tokio::select;
use tracing::{info, Level};

#[derive(Parser)]
struct Args {
    #[clap(long, default_value = "127.0.0.1")]
    ip: IpAddr,

    #[clap(long, default_value_t = 1001)]
    port: u16,

    #[clap(long)]
    password: Option<String>,

    /// key sessions by IP address only, ignoring the sender's port
    #[clap(long, default_value_t = false)]
    ip_only_sessions: bool,

    /// packet types to log - others are reported as unhandled
    #[clap(long = "packet-type")]
    packet_types: Vec<u8>,

    #[clap(short, long, default_value_t = false)]
    verbose: bool,

    #[clap(long, default_value_t = false)]
    very_verbose: bool,
}

struct LoggingHandler;

#[async_trait]
impl PacketHandler for LoggingHandler {
    async fn on_packet(&self, mut packet: FrameReader, sender: SocketAddr) -> anyhow::Result<()> {
        let payload = packet.read_remaining();
        info!("received {} byte payload from {:?}: {:?}", payload.len(), sender, payload.as_ref());
        Ok(())
    }
}

#[tokio::main]
pub async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let level = match (args.verbose, args.very_verbose) {
        (_, true) => Level::TRACE,
        (true, _) => Level::DEBUG,
        (false, false) => Level::INFO,
    };

    tracing_subscriber::fmt()
        .with_max_level(level)
        .try_init()
        .ok();

    let mut config = ServerConfig::new(SocketAddr::new(args.ip, args.port));
    config.shared_secret = args.password.map(|p| p.into_bytes());
    if args.ip_only_sessions {
        config.session_keying = SessionKeying::AddressOnly;
    }

    let server = Arc::new(Server::bind(Arc::new(config), Arc::new(PassThroughSessionFactory)).await?);

    let handler = Arc::new(LoggingHandler);
    for packet_type in args.packet_types {
        server.register_handler(packet_type, handler.clone()).await;
    }

    select! {
        result = server.recv_loop() => { result }
        _ = tokio::signal::ctrl_c() => {
            server.cancel_recv_loop();
            Ok(())
        }
    }
}
