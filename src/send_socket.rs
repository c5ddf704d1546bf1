use std::net::SocketAddr;
use std::sync::Arc;

use async_trait::async_trait;
#[cfg(test)] use mockall::automock;
use tokio::net::UdpSocket;
use tracing::{error, trace};

/// This is an abstraction for sending a buffer on the server's UDP socket, introduced to
///  facilitate mocking the I/O part away for testing. It is also the socket handle that
///  reliability sessions use to send their own packets.
///
/// Send failures are reported but not propagated: there is no retry, and a failed send must not
///  affect anything but the packet that was being sent.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait SendSocket: Send + Sync + 'static {
    async fn do_send_packet(&self, to: SocketAddr, packet_buf: &[u8]);

    fn local_addr(&self) -> anyhow::Result<SocketAddr>;
}

#[async_trait]
impl SendSocket for Arc<UdpSocket> {
    async fn do_send_packet(&self, to: SocketAddr, packet_buf: &[u8]) {
        trace!("UDP socket: sending packet to {:?}", to);

        if let Err(e) = self.send_to(packet_buf, to).await {
            error!("error sending UDP packet to {:?}: {}", to, e);
        }
    }

    fn local_addr(&self) -> anyhow::Result<SocketAddr> {
        Ok(self.as_ref().local_addr()?)
    }
}
