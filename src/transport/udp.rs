//! UDP transport for DNS queries.
//!
//! Every datagram is decoded and handled in its own task, so a slow
//! upstream exchange never holds up other clients.

use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

use hickory_proto::op::{Message, MessageType};
use socket2::{Domain, Protocol, Socket, Type};
use tokio::net::UdpSocket;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::error::{Error, Result};
use crate::resolver::Resolver;

use super::MAX_DNS_PACKET_SIZE;

/// UDP transport for the relay.
pub struct UdpTransport {
    socket: Arc<UdpSocket>,
}

impl UdpTransport {
    /// Bind the listening socket.
    ///
    /// The socket is bound with `SO_REUSEPORT` on unix, so several relays
    /// can share a port and the kernel spreads datagrams between them.
    pub async fn bind(addr: SocketAddr) -> Result<Self> {
        let socket = create_udp_socket(addr).map_err(|source| Error::Bind { addr, source })?;

        Ok(Self {
            socket: Arc::new(socket),
        })
    }

    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.socket.local_addr()
    }

    /// Start the receive loop on the current runtime.
    pub fn start(self, resolver: Arc<Resolver>) -> JoinHandle<()> {
        tokio::spawn(run(self.socket, resolver))
    }
}

fn create_udp_socket(addr: SocketAddr) -> io::Result<UdpSocket> {
    let socket = Socket::new(Domain::for_address(addr), Type::DGRAM, Some(Protocol::UDP))?;
    if addr.is_ipv6() {
        socket.set_only_v6(false)?;
    }
    socket.set_reuse_address(true)?;
    #[cfg(unix)]
    socket.set_reuse_port(true)?;
    socket.bind(&addr.into())?;
    socket.set_nonblocking(true)?;
    UdpSocket::from_std(socket.into())
}

async fn run(socket: Arc<UdpSocket>, resolver: Arc<Resolver>) {
    let mut buf = vec![0u8; MAX_DNS_PACKET_SIZE];

    loop {
        let (len, src) = match socket.recv_from(&mut buf).await {
            Ok(r) => r,
            Err(e) => {
                warn!(error = %e, "UDP recv error");
                continue;
            }
        };

        let request = match Message::from_vec(&buf[..len]) {
            Ok(m) => m,
            Err(e) => {
                debug!(%src, len, error = %e, "dropping undecodable datagram");
                continue;
            }
        };

        if request.message_type() != MessageType::Query {
            debug!(%src, "dropping non-query message");
            continue;
        }

        tokio::spawn(handle_request(
            socket.clone(),
            resolver.clone(),
            request,
            src,
        ));
    }
}

async fn handle_request(
    socket: Arc<UdpSocket>,
    resolver: Arc<Resolver>,
    request: Message,
    src: SocketAddr,
) {
    let start_time = Instant::now();
    let reply = resolver.answer(&request).await;

    let bytes = match reply.to_vec() {
        Ok(b) => b,
        Err(e) => {
            warn!(%src, id = request.id(), error = %e, "failed to encode reply");
            return;
        }
    };

    if let Err(e) = socket.send_to(&bytes, src).await {
        warn!(%src, error = %e, "UDP response error");
        return;
    }

    debug!(
        %src,
        id = request.id(),
        questions = request.queries().len(),
        answers = reply.answers().len(),
        total_ms = start_time.elapsed().as_secs_f64() * 1000.0,
        "replied"
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn bind_reports_local_addr() {
        let transport = UdpTransport::bind("127.0.0.1:0".parse().unwrap())
            .await
            .unwrap();

        let addr = transport.local_addr().unwrap();
        assert!(addr.ip().is_loopback());
        assert_ne!(addr.port(), 0);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn bind_shares_port_between_relays() {
        let first = UdpTransport::bind("127.0.0.1:0".parse().unwrap())
            .await
            .unwrap();
        let addr = first.local_addr().unwrap();

        let second = UdpTransport::bind(addr).await.unwrap();

        assert_eq!(second.local_addr().unwrap(), addr);
    }

    #[tokio::test]
    async fn bind_fails_on_port_held_without_reuse() {
        let taken = std::net::UdpSocket::bind("127.0.0.1:0").unwrap();
        let addr = taken.local_addr().unwrap();

        let err = UdpTransport::bind(addr).await.err().unwrap();

        assert!(matches!(err, Error::Bind { addr: a, .. } if a == addr));
    }
}
