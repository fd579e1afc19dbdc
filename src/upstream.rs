//! Upstream resolver client.
//!
//! Forwarded questions go to a single upstream over UDP, one socket per
//! exchange, bounded by a timeout and never retried.

use std::io;
use std::net::{Ipv4Addr, Ipv6Addr, SocketAddr};
use std::time::Duration;

use async_trait::async_trait;
use hickory_proto::op::Message;
use tokio::net::UdpSocket;
use tracing::trace;

use crate::error::{Error, Result};

/// Default deadline for one upstream exchange.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);

/// Largest UDP payload accepted from the upstream.
const MAX_UDP_PAYLOAD: usize = 65535;

/// Something that can answer a DNS query.
#[async_trait]
pub trait Upstream: Send + Sync {
    /// Send `query` and wait for the matching response.
    async fn exchange(&self, query: Message) -> Result<Message>;
}

/// Plain DNS over UDP to a fixed address.
pub struct UdpUpstream {
    addr: SocketAddr,
    timeout: Duration,
}

impl UdpUpstream {
    pub fn new(addr: SocketAddr, timeout: Duration) -> Self {
        Self { addr, timeout }
    }

    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    async fn send_and_receive(&self, id: u16, bytes: &[u8]) -> Result<Message> {
        let bind_addr: SocketAddr = if self.addr.is_ipv4() {
            (Ipv4Addr::UNSPECIFIED, 0).into()
        } else {
            (Ipv6Addr::UNSPECIFIED, 0).into()
        };

        let socket = UdpSocket::bind(bind_addr)
            .await
            .map_err(|e| self.unreachable(e))?;
        socket
            .send_to(bytes, self.addr)
            .await
            .map_err(|e| self.unreachable(e))?;

        let mut buf = vec![0u8; MAX_UDP_PAYLOAD];
        loop {
            let (len, from) = socket
                .recv_from(&mut buf)
                .await
                .map_err(|e| self.unreachable(e))?;

            if from != self.addr {
                trace!(%from, "ignoring datagram from unexpected peer");
                continue;
            }

            let response = Message::from_vec(&buf[..len]).map_err(|source| {
                Error::MalformedUpstreamResponse {
                    addr: self.addr,
                    source,
                }
            })?;

            if response.id() != id {
                trace!(expected = id, got = response.id(), "ignoring stale response");
                continue;
            }

            return Ok(response);
        }
    }

    fn unreachable(&self, source: io::Error) -> Error {
        Error::UpstreamUnreachable {
            addr: self.addr,
            source,
        }
    }
}

#[async_trait]
impl Upstream for UdpUpstream {
    async fn exchange(&self, query: Message) -> Result<Message> {
        let bytes = query.to_vec().map_err(Error::Encode)?;

        tokio::time::timeout(self.timeout, self.send_and_receive(query.id(), &bytes))
            .await
            .map_err(|_| Error::UpstreamTimeout {
                addr: self.addr,
                timeout: self.timeout,
            })?
    }
}
