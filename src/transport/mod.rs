//! Transport layer for the relay.
//!
//! Receives DNS queries from clients and sends back the replies built by
//! the resolver. Only UDP is served.

pub mod udp;

/// Largest datagram accepted from a client.
pub const MAX_DNS_PACKET_SIZE: usize = 65535;
