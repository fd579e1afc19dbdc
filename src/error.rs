//! Error types shared by the rule store, the upstream client and the server.

use std::io;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use hickory_proto::error::ProtoError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    /// The rule source could not be opened or read. Fatal at startup.
    #[error("rule source {path} unavailable: {source}")]
    SourceUnavailable {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// The configured upstream host:port could not be resolved. Fatal at startup.
    #[error("cannot resolve upstream {upstream}: {source}")]
    UpstreamLookup {
        upstream: String,
        #[source]
        source: io::Error,
    },

    #[error("upstream {addr} unreachable: {source}")]
    UpstreamUnreachable {
        addr: SocketAddr,
        #[source]
        source: io::Error,
    },

    #[error("upstream {addr} did not answer within {timeout:?}")]
    UpstreamTimeout { addr: SocketAddr, timeout: Duration },

    #[error("malformed response from upstream {addr}: {source}")]
    MalformedUpstreamResponse {
        addr: SocketAddr,
        #[source]
        source: ProtoError,
    },

    #[error("failed to encode DNS message: {0}")]
    Encode(#[source] ProtoError),

    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        #[source]
        source: io::Error,
    },
}

impl Error {
    /// True for the failures of a single forwarding exchange, which the
    /// resolver absorbs into an empty answer set.
    pub fn is_upstream(&self) -> bool {
        matches!(
            self,
            Error::UpstreamUnreachable { .. }
                | Error::UpstreamTimeout { .. }
                | Error::MalformedUpstreamResponse { .. }
        )
    }
}

pub type Result<T> = std::result::Result<T, Error>;
