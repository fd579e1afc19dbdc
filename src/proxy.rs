//! Relay orchestration.
//!
//! Loads the rules, binds the transport and runs the server.

use std::net::{Ipv4Addr, SocketAddr};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use tokio::net::lookup_host;
use tracing::info;

use crate::error::{Error, Result};
use crate::filter::RuleSet;
use crate::resolver::{Policy, Resolver};
use crate::transport::udp::UdpTransport;
use crate::upstream::UdpUpstream;

/// Default listening port.
pub const DEFAULT_PORT: u16 = 10053;

/// Default upstream resolver.
pub const DEFAULT_UPSTREAM: &str = "114.114.114.114:53";

/// Interval between stats lines.
const STATS_INTERVAL: Duration = Duration::from_secs(60);

/// Configuration for the relay.
#[derive(Debug, Clone)]
pub struct ProxyConfig {
    /// File with one domain pattern per line
    pub rules_path: PathBuf,
    /// Local address to bind (e.g., 0.0.0.0:10053)
    pub bind_addr: SocketAddr,
    /// Upstream resolver for forwarded questions, as host:port
    pub upstream: String,
    /// Address returned for intercepted A questions
    pub sentinel: Ipv4Addr,
    pub upstream_timeout: Duration,
    pub policy: Policy,
}

/// Resolve an upstream `host:port` once, taking the first address.
pub async fn resolve_upstream(upstream: &str) -> Result<SocketAddr> {
    let lookup_failed = |source: std::io::Error| Error::UpstreamLookup {
        upstream: upstream.to_string(),
        source,
    };

    lookup_host(upstream)
        .await
        .map_err(lookup_failed)?
        .next()
        .ok_or_else(|| {
            lookup_failed(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                "no addresses found",
            ))
        })
}

/// Run the relay with the given configuration.
///
/// Loads the rule set, resolves the upstream, then binds UDP on the bind
/// address. Any of these failing is returned before anything is served.
/// Otherwise runs indefinitely.
pub async fn run(config: ProxyConfig) -> Result<()> {
    let rules = RuleSet::load(&config.rules_path)?;
    let upstream = Arc::new(UdpUpstream::new(
        resolve_upstream(&config.upstream).await?,
        config.upstream_timeout,
    ));
    let upstream_addr = upstream.addr();
    let resolver =
        Arc::new(Resolver::new(rules, upstream, config.sentinel).with_policy(config.policy));

    let udp = UdpTransport::bind(config.bind_addr).await?;

    info!(
        listen = %config.bind_addr,
        rules = %config.rules_path.display(),
        patterns = resolver.rule_count(),
        upstream = %config.upstream,
        upstream_addr = %upstream_addr,
        sentinel = %resolver.sentinel(),
        timeout = ?config.upstream_timeout,
        policy = ?resolver.policy(),
        "DNS relay listening"
    );

    udp.start(resolver.clone());

    let mut interval = tokio::time::interval(STATS_INTERVAL);
    interval.tick().await; // Skip first immediate tick
    loop {
        interval.tick().await;
        let stats = resolver.stats_snapshot_and_reset();
        info!(
            questions = stats.questions,
            intercepted = stats.intercepted,
            forwarded = stats.forwarded,
            failed = stats.failed,
            dropped = stats.dropped,
            avg_upstream_ms = stats.avg_upstream_ms,
            "stats"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(rules_path: PathBuf, bind_addr: SocketAddr) -> ProxyConfig {
        ProxyConfig {
            rules_path,
            bind_addr,
            upstream: DEFAULT_UPSTREAM.to_string(),
            sentinel: crate::resolver::DEFAULT_SENTINEL,
            upstream_timeout: crate::upstream::DEFAULT_TIMEOUT,
            policy: Policy::default(),
        }
    }

    #[tokio::test]
    async fn resolve_upstream_accepts_literal_address() {
        let addr = resolve_upstream("114.114.114.114:53").await.unwrap();

        assert_eq!(addr, "114.114.114.114:53".parse().unwrap());
    }

    #[tokio::test]
    async fn resolve_upstream_accepts_hostname() {
        let addr = resolve_upstream("localhost:53").await.unwrap();

        assert!(addr.ip().is_loopback());
        assert_eq!(addr.port(), 53);
    }

    #[tokio::test]
    async fn resolve_upstream_rejects_missing_port() {
        let err = resolve_upstream("localhost").await.unwrap_err();

        assert!(matches!(err, Error::UpstreamLookup { upstream, .. } if upstream == "localhost"));
    }

    #[tokio::test]
    async fn run_fails_without_rule_source() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = config(dir.path().join("nope.txt"), "127.0.0.1:0".parse().unwrap());

        let err = run(cfg).await.unwrap_err();

        assert!(matches!(err, Error::SourceUnavailable { .. }));
    }

    #[tokio::test]
    async fn run_fails_when_upstream_does_not_resolve() {
        let rules = tempfile::NamedTempFile::new().unwrap();
        let mut cfg = config(rules.path().to_path_buf(), "127.0.0.1:0".parse().unwrap());
        cfg.upstream = "not a host".to_string();

        let err = run(cfg).await.unwrap_err();

        assert!(matches!(err, Error::UpstreamLookup { .. }));
    }

    #[tokio::test]
    async fn run_fails_when_port_is_taken() {
        let taken = std::net::UdpSocket::bind("127.0.0.1:0").unwrap();
        let rules = tempfile::NamedTempFile::new().unwrap();
        let cfg = config(rules.path().to_path_buf(), taken.local_addr().unwrap());

        let err = run(cfg).await.unwrap_err();

        assert!(matches!(err, Error::Bind { .. }));
    }
}
