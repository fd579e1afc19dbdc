use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use clap::Parser;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use greendns::proxy::{self, DEFAULT_PORT, DEFAULT_UPSTREAM, ProxyConfig};
use greendns::resolver::{DEFAULT_SENTINEL, Policy};

#[derive(Parser)]
#[command(name = "greendns", version)]
#[command(about = "DNS relay that answers listed domains with a sentinel address", long_about = None)]
struct Args {
    /// File with one domain pattern per line
    rules: PathBuf,

    /// Local port to listen on
    #[arg(default_value_t = DEFAULT_PORT)]
    port: u16,

    /// Upstream DNS server (host:port)
    #[arg(default_value = DEFAULT_UPSTREAM)]
    upstream: String,

    /// Address returned for intercepted A queries
    #[arg(default_value_t = DEFAULT_SENTINEL)]
    sentinel: Ipv4Addr,

    /// Bind address
    #[arg(short, long, default_value = "0.0.0.0")]
    bind: IpAddr,

    /// Upstream timeout in seconds
    #[arg(long, default_value_t = 5)]
    timeout_secs: u64,

    /// Forward AAAA queries instead of dropping them
    #[arg(long)]
    allow_aaaa: bool,

    /// Forward non-A queries for listed domains instead of dropping them
    #[arg(long)]
    forward_matched_non_a: bool,

    /// Log every query (domain, decision, timing)
    #[arg(short, long)]
    verbose: bool,
}

impl Args {
    fn into_config(self) -> ProxyConfig {
        ProxyConfig {
            rules_path: self.rules,
            bind_addr: SocketAddr::new(self.bind, self.port),
            upstream: self.upstream,
            sentinel: self.sentinel,
            upstream_timeout: Duration::from_secs(self.timeout_secs),
            policy: Policy {
                drop_aaaa: !self.allow_aaaa,
                suppress_matched_non_a: !self.forward_matched_non_a,
            },
        }
    }
}

fn init_logging(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::fmt().with_env_filter(filter).init();
}

fn main() -> ExitCode {
    let args = Args::parse();
    init_logging(args.verbose);

    info!("greendns v{}", env!("CARGO_PKG_VERSION"));

    let rt = match tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
    {
        Ok(rt) => rt,
        Err(e) => {
            error!(error = %e, "failed to start runtime");
            return ExitCode::FAILURE;
        }
    };

    match rt.block_on(proxy::run(args.into_config())) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(error = %e, "DNS relay stopped");
            ExitCode::FAILURE
        }
    }
}
