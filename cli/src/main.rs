mod shutdown;

use std::{net::SocketAddr, sync::Arc, time::Duration};

use anyhow::{Context, Result, bail};
use clap::{Args, Parser, Subcommand};
use peerlink::{
    config::PeerConfig,
    memnet::{MemoryNetwork, MemoryNode},
    types::{NodePublic, RelayId},
};
use tracing_subscriber::EnvFilter;

/// Peerlink: per-peer path negotiation for a mesh VPN agent.
///
/// Every peer starts on its home relay and upgrades to a direct UDP path as
/// soon as both sides have heard from each other.
#[derive(Parser, Debug)]
#[command(name = "peerlink", version, about)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run a full mesh of in-memory nodes and report the paths they settle on.
    Simulate(SimulateArgs),
}

#[derive(Args, Debug)]
struct SimulateArgs {
    /// Number of nodes in the mesh.
    #[arg(long, default_value_t = 3, env = "PEERLINK_PEERS")]
    peers: u8,

    /// Tick interval in milliseconds.
    #[arg(long, default_value_t = 1000, env = "PEERLINK_TICK_MS")]
    tick_ms: u64,

    /// Drop every direct datagram, forcing relay fallback.
    #[arg(long, env = "PEERLINK_NO_DIRECT")]
    no_direct: bool,

    /// Stop after this many seconds instead of waiting for Ctrl-C.
    #[arg(long, env = "PEERLINK_DURATION_SECS")]
    duration_secs: Option<u64>,

    /// Relay pings per round before a silent peer is considered offline.
    #[arg(long, default_value_t = 5, env = "PEERLINK_TRYING_ATTEMPTS")]
    trying_attempts: u32,

    /// Ticks of direct probing before falling back to the relay.
    #[arg(long, default_value_t = 5, env = "PEERLINK_ESTABLISHING_TICKS")]
    establishing_ticks: u32,

    /// Ticks between keepalive pings on an established path.
    #[arg(long, default_value_t = 5, env = "PEERLINK_KEEPALIVE_TICKS")]
    keepalive_ticks: u32,

    /// Ticks of silence before an established path is torn down.
    #[arg(long, default_value_t = 15, env = "PEERLINK_IDLE_TIMEOUT_TICKS")]
    idle_timeout_ticks: u32,
}

impl From<&SimulateArgs> for PeerConfig {
    fn from(args: &SimulateArgs) -> Self {
        Self {
            tick_interval: Duration::from_millis(args.tick_ms),
            trying_attempts: args.trying_attempts,
            establishing_ticks: args.establishing_ticks,
            keepalive_ticks: args.keepalive_ticks,
            idle_timeout_ticks: args.idle_timeout_ticks,
            ..PeerConfig::default()
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    match cli.command {
        Command::Simulate(args) => simulate(args).await,
    }
}

fn node_addrs(index: u8) -> Vec<SocketAddr> {
    vec![
        SocketAddr::from(([192, 0, 2, index], 41641)),
        SocketAddr::from(([10, 0, index, 1], 41641)),
    ]
}

async fn simulate(args: SimulateArgs) -> Result<()> {
    if args.peers < 2 {
        bail!("--peers must be at least 2, got {}", args.peers);
    }
    let config = PeerConfig::from(&args);
    config.validate().context("invalid simulation timing")?;
    let config = Arc::new(config);

    let net = MemoryNetwork::new();
    net.block_direct(args.no_direct);

    let nodes: Vec<MemoryNode> = (1..=args.peers)
        .map(|index| {
            net.spawn_node(
                NodePublic::random(),
                node_addrs(index),
                RelayId(i64::from(index % 2) + 1),
                Arc::clone(&config),
            )
        })
        .collect();
    for node in &nodes {
        for other in nodes.iter().filter(|other| other.key() != node.key()) {
            node.connect(other);
        }
    }
    tracing::info!(
        nodes = nodes.len(),
        direct = !args.no_direct,
        tick_ms = args.tick_ms,
        "simulation started"
    );

    let deadline = async {
        match args.duration_secs {
            Some(secs) => tokio::time::sleep(Duration::from_secs(secs)).await,
            None => std::future::pending().await,
        }
    };
    tokio::pin!(deadline);
    let shutdown_signal = shutdown::shutdown_signal();
    tokio::pin!(shutdown_signal);

    let mut report = tokio::time::interval(config.tick_interval.saturating_mul(5));
    let mut converged = false;
    loop {
        tokio::select! {
            result = &mut shutdown_signal => {
                let signal = result?;
                tracing::info!(%signal, "shutdown signal received");
                break;
            }
            () = &mut deadline => {
                tracing::info!("simulation deadline reached");
                break;
            }
            _ = report.tick() => {
                let established = established_pairs(&nodes);
                let total = nodes.len() * (nodes.len() - 1);
                tracing::debug!(established, total, "mesh progress");
                if established == total && !converged {
                    converged = true;
                    tracing::info!(pairs = total, "mesh converged");
                    report_paths(&nodes);
                }
            }
        }
    }

    report_paths(&nodes);
    for node in nodes {
        node.shutdown().await;
    }
    Ok(())
}

fn established_pairs(nodes: &[MemoryNode]) -> usize {
    nodes
        .iter()
        .flat_map(|node| node.registry().peers())
        .filter(|(_, status)| status.is_established())
        .count()
}

fn report_paths(nodes: &[MemoryNode]) {
    for node in nodes {
        for (peer, status) in node.registry().peers() {
            match status.endpoint {
                Some(endpoint) => tracing::info!(
                    node = %node.key().short(),
                    peer = %peer.short(),
                    state = status.state,
                    path = %endpoint.kind(),
                    %endpoint,
                    "peer path"
                ),
                None => tracing::info!(
                    node = %node.key().short(),
                    peer = %peer.short(),
                    state = status.state,
                    "peer path"
                ),
            }
        }
    }
}
