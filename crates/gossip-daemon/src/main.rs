//! gossip-daemon: runs one secure gossip node until Ctrl+C.

use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use anyhow::{Context, Result};
use clap::Parser;
use gossip_core::{ClusterEvent, ClusterNode, NodeConfig};
use tracing::info;
use tracing_subscriber::EnvFilter;

use gossip_daemon::{Config, load_or_create, parse_assignment, parse_endpoint};

#[derive(Parser, Debug)]
#[command(name = "gossip-daemon")]
#[command(about = "Secure gossip membership and replication node")]
struct Args {
    /// Address to bind and advertise (host:port, port 0 picks one)
    #[arg(short, long, default_value = "127.0.0.1:7946")]
    listen: String,

    /// Existing cluster member to bootstrap off (host:port)
    #[arg(short, long)]
    contact: Option<String>,

    /// PEM file holding the shared cluster key (created if missing)
    #[arg(short, long, default_value = "cluster_key.pem")]
    key: PathBuf,

    /// JSON config file
    #[arg(long)]
    config: Option<PathBuf>,

    /// Seed a value as KEY=TEXT (repeatable)
    #[arg(long = "put", value_name = "KEY=TEXT")]
    puts: Vec<String>,

    /// Enable verbose logging
    #[arg(long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // RUST_LOG wins; otherwise info (or debug with --verbose)
    let default_filter = if args.verbose {
        "debug,gossip_core=debug,gossip_daemon=debug"
    } else {
        "info,gossip_core=info,gossip_daemon=info"
    };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    info!("Starting gossip-daemon");

    let config = match &args.config {
        Some(path) => Config::load(path)?,
        None => Config::default(),
    };
    let listen = parse_endpoint(&args.listen)?;
    let contact = args.contact.as_deref().map(parse_endpoint).transpose()?;
    let seeds = args
        .puts
        .iter()
        .map(|s| parse_assignment(s))
        .collect::<Result<Vec<_>>>()?;

    let keys = load_or_create(&args.key, config.key_bits)?;
    let node_config =
        NodeConfig::new(listen.host.clone(), listen.port).with_gossip(config.gossip_config());

    let node = match contact {
        Some(contact) => ClusterNode::bootstrap(node_config, contact, keys).await,
        None => ClusterNode::start(node_config, keys).await,
    }
    .context("Failed to start node")?;

    info!("Node {} listening on {}", node.local_id(), node.local_address());
    if let Some(port) = node.local_address().transfer_port() {
        info!("Transfer port reserved: {}", port);
    }

    for (key, value) in seeds {
        info!("Seeding {}", key);
        node.put(key, value);
    }

    let dropped = Arc::new(AtomicUsize::new(0));
    let dropped_clone = Arc::clone(&dropped);
    let _dropped_sub = node.subscribe(move |event| {
        if matches!(event, ClusterEvent::MessageDropped { .. }) {
            dropped_clone.fetch_add(1, Ordering::Relaxed);
        }
    });

    info!("Daemon running. Press Ctrl+C to stop.");

    let mut status = tokio::time::interval(config.status_interval());
    loop {
        tokio::select! {
            _ = status.tick() => {
                info!(
                    "Status: {} peer(s), {} value(s), {} dropped datagram(s)",
                    node.peers().len(),
                    node.values().len(),
                    dropped.load(Ordering::Relaxed)
                );
            }

            _ = tokio::signal::ctrl_c() => {
                info!("Shutdown signal received");
                break;
            }
        }
    }

    node.shutdown().await;
    info!("Shut down");
    Ok(())
}
