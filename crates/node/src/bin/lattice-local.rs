#![forbid(unsafe_code)]

//! A minimal single-process node: tracing, Prometheus metrics, a stable
//! on-disk identity, and a LocalNode idling until ctrl-c. Wire transports
//! are attached by the embedding application; this binary is the process
//! harness.

use anyhow::Result;
use clap::Parser;
use lattice_node::{identity, LocalNode};
use lattice_telemetry::http::StatusSource;
use lattice_types::config::SyncConfig;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Parser, Debug)]
#[clap(name = "lattice-local", about = "Lattice local node")]
struct LocalOpts {
    /// Address for the /metrics, /healthz, /readyz, and /statusz endpoints.
    #[clap(long, default_value = "127.0.0.1:9464")]
    telemetry_addr: SocketAddr,
    /// Directory holding the node identity; omit for an ephemeral identity.
    #[clap(long)]
    data_dir: Option<PathBuf>,
    /// Per-peer load deadline in milliseconds.
    #[clap(long, default_value_t = 30_000)]
    load_deadline_ms: u64,
}

#[tokio::main]
async fn main() -> Result<()> {
    let sink = lattice_telemetry::init::init_observability()?;
    let _ = lattice_sync::metrics::SINK.set(sink);

    let opts = LocalOpts::parse();
    let config = SyncConfig {
        load_deadline_ms: opts.load_deadline_ms,
        ..SyncConfig::default()
    };

    let node = match &opts.data_dir {
        Some(data_dir) => {
            std::fs::create_dir_all(data_dir)?;
            let keypair = identity::load_or_generate(&data_dir.join("identity.key"))?;
            LocalNode::with_identity(keypair, config)
        }
        None => LocalNode::new(config),
    };
    tracing::info!(target: "node", agent = %node.agent_id(), "lattice-local started");

    // Serves telemetry until ctrl-c, then drains the node.
    let status = Arc::clone(node.sync()) as Arc<dyn StatusSource>;
    lattice_telemetry::http::run_server(opts.telemetry_addr, status).await;
    node.shutdown();
    Ok(())
}
