//! Global observability setup: structured logging plus the Prometheus sink.

use crate::prometheus::PrometheusSink;
use tracing_subscriber::{fmt, layer::SubscriberExt, EnvFilter, Registry};

/// The filter applied when `RUST_LOG` is unset: the engine crates at debug
/// so load attempts and state transitions are visible, everything else at
/// info.
const DEFAULT_DIRECTIVES: &str = "info,lattice_sync=debug,lattice_node=debug";

/// Initializes the global `tracing` subscriber for structured JSON logging.
pub fn init_tracing() -> Result<(), anyhow::Error> {
    let fmt_layer = fmt::layer()
        .json()
        .flatten_event(true)
        .with_writer(std::io::stderr)
        .with_target(true);
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(DEFAULT_DIRECTIVES));
    let subscriber = Registry::default().with(filter).with(fmt_layer);
    tracing_log::LogTracer::init()?;
    tracing::subscriber::set_global_default(subscriber)?;
    Ok(())
}

/// One-call setup for binaries: tracing, the Prometheus collectors, and
/// the global metrics sink.
///
/// Returns the installed sink so the caller can also hand it to the
/// crate-local sink slots that cannot be reached from here (the sync
/// crate's `metrics::SINK`).
pub fn init_observability() -> Result<&'static PrometheusSink, anyhow::Error> {
    init_tracing()?;
    let sink = crate::prometheus::install()
        .map_err(|e| anyhow::anyhow!("failed to install prometheus collectors: {e}"))?;
    let _ = crate::sinks::SINK.set(sink);
    Ok(sink)
}
