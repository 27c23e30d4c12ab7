//! vis-capture: loopback audio spectrum daemon.
//!
//! No CLI flags, no configuration file (spec §6 "Process interface"): the
//! daemon binds [`vis_proto::DEFAULT_PORT`], opens the system's default
//! loopback source, and starts streaming bar vectors to the first subscriber
//! that completes the websocket handshake.

mod orchestrator;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use orchestrator::Orchestrator;
use tracing_subscriber::EnvFilter;

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "warn".into()))
        .init();

    if let Err(e) = run() {
        tracing::error!(error = %e, "vis-capture exiting");
        std::process::exit(1);
    }
}

fn run() -> anyhow::Result<()> {
    let running = Arc::new(AtomicBool::new(true));
    let r = Arc::clone(&running);
    ctrlc::set_handler(move || {
        tracing::info!("shutdown signal received");
        r.store(false, Ordering::SeqCst);
    })?;

    tracing::info!(port = vis_proto::DEFAULT_PORT, "starting vis-capture");
    let mut orchestrator = Orchestrator::start()?;
    let result = orchestrator.run(&running);

    tracing::info!(
        ok = result.is_ok(),
        "vis-capture shutting down"
    );
    result
}
