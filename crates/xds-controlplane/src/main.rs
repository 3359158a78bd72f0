//! # xds-controlplane
//!
//! Runs the revision controllers against a YAML manifest of `NodeConfigCache`
//! and `Secret` objects, then prints the resulting status of every record.
//!
//! ```text
//! xds-controlplane manifest.yaml --once
//! xds-controlplane manifest.yaml --config controller.yaml --debug
//! ```

use std::io;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use xds_controlplane::manifest::{apply_manifest, parse_manifest, report};
use xds_revision::shutdown::wait_for_signal;
use xds_revision::{ControlPlane, ControllerConfig, MemoryStore};

/// Revision-controlled xDS snapshot publisher
#[derive(Parser, Debug)]
#[command(name = "xds-controlplane", version)]
struct Args {
    /// Manifest with NodeConfigCache and Secret documents
    manifest: PathBuf,

    /// Controller configuration file (YAML, or JSON by extension)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Override the number of revisions kept per node
    #[arg(long)]
    retention: Option<usize>,

    /// Exit once the controllers have been idle for the settle period
    #[arg(long)]
    once: bool,

    /// Idle period that counts as settled, in milliseconds
    #[arg(long, default_value_t = 250)]
    settle_ms: u64,

    /// Enable debug logging
    #[arg(short, long)]
    debug: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Logs go to stderr so the report on stdout stays machine-readable.
    let level = if args.debug { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level)))
        .with_writer(io::stderr)
        .init();

    let mut config = match &args.config {
        Some(path) => ControllerConfig::from_path(path)?,
        None => ControllerConfig::default(),
    };
    if let Some(retention) = args.retention {
        config = config.with_revision_retention(retention);
    }
    config.validate()?;

    let raw = std::fs::read_to_string(&args.manifest)
        .with_context(|| format!("cannot read {}", args.manifest.display()))?;
    let objects = parse_manifest(&raw)?;

    let store = Arc::new(MemoryStore::with_event_buffer(config.event_buffer));
    let plane = ControlPlane::new(Arc::clone(&store), config);
    let running = plane.start();

    let applied = apply_manifest(&*store, objects).await?;
    info!(objects = applied, manifest = %args.manifest.display(), "manifest applied");

    if args.once {
        running
            .wait_settled(Duration::from_millis(args.settle_ms))
            .await;
        info!("controllers settled");
    } else {
        wait_for_signal().await?;
    }

    running.shutdown(Duration::from_secs(10)).await;

    let reports = report(&*store, &**plane.cache()).await?;
    print!("{}", serde_yaml::to_string(&reports)?);
    Ok(())
}
