//! chainview standalone server

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use bytes::Bytes;
use clap::Parser;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use chainview_core::source::{ChainSource, LedgerHandle, SourceError};
use chainview_core::types::{EntityId, SessionId, WatchKind};
use chainview_core::{RegistryConfig, SessionRegistry};

/// chainview - session and notification-fanout server for chain indexing
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// GC sweep interval in seconds (0 disables the built-in ticker)
    #[arg(long, default_value_t = 10)]
    gc_interval: u64,

    /// Long-poll response timeout in seconds
    #[arg(long, default_value_t = 30)]
    poll_timeout: u64,

    /// Log level
    #[arg(long, default_value = "info")]
    log_level: String,
}

/// Stand-in chain engine used until the block-data backend is wired up:
/// resolves every watch to an empty script set and echoes queries.
// TODO(storage): replace with the block-data engine adapter.
struct DevChainSource;

impl ChainSource for DevChainSource {
    fn resolve_watch(
        &self,
        entity: &EntityId,
        kind: WatchKind,
        _payload: &Bytes,
    ) -> Result<LedgerHandle, SourceError> {
        Ok(LedgerHandle::new(entity.clone(), kind, Vec::new()))
    }

    fn query(
        &self,
        _session: &SessionId,
        _entity: Option<&EntityId>,
        payload: &Bytes,
    ) -> Result<Bytes, SourceError> {
        Ok(payload.clone())
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| format!("chainview={}", args.log_level).into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting chainview server");
    info!("Version: {}", env!("CARGO_PKG_VERSION"));

    let config = RegistryConfig {
        gc_interval: (args.gc_interval > 0).then(|| Duration::from_secs(args.gc_interval)),
        poll_timeout: Duration::from_secs(args.poll_timeout),
        ..RegistryConfig::default()
    };

    let registry = SessionRegistry::new(Arc::new(DevChainSource), config);
    registry.set_shutdown_hook(|| info!("registry shutdown complete"));
    registry.start();

    // TODO(transport): mount the long-poll and push endpoints on the
    // registry's request router once the wire codec lands.

    tokio::signal::ctrl_c().await?;
    info!("Shutdown signal received");
    registry.shutdown_all();

    Ok(())
}
