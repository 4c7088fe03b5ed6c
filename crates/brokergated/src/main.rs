//! brokergated — the brokergate daemon.
//!
//! Single binary that assembles:
//! - Configuration store (redb)
//! - Route registry, restored from the store at startup
//! - Request pipeline (transformer + downstream forwarder)
//! - Admin REST API and the dynamic `/api/{name}` routes
//!
//! # Usage
//!
//! ```text
//! brokergated serve --config /etc/brokergate/brokergated.toml
//! brokergated serve --port 8080 --data-dir /var/lib/brokergate --downstream-timeout-secs 10
//! brokergated serve --config brokergated.toml --validate
//! ```

mod config;

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use brokergate_gateway::{Forwarder, Pipeline, RouteManager, RouteRegistry};
use brokergate_state::StateStore;
use brokergate_transform::Transformer;

use crate::config::DaemonConfig;

#[derive(Parser)]
#[command(name = "brokergated", about = "brokergate daemon", version)]
struct Cli {
    /// Emit logs as JSON lines.
    #[arg(long, global = true)]
    json_logs: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Serve the admin API and all registered routes.
    Serve(ServeArgs),
}

#[derive(Args)]
struct ServeArgs {
    /// Configuration file (default: ./brokergated.toml if present).
    #[arg(long)]
    config: Option<PathBuf>,

    /// Port to listen on; keeps the configured address.
    #[arg(long)]
    port: Option<u16>,

    /// Data directory for the configuration store.
    #[arg(long)]
    data_dir: Option<PathBuf>,

    /// Bound on one downstream exchange, in seconds.
    #[arg(long)]
    downstream_timeout_secs: Option<u64>,

    /// Check the configuration and exit.
    #[arg(long)]
    validate: bool,
}

impl ServeArgs {
    fn apply(&self, config: &mut DaemonConfig) {
        if let Some(port) = self.port {
            config.server.listen.set_port(port);
        }
        if let Some(dir) = &self.data_dir {
            config.store.data_dir = dir.clone();
        }
        if let Some(secs) = self.downstream_timeout_secs {
            config.gateway.downstream_timeout = format!("{secs}s");
        }
    }
}

fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,brokergate=debug"));

    if json {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer())
            .init();
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.json_logs);

    match cli.command {
        Command::Serve(args) => serve(args).await,
    }
}

async fn serve(args: ServeArgs) -> anyhow::Result<()> {
    let mut config = DaemonConfig::load(args.config.as_deref())?;
    args.apply(&mut config);
    config.validate()?;
    let timeout = config.downstream_timeout()?;

    if args.validate {
        info!(
            listen = %config.server.listen,
            data_dir = %config.store.data_dir.display(),
            ?timeout,
            selection = ?config.gateway.response_selection,
            "configuration is valid"
        );
        return Ok(());
    }

    info!("brokergate daemon starting");

    // ── Initialize subsystems ──────────────────────────────────

    std::fs::create_dir_all(&config.store.data_dir)
        .with_context(|| format!("creating {}", config.store.data_dir.display()))?;
    let db_path = config.db_path();
    let store = StateStore::open(&db_path)?;
    info!(path = ?db_path, "configuration store opened");

    let registry = Arc::new(RouteRegistry::new(config.gateway.response_selection));
    let manager = RouteManager::new(store, Arc::clone(&registry));
    if config.gateway.restore_routes {
        let stats = manager.restore_routes()?;
        info!(
            registered = stats.registered,
            skipped = stats.skipped,
            failed = stats.failed,
            "startup restore complete"
        );
    }

    let pipeline = Arc::new(Pipeline::new(
        Transformer::default(),
        Forwarder::new(timeout),
    ));
    info!(?timeout, "request pipeline initialized");

    // ── Start server ───────────────────────────────────────────

    let router = brokergate_api::build_router(manager, pipeline);
    let addr: SocketAddr = config.server.listen;
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("binding {addr}"))?;
    info!(%addr, routes = registry.len(), "server listening");

    axum::serve(listener, router)
        .with_graceful_shutdown(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                warn!(error = %e, "failed to listen for ctrl-c; shutting down");
            }
            info!("shutdown signal received");
        })
        .await?;

    info!("brokergate daemon stopped");
    Ok(())
}
