use std::sync::Arc;

use clap::Parser;
use tracing::{error, info};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use jobset_operator::{
    clock::SystemClock,
    config::{Config, ConfigOverrides},
    controllers::JobSetController,
    metrics,
    server::Server,
    store::KubeStore,
    Error, Result,
};

/// Runs groups of replicated batch Jobs as a single JobSet
///
/// Settings come from the environment (and `.env`); flags given here take precedence.
#[derive(Parser, Debug)]
#[command(name = "jobset-operator", version, about, long_about = None)]
struct Args {
    /// Address of the health and metrics endpoint
    #[arg(long)]
    server_addr: Option<String>,

    /// Only watch JobSets in this namespace
    #[arg(long)]
    watch_namespace: Option<String>,

    /// Seconds between periodic reconciles of a healthy JobSet
    #[arg(long)]
    resync_interval_seconds: Option<u64>,

    /// Seconds to wait before retrying a failed reconcile
    #[arg(long)]
    error_requeue_seconds: Option<u64>,
}

impl From<Args> for ConfigOverrides {
    fn from(args: Args) -> Self {
        Self {
            server_addr: args.server_addr,
            watch_namespace: args.watch_namespace,
            resync_interval_seconds: args.resync_interval_seconds,
            error_requeue_seconds: args.error_requeue_seconds,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args = Args::parse();
    let config = Config::load()?.apply_overrides(args.into())?;
    info!("Loaded configuration: {:?}", config);

    metrics::register_metrics()?;

    let client = kube::Client::try_default()
        .await
        .map_err(|e| Error::Kubernetes(e.to_string()))?;
    let store = Arc::new(KubeStore::new(client.clone()));

    let addr = config.server.addr.clone();
    tokio::spawn(async move {
        if let Err(e) = Server::new().start(&addr).await {
            error!("Health server stopped: {}", e);
        }
    });

    let controller = Arc::new(JobSetController::new(
        store.clone(),
        store,
        Arc::new(SystemClock),
        config.controller,
    ));
    controller.run(client).await;

    Ok(())
}
