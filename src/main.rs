use clap::{Parser, Subcommand};
use rentchain::api::{create_router, AppState};
use rentchain::chain::{AgreementArtifact, ChainSigner, EthersLedger, LedgerClient, ReadAggregator};
use rentchain::config::AppConfig;
use rentchain::coordinator::LifecycleCoordinator;
use rentchain::error::{RentchainError, Result};
use rentchain::queue::BroadcastQueue;
use rentchain::services::{ReconciliationSweep, SweepConfig};
use rentchain::store::{ListingStore, MemoryStore, PostgresStore};
use std::sync::Arc;
use std::time::Duration;
use tokio::signal;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "rentchain", about = "Custodial rental-agreement lifecycle service")]
struct Cli {
    /// Configuration file path
    #[arg(short, long, default_value = "config/default.toml")]
    config: String,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the API server with the reconciliation sweep (default)
    Serve,
    /// Run a single reconciliation sweep cycle and exit
    Sweep,
    /// Print the live on-chain view of an agreement
    Agreement { address: String },
}

#[tokio::main]
async fn main() -> Result<()> {
    init_logging();

    let cli = Cli::parse();
    let config = AppConfig::load(&cli.config)?;

    match cli.command.unwrap_or(Commands::Serve) {
        Commands::Serve => run_serve(&config).await,
        Commands::Sweep => run_sweep_once(&config).await,
        Commands::Agreement { address } => run_agreement_view(&config, &address).await,
    }
}

fn init_logging() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("rentchain=info")),
        )
        .init();
}

fn build_ledger(config: &AppConfig) -> Result<Arc<dyn LedgerClient>> {
    let signer = match &config.signer.private_key {
        Some(key) => ChainSigner::from_private_key(key, config.chain.chain_id)?,
        None => ChainSigner::from_env(config.chain.chain_id)?,
    };
    let artifact = AgreementArtifact::load(&config.chain.artifact_path)?;
    Ok(Arc::new(EthersLedger::new(
        &config.chain.rpc_url,
        signer,
        artifact,
    )?))
}

async fn build_store(config: &AppConfig) -> Result<Arc<dyn ListingStore>> {
    match &config.database.url {
        Some(url) => {
            let store = PostgresStore::new(url, config.database.max_connections).await?;
            store.migrate().await?;
            Ok(Arc::new(store))
        }
        None => {
            warn!("No database configured; listings are kept in memory and lost on restart");
            Ok(Arc::new(MemoryStore::new()))
        }
    }
}

struct Components {
    state: AppState,
    sweep: Arc<ReconciliationSweep>,
}

async fn build_components(config: &AppConfig) -> Result<Components> {
    let ledger = build_ledger(config)?;
    let store = build_store(config).await?;

    let queue = Arc::new(BroadcastQueue::new(ledger.clone(), &config.execution));
    let aggregator = Arc::new(ReadAggregator::new(ledger));
    let coordinator = Arc::new(LifecycleCoordinator::new(
        queue.clone(),
        store.clone(),
        aggregator.clone(),
        Duration::from_secs(config.execution.confirmation_timeout_secs),
    ));
    let sweep = Arc::new(ReconciliationSweep::new(
        coordinator.clone(),
        store.clone(),
        queue.clone(),
        SweepConfig {
            interval_secs: config.reconcile.sweep_interval_secs,
            max_listings_per_cycle: config.reconcile.max_listings_per_cycle,
        },
    ));

    Ok(Components {
        state: AppState::new(store, coordinator, aggregator, queue),
        sweep,
    })
}

async fn run_serve(config: &AppConfig) -> Result<()> {
    let components = build_components(config).await?;
    components.sweep.clone().start();

    let router = create_router(components.state);
    let addr = format!("0.0.0.0:{}", config.api.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("API server listening on {}", addr);

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    components.sweep.stop();
    info!("Shutdown complete");
    Ok(())
}

async fn run_sweep_once(config: &AppConfig) -> Result<()> {
    let components = build_components(config).await?;
    components.sweep.run_cycle().await;

    let stats = components.sweep.get_stats().await;
    info!(
        "Sweep cycle done: {} listings checked, {} drift corrections, {} errors, {} orphaned contracts",
        stats.listings_checked,
        stats.drift_corrections,
        stats.errors,
        stats.orphaned_contracts.len()
    );
    Ok(())
}

async fn run_agreement_view(config: &AppConfig, address: &str) -> Result<()> {
    let contract = address
        .parse()
        .map_err(|_| RentchainError::Validation(format!("invalid contract address '{}'", address)))?;

    let ledger = build_ledger(config)?;
    let aggregator = ReadAggregator::new(ledger);
    let view = aggregator.fetch_agreement_view(contract).await?;

    println!("{}", serde_json::to_string_pretty(&view)?);
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = signal::ctrl_c().await {
        warn!("Failed to listen for shutdown signal: {}", e);
    } else {
        info!("Shutdown signal received");
    }
}
