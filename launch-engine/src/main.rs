//! Launch engine service
//!
//! Serves launch preparation, submission, claim batching and pool
//! administration over HTTP, and sweeps abandoned reservations in the
//! background.

use anyhow::Result;
use clap::Parser;
use launch_engine::api::{self, ApiState};
use launch_engine::claims::ClaimTransactionBuilder;
use launch_engine::config::EngineConfig;
use launch_engine::core::{IdentityStore, LedgerClient};
use launch_engine::curve::CurveConfigCalculator;
use launch_engine::launch::{spawn_reaper, CoordinatorSettings, LaunchPrograms, LaunchTransactionCoordinator};
use launch_engine::ledger::{MockLedger, RetryPolicy, RpcLedgerClient};
use launch_engine::pool::{KeypairPool, PoolSettings};
use launch_engine::storage::{MemoryIdentityStore, PostgresIdentityStore};
use solana_sdk::signature::Keypair;
use solana_sdk::signer::Signer;
use std::sync::Arc;
use std::time::Duration;
use tokio::signal;
use tokio::sync::watch;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "launch-engine")]
#[command(about = "Token launch and reward claim orchestration engine")]
struct Cli {
    /// Configuration file path
    #[arg(short, long, default_value = "launch-engine.toml")]
    config: String,

    /// Override log level
    #[arg(long)]
    log_level: Option<String>,

    /// Dry run mode (validate config and exit)
    #[arg(long)]
    dry_run: bool,

    /// Use the in-memory identity store and mock ledger
    #[arg(long)]
    in_memory: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Load configuration
    let config_found = std::path::Path::new(&cli.config).exists();
    let mut config = if config_found {
        EngineConfig::from_file(&cli.config)?
    } else {
        let mut config = EngineConfig::default();
        config.apply_env_overrides();
        config
    };

    if let Some(log_level) = cli.log_level {
        config.monitoring.log_level = log_level;
    }

    init_logging(&config)?;
    if !config_found {
        warn!("Config file not found, using defaults: {}", cli.config);
    }

    info!("Starting launch engine");
    config.validate()?;
    let programs = LaunchPrograms::from_config(&config.platform)?;
    info!("Launch program: {}", programs.launch_program);
    info!("Quote mint: {}", programs.quote_mint);

    let platform = match config.platform.load_authority() {
        Ok(keypair) => keypair,
        Err(e) if cli.in_memory => {
            warn!("{}; using an ephemeral platform authority", e);
            Keypair::new()
        }
        Err(e) => return Err(e.into()),
    };
    info!("Platform authority: {}", platform.pubkey());
    info!("Configuration validated successfully");

    if cli.dry_run {
        info!("Dry run mode - configuration is valid, exiting");
        return Ok(());
    }

    let (store, ledger): (Arc<dyn IdentityStore>, Arc<dyn LedgerClient>) = if cli.in_memory {
        warn!("Running with the in-memory identity store and mock ledger");
        (Arc::new(MemoryIdentityStore::new()), Arc::new(MockLedger::new()))
    } else {
        info!("Connecting to PostgreSQL...");
        let store = PostgresIdentityStore::connect(&config.database).await?;
        store.migrate().await?;
        info!("Identity store ready");
        info!("Ledger RPC endpoint: {}", config.ledger.rpc_url);
        (Arc::new(store), Arc::new(RpcLedgerClient::from_config(&config.ledger)))
    };

    let read_retry = RetryPolicy::from_config(&config.ledger);
    let pool = Arc::new(KeypairPool::new(
        store,
        ledger.clone(),
        PoolSettings::from_config(&config.pool, read_retry),
    ));
    let calculator = CurveConfigCalculator::new(
        config.curve.clone(),
        config.platform.fee_claimer,
        config.platform.leftover_receiver,
    );
    let coordinator = Arc::new(LaunchTransactionCoordinator::new(
        pool,
        calculator,
        ledger.clone(),
        Arc::new(platform),
        programs,
        CoordinatorSettings::from_config(&config),
    ));
    let claims = Arc::new(ClaimTransactionBuilder::new(ledger, programs, read_retry));

    match coordinator.pool().supply_stats().await {
        Ok(stats) => info!(
            "Identity pool: {} available, {} reserved, {} used",
            stats.available, stats.reserved, stats.used
        ),
        Err(e) => warn!("Could not read pool supply: {}", e),
    }

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let reaper = spawn_reaper(
        coordinator.clone(),
        Duration::from_secs(config.pool.reap_interval_secs),
        shutdown_rx,
    );

    let state = ApiState::new(coordinator, claims, &config.api);
    let api_server = api::start_server(state, &config.api).await?;

    info!("Launch engine started. Press Ctrl+C to shutdown.");
    tokio::select! {
        _ = signal::ctrl_c() => {
            info!("Received shutdown signal");
        }
        _ = api_server => {
            info!("API server finished");
        }
    }

    let _ = shutdown_tx.send(true);
    if let Err(e) = reaper.await {
        error!("Reservation sweep task error: {}", e);
    }

    info!("Shutting down launch engine");
    Ok(())
}

fn init_logging(config: &EngineConfig) -> Result<()> {
    let log_level = config.monitoring.log_level.parse().unwrap_or(tracing::Level::INFO);
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| format!("launch_engine={},tower_http=info", log_level).into());

    if config.monitoring.structured_logging {
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

    Ok(())
}
