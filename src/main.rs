//! Vault Operator - resilient update intake and signed AgentVault calls
//!
//! The operator keeps a long-poll connection to the update feed alive under
//! transient failures and executes requested vault admin calls through a
//! single serialized submission pipeline.

use anyhow::Result;
use std::sync::Arc;
use std::time::Instant;
use tokio::signal;
use tokio::sync::{mpsc, watch};
use tracing::{debug, error, info, warn};

mod chain;
mod config;
mod error;
mod intake;
mod metrics;
mod service;
mod tx;
mod vault;

use chain::{ChainProvider, ChainRpc};
use config::{ChainConfig, Settings};
use error::{OperatorError, OperatorResult};
use ethers::signers::LocalWallet;
use intake::{IntakeUpdate, LongPollIntake};
use metrics::MetricsServer;
use service::{RetryPolicy, ServiceLoop, StopReason};
use tx::{TxOutcome, VaultExecutor};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    init_logging();

    info!("Starting Vault Operator v{}", env!("CARGO_PKG_VERSION"));

    // Load configuration
    let settings = Settings::load()?;
    info!(
        "Loaded configuration for instance {} (chain {})",
        settings.operator.instance_id, settings.chain.chain_id
    );

    let wallet = load_wallet(&settings.chain)?;

    let provider = Arc::new(ChainProvider::new(&settings.chain)?);
    if !provider.health_check().await {
        warn!("Chain RPC health check failed at startup");
    }

    let executor = Arc::new(VaultExecutor::new(
        provider.clone(),
        wallet,
        &settings.chain.vault_address,
        settings.chain.chain_id,
        settings.confirm_poll_interval(),
    )?);
    info!("Vault executor ready (sender {:?})", executor.sender_address());

    // Start metrics server
    let metrics_handle = if settings.metrics.enabled {
        let server = MetricsServer::new(settings.metrics.port);
        info!("Metrics: http://0.0.0.0:{}/metrics", settings.metrics.port);
        Some(tokio::spawn(async move {
            if let Err(e) = server.run().await {
                error!("Metrics server error: {}", e);
            }
        }))
    } else {
        None
    };

    // Action dispatch: drains intake updates into the executor
    let (update_tx, update_rx) = mpsc::channel::<IntakeUpdate>(100);
    let dispatch_handle = tokio::spawn(dispatch_actions(executor.clone(), update_rx));

    // Shutdown signal feeds the intake supervisor
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        shutdown_signal().await;
        info!("Shutdown signal received, stopping...");
        let _ = shutdown_tx.send(true);
    });

    let transport = LongPollIntake::new(&settings.intake, update_tx)?;
    let policy = RetryPolicy::from_config(&settings.retry);
    let service = ServiceLoop::new(transport, policy, shutdown_rx);

    metrics::set_intake_up(true);
    let reason = service.run().await;
    metrics::set_intake_up(false);

    dispatch_handle.abort();
    if let Some(h) = metrics_handle {
        h.abort();
    }

    match reason {
        StopReason::Interrupted => {
            info!("Vault Operator stopped");
            Ok(())
        }
        StopReason::RetriesExhausted { attempts } => {
            error!(
                "Update intake permanently lost after {} failed cycles",
                attempts
            );
            anyhow::bail!("update intake exhausted its retry budget")
        }
    }
}

/// Execute requested vault actions one at a time, in arrival order
async fn dispatch_actions<C: ChainRpc>(
    executor: Arc<VaultExecutor<C>>,
    mut updates: mpsc::Receiver<IntakeUpdate>,
) {
    while let Some(update) = updates.recv().await {
        let Some(action) = update.action else {
            debug!("Update {} carries no action", update.update_id);
            continue;
        };

        let call = action.into_call();
        let function = call.function;
        info!("Executing {} (update {})", function, update.update_id);
        metrics::record_tx_submitted(function);

        let started = Instant::now();
        match executor.submit(call).await {
            TxOutcome::Confirmed {
                tx_hash,
                block_number,
            } => {
                metrics::record_tx_confirmed(function, started.elapsed().as_secs_f64());
                info!(
                    "{} confirmed: {:?} in block {}",
                    function, tx_hash, block_number
                );
            }
            TxOutcome::Failed(failure) => {
                metrics::record_tx_failed(function, failure.kind(), started.elapsed().as_secs_f64());
                error!("{} failed: {}", function, failure);
            }
        }
    }
}

/// Load the signing key from the environment variable named in config.
/// The key material is never logged.
fn load_wallet(chain: &ChainConfig) -> OperatorResult<LocalWallet> {
    let key = std::env::var(&chain.private_key_env).map_err(|_| {
        OperatorError::Config(format!(
            "{} is not set. Export the signing key before starting",
            chain.private_key_env
        ))
    })?;

    key.parse::<LocalWallet>()
        .map_err(|e| OperatorError::Signing(format!("Invalid private key: {}", e)))
}

fn init_logging() {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,vault_operator=debug,hyper=warn"));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(true).with_thread_ids(true))
        .init();
}

async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
