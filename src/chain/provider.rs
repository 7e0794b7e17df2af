//! Chain provider with multi-RPC support and automatic failover
//!
//! Failover applies to idempotent reads only. Broadcast always goes to the
//! currently selected endpoint exactly once: re-sending the same raw
//! envelope through another endpoint would make the submission pipeline's
//! failure report ambiguous.

use crate::chain::ChainRpc;
use crate::config::ChainConfig;
use crate::error::{OperatorError, OperatorResult};

use async_trait::async_trait;
use ethers::prelude::*;
use ethers::providers::{Http, Provider, ProviderError};
use ethers::types::transaction::eip2718::TypedTransaction;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tracing::{debug, error, warn};

/// Multi-provider wrapper over the configured RPC endpoints
pub struct ChainProvider {
    chain_id: u64,
    http_providers: Vec<Provider<Http>>,
    /// Current active provider index
    current_provider: AtomicUsize,
}

impl ChainProvider {
    pub fn new(config: &ChainConfig) -> OperatorResult<Self> {
        let mut http_providers = Vec::new();

        for url in &config.rpc_urls {
            match Provider::<Http>::try_from(url.as_str()) {
                Ok(provider) => {
                    let provider = provider.interval(Duration::from_millis(100));
                    http_providers.push(provider);
                    debug!("Added HTTP provider for chain {}: {}", config.chain_id, url);
                }
                Err(e) => {
                    warn!("Failed to create provider for {}: {}", url, e);
                }
            }
        }

        if http_providers.is_empty() {
            return Err(OperatorError::Config(
                "No valid RPC providers".to_string(),
            ));
        }

        Ok(Self {
            chain_id: config.chain_id,
            http_providers,
            current_provider: AtomicUsize::new(0),
        })
    }

    /// Get the active HTTP provider
    fn http(&self) -> &Provider<Http> {
        let idx = self.current_provider.load(Ordering::Relaxed);
        &self.http_providers[idx % self.http_providers.len()]
    }

    /// Switch to next available provider
    fn failover(&self) {
        let current = self.current_provider.load(Ordering::Relaxed);
        let next = (current + 1) % self.http_providers.len();
        self.current_provider.store(next, Ordering::Relaxed);
        warn!("Chain {} failover to provider {}", self.chain_id, next);
    }

    /// Run an idempotent read against each endpoint in turn until one answers
    async fn read_with_failover<T, F, Fut>(&self, what: &str, op: F) -> OperatorResult<T>
    where
        F: Fn(Provider<Http>) -> Fut,
        Fut: std::future::Future<Output = Result<T, ProviderError>>,
    {
        for _ in 0..self.http_providers.len() {
            match op(self.http().clone()).await {
                Ok(value) => return Ok(value),
                Err(e) => {
                    warn!("Chain {} {} failed: {}", self.chain_id, what, e);
                    self.failover();
                }
            }
        }

        Err(OperatorError::ChainConnection(format!(
            "all providers failed: {}",
            what
        )))
    }

    pub fn chain_id(&self) -> u64 {
        self.chain_id
    }

    /// Health check
    pub async fn health_check(&self) -> bool {
        match self.block_number().await {
            Ok(_) => true,
            Err(e) => {
                error!("Health check failed for chain {}: {}", self.chain_id, e);
                false
            }
        }
    }
}

#[async_trait]
impl ChainRpc for ChainProvider {
    async fn estimate_gas(&self, tx: &TypedTransaction) -> OperatorResult<U256> {
        self.http()
            .estimate_gas(tx, None)
            .await
            .map_err(|e| OperatorError::GasEstimation(e.to_string()))
    }

    async fn gas_price(&self) -> OperatorResult<U256> {
        self.read_with_failover("gas price", |p| async move { p.get_gas_price().await })
            .await
    }

    async fn next_nonce(&self, sender: Address) -> OperatorResult<U256> {
        self.read_with_failover("transaction count", move |p| async move {
            p.get_transaction_count(sender, None).await
        })
        .await
    }

    async fn send_raw_transaction(&self, raw: Bytes) -> OperatorResult<H256> {
        let pending = self
            .http()
            .send_raw_transaction(raw)
            .await
            .map_err(|e| OperatorError::Broadcast(e.to_string()))?;
        Ok(pending.tx_hash())
    }

    async fn transaction_receipt(&self, hash: H256) -> OperatorResult<Option<TransactionReceipt>> {
        self.read_with_failover("transaction receipt", move |p| async move {
            p.get_transaction_receipt(hash).await
        })
        .await
    }

    async fn block_number(&self) -> OperatorResult<u64> {
        self.read_with_failover("block number", |p| async move {
            p.get_block_number().await.map(|b| b.as_u64())
        })
        .await
    }
}
