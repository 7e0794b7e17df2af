//! Sign-broadcast-confirm lifecycle for vault contract calls
//!
//! The executor owns the signing key and serializes submissions: two calls
//! in flight with the same sender would race on "fetch next nonce" and one
//! of them would collide or be rejected by the chain.

use super::gas::GasPlan;
use crate::chain::ChainRpc;
use crate::error::{OperatorError, OperatorResult};

use ethers::prelude::*;
use ethers::signers::{LocalWallet, Signer};
use ethers::types::transaction::eip2718::TypedTransaction;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};

/// A fully-formed contract call, ready for submission
#[derive(Debug, Clone)]
pub struct CallRequest {
    /// Function name, used in logs and metrics only
    pub function: &'static str,
    /// ABI-encoded selector and arguments
    pub calldata: Bytes,
}

/// Terminal failure classes for a submission
#[derive(Debug, Clone)]
pub enum TxFailure {
    /// Pre-flight rejection: nothing was built or sent, no fee spent
    GasEstimation(String),
    /// The envelope never reached the chain; fee not spent
    Broadcast(String),
    /// Included with status 0: fee spent, no state change
    OnChainRevert { tx_hash: H256, block_number: u64 },
    /// Local faults, signing defects included
    Other(String),
}

impl TxFailure {
    pub fn kind(&self) -> &'static str {
        match self {
            TxFailure::GasEstimation(_) => "gas_estimation",
            TxFailure::Broadcast(_) => "broadcast",
            TxFailure::OnChainRevert { .. } => "revert",
            TxFailure::Other(_) => "other",
        }
    }
}

impl std::fmt::Display for TxFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TxFailure::GasEstimation(msg) => write!(f, "gas estimation failed: {}", msg),
            TxFailure::Broadcast(msg) => write!(f, "broadcast failed: {}", msg),
            TxFailure::OnChainRevert {
                tx_hash,
                block_number,
            } => write!(
                f,
                "transaction {:?} reverted on chain in block {}",
                tx_hash, block_number
            ),
            TxFailure::Other(msg) => write!(f, "{}", msg),
        }
    }
}

/// Terminal result of one submission.
///
/// The executor blocks until one of these is reached; no pending state is
/// ever returned to the caller.
#[derive(Debug, Clone)]
pub enum TxOutcome {
    Confirmed { tx_hash: H256, block_number: u64 },
    Failed(TxFailure),
}

/// Executes vault contract calls against the chain
pub struct VaultExecutor<C: ChainRpc> {
    rpc: Arc<C>,
    wallet: LocalWallet,
    vault: Address,
    chain_id: u64,
    confirm_poll_interval: Duration,
    /// Serializes submissions for this signing key
    submit_lock: Mutex<()>,
}

impl<C: ChainRpc> VaultExecutor<C> {
    /// Create a new executor.
    ///
    /// Misconfiguration (unparseable vault address) surfaces here; `submit`
    /// itself never errs.
    pub fn new(
        rpc: Arc<C>,
        wallet: LocalWallet,
        vault_address: &str,
        chain_id: u64,
        confirm_poll_interval: Duration,
    ) -> OperatorResult<Self> {
        let vault: Address = vault_address
            .parse()
            .map_err(|e| OperatorError::Config(format!("Invalid vault address: {}", e)))?;

        let wallet = wallet.with_chain_id(chain_id);
        info!("Vault executor initialized with sender: {:?}", wallet.address());

        Ok(Self {
            rpc,
            wallet,
            vault,
            chain_id,
            confirm_poll_interval,
            submit_lock: Mutex::new(()),
        })
    }

    pub fn sender_address(&self) -> Address {
        self.wallet.address()
    }

    /// Submit a contract call and block until a terminal outcome.
    ///
    /// Every ordinary failure mode (estimation, broadcast, on-chain revert)
    /// is captured as [`TxOutcome::Failed`] with the original error text.
    /// There is no client-side confirmation timeout; once broadcast, the
    /// call resolves only when the chain produces a final receipt.
    pub async fn submit(&self, call: CallRequest) -> TxOutcome {
        let _guard = self.submit_lock.lock().await;

        let mut tx: TypedTransaction = TransactionRequest::new()
            .from(self.wallet.address())
            .to(self.vault)
            .data(call.calldata.clone())
            .chain_id(self.chain_id)
            .into();

        // Estimate against current state before anything is built or sent
        let estimated = match self.rpc.estimate_gas(&tx).await {
            Ok(units) => units,
            Err(e) => {
                warn!("Gas estimation failed for {}: {}", call.function, e);
                return TxOutcome::Failed(TxFailure::GasEstimation(e.to_string()));
            }
        };

        // Price and nonce are only valid for a narrow window; fetch both
        // fresh on every call rather than caching
        let unit_price = match self.rpc.gas_price().await {
            Ok(price) => price,
            Err(e) => return TxOutcome::Failed(TxFailure::Broadcast(e.to_string())),
        };
        let nonce = match self.rpc.next_nonce(self.wallet.address()).await {
            Ok(nonce) => nonce,
            Err(e) => return TxOutcome::Failed(TxFailure::Broadcast(e.to_string())),
        };

        let plan = GasPlan::new(estimated, unit_price);
        debug!(
            "Gas plan for {}: estimated={} applied={} price={}",
            call.function, plan.estimated_units, plan.applied_units, plan.unit_price
        );

        tx.set_nonce(nonce);
        tx.set_gas(plan.applied_units);
        tx.set_gas_price(plan.unit_price);

        // Signing is local; a failure here is a configuration defect, still
        // returned as Failed to keep the contract uniform
        let signature = match self.wallet.sign_transaction(&tx).await {
            Ok(sig) => sig,
            Err(e) => {
                error!("Failed to sign {} call: {}", call.function, e);
                return TxOutcome::Failed(TxFailure::Other(format!("signing failed: {}", e)));
            }
        };
        let raw = tx.rlp_signed(&signature);

        let tx_hash = match self.rpc.send_raw_transaction(raw).await {
            Ok(hash) => hash,
            Err(e) => {
                warn!("Broadcast failed for {}: {}", call.function, e);
                return TxOutcome::Failed(TxFailure::Broadcast(e.to_string()));
            }
        };

        info!(
            "Submitted {} call: {:?} (nonce {})",
            call.function, tx_hash, nonce
        );

        self.await_receipt(call.function, tx_hash).await
    }

    /// Poll until the chain produces a receipt with a final status.
    ///
    /// Transient RPC errors here are logged and retried: the envelope is
    /// already on the wire, so the only terminal states left are Confirmed
    /// and OnChainRevert.
    async fn await_receipt(&self, function: &'static str, tx_hash: H256) -> TxOutcome {
        loop {
            match self.rpc.transaction_receipt(tx_hash).await {
                Ok(Some(receipt)) => {
                    if let Some(block_number) = receipt.block_number.map(|b| b.as_u64()) {
                        let status = receipt.status.map(|s| s.as_u64()).unwrap_or(1);
                        if status == 0 {
                            error!(
                                "{} call {:?} reverted in block {}",
                                function, tx_hash, block_number
                            );
                            return TxOutcome::Failed(TxFailure::OnChainRevert {
                                tx_hash,
                                block_number,
                            });
                        }
                        info!(
                            "{} call {:?} confirmed in block {}",
                            function, tx_hash, block_number
                        );
                        return TxOutcome::Confirmed {
                            tx_hash,
                            block_number,
                        };
                    }
                    // Receipt exists but has no block yet; keep waiting
                }
                Ok(None) => {}
                Err(e) => {
                    warn!("Receipt poll for {:?} failed: {}", tx_hash, e);
                }
            }

            tokio::time::sleep(self.confirm_poll_interval).await;
        }
    }
}
