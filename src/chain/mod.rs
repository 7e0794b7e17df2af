//! Chain module - JSON-RPC access for the transaction pipeline
//!
//! The executor talks to the chain through the [`ChainRpc`] trait so the
//! submission pipeline can be exercised against a double in tests.
//! [`ChainProvider`] is the production implementation.

pub mod provider;

pub use provider::ChainProvider;

use crate::error::OperatorResult;

use async_trait::async_trait;
use ethers::types::transaction::eip2718::TypedTransaction;
use ethers::types::{Address, Bytes, TransactionReceipt, H256, U256};

/// The subset of the JSON-RPC surface the operator consumes.
///
/// Estimation, price, and nonce reads are idempotent and may be shared
/// across callers; `send_raw_transaction` is not.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ChainRpc: Send + Sync {
    async fn estimate_gas(&self, tx: &TypedTransaction) -> OperatorResult<U256>;

    async fn gas_price(&self) -> OperatorResult<U256>;

    async fn next_nonce(&self, sender: Address) -> OperatorResult<U256>;

    async fn send_raw_transaction(&self, raw: Bytes) -> OperatorResult<H256>;

    async fn transaction_receipt(&self, hash: H256) -> OperatorResult<Option<TransactionReceipt>>;

    async fn block_number(&self) -> OperatorResult<u64>;
}
