//! Ledger node access
//!
//! The submitter only talks to the node through [`LedgerClient`], which keeps the
//! transaction pipeline testable against a mocked node. [`RpcLedger`] is the
//! JSON-RPC implementation.

mod provider;

pub use provider::RpcLedger;

use crate::error::SubmitterResult;

use async_trait::async_trait;
use ethers::types::transaction::eip2718::TypedTransaction;
use ethers::types::{Address, Bytes, Transaction, TransactionReceipt, H256, U256};

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait LedgerClient: Send + Sync {
    /// Nonce as of the latest block
    async fn nonce_at(&self, address: Address) -> SubmitterResult<u64>;

    /// Nonce including transactions still in the pool
    async fn pending_nonce_at(&self, address: Address) -> SubmitterResult<u64>;

    async fn block_number(&self) -> SubmitterResult<u64>;

    /// Hashes of the transactions in the node's pending block
    async fn pending_block_transactions(&self) -> SubmitterResult<Vec<H256>>;

    async fn transaction_by_hash(&self, hash: H256) -> SubmitterResult<Option<Transaction>>;

    async fn transaction_receipt(&self, hash: H256) -> SubmitterResult<Option<TransactionReceipt>>;

    async fn estimate_gas(&self, tx: &TypedTransaction) -> SubmitterResult<U256>;

    /// Broadcast a signed, RLP-encoded transaction. Never retried.
    async fn send_raw_transaction(&self, raw: Bytes) -> SubmitterResult<H256>;
}
