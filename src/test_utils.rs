//! Shared fixtures for unit tests

use crate::context::RequestContext;
use crate::error::SubmitterResult;
use crate::ledger::LedgerClient;
use crate::tx::SignedTransaction;
use crate::wallet::{KeystoreWallet, SigningIdentity, WalletSigner};

use async_trait::async_trait;
use ethers::signers::{LocalWallet, Signer};
use ethers::types::transaction::eip2718::TypedTransaction;
use ethers::utils::keccak256;
use ethers::types::{
    Address, Bytes, Transaction, TransactionReceipt, TransactionRequest, H256, U256, U64,
};
use std::sync::Arc;
use std::time::Duration;

/// First well-known development account
pub const DEV_KEY: &str = "0xac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80";

/// Second well-known development account
pub const SECOND_KEY: &str = "0x59c6995e998f97a5a0044966f0945389dc9e86dae88c7a8412f4603b6b78690d";

pub fn dev_address() -> Address {
    DEV_KEY.parse::<LocalWallet>().unwrap().address()
}

pub fn dev_wallet() -> Arc<KeystoreWallet> {
    Arc::new(KeystoreWallet::from_keys("sequencer", &[DEV_KEY]).unwrap())
}

pub fn dev_identity() -> SigningIdentity {
    SigningIdentity {
        wallet: "sequencer".to_string(),
        account_index: 0,
        address: dev_address(),
    }
}

pub fn request_context() -> RequestContext {
    RequestContext::new(Duration::from_secs(10))
}

/// A transfer signed by the dev account
pub async fn signed_fixture(nonce: u64) -> SignedTransaction {
    let tx: TypedTransaction = TransactionRequest::new()
        .from(dev_address())
        .to(Address::repeat_byte(0x11))
        .nonce(nonce)
        .gas(21_000u64)
        .gas_price(1_000_000_000u64)
        .chain_id(31337u64)
        .into();
    let signature = dev_wallet().sign(&dev_identity(), &tx).await.unwrap();
    SignedTransaction::new(tx, signature, dev_address())
}

pub fn receipt(block: u64, status: u64) -> TransactionReceipt {
    TransactionReceipt {
        block_number: Some(U64::from(block)),
        status: Some(U64::from(status)),
        ..Default::default()
    }
}

/// A transaction as the node would report it from its pending block; the hash is unique per sender and nonce
pub fn pending_tx(from: Address, nonce: u64, gas_price: u64) -> Transaction {
    Transaction {
        hash: H256::from(keccak256([from.as_bytes(), &nonce.to_be_bytes()[..]].concat())),
        from,
        nonce: U256::from(nonce),
        gas: U256::from(500_000u64),
        gas_price: Some(U256::from(gas_price)),
        to: Some(Address::repeat_byte(0xcc)),
        input: Bytes::from(vec![0xde, 0xad, nonce as u8]),
        ..Default::default()
    }
}

/// A node that accepts every request and never answers
pub struct StallingLedger;

#[async_trait]
impl LedgerClient for StallingLedger {
    async fn nonce_at(&self, _address: Address) -> SubmitterResult<u64> {
        std::future::pending().await
    }

    async fn pending_nonce_at(&self, _address: Address) -> SubmitterResult<u64> {
        std::future::pending().await
    }

    async fn block_number(&self) -> SubmitterResult<u64> {
        std::future::pending().await
    }

    async fn pending_block_transactions(&self) -> SubmitterResult<Vec<H256>> {
        std::future::pending().await
    }

    async fn transaction_by_hash(&self, _hash: H256) -> SubmitterResult<Option<Transaction>> {
        std::future::pending().await
    }

    async fn transaction_receipt(&self, _hash: H256) -> SubmitterResult<Option<TransactionReceipt>> {
        std::future::pending().await
    }

    async fn estimate_gas(&self, _tx: &TypedTransaction) -> SubmitterResult<U256> {
        std::future::pending().await
    }

    async fn send_raw_transaction(&self, _raw: Bytes) -> SubmitterResult<H256> {
        std::future::pending().await
    }
}
