//! Value types passed between the builder, the pipeline and callers

use ethers::types::transaction::eip2718::TypedTransaction;
use ethers::types::{Address, Bytes, Signature, Transaction, H256, U256};
use ethers::utils::to_checksum;
use serde::{Serialize, Serializer};

/// A signed transaction ready to broadcast
#[derive(Debug, Clone)]
pub struct SignedTransaction {
    pub tx: TypedTransaction,
    pub signature: Signature,
    /// RLP encoding of the signed transaction
    pub raw: Bytes,
    pub hash: H256,
    pub from: Address,
}

impl SignedTransaction {
    pub fn new(tx: TypedTransaction, signature: Signature, from: Address) -> Self {
        let raw = tx.rlp_signed(&signature);
        let hash = tx.hash(&signature);
        Self {
            tx,
            signature,
            raw,
            hash,
            from,
        }
    }

    pub fn nonce(&self) -> u64 {
        self.tx.nonce().map(|n| n.as_u64()).unwrap_or_default()
    }

    pub fn gas_price(&self) -> U256 {
        self.tx.gas_price().unwrap_or_default()
    }

    pub fn gas_limit(&self) -> U256 {
        self.tx.gas().copied().unwrap_or_default()
    }
}

/// What the caller gets back after a batch transaction is sent
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SubmissionResult {
    #[serde(serialize_with = "checksummed")]
    pub contract: Address,
    pub transaction_hash: H256,
    pub signed_transaction: Bytes,
    #[serde(serialize_with = "checksummed")]
    pub from: Address,
    pub nonce: u64,
    #[serde(serialize_with = "decimal")]
    pub gas_price: U256,
    #[serde(serialize_with = "decimal")]
    pub gas_limit: U256,
    /// Inclusion block, when the caller asked to wait for confirmations
    #[serde(skip_serializing_if = "Option::is_none")]
    pub block_number: Option<u64>,
}

impl SubmissionResult {
    pub fn new(contract: Address, signed: &SignedTransaction, block_number: Option<u64>) -> Self {
        Self {
            contract,
            transaction_hash: signed.hash,
            signed_transaction: signed.raw.clone(),
            from: signed.from,
            nonce: signed.nonce(),
            gas_price: signed.gas_price(),
            gas_limit: signed.gas_limit(),
            block_number,
        }
    }
}

/// A transaction of ours found in the node's pending block. Never persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingTransactionRecord {
    pub nonce: u64,
    pub gas_price: U256,
    pub gas_limit: U256,
    pub data: Bytes,
    pub recipient: Option<Address>,
    pub original_hash: H256,
    pub from: Address,
}

impl From<&Transaction> for PendingTransactionRecord {
    fn from(tx: &Transaction) -> Self {
        Self {
            nonce: tx.nonce.as_u64(),
            // fee cap for dynamic-fee transactions
            gas_price: tx.gas_price.or(tx.max_fee_per_gas).unwrap_or_default(),
            gas_limit: tx.gas,
            data: tx.input.clone(),
            recipient: tx.to,
            original_hash: tx.hash,
            from: tx.from,
        }
    }
}

fn checksummed<S: Serializer>(address: &Address, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(&to_checksum(address, None))
}

fn decimal<S: Serializer>(value: &U256, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(&value.to_string())
}
