//! Signing capability
//!
//! Key material never leaves the wallet implementation. The rest of the crate
//! holds a [`SigningIdentity`], which names an account but cannot sign by itself.

mod keystore;

pub use keystore::KeystoreWallet;

use crate::error::SubmitterResult;

use async_trait::async_trait;
use ethers::types::transaction::eip2718::TypedTransaction;
use ethers::types::{Address, Signature};

/// Reference to one account of one wallet
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SigningIdentity {
    pub wallet: String,
    pub account_index: usize,
    pub address: Address,
}

#[async_trait]
pub trait WalletSigner: Send + Sync {
    /// Look up the account `address` in wallet `name`
    async fn resolve_account(&self, name: &str, address: Address) -> SubmitterResult<SigningIdentity>;

    /// Sign `tx` with the identity's key. The transaction must carry its chain id.
    async fn sign(&self, identity: &SigningIdentity, tx: &TypedTransaction) -> SubmitterResult<Signature>;
}
