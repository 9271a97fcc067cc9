//! Wallets whose account keys are supplied through environment variables

use super::{SigningIdentity, WalletSigner};
use crate::config::WalletConfig;
use crate::error::{SubmitterError, SubmitterResult};

use async_trait::async_trait;
use ethers::signers::{LocalWallet, Signer};
use ethers::types::transaction::eip2718::TypedTransaction;
use ethers::types::{Address, Signature};
use std::collections::HashMap;
use tracing::info;

pub struct KeystoreWallet {
    /// Wallet name -> accounts in index order
    wallets: HashMap<String, Vec<LocalWallet>>,
}

impl KeystoreWallet {
    /// Load every configured wallet, reading each key from its environment variable
    pub fn from_config(configs: &[WalletConfig]) -> SubmitterResult<Self> {
        let mut wallet = Self {
            wallets: HashMap::new(),
        };

        for config in configs {
            let keys = config
                .private_key_envs
                .iter()
                .map(|var| {
                    std::env::var(var).map_err(|_| {
                        SubmitterError::Wallet(format!(
                            "Key variable {} for wallet {} is not set",
                            var, config.name
                        ))
                    })
                })
                .collect::<SubmitterResult<Vec<_>>>()?;
            wallet.insert(&config.name, &keys)?;
        }

        Ok(wallet)
    }

    /// Build a single wallet from hex private keys
    pub fn from_keys(name: &str, keys: &[&str]) -> SubmitterResult<Self> {
        let mut wallet = Self {
            wallets: HashMap::new(),
        };
        let keys: Vec<String> = keys.iter().map(|k| k.to_string()).collect();
        wallet.insert(name, &keys)?;
        Ok(wallet)
    }

    fn insert(&mut self, name: &str, keys: &[String]) -> SubmitterResult<()> {
        let accounts = keys
            .iter()
            .enumerate()
            .map(|(index, key)| {
                key.trim().parse::<LocalWallet>().map_err(|e| {
                    SubmitterError::Wallet(format!(
                        "Invalid private key for account {} of wallet {}: {}",
                        index, name, e
                    ))
                })
            })
            .collect::<SubmitterResult<Vec<_>>>()?;

        info!(wallet = name, accounts = accounts.len(), "Loaded wallet");
        self.wallets.insert(name.to_string(), accounts);
        Ok(())
    }

    fn account(&self, identity: &SigningIdentity) -> SubmitterResult<&LocalWallet> {
        let signer = self
            .wallets
            .get(&identity.wallet)
            .and_then(|accounts| accounts.get(identity.account_index))
            .ok_or_else(|| SubmitterError::AccountNotFound {
                name: identity.wallet.clone(),
                address: format!("{:?}", identity.address),
            })?;

        if signer.address() != identity.address {
            return Err(SubmitterError::Wallet(format!(
                "Account {} of wallet {} is not {:?}",
                identity.account_index, identity.wallet, identity.address
            )));
        }
        Ok(signer)
    }
}

#[async_trait]
impl WalletSigner for KeystoreWallet {
    async fn resolve_account(&self, name: &str, address: Address) -> SubmitterResult<SigningIdentity> {
        let not_found = || SubmitterError::AccountNotFound {
            name: name.to_string(),
            address: format!("{:?}", address),
        };

        let accounts = self.wallets.get(name).ok_or_else(not_found)?;
        let account_index = accounts
            .iter()
            .position(|account| account.address() == address)
            .ok_or_else(not_found)?;

        Ok(SigningIdentity {
            wallet: name.to_string(),
            account_index,
            address,
        })
    }

    async fn sign(&self, identity: &SigningIdentity, tx: &TypedTransaction) -> SubmitterResult<Signature> {
        if tx.chain_id().is_none() {
            return Err(SubmitterError::Wallet(
                "Refusing to sign a transaction without a chain id".to_string(),
            ));
        }

        self.account(identity)?
            .sign_transaction(tx)
            .await
            .map_err(|e| SubmitterError::Wallet(e.to_string()))
    }
}
