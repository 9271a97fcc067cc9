//! JSON-RPC ledger client with multi-URL failover

use super::LedgerClient;
use crate::config::LedgerConfig;
use crate::error::{SubmitterError, SubmitterResult};

use async_trait::async_trait;
use ethers::prelude::*;
use ethers::providers::{Http, Provider, ProviderError, RpcError};
use ethers::types::transaction::eip2718::TypedTransaction;
use std::future::Future;
use std::sync::atomic::{AtomicUsize, Ordering};
use tracing::{debug, warn};

/// Multi-provider wrapper with automatic failover for reads
pub struct RpcLedger {
    /// HTTP providers, tried in order
    http_providers: Vec<Provider<Http>>,
    /// Current active provider index
    current_provider: AtomicUsize,
}

impl RpcLedger {
    pub fn new(config: &LedgerConfig) -> SubmitterResult<Self> {
        let mut http_providers = Vec::new();

        for url in &config.rpc_urls {
            match Provider::<Http>::try_from(url.as_str()) {
                Ok(provider) => {
                    http_providers.push(provider);
                    debug!("Added HTTP provider: {}", url);
                }
                Err(e) => {
                    warn!("Failed to create provider for {}: {}", url, e);
                }
            }
        }

        if http_providers.is_empty() {
            return Err(SubmitterError::Config("No valid ledger RPC URLs".to_string()));
        }

        Ok(Self {
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
        warn!("Ledger failover to provider {}", next);
    }

    /// Run a read against each provider in turn until one answers.
    ///
    /// Only transport failures move on to the next provider; an error answered
    /// by the node is returned as is.
    async fn read<T, F, Fut>(&self, operation: &'static str, call: F) -> SubmitterResult<T>
    where
        F: Fn(Provider<Http>) -> Fut,
        Fut: Future<Output = Result<T, ProviderError>>,
    {
        let mut last_error = None;

        for _ in 0..self.http_providers.len() {
            match call(self.http().clone()).await {
                Ok(value) => return Ok(value),
                Err(e) => match classify(e) {
                    SubmitterError::RpcUnavailable(message) => {
                        warn!(operation, "Ledger read failed: {}", message);
                        last_error = Some(SubmitterError::RpcUnavailable(message));
                        self.failover();
                    }
                    other => return Err(other),
                },
            }
        }

        Err(last_error
            .unwrap_or_else(|| SubmitterError::RpcUnavailable("All providers failed".to_string())))
    }
}

/// Split node answers from transport failures
fn classify(err: ProviderError) -> SubmitterError {
    match RpcError::as_error_response(&err) {
        Some(response) => SubmitterError::from_node_message(response.code, &response.message),
        None => SubmitterError::RpcUnavailable(err.to_string()),
    }
}

#[async_trait]
impl LedgerClient for RpcLedger {
    async fn nonce_at(&self, address: Address) -> SubmitterResult<u64> {
        let nonce = self
            .read("nonce_at", |p| async move {
                p.get_transaction_count(address, Some(BlockNumber::Latest.into()))
                    .await
            })
            .await?;
        Ok(nonce.as_u64())
    }

    async fn pending_nonce_at(&self, address: Address) -> SubmitterResult<u64> {
        let nonce = self
            .read("pending_nonce_at", |p| async move {
                p.get_transaction_count(address, Some(BlockNumber::Pending.into()))
                    .await
            })
            .await?;
        Ok(nonce.as_u64())
    }

    async fn block_number(&self) -> SubmitterResult<u64> {
        let block = self
            .read("block_number", |p| async move { p.get_block_number().await })
            .await?;
        Ok(block.as_u64())
    }

    async fn pending_block_transactions(&self) -> SubmitterResult<Vec<H256>> {
        let block = self
            .read("pending_block", |p| async move {
                p.get_block(BlockNumber::Pending).await
            })
            .await?;
        Ok(block.map(|b| b.transactions).unwrap_or_default())
    }

    async fn transaction_by_hash(&self, hash: H256) -> SubmitterResult<Option<Transaction>> {
        self.read("transaction_by_hash", |p| async move {
            p.get_transaction(hash).await
        })
        .await
    }

    async fn transaction_receipt(&self, hash: H256) -> SubmitterResult<Option<TransactionReceipt>> {
        self.read("transaction_receipt", |p| async move {
            p.get_transaction_receipt(hash).await
        })
        .await
    }

    async fn estimate_gas(&self, tx: &TypedTransaction) -> SubmitterResult<U256> {
        let tx = tx.clone();
        self.read("estimate_gas", |p| {
            let tx = tx.clone();
            async move { p.estimate_gas(&tx, None).await }
        })
        .await
    }

    async fn send_raw_transaction(&self, raw: Bytes) -> SubmitterResult<H256> {
        let pending = self
            .http()
            .send_raw_transaction(raw)
            .await
            .map_err(classify)?;
        Ok(pending.tx_hash())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ethers::providers::{HttpClientError, JsonRpcError};

    fn config(urls: &[&str]) -> LedgerConfig {
        LedgerConfig {
            rpc_urls: urls.iter().map(|u| u.to_string()).collect(),
            chain_id: "31337".to_string(),
            request_timeout_ms: 1_000,
        }
    }

    #[test]
    fn test_rejects_when_no_url_parses() {
        assert!(matches!(
            RpcLedger::new(&config(&["not a url"])),
            Err(SubmitterError::Config(_))
        ));
    }

    #[test]
    fn test_failover_rotates_providers() {
        let ledger = RpcLedger::new(&config(&["http://a:8545", "http://b:8545"])).unwrap();
        assert_eq!(ledger.current_provider.load(Ordering::Relaxed), 0);
        ledger.failover();
        assert_eq!(ledger.current_provider.load(Ordering::Relaxed), 1);
        ledger.failover();
        assert_eq!(ledger.current_provider.load(Ordering::Relaxed), 0);
    }

    #[tokio::test]
    async fn test_unreachable_node_is_rpc_unavailable() {
        // Port 9 on loopback refuses connections
        let ledger = RpcLedger::new(&config(&["http://127.0.0.1:9"])).unwrap();
        let result = ledger.block_number().await;
        assert!(matches!(result, Err(SubmitterError::RpcUnavailable(_))));
    }

    #[test]
    fn test_classify_splits_node_answers_from_transport_failures() {
        let node_answer = ProviderError::from(HttpClientError::JsonRpcError(JsonRpcError {
            code: -32000,
            message: "replacement transaction underpriced".to_string(),
            data: None,
        }));
        assert!(matches!(classify(node_answer), SubmitterError::Underpriced(_)));

        let transport = ProviderError::CustomError("connection reset".to_string());
        assert!(matches!(classify(transport), SubmitterError::RpcUnavailable(_)));
    }
}
