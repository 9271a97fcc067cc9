//! Broadcasting signed transactions and waiting for confirmations
//!
//! Node rejections and transport failures are surfaced as they are; nothing in
//! here retries a send.

use crate::config::SubmissionConfig;
use crate::context::RequestContext;
use crate::error::{SubmitterError, SubmitterResult};
use crate::ledger::LedgerClient;
use crate::metrics;
use crate::tx::types::SignedTransaction;

use ethers::types::{TransactionReceipt, H256};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, info, warn};

/// Observation points around each send. Implementations must not block.
pub trait SubmissionObserver: Send + Sync {
    fn before_send(&self, tx: &SignedTransaction);

    fn on_response(&self, tx: &SignedTransaction, outcome: &SubmitterResult<H256>);
}

/// Logs every send and records it in the metrics registry
pub struct TracingObserver;

impl SubmissionObserver for TracingObserver {
    fn before_send(&self, tx: &SignedTransaction) {
        debug!(
            tx_hash = ?tx.hash,
            from = ?tx.from,
            nonce = tx.nonce(),
            gas_price = %tx.gas_price(),
            gas_limit = %tx.gas_limit(),
            "Sending transaction"
        );
    }

    fn on_response(&self, tx: &SignedTransaction, outcome: &SubmitterResult<H256>) {
        match outcome {
            Ok(hash) => {
                info!(tx_hash = ?hash, nonce = tx.nonce(), "Transaction accepted by node");
                metrics::record_tx_submitted();
            }
            Err(e) => {
                warn!(tx_hash = ?tx.hash, nonce = tx.nonce(), error = %e, "Transaction not accepted");
                metrics::record_tx_rejected(e);
            }
        }
    }
}

pub struct SubmissionPipeline {
    ledger: Arc<dyn LedgerClient>,
    observers: Vec<Arc<dyn SubmissionObserver>>,
    poll_interval: Duration,
    confirmation_timeout: Duration,
}

impl SubmissionPipeline {
    pub fn new(ledger: Arc<dyn LedgerClient>, config: &SubmissionConfig) -> Self {
        Self {
            ledger,
            observers: vec![Arc::new(TracingObserver)],
            poll_interval: config.poll_interval(),
            confirmation_timeout: config.confirmation_timeout(),
        }
    }

    pub fn with_observer(mut self, observer: Arc<dyn SubmissionObserver>) -> Self {
        self.observers.push(observer);
        self
    }

    /// Broadcast and return the hash as soon as the node accepts it
    pub async fn submit(&self, ctx: &RequestContext, tx: &SignedTransaction) -> SubmitterResult<H256> {
        ctx.check("send_raw_transaction")?;

        for observer in &self.observers {
            observer.before_send(tx);
        }

        let outcome = ctx
            .run(
                "send_raw_transaction",
                self.ledger.send_raw_transaction(tx.raw.clone()),
            )
            .await;

        for observer in &self.observers {
            observer.on_response(tx, &outcome);
        }

        let hash = outcome?;
        if hash != tx.hash {
            warn!(expected = ?tx.hash, reported = ?hash, "Node reported a different transaction hash");
        }
        Ok(hash)
    }

    /// Broadcast, then wait until the transaction is `confirmations` blocks deep
    pub async fn submit_and_confirm(
        &self,
        ctx: &RequestContext,
        tx: &SignedTransaction,
        confirmations: u64,
    ) -> SubmitterResult<TransactionReceipt> {
        let hash = self.submit(ctx, tx).await?;
        self.wait_for_confirmations(ctx, hash, confirmations).await
    }

    /// Poll for the receipt until it is deep enough or `confirmation_timeout` passes.
    ///
    /// Timing out does not mean the transaction failed; it may still be mined.
    /// The wait may outlive the request deadline, but cancelling the request ends it.
    pub async fn wait_for_confirmations(
        &self,
        ctx: &RequestContext,
        hash: H256,
        confirmations: u64,
    ) -> SubmitterResult<TransactionReceipt> {
        let started = Instant::now();
        let wait_ctx = ctx.extended(self.confirmation_timeout);

        match self.poll_confirmations(&wait_ctx, hash, confirmations, started).await {
            Err(SubmitterError::Cancelled {
                reason: "deadline exceeded",
                ..
            }) if !ctx.is_cancelled() => Err(timed_out(hash, confirmations, started)),
            other => other,
        }
    }

    async fn poll_confirmations(
        &self,
        ctx: &RequestContext,
        hash: H256,
        confirmations: u64,
        started: Instant,
    ) -> SubmitterResult<TransactionReceipt> {
        loop {
            let receipt = ctx
                .run("transaction_receipt", self.ledger.transaction_receipt(hash))
                .await?;

            if let Some(receipt) = receipt {
                if receipt.status.map(|s| s.as_u64()) == Some(0) {
                    return Err(SubmitterError::Reverted {
                        tx_hash: format!("{:?}", hash),
                    });
                }

                if let Some(included_at) = receipt.block_number {
                    let head = ctx.run("block_number", self.ledger.block_number()).await?;
                    let depth = head.saturating_sub(included_at.as_u64());
                    debug!(tx_hash = ?hash, depth, confirmations, "Transaction included");

                    if depth >= confirmations {
                        metrics::record_confirmation_latency(started.elapsed().as_secs_f64());
                        return Ok(receipt);
                    }
                }
            }

            let elapsed = started.elapsed();
            if elapsed >= self.confirmation_timeout {
                return Err(timed_out(hash, confirmations, started));
            }

            let wait = self.poll_interval.min(self.confirmation_timeout - elapsed);
            ctx.sleep("confirmation_poll", wait).await?;
        }
    }
}

fn timed_out(hash: H256, confirmations: u64, started: Instant) -> SubmitterError {
    warn!(tx_hash = ?hash, confirmations, "Gave up waiting for confirmations");
    SubmitterError::ConfirmationTimeout {
        tx_hash: format!("{:?}", hash),
        confirmations,
        waited_secs: started.elapsed().as_secs(),
    }
}
