//! Self-replacement of stuck transactions
//!
//! When an account's pending nonce runs ahead of its confirmed nonce, every
//! transaction of that account still sitting in the node's pending block is
//! re-signed at the same nonce with a higher gas price and sent back to the
//! account itself, relying on the node's same-nonce replacement rule.
//!
//! Callers must serialize submissions per account. Nothing here locks the
//! account, and the node remains the authority on nonce state.

use crate::config::ReplacerConfig;
use crate::context::RequestContext;
use crate::error::{SubmitterError, SubmitterResult};
use crate::ledger::LedgerClient;
use crate::metrics;
use crate::tx::builder::TransactionBuilder;
use crate::tx::pipeline::SubmissionPipeline;
use crate::tx::types::PendingTransactionRecord;
use crate::wallet::SigningIdentity;

use ethers::types::{H256, U256};
use std::sync::Arc;
use tracing::{debug, info, warn};

const GWEI: u64 = 1_000_000_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplacerState {
    Idle,
    Scanning,
    /// Pending and confirmed nonces agree
    NoneStuck,
    ReplacingEach,
    Done,
    /// At least one replacement failed; the others are still reported
    Failed,
}

#[derive(Debug)]
pub struct ReplacementEntry {
    pub nonce: u64,
    pub original_hash: H256,
    pub gas_price: U256,
    pub outcome: SubmitterResult<H256>,
}

#[derive(Debug)]
pub struct ReplacementReport {
    pub state: ReplacerState,
    pub confirmed_nonce: u64,
    pub pending_nonce: u64,
    /// Ascending nonce order
    pub entries: Vec<ReplacementEntry>,
}

impl ReplacementReport {
    /// Hashes of the replacements the node accepted, ascending nonce
    pub fn hashes(&self) -> Vec<H256> {
        self.entries
            .iter()
            .filter_map(|entry| entry.outcome.as_ref().ok().copied())
            .collect()
    }

    pub fn failures(&self) -> impl Iterator<Item = (&ReplacementEntry, &SubmitterError)> {
        self.entries
            .iter()
            .filter_map(|entry| entry.outcome.as_ref().err().map(|e| (entry, e)))
    }
}

pub struct StuckTransactionReplacer {
    ledger: Arc<dyn LedgerClient>,
    builder: Arc<TransactionBuilder>,
    pipeline: Arc<SubmissionPipeline>,
    gas_bump: U256,
}

impl StuckTransactionReplacer {
    pub fn new(
        ledger: Arc<dyn LedgerClient>,
        builder: Arc<TransactionBuilder>,
        pipeline: Arc<SubmissionPipeline>,
        config: &ReplacerConfig,
    ) -> Self {
        Self {
            ledger,
            builder,
            pipeline,
            gas_bump: U256::from(config.gas_bump_gwei) * U256::from(GWEI),
        }
    }

    pub fn bumped_gas_price(&self, original: U256) -> U256 {
        original.saturating_add(self.gas_bump)
    }

    /// Replace every stuck transaction of `identity`, lowest nonce first.
    ///
    /// Failing to read nonces or the pending block aborts the pass. A failed
    /// resend is recorded on its entry and the pass moves on, unless the
    /// request itself was cancelled.
    pub async fn replace_stuck(
        &self,
        ctx: &RequestContext,
        identity: &SigningIdentity,
    ) -> SubmitterResult<ReplacementReport> {
        let account = identity.address;
        let mut state = ReplacerState::Idle;
        debug!(?account, ?state, "Starting replacement pass");

        let confirmed_nonce = ctx.run("nonce_at", self.ledger.nonce_at(account)).await?;
        let pending_nonce = ctx
            .run("pending_nonce_at", self.ledger.pending_nonce_at(account))
            .await?;

        let mut report = ReplacementReport {
            state,
            confirmed_nonce,
            pending_nonce,
            entries: Vec::new(),
        };

        if pending_nonce <= confirmed_nonce {
            debug!(?account, confirmed_nonce, "No stuck transactions");
            report.state = ReplacerState::NoneStuck;
            return Ok(report);
        }

        state = ReplacerState::Scanning;
        debug!(?account, confirmed_nonce, pending_nonce, ?state, "Nonce gap detected");
        let stuck = self.scan(ctx, identity, confirmed_nonce).await?;

        if stuck.is_empty() {
            warn!(
                ?account,
                confirmed_nonce, pending_nonce, "Nonce gap but no transactions in pending block"
            );
        }

        state = ReplacerState::ReplacingEach;
        debug!(?account, count = stuck.len(), ?state, "Replacing transactions");

        for record in stuck {
            let gas_price = self.bumped_gas_price(record.gas_price);
            metrics::record_replacement_attempted();

            let outcome = self.replace_one(ctx, identity, &record, gas_price).await;
            let cancelled = matches!(outcome, Err(SubmitterError::Cancelled { .. }));

            match &outcome {
                Ok(hash) => {
                    info!(
                        ?account,
                        nonce = record.nonce,
                        original = ?record.original_hash,
                        replacement = ?hash,
                        %gas_price,
                        "Replaced stuck transaction"
                    );
                    metrics::record_replacement_succeeded();
                }
                Err(e) => warn!(
                    ?account,
                    nonce = record.nonce,
                    original = ?record.original_hash,
                    error = %e,
                    "Replacement failed"
                ),
            }

            report.entries.push(ReplacementEntry {
                nonce: record.nonce,
                original_hash: record.original_hash,
                gas_price,
                outcome,
            });

            if cancelled {
                break;
            }
        }

        report.state = if report.failures().next().is_some() {
            ReplacerState::Failed
        } else {
            ReplacerState::Done
        };
        Ok(report)
    }

    async fn replace_one(
        &self,
        ctx: &RequestContext,
        identity: &SigningIdentity,
        record: &PendingTransactionRecord,
        gas_price: U256,
    ) -> SubmitterResult<H256> {
        let signed = self
            .builder
            .build_replacement(ctx, record, identity.address, gas_price, identity)
            .await?;
        self.pipeline.submit(ctx, &signed).await
    }

    /// Our transactions in the pending block at or above the confirmed nonce,
    /// one per nonce, ascending
    async fn scan(
        &self,
        ctx: &RequestContext,
        identity: &SigningIdentity,
        confirmed_nonce: u64,
    ) -> SubmitterResult<Vec<PendingTransactionRecord>> {
        let hashes = ctx
            .run(
                "pending_block_transactions",
                self.ledger.pending_block_transactions(),
            )
            .await?;

        let mut records = Vec::new();
        for hash in hashes {
            let tx = ctx
                .run("transaction_by_hash", self.ledger.transaction_by_hash(hash))
                .await?;

            // already mined or dropped since the block was read
            let Some(tx) = tx else { continue };

            if tx.from != identity.address {
                continue;
            }
            let record = PendingTransactionRecord::from(&tx);
            if record.nonce >= confirmed_nonce {
                records.push(record);
            }
        }

        records.sort_by_key(|record| record.nonce);
        records.dedup_by_key(|record| record.nonce);
        Ok(records)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SubmissionConfig;
    use crate::ledger::MockLedgerClient;
    use crate::test_utils::{dev_address, dev_identity, dev_wallet, pending_tx, request_context};
    use ethers::types::transaction::eip2718::TypedTransaction;
    use ethers::types::{Address, Bytes};
    use ethers::utils::{keccak256, rlp::Rlp};
    use std::sync::Mutex;

    fn replacer(ledger: MockLedgerClient) -> StuckTransactionReplacer {
        let ledger: Arc<dyn LedgerClient> = Arc::new(ledger);
        let builder =
            Arc::new(TransactionBuilder::new("31337", ledger.clone(), dev_wallet()).unwrap());
        let pipeline = Arc::new(SubmissionPipeline::new(
            ledger.clone(),
            &SubmissionConfig::default(),
        ));
        StuckTransactionReplacer::new(ledger, builder, pipeline, &ReplacerConfig::default())
    }

    fn decode(raw: &Bytes) -> TypedTransaction {
        TypedTransaction::decode_signed(&Rlp::new(raw)).unwrap().0
    }

    #[tokio::test]
    async fn test_no_gap_sends_nothing() {
        let mut ledger = MockLedgerClient::new();
        ledger.expect_nonce_at().returning(|_| Ok(5));
        ledger.expect_pending_nonce_at().returning(|_| Ok(5));
        ledger.expect_send_raw_transaction().never();
        ledger.expect_pending_block_transactions().never();

        let report = replacer(ledger)
            .replace_stuck(&request_context(), &dev_identity())
            .await
            .unwrap();
        assert_eq!(report.state, ReplacerState::NoneStuck);
        assert!(report.hashes().is_empty());
    }

    #[tokio::test]
    async fn test_replaces_in_ascending_nonce_order() {
        let me = dev_address();
        let other = Address::repeat_byte(0x42);
        // block order deliberately out of nonce order
        let block = vec![
            pending_tx(me, 8, 30 * GWEI),
            pending_tx(other, 7, 1),
            pending_tx(me, 7, 20 * GWEI),
            pending_tx(me, 6, 20 * GWEI),
        ];
        let hashes: Vec<H256> = block.iter().map(|tx| tx.hash).collect();
        // same nonce, different sender
        assert_ne!(block[1].hash, block[2].hash);

        let mut ledger = MockLedgerClient::new();
        ledger.expect_nonce_at().returning(|_| Ok(7));
        ledger.expect_pending_nonce_at().returning(|_| Ok(9));
        ledger
            .expect_pending_block_transactions()
            .times(1)
            .returning(move || Ok(hashes.clone()));
        ledger
            .expect_transaction_by_hash()
            .returning(move |hash| Ok(block.iter().find(|tx| tx.hash == hash).cloned()));

        let sent = Arc::new(Mutex::new(Vec::new()));
        let sink = sent.clone();
        ledger.expect_send_raw_transaction().times(2).returning(move |raw| {
            sink.lock().unwrap().push(decode(&raw));
            Ok(H256::from(keccak256(&raw)))
        });

        let report = replacer(ledger)
            .replace_stuck(&request_context(), &dev_identity())
            .await
            .unwrap();

        assert_eq!(report.state, ReplacerState::Done);
        assert_eq!(report.hashes().len(), 2);

        let sent = sent.lock().unwrap();
        let nonces: Vec<u64> = sent.iter().map(|tx| tx.nonce().unwrap().as_u64()).collect();
        assert_eq!(nonces, vec![7, 8]);

        let prices: Vec<U256> = sent.iter().map(|tx| tx.gas_price().unwrap()).collect();
        assert_eq!(prices[0], U256::from(90 * GWEI));
        assert_eq!(prices[1], U256::from(100 * GWEI));

        for tx in sent.iter() {
            assert_eq!(tx.to_addr(), Some(&me));
            assert_eq!(tx.value(), Some(&U256::zero()));
            assert_eq!(tx.gas(), Some(&U256::from(500_000u64)));
        }
    }

    #[tokio::test]
    async fn test_failed_replacement_is_reported_per_transaction() {
        let me = dev_address();
        let block = vec![pending_tx(me, 3, GWEI), pending_tx(me, 4, GWEI)];
        let hashes: Vec<H256> = block.iter().map(|tx| tx.hash).collect();

        let mut ledger = MockLedgerClient::new();
        ledger.expect_nonce_at().returning(|_| Ok(3));
        ledger.expect_pending_nonce_at().returning(|_| Ok(5));
        ledger
            .expect_pending_block_transactions()
            .returning(move || Ok(hashes.clone()));
        ledger
            .expect_transaction_by_hash()
            .returning(move |hash| Ok(block.iter().find(|tx| tx.hash == hash).cloned()));
        ledger.expect_send_raw_transaction().times(2).returning(|raw| {
            if decode(&raw).nonce().unwrap().as_u64() == 3 {
                Err(SubmitterError::Underpriced("replacement transaction underpriced".into()))
            } else {
                Ok(H256::from(keccak256(&raw)))
            }
        });

        let report = replacer(ledger)
            .replace_stuck(&request_context(), &dev_identity())
            .await
            .unwrap();

        assert_eq!(report.state, ReplacerState::Failed);
        assert_eq!(report.hashes().len(), 1);
        let failures: Vec<_> = report.failures().collect();
        assert_eq!(failures.len(), 1);
        assert_eq!(failures[0].0.nonce, 3);
        assert!(matches!(failures[0].1, SubmitterError::Underpriced(_)));
    }

    #[tokio::test]
    async fn test_cancelled_context_makes_no_calls() {
        let ctx = request_context();
        ctx.cancel();

        let err = tokio_test::assert_err!(
            replacer(MockLedgerClient::new())
                .replace_stuck(&ctx, &dev_identity())
                .await
        );
        assert!(matches!(err, SubmitterError::Cancelled { operation: "nonce_at", .. }));
    }

    #[test]
    fn test_bump_is_seventy_gwei() {
        let r = replacer(MockLedgerClient::new());
        assert_eq!(r.bumped_gas_price(U256::from(GWEI)), U256::from(71 * GWEI));
        assert_eq!(r.bumped_gas_price(U256::MAX), U256::MAX);
    }
}
