//! The standard handler for every command kind

use super::{ClearedTransactions, Command, CommandHandler, CommandOutput};
use crate::codec;
use crate::config::{ReplacerConfig, Settings, SubmissionConfig};
use crate::context::RequestContext;
use crate::error::SubmitterResult;
use crate::ledger::{LedgerClient, RpcLedger};
use crate::metrics;
use crate::tx::{
    SignedTransaction, StuckTransactionReplacer, SubmissionPipeline, SubmissionResult,
    TransactionBuilder,
};
use crate::wallet::{KeystoreWallet, WalletSigner};

use async_trait::async_trait;
use ethers::types::Address;
use std::sync::Arc;
use tracing::info;

pub struct BatchSubmitter {
    wallet: Arc<dyn WalletSigner>,
    builder: Arc<TransactionBuilder>,
    pipeline: Arc<SubmissionPipeline>,
    replacer: StuckTransactionReplacer,
    default_confirmations: u64,
}

impl BatchSubmitter {
    pub fn new(
        ledger: Arc<dyn LedgerClient>,
        wallet: Arc<dyn WalletSigner>,
        chain_id: &str,
        submission: &SubmissionConfig,
        replacer: &ReplacerConfig,
    ) -> SubmitterResult<Self> {
        let builder = Arc::new(TransactionBuilder::new(
            chain_id,
            ledger.clone(),
            wallet.clone(),
        )?);
        let pipeline = Arc::new(SubmissionPipeline::new(ledger.clone(), submission));
        let replacer =
            StuckTransactionReplacer::new(ledger, builder.clone(), pipeline.clone(), replacer);

        Ok(Self {
            wallet,
            builder,
            pipeline,
            replacer,
            default_confirmations: submission.default_confirmations,
        })
    }

    /// Wire up the JSON-RPC ledger and the configured wallets
    pub fn from_settings(settings: &Settings) -> SubmitterResult<Self> {
        let ledger: Arc<dyn LedgerClient> = Arc::new(RpcLedger::new(&settings.ledger)?);
        let wallet: Arc<dyn WalletSigner> = Arc::new(KeystoreWallet::from_config(&settings.wallets)?);

        let submitter = Self::new(
            ledger,
            wallet,
            &settings.ledger.chain_id,
            &settings.submission,
            &settings.replacer,
        )?;
        info!(chain_id = submitter.builder.chain_id(), "Batch submitter ready");
        Ok(submitter)
    }

    async fn send(
        &self,
        ctx: &RequestContext,
        contract: Address,
        signed: SignedTransaction,
        confirmations: Option<u64>,
    ) -> SubmitterResult<CommandOutput> {
        let confirmations = confirmations.unwrap_or(self.default_confirmations);

        let block_number = if confirmations == 0 {
            self.pipeline.submit(ctx, &signed).await?;
            None
        } else {
            let receipt = self
                .pipeline
                .submit_and_confirm(ctx, &signed, confirmations)
                .await?;
            receipt.block_number.map(|b| b.as_u64())
        };

        Ok(CommandOutput::Submitted(SubmissionResult::new(
            contract,
            &signed,
            block_number,
        )))
    }
}

#[async_trait]
impl CommandHandler for BatchSubmitter {
    async fn handle(&self, ctx: &RequestContext, command: Command) -> SubmitterResult<CommandOutput> {
        let kind = command.kind();

        match command {
            Command::EncodeAppendSequencerBatch(input) => {
                let batch = codec::encode(&input)?;
                Ok(CommandOutput::Encoded {
                    data: batch.as_hex().to_string(),
                })
            }
            Command::AppendStateBatch(request) => {
                let identity = self
                    .wallet
                    .resolve_account(&request.account.name, request.account.address)
                    .await?;
                let signed = self
                    .builder
                    .build_state_batch_append(
                        ctx,
                        request.contract,
                        &request.batch,
                        request.should_start_at_element,
                        Some(request.gas_price),
                        Some(request.nonce),
                        &identity,
                    )
                    .await?;
                metrics::record_tx_signed(kind.as_str());

                self.send(ctx, request.contract, signed, request.confirmations)
                    .await
            }
            Command::AppendSequencerBatch(request) => {
                let batch = codec::encode(&request.batch)?;
                let identity = self
                    .wallet
                    .resolve_account(&request.account.name, request.account.address)
                    .await?;
                let signed = self
                    .builder
                    .build_sequencer_batch_append(
                        ctx,
                        request.contract,
                        &batch,
                        Some(request.nonce),
                        Some(request.gas_price),
                        &identity,
                    )
                    .await?;
                metrics::record_tx_signed(kind.as_str());

                self.send(ctx, request.contract, signed, request.confirmations)
                    .await
            }
            Command::ClearPendingTransactions(account) => {
                let identity = self
                    .wallet
                    .resolve_account(&account.name, account.address)
                    .await?;
                let report = self.replacer.replace_stuck(ctx, &identity).await?;

                info!(
                    account = ?identity.address,
                    state = ?report.state,
                    replaced = report.hashes().len(),
                    "Cleared pending transactions"
                );
                Ok(CommandOutput::Cleared(ClearedTransactions::from(&report)))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::{CommandKind, RawRequest};
    use crate::error::SubmitterError;
    use crate::ledger::MockLedgerClient;
    use crate::test_utils::{dev_address, dev_wallet, receipt, request_context};
    use ethers::types::{H256, U256};
    use ethers::utils::keccak256;

    fn submitter(ledger: MockLedgerClient, default_confirmations: u64) -> BatchSubmitter {
        let submission = SubmissionConfig {
            default_confirmations,
            confirmation_timeout_secs: 5,
            poll_interval_ms: 5,
        };
        BatchSubmitter::new(
            Arc::new(ledger),
            dev_wallet(),
            "31337",
            &submission,
            &ReplacerConfig::default(),
        )
        .unwrap()
    }

    fn sequencer_request(confirmations: Option<u64>) -> Command {
        Command::parse(
            CommandKind::AppendSequencerBatch,
            RawRequest {
                name: Some("sequencer".into()),
                address: Some(format!("{:?}", dev_address())),
                contract: Some(format!("{:?}", Address::repeat_byte(0xcc))),
                gas_price: Some("1000000000".into()),
                nonce: Some("0".into()),
                should_start_at_element: Some("5".into()),
                total_elements_to_append: Some("1".into()),
                contexts: Some(vec![r#"{"num_sequenced_transactions":1,"num_subsequent_queue_transactions":0,"timestamp":0,"block_number":0}"#.into()]),
                transactions: Some(vec!["0x1234".into()]),
                confirmations,
                ..Default::default()
            },
        )
        .unwrap()
    }

    #[tokio::test]
    async fn test_encode_only_makes_no_calls() {
        let command = Command::parse(
            CommandKind::EncodeAppendSequencerBatch,
            RawRequest {
                should_start_at_element: Some("5".into()),
                total_elements_to_append: Some("1".into()),
                contexts: Some(vec![r#"{"num_sequenced_transactions":1,"num_subsequent_queue_transactions":0,"timestamp":0,"block_number":0}"#.into()]),
                transactions: Some(vec!["0x1234".into()]),
                ..Default::default()
            },
        )
        .unwrap();

        let output = submitter(MockLedgerClient::new(), 0)
            .handle(&request_context(), command)
            .await
            .unwrap();
        assert_eq!(
            output,
            CommandOutput::Encoded {
                data: "0000000005000001000001000001000000000000000000000000000000021234".into()
            }
        );
    }

    #[tokio::test]
    async fn test_sequencer_batch_submitted() {
        let mut ledger = MockLedgerClient::new();
        ledger
            .expect_estimate_gas()
            .returning(|_| Ok(U256::from(400_000u64)));
        ledger
            .expect_send_raw_transaction()
            .times(1)
            .returning(|raw| Ok(H256::from(keccak256(&raw))));

        let output = submitter(ledger, 0)
            .handle(&request_context(), sequencer_request(None))
            .await
            .unwrap();

        let CommandOutput::Submitted(result) = output else {
            panic!("expected a submission result");
        };
        assert_eq!(result.from, dev_address());
        assert_eq!(result.contract, Address::repeat_byte(0xcc));
        assert_eq!(result.nonce, 0);
        assert_eq!(result.gas_limit, U256::from(400_000u64));
        assert_eq!(
            result.transaction_hash,
            H256::from(keccak256(&result.signed_transaction))
        );
        assert_eq!(result.block_number, None);
    }

    #[tokio::test]
    async fn test_confirmations_wait_for_receipt() {
        let mut ledger = MockLedgerClient::new();
        ledger
            .expect_estimate_gas()
            .returning(|_| Ok(U256::from(400_000u64)));
        ledger
            .expect_send_raw_transaction()
            .returning(|raw| Ok(H256::from(keccak256(&raw))));
        ledger
            .expect_transaction_receipt()
            .returning(|_| Ok(Some(receipt(50, 1))));
        ledger.expect_block_number().returning(|| Ok(51));

        let output = submitter(ledger, 0)
            .handle(&request_context(), sequencer_request(Some(1)))
            .await
            .unwrap();
        let CommandOutput::Submitted(result) = output else {
            panic!("expected a submission result");
        };
        assert_eq!(result.block_number, Some(50));
    }

    #[tokio::test]
    async fn test_unknown_account_fails_before_network() {
        let command = Command::parse(
            CommandKind::ClearPendingTransactions,
            RawRequest {
                name: Some("proposer".into()),
                address: Some(format!("{:?}", dev_address())),
                ..Default::default()
            },
        )
        .unwrap();

        let err = submitter(MockLedgerClient::new(), 0)
            .handle(&request_context(), command)
            .await
            .unwrap_err();
        assert!(matches!(err, SubmitterError::AccountNotFound { .. }));
    }

    #[tokio::test]
    async fn test_clear_with_no_gap() {
        let mut ledger = MockLedgerClient::new();
        ledger.expect_nonce_at().returning(|_| Ok(2));
        ledger.expect_pending_nonce_at().returning(|_| Ok(2));

        let command = Command::ClearPendingTransactions(crate::commands::AccountRef {
            name: "sequencer".into(),
            address: dev_address(),
        });
        let output = submitter(ledger, 0)
            .handle(&request_context(), command)
            .await
            .unwrap();
        assert_eq!(
            output,
            CommandOutput::Cleared(ClearedTransactions {
                transaction_hashes: vec![],
                failures: vec![],
            })
        );
    }
}
