//! Turns validated batch parameters into signed legacy transactions
//!
//! Nonce and gas price always come from the caller and are never estimated, so
//! the caller keeps control of ordering and fees. A gas limit left unset is
//! filled in from the node's estimate right before signing.

use crate::codec::{append_state_batch_calldata, parse_number, validate_batch_roots, EncodedBatch};
use crate::context::RequestContext;
use crate::error::{SubmitterError, SubmitterResult};
use crate::ledger::LedgerClient;
use crate::tx::types::{PendingTransactionRecord, SignedTransaction};
use crate::wallet::{SigningIdentity, WalletSigner};

use ethers::types::transaction::eip2718::TypedTransaction;
use ethers::types::{Address, Bytes, TransactionRequest, U256};
use std::sync::Arc;
use tracing::debug;

pub struct TransactionBuilder {
    chain_id: u64,
    ledger: Arc<dyn LedgerClient>,
    wallet: Arc<dyn WalletSigner>,
}

impl TransactionBuilder {
    pub fn new(
        chain_id: &str,
        ledger: Arc<dyn LedgerClient>,
        wallet: Arc<dyn WalletSigner>,
    ) -> SubmitterResult<Self> {
        let invalid = || SubmitterError::InvalidChainId {
            value: chain_id.to_string(),
        };
        let parsed = parse_number("chain_id", chain_id.trim()).map_err(|_| invalid())?;
        if parsed == 0 {
            return Err(invalid());
        }

        Ok(Self {
            chain_id: parsed,
            ledger,
            wallet,
        })
    }

    pub fn chain_id(&self) -> u64 {
        self.chain_id
    }

    /// `appendStateBatch(bytes32[] batch, uint256 shouldStartAtElement)` on the state commitment chain
    #[allow(clippy::too_many_arguments)]
    pub async fn build_state_batch_append(
        &self,
        ctx: &RequestContext,
        contract: Address,
        batch_roots: &[Vec<u8>],
        should_start_at_element: u64,
        gas_price: Option<U256>,
        nonce: Option<u64>,
        identity: &SigningIdentity,
    ) -> SubmitterResult<SignedTransaction> {
        let roots = validate_batch_roots(batch_roots)?;
        let gas_price = gas_price.ok_or(SubmitterError::MissingGasPrice)?;
        let nonce = nonce.ok_or(SubmitterError::MissingNonce)?;

        let data = append_state_batch_calldata(&roots, should_start_at_element);
        let tx = self.unsigned(identity.address, contract, data, nonce, gas_price);

        debug!(
            roots = roots.len(),
            should_start_at_element, nonce, "Building appendStateBatch transaction"
        );
        self.sign(ctx, identity, tx).await
    }

    /// `appendSequencerBatch()` with the packed batch appended to the selector.
    ///
    /// The gas limit is always left unset: batch calldata is too large for a
    /// static guess, so the node estimates it.
    pub async fn build_sequencer_batch_append(
        &self,
        ctx: &RequestContext,
        contract: Address,
        batch: &EncodedBatch,
        nonce: Option<u64>,
        gas_price: Option<U256>,
        identity: &SigningIdentity,
    ) -> SubmitterResult<SignedTransaction> {
        let gas_price = gas_price.ok_or(SubmitterError::MissingGasPrice)?;
        let nonce = nonce.ok_or(SubmitterError::MissingNonce)?;

        let tx = self.unsigned(identity.address, contract, batch.calldata(), nonce, gas_price);

        debug!(
            batch_bytes = batch.as_bytes().len(),
            nonce, "Building appendSequencerBatch transaction"
        );
        self.sign(ctx, identity, tx).await
    }

    /// Same nonce, gas limit and data as `record`, zero value, new recipient and price
    pub async fn build_replacement(
        &self,
        ctx: &RequestContext,
        record: &PendingTransactionRecord,
        recipient: Address,
        gas_price: U256,
        identity: &SigningIdentity,
    ) -> SubmitterResult<SignedTransaction> {
        let tx: TypedTransaction = TransactionRequest::new()
            .from(identity.address)
            .to(recipient)
            .value(U256::zero())
            .data(record.data.clone())
            .nonce(record.nonce)
            .gas(record.gas_limit)
            .gas_price(gas_price)
            .chain_id(self.chain_id)
            .into();

        self.sign(ctx, identity, tx).await
    }

    fn unsigned(
        &self,
        from: Address,
        to: Address,
        data: Bytes,
        nonce: u64,
        gas_price: U256,
    ) -> TypedTransaction {
        TransactionRequest::new()
            .from(from)
            .to(to)
            .data(data)
            .nonce(nonce)
            .gas_price(gas_price)
            .chain_id(self.chain_id)
            .into()
    }

    /// Fill in an unset gas limit, then hand the transaction to the wallet
    pub async fn sign(
        &self,
        ctx: &RequestContext,
        identity: &SigningIdentity,
        mut tx: TypedTransaction,
    ) -> SubmitterResult<SignedTransaction> {
        if tx.gas().is_none() {
            let estimate = ctx
                .run("estimate_gas", self.ledger.estimate_gas(&tx))
                .await?;
            debug!(gas_limit = %estimate, "Using estimated gas limit");
            tx.set_gas(estimate);
        }

        ctx.check("sign")?;
        let signature = self.wallet.sign(identity, &tx).await?;
        Ok(SignedTransaction::new(tx, signature, identity.address))
    }
}
