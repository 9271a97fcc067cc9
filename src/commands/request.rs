//! Validation of untyped host fields into typed commands

use super::CommandKind;
use crate::codec::{decode_hex_bytes, parse_number, validate_batch_roots, SequencerBatchInput};
use crate::error::{SubmitterError, SubmitterResult};

use ethers::types::{Address, U256};
use serde::Deserialize;

/// Fields as the host passes them. Numbers arrive as decimal strings.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct RawRequest {
    pub name: Option<String>,
    pub address: Option<String>,
    pub contract: Option<String>,
    pub gas_price: Option<String>,
    pub nonce: Option<String>,
    pub should_start_at_element: Option<String>,
    pub total_elements_to_append: Option<String>,
    pub batch: Option<Vec<String>>,
    pub contexts: Option<Vec<String>>,
    pub transactions: Option<Vec<String>>,
    /// Blocks to wait after inclusion; absent means the configured default
    pub confirmations: Option<u64>,
}

/// Wallet name plus account address
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccountRef {
    pub name: String,
    pub address: Address,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StateBatchRequest {
    pub account: AccountRef,
    pub contract: Address,
    pub gas_price: U256,
    pub nonce: u64,
    pub should_start_at_element: u64,
    pub batch: Vec<Vec<u8>>,
    pub confirmations: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SequencerBatchRequest {
    pub account: AccountRef,
    pub contract: Address,
    pub gas_price: U256,
    pub nonce: u64,
    pub batch: SequencerBatchInput,
    pub confirmations: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    EncodeAppendSequencerBatch(SequencerBatchInput),
    AppendStateBatch(StateBatchRequest),
    AppendSequencerBatch(SequencerBatchRequest),
    ClearPendingTransactions(AccountRef),
}

impl Command {
    pub fn kind(&self) -> CommandKind {
        match self {
            Command::EncodeAppendSequencerBatch(_) => CommandKind::EncodeAppendSequencerBatch,
            Command::AppendStateBatch(_) => CommandKind::AppendStateBatch,
            Command::AppendSequencerBatch(_) => CommandKind::AppendSequencerBatch,
            Command::ClearPendingTransactions(_) => CommandKind::ClearPendingTransactions,
        }
    }

    /// Validate every field `kind` needs. Nothing touches the network here.
    pub fn parse(kind: CommandKind, raw: RawRequest) -> SubmitterResult<Self> {
        match kind {
            CommandKind::EncodeAppendSequencerBatch => {
                Ok(Command::EncodeAppendSequencerBatch(sequencer_input(raw)?))
            }
            CommandKind::AppendStateBatch => {
                let account = account(&raw)?;
                let contract = address("contract", raw.contract.as_deref())?;
                let gas_price = gas_price(raw.gas_price.as_deref())?;
                let nonce = nonce(raw.nonce.as_deref())?;
                let should_start_at_element = parse_number(
                    "should_start_at_element",
                    required("should_start_at_element", raw.should_start_at_element.as_deref())?,
                )?;

                let batch = raw
                    .batch
                    .ok_or(SubmitterError::MissingField { field: "batch" })?
                    .iter()
                    .enumerate()
                    .map(|(index, root)| decode_hex_bytes("batch", index, root))
                    .collect::<SubmitterResult<Vec<_>>>()?;
                validate_batch_roots(&batch)?;

                Ok(Command::AppendStateBatch(StateBatchRequest {
                    account,
                    contract,
                    gas_price,
                    nonce,
                    should_start_at_element,
                    batch,
                    confirmations: raw.confirmations,
                }))
            }
            CommandKind::AppendSequencerBatch => {
                let account = account(&raw)?;
                let contract = address("contract", raw.contract.as_deref())?;
                let gas_price = gas_price(raw.gas_price.as_deref())?;
                let nonce = nonce(raw.nonce.as_deref())?;
                let confirmations = raw.confirmations;

                Ok(Command::AppendSequencerBatch(SequencerBatchRequest {
                    account,
                    contract,
                    gas_price,
                    nonce,
                    batch: sequencer_input(raw)?,
                    confirmations,
                }))
            }
            CommandKind::ClearPendingTransactions => {
                Ok(Command::ClearPendingTransactions(account(&raw)?))
            }
        }
    }
}

fn required<'a>(field: &'static str, value: Option<&'a str>) -> SubmitterResult<&'a str> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .ok_or(SubmitterError::MissingField { field })
}

fn address(field: &'static str, value: Option<&str>) -> SubmitterResult<Address> {
    let value = required(field, value)?;
    value.parse::<Address>().map_err(|_| SubmitterError::InvalidAddress {
        field,
        value: value.to_string(),
    })
}

fn account(raw: &RawRequest) -> SubmitterResult<AccountRef> {
    Ok(AccountRef {
        name: required("name", raw.name.as_deref())?.to_string(),
        address: address("address", raw.address.as_deref())?,
    })
}

fn gas_price(value: Option<&str>) -> SubmitterResult<U256> {
    let value = required("gas_price", value).map_err(|_| SubmitterError::MissingGasPrice)?;
    let invalid = || SubmitterError::InvalidNumber {
        field: "gas_price",
        value: value.to_string(),
    };
    if !value.bytes().all(|b| b.is_ascii_digit()) {
        return Err(invalid());
    }
    U256::from_dec_str(value).map_err(|_| invalid())
}

fn nonce(value: Option<&str>) -> SubmitterResult<u64> {
    let value = required("nonce", value).map_err(|_| SubmitterError::MissingNonce)?;
    parse_number("nonce", value)
}

fn sequencer_input(raw: RawRequest) -> SubmitterResult<SequencerBatchInput> {
    Ok(SequencerBatchInput {
        should_start_at_element: required(
            "should_start_at_element",
            raw.should_start_at_element.as_deref(),
        )?
        .to_string(),
        total_elements_to_append: required(
            "total_elements_to_append",
            raw.total_elements_to_append.as_deref(),
        )?
        .to_string(),
        contexts: raw
            .contexts
            .ok_or(SubmitterError::MissingField { field: "contexts" })?,
        transactions: raw
            .transactions
            .ok_or(SubmitterError::MissingField { field: "transactions" })?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const ACCOUNT: &str = "0x00000000000000000000000000000000000000aa";
    const CONTRACT: &str = "0x00000000000000000000000000000000000000cc";

    fn state_request() -> RawRequest {
        RawRequest {
            name: Some("proposer".into()),
            address: Some(ACCOUNT.into()),
            contract: Some(CONTRACT.into()),
            gas_price: Some("1000000000".into()),
            nonce: Some("3".into()),
            should_start_at_element: Some("42".into()),
            batch: Some(vec![format!("0x{}", "11".repeat(32))]),
            ..Default::default()
        }
    }

    #[test]
    fn test_parse_state_batch() {
        let command = Command::parse(CommandKind::AppendStateBatch, state_request()).unwrap();
        let Command::AppendStateBatch(request) = command else {
            panic!("wrong variant");
        };
        assert_eq!(request.account.name, "proposer");
        assert_eq!(request.contract, Address::from_low_u64_be(0xcc));
        assert_eq!(request.gas_price, U256::from(1_000_000_000u64));
        assert_eq!(request.nonce, 3);
        assert_eq!(request.should_start_at_element, 42);
        assert_eq!(request.batch, vec![vec![0x11; 32]]);
        assert_eq!(request.confirmations, None);
    }

    #[test]
    fn test_empty_gas_price_and_nonce() {
        let mut raw = state_request();
        raw.gas_price = Some(String::new());
        assert!(matches!(
            Command::parse(CommandKind::AppendStateBatch, raw),
            Err(SubmitterError::MissingGasPrice)
        ));

        let mut raw = state_request();
        raw.nonce = None;
        assert!(matches!(
            Command::parse(CommandKind::AppendStateBatch, raw),
            Err(SubmitterError::MissingNonce)
        ));

        let mut raw = state_request();
        raw.gas_price = Some("1e9".into());
        assert!(matches!(
            Command::parse(CommandKind::AppendStateBatch, raw),
            Err(SubmitterError::InvalidNumber { field: "gas_price", .. })
        ));
    }

    #[test]
    fn test_short_batch_root_rejected() {
        let mut raw = state_request();
        raw.batch = Some(vec!["0x11".repeat(1), format!("0x{}", "22".repeat(32))]);
        assert!(matches!(
            Command::parse(CommandKind::AppendStateBatch, raw),
            Err(SubmitterError::InvalidBatchElement { index: 0, length: 1 })
        ));
    }

    #[test]
    fn test_bad_address() {
        let mut raw = state_request();
        raw.contract = Some("0x1234".into());
        assert!(matches!(
            Command::parse(CommandKind::AppendStateBatch, raw),
            Err(SubmitterError::InvalidAddress { field: "contract", .. })
        ));
    }

    #[test]
    fn test_encode_requires_lists() {
        let raw = RawRequest {
            should_start_at_element: Some("1".into()),
            total_elements_to_append: Some("1".into()),
            contexts: Some(vec![]),
            ..Default::default()
        };
        assert!(matches!(
            Command::parse(CommandKind::EncodeAppendSequencerBatch, raw),
            Err(SubmitterError::MissingField { field: "transactions" })
        ));
    }

    #[test]
    fn test_raw_request_from_json() {
        let raw: RawRequest = serde_json::from_value(serde_json::json!({
            "name": "sequencer",
            "address": ACCOUNT,
            "confirmations": 2
        }))
        .unwrap();
        assert_eq!(raw.confirmations, Some(2));

        let command = Command::parse(CommandKind::ClearPendingTransactions, raw).unwrap();
        assert_eq!(command.kind(), CommandKind::ClearPendingTransactions);
    }
}
