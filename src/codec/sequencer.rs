//! Calldata for `appendSequencerBatch()`
//!
//! The contract reads its arguments straight out of calldata, so the batch is a
//! hand-packed sequence of fixed-width hex fields rather than ABI encoding:
//!
//! | field                          | hex digits |
//! |--------------------------------|-----------:|
//! | shouldStartAtElement           | 10 |
//! | totalElementsToAppend          | 6  |
//! | context count                  | 6  |
//! | per context: numSequenced      | 6  |
//! | per context: numSubsequentQueue| 6  |
//! | per context: timestamp         | 10 |
//! | per context: blockNumber       | 10 |
//! | per tx: byte length            | 6  |
//! | per tx: payload                | variable |

use super::hex_field::{decode_hex_bytes, encode_hex, parse_number, strip_0x};
use crate::error::{SubmitterError, SubmitterResult};

use ethers::types::Bytes;
use serde::{Deserialize, Serialize};

pub const SHOULD_START_AT_ELEMENT_WIDTH: usize = 10;
pub const TOTAL_ELEMENTS_TO_APPEND_WIDTH: usize = 6;
pub const CONTEXT_COUNT_WIDTH: usize = 6;
pub const NUM_SEQUENCED_WIDTH: usize = 6;
pub const NUM_SUBSEQUENT_QUEUE_WIDTH: usize = 6;
pub const TIMESTAMP_WIDTH: usize = 10;
pub const BLOCK_NUMBER_WIDTH: usize = 10;
pub const TX_LENGTH_WIDTH: usize = 6;

pub const APPEND_SEQUENCER_BATCH_SIGNATURE: &str = "appendSequencerBatch()";

/// Metadata for one segment of a sequencer batch
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Context {
    pub num_sequenced_transactions: u64,
    pub num_subsequent_queue_transactions: u64,
    pub timestamp: u64,
    pub block_number: u64,
}

impl Context {
    /// Parse one JSON-encoded context; all four fields are required
    pub fn parse(index: usize, raw: &str) -> SubmitterResult<Self> {
        serde_json::from_str(raw).map_err(|e| SubmitterError::MalformedContext {
            index,
            reason: e.to_string(),
        })
    }

    pub fn encode(&self) -> SubmitterResult<String> {
        Ok([
            encode_hex(
                "num_sequenced_transactions",
                self.num_sequenced_transactions,
                NUM_SEQUENCED_WIDTH,
            )?,
            encode_hex(
                "num_subsequent_queue_transactions",
                self.num_subsequent_queue_transactions,
                NUM_SUBSEQUENT_QUEUE_WIDTH,
            )?,
            encode_hex("timestamp", self.timestamp, TIMESTAMP_WIDTH)?,
            encode_hex("block_number", self.block_number, BLOCK_NUMBER_WIDTH)?,
        ]
        .concat())
    }
}

/// Untyped batch fields as the host hands them over
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SequencerBatchInput {
    pub should_start_at_element: String,
    pub total_elements_to_append: String,
    /// JSON-encoded [`Context`] records
    pub contexts: Vec<String>,
    /// Hex-encoded L2 transactions, `0x` optional
    pub transactions: Vec<String>,
}

/// The packed batch, immutable once built
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedBatch {
    hex: String,
    bytes: Vec<u8>,
}

impl EncodedBatch {
    fn from_hex(hex: String) -> SubmitterResult<Self> {
        let bytes = decode_hex_bytes("batch", 0, &hex)?;
        Ok(Self { hex, bytes })
    }

    /// Hex digits without a `0x` prefix
    pub fn as_hex(&self) -> &str {
        &self.hex
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Function selector followed by the packed batch
    pub fn calldata(&self) -> Bytes {
        let mut data = append_sequencer_batch_selector().to_vec();
        data.extend_from_slice(&self.bytes);
        Bytes::from(data)
    }
}

pub fn append_sequencer_batch_selector() -> [u8; 4] {
    ethers::utils::id(APPEND_SEQUENCER_BATCH_SIGNATURE)
}

pub fn encode_should_start_at_element(value: &str) -> SubmitterResult<String> {
    let value = parse_number("should_start_at_element", value)?;
    encode_hex("should_start_at_element", value, SHOULD_START_AT_ELEMENT_WIDTH)
}

pub fn encode_total_elements_to_append(value: &str) -> SubmitterResult<String> {
    let value = parse_number("total_elements_to_append", value)?;
    encode_hex(
        "total_elements_to_append",
        value,
        TOTAL_ELEMENTS_TO_APPEND_WIDTH,
    )
}

/// Count header followed by each context, in input order
pub fn encode_contexts(contexts: &[String]) -> SubmitterResult<String> {
    let parsed = contexts
        .iter()
        .enumerate()
        .map(|(i, raw)| Context::parse(i, raw))
        .collect::<SubmitterResult<Vec<_>>>()?;

    encode_parsed_contexts(&parsed)
}

pub fn encode_parsed_contexts(contexts: &[Context]) -> SubmitterResult<String> {
    let mut encoded = encode_hex("contexts", contexts.len() as u64, CONTEXT_COUNT_WIDTH)?;
    for context in contexts {
        encoded.push_str(&context.encode()?);
    }
    Ok(encoded)
}

/// Length-prefixed payloads, in input order. Payload digits are copied as given.
pub fn encode_transactions(payloads: &[String]) -> SubmitterResult<String> {
    let mut encoded = String::new();
    for (index, payload) in payloads.iter().enumerate() {
        let bytes = decode_hex_bytes("transactions", index, payload)?;
        encoded.push_str(&encode_hex(
            "transactions",
            bytes.len() as u64,
            TX_LENGTH_WIDTH,
        )?);
        encoded.push_str(strip_0x(payload));
    }
    Ok(encoded)
}

/// Pack a whole batch. Field order is part of the wire format.
pub fn encode(input: &SequencerBatchInput) -> SubmitterResult<EncodedBatch> {
    let hex = [
        encode_should_start_at_element(&input.should_start_at_element)?,
        encode_total_elements_to_append(&input.total_elements_to_append)?,
        encode_contexts(&input.contexts)?,
        encode_transactions(&input.transactions)?,
    ]
    .concat();

    EncodedBatch::from_hex(hex)
}
