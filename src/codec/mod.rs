//! Batch calldata encoding
//!
//! Pure and stateless: no I/O happens in this module, and every input is
//! validated before any output is produced.

pub mod hex_field;
pub mod sequencer;
pub mod state;

pub use hex_field::{decode_hex, decode_hex_bytes, encode_hex, parse_number, strip_0x};
pub use sequencer::{
    encode, encode_contexts, encode_should_start_at_element, encode_total_elements_to_append,
    encode_transactions, Context, EncodedBatch, SequencerBatchInput,
};
pub use state::{append_state_batch_calldata, validate_batch_roots};
