//! OVM batch submitter
//!
//! Packs layer-2 sequencer batches and state roots into calldata for the
//! layer-1 chain contracts, signs and submits the resulting transactions, and
//! replaces an account's stuck transactions at a higher gas price.
//!
//! Submissions for a given account must be serialized by the caller: nonces
//! are supplied with each request and nothing in this crate locks an account.

pub mod api;
pub mod codec;
pub mod commands;
pub mod config;
pub mod context;
pub mod error;
pub mod ledger;
pub mod metrics;
pub mod tx;
pub mod wallet;

#[cfg(test)]
pub(crate) mod test_utils;

pub use error::{ErrorCategory, SubmitterError, SubmitterResult};
