//! Error types for the batch submitter

use thiserror::Error;

/// Main error type for encoding, building and submitting transactions
#[derive(Error, Debug)]
pub enum SubmitterError {
    #[error("Invalid number for {field}: {value:?} is not a non-negative decimal integer")]
    InvalidNumber { field: &'static str, value: String },

    #[error("Value {value} for {field} does not fit in {width} hex digits")]
    WidthOverflow {
        field: &'static str,
        value: u64,
        width: usize,
    },

    #[error("Malformed context at index {index}: {reason}")]
    MalformedContext { index: usize, reason: String },

    #[error("Odd-length hex in {field} at index {index}: not a whole number of bytes")]
    OddLengthHex { field: &'static str, index: usize },

    #[error("Invalid hex in {field} at index {index}: {reason}")]
    InvalidHex {
        field: &'static str,
        index: usize,
        reason: String,
    },

    #[error("Invalid batch element at index {index}: expected 32 bytes, got {length}")]
    InvalidBatchElement { index: usize, length: usize },

    #[error("Missing required field {field}")]
    MissingField { field: &'static str },

    #[error("Invalid address for {field}: {value:?}")]
    InvalidAddress { field: &'static str, value: String },

    #[error("Missing or empty gas_price")]
    MissingGasPrice,

    #[error("Missing or empty nonce")]
    MissingNonce,

    #[error("Invalid chain ID: {value:?}")]
    InvalidChainId { value: String },

    #[error("Account {address} not found in wallet {name}")]
    AccountNotFound { name: String, address: String },

    #[error("Wallet error: {0}")]
    Wallet(String),

    #[error("Ledger node unavailable: {0}")]
    RpcUnavailable(String),

    #[error("Ledger node error {code}: {message}")]
    Rpc { code: i64, message: String },

    #[error("Transaction underpriced: {0}")]
    Underpriced(String),

    #[error("Nonce too low: {0}")]
    NonceTooLow(String),

    #[error("Nonce too high: {0}")]
    NonceTooHigh(String),

    #[error("Insufficient funds: {0}")]
    InsufficientFunds(String),

    #[error("Transaction {tx_hash} reverted")]
    Reverted { tx_hash: String },

    #[error("Timed out after {waited_secs}s waiting for {confirmations} confirmations of {tx_hash}")]
    ConfirmationTimeout {
        tx_hash: String,
        confirmations: u64,
        waited_secs: u64,
    },

    #[error("Cancelled during {operation}: {reason}")]
    Cancelled {
        operation: &'static str,
        reason: &'static str,
    },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Unknown command {0:?}")]
    UnknownCommand(String),

    #[error("Command {0} already has a handler")]
    DuplicateHandler(String),

    #[error("Command {0} has no handler")]
    MissingHandler(String),
}

/// Coarse classification used for status codes and metrics
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    InputValidation,
    IdentityResolution,
    NetworkFailure,
    ChainRejection,
    ConfirmationTimeout,
    Cancelled,
    Internal,
}

impl ErrorCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCategory::InputValidation => "input_validation",
            ErrorCategory::IdentityResolution => "identity_resolution",
            ErrorCategory::NetworkFailure => "network_failure",
            ErrorCategory::ChainRejection => "chain_rejection",
            ErrorCategory::ConfirmationTimeout => "confirmation_timeout",
            ErrorCategory::Cancelled => "cancelled",
            ErrorCategory::Internal => "internal",
        }
    }
}

impl SubmitterError {
    pub fn category(&self) -> ErrorCategory {
        use SubmitterError::*;
        match self {
            InvalidNumber { .. }
            | WidthOverflow { .. }
            | MalformedContext { .. }
            | OddLengthHex { .. }
            | InvalidHex { .. }
            | InvalidBatchElement { .. }
            | MissingField { .. }
            | InvalidAddress { .. }
            | MissingGasPrice
            | MissingNonce
            | InvalidChainId { .. }
            | UnknownCommand(_) => ErrorCategory::InputValidation,
            AccountNotFound { .. } | Wallet(_) => ErrorCategory::IdentityResolution,
            RpcUnavailable(_) | Rpc { .. } => ErrorCategory::NetworkFailure,
            Underpriced(_)
            | NonceTooLow(_)
            | NonceTooHigh(_)
            | InsufficientFunds(_)
            | Reverted { .. } => ErrorCategory::ChainRejection,
            ConfirmationTimeout { .. } => ErrorCategory::ConfirmationTimeout,
            Cancelled { .. } => ErrorCategory::Cancelled,
            Config(_) | DuplicateHandler(_) | MissingHandler(_) => ErrorCategory::Internal,
        }
    }

    /// The request field at fault, when the error can be pinned to one
    pub fn field(&self) -> Option<&'static str> {
        use SubmitterError::*;
        match self {
            InvalidNumber { field, .. }
            | WidthOverflow { field, .. }
            | OddLengthHex { field, .. }
            | InvalidHex { field, .. }
            | MissingField { field }
            | InvalidAddress { field, .. } => Some(*field),
            MalformedContext { .. } => Some("contexts"),
            InvalidBatchElement { .. } => Some("batch"),
            MissingGasPrice => Some("gas_price"),
            MissingNonce => Some("nonce"),
            AccountNotFound { .. } => Some("address"),
            _ => None,
        }
    }

    /// Classify an error message returned by the node for a submission
    pub fn from_node_message(code: i64, message: &str) -> Self {
        let lower = message.to_lowercase();
        if lower.contains("nonce too low") {
            SubmitterError::NonceTooLow(message.to_string())
        } else if lower.contains("nonce too high") {
            SubmitterError::NonceTooHigh(message.to_string())
        } else if lower.contains("underpriced") {
            SubmitterError::Underpriced(message.to_string())
        } else if lower.contains("insufficient funds") {
            SubmitterError::InsufficientFunds(message.to_string())
        } else {
            SubmitterError::Rpc {
                code,
                message: message.to_string(),
            }
        }
    }
}

/// Result type for submitter operations
pub type SubmitterResult<T> = Result<T, SubmitterError>;
