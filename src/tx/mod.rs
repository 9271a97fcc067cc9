//! Transaction construction, submission and stuck-transaction replacement

pub mod builder;
pub mod pipeline;
pub mod replacer;
pub mod types;

pub use builder::TransactionBuilder;
pub use pipeline::{SubmissionObserver, SubmissionPipeline, TracingObserver};
pub use replacer::{ReplacementEntry, ReplacementReport, ReplacerState, StuckTransactionReplacer};
pub use types::{PendingTransactionRecord, SignedTransaction, SubmissionResult};
