//! Command surface exposed to the host
//!
//! The host hands over a command name and untyped fields. Names resolve to a
//! closed [`CommandKind`], fields are validated into a typed [`Command`], and
//! the registry routes it to the one handler registered for that kind.

pub mod request;
pub mod submitter;

pub use request::{AccountRef, Command, RawRequest, SequencerBatchRequest, StateBatchRequest};
pub use submitter::BatchSubmitter;

use crate::context::RequestContext;
use crate::error::{SubmitterError, SubmitterResult};
use crate::tx::{ReplacementReport, SubmissionResult};

use async_trait::async_trait;
use ethers::types::H256;
use serde::Serialize;
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CommandKind {
    EncodeAppendSequencerBatch,
    AppendStateBatch,
    AppendSequencerBatch,
    ClearPendingTransactions,
}

impl CommandKind {
    pub const ALL: [CommandKind; 4] = [
        CommandKind::EncodeAppendSequencerBatch,
        CommandKind::AppendStateBatch,
        CommandKind::AppendSequencerBatch,
        CommandKind::ClearPendingTransactions,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            CommandKind::EncodeAppendSequencerBatch => "encodeAppendSequencerBatch",
            CommandKind::AppendStateBatch => "appendStateBatch",
            CommandKind::AppendSequencerBatch => "appendSequencerBatch",
            CommandKind::ClearPendingTransactions => "clearPendingTransactions",
        }
    }
}

impl fmt::Display for CommandKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CommandKind {
    type Err = SubmitterError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        CommandKind::ALL
            .into_iter()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| SubmitterError::UnknownCommand(s.to_string()))
    }
}

/// A failed replacement as reported to the caller
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReplacementFailure {
    pub nonce: u64,
    pub original_hash: H256,
    pub error: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ClearedTransactions {
    /// One per accepted replacement, ascending nonce
    pub transaction_hashes: Vec<H256>,
    pub failures: Vec<ReplacementFailure>,
}

impl From<&ReplacementReport> for ClearedTransactions {
    fn from(report: &ReplacementReport) -> Self {
        Self {
            transaction_hashes: report.hashes(),
            failures: report
                .failures()
                .map(|(entry, error)| ReplacementFailure {
                    nonce: entry.nonce,
                    original_hash: entry.original_hash,
                    error: error.to_string(),
                })
                .collect(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum CommandOutput {
    /// Packed batch as hex digits, no `0x`
    Encoded { data: String },
    Submitted(SubmissionResult),
    Cleared(ClearedTransactions),
}

#[async_trait]
pub trait CommandHandler: Send + Sync {
    async fn handle(&self, ctx: &RequestContext, command: Command) -> SubmitterResult<CommandOutput>;
}

/// Exactly one handler per [`CommandKind`]
pub struct CommandRegistry {
    handlers: HashMap<CommandKind, Arc<dyn CommandHandler>>,
}

#[derive(Default)]
pub struct CommandRegistryBuilder {
    handlers: HashMap<CommandKind, Arc<dyn CommandHandler>>,
}

impl CommandRegistryBuilder {
    pub fn register(
        mut self,
        kind: CommandKind,
        handler: Arc<dyn CommandHandler>,
    ) -> SubmitterResult<Self> {
        if self.handlers.contains_key(&kind) {
            return Err(SubmitterError::DuplicateHandler(kind.to_string()));
        }
        self.handlers.insert(kind, handler);
        Ok(self)
    }

    /// Register `handler` for every kind
    pub fn register_all(self, handler: Arc<dyn CommandHandler>) -> SubmitterResult<Self> {
        CommandKind::ALL
            .into_iter()
            .try_fold(self, |builder, kind| builder.register(kind, handler.clone()))
    }

    pub fn build(self) -> SubmitterResult<CommandRegistry> {
        if let Some(missing) = CommandKind::ALL
            .into_iter()
            .find(|kind| !self.handlers.contains_key(kind))
        {
            return Err(SubmitterError::MissingHandler(missing.to_string()));
        }
        Ok(CommandRegistry {
            handlers: self.handlers,
        })
    }
}

impl CommandRegistry {
    pub fn builder() -> CommandRegistryBuilder {
        CommandRegistryBuilder::default()
    }

    pub async fn dispatch(&self, ctx: &RequestContext, command: Command) -> SubmitterResult<CommandOutput> {
        let kind = command.kind();
        let handler = self
            .handlers
            .get(&kind)
            .ok_or_else(|| SubmitterError::MissingHandler(kind.to_string()))?;

        debug!(request_id = %ctx.request_id(), command = %kind, "Dispatching command");
        handler.handle(ctx, command).await
    }

    /// Resolve `name`, validate `raw` into a [`Command`] and dispatch it
    pub async fn dispatch_raw(
        &self,
        ctx: &RequestContext,
        name: &str,
        raw: RawRequest,
    ) -> SubmitterResult<CommandOutput> {
        let kind: CommandKind = name.parse()?;
        let command = Command::parse(kind, raw)?;
        self.dispatch(ctx, command).await
    }
}
