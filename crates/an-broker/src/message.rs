//! Wire-level message types and the outstanding-message ledger.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use uuid::Uuid;

use an_types::WorkerCommand;

/// Acknowledgment a worker must echo after a successful model deployment.
pub const MODEL_DEPLOYED: &str = "model_deployed";

/// Reply a worker must give to a ping request.
pub const PONG: &str = "pong";

/// Command field of a queue request.
///
/// [`WorkerCommand`] covers the job-carrying opcodes; `Ping` is the
/// lightweight liveness probe and never carries a payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RequestCommand {
    DeployModel,
    RunOptimization,
    Ping,
}

impl From<WorkerCommand> for RequestCommand {
    fn from(command: WorkerCommand) -> Self {
        match command {
            WorkerCommand::DeployModel => Self::DeployModel,
            WorkerCommand::RunOptimization => Self::RunOptimization,
        }
    }
}

/// One request addressed to a worker queue.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueueRequest {
    pub command: RequestCommand,
    pub payload: Value,
}

impl QueueRequest {
    pub fn command(command: WorkerCommand, payload: Value) -> Self {
        Self {
            command: command.into(),
            payload,
        }
    }

    pub fn ping() -> Self {
        Self {
            command: RequestCommand::Ping,
            payload: Value::Null,
        }
    }
}

/// Identifies one enqueued request awaiting a result.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MessageHandle {
    pub message_id: Uuid,
    pub queue_id: String,
}

impl MessageHandle {
    pub fn new(queue_id: impl Into<String>) -> Self {
        Self {
            message_id: Uuid::new_v4(),
            queue_id: queue_id.into(),
        }
    }
}

/// Per-queue ledger of message handles awaiting a result.
///
/// Owns the handle lifecycle explicitly: handles are appended on send, read
/// for polling, and dropped only by [`MessageLedger::clear`]. Resolved
/// handles are *not* removed automatically, so repeated polling passes may
/// re-observe them; pollers track what they have already consumed.
#[derive(Debug, Default)]
pub struct MessageLedger {
    outstanding: HashMap<String, Vec<MessageHandle>>,
}

impl MessageLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a handle under its queue.
    pub fn append(&mut self, handle: MessageHandle) {
        self.outstanding
            .entry(handle.queue_id.clone())
            .or_default()
            .push(handle);
    }

    /// Handles currently registered for the given queues.
    pub fn for_queues(&self, queues: &[String]) -> Vec<MessageHandle> {
        queues
            .iter()
            .flat_map(|q| self.outstanding.get(q).into_iter().flatten())
            .cloned()
            .collect()
    }

    /// Drop every registered handle.
    pub fn clear(&mut self) {
        self.outstanding.clear();
    }

    pub fn len(&self) -> usize {
        self.outstanding.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
