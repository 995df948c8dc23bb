//! Transport seam to the external queue/result infrastructure.

use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;

use crate::message::{MessageHandle, QueueRequest};

/// Errors surfaced by the underlying queue/result infrastructure.
///
/// Propagated unchanged through [`crate::Broker`]; retry policy belongs to
/// the layers above.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("not connected to queue infrastructure")]
    NotConnected,

    #[error("queue infrastructure error: {message}")]
    Infrastructure { message: String },

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// At-least-once message queue plus keyed result store.
///
/// [`QueueTransport::enqueue`] delivers one request to a worker queue and
/// returns the handle its result can later be fetched under.
/// [`QueueTransport::try_fetch`] is non-blocking: `Ok(None)` means the result
/// has not been produced yet.
///
/// Commands sent to the same queue preserve submission order; nothing is
/// guaranteed across different queues.
#[async_trait]
pub trait QueueTransport: Send + Sync {
    /// Deliver one request to `queue_id`.
    async fn enqueue(
        &self,
        queue_id: &str,
        request: QueueRequest,
    ) -> Result<MessageHandle, TransportError>;

    /// Attempt to fetch the result for `handle` without blocking.
    async fn try_fetch(&self, handle: &MessageHandle) -> Result<Option<Value>, TransportError>;
}
