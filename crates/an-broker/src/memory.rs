//! In-process transport for development and integration testing.
//!
//! Simulates the queue and result-store infrastructure with no external
//! dependencies. Callers script worker behavior by registering a responder
//! per queue; whatever a responder returns becomes that message's stored
//! result. Cloning shares the underlying state, so a test can keep a handle
//! for inspection while the broker owns its own copy.

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use uuid::Uuid;

use crate::message::{MessageHandle, QueueRequest};
use crate::transport::{QueueTransport, TransportError};

/// Scripted worker behavior: maps an incoming request to an optional result.
///
/// Returning `None` leaves the message unanswered, which is how tests
/// exercise timeouts.
pub type Responder = Box<dyn FnMut(&QueueRequest) -> Option<Value> + Send>;

#[derive(Default)]
struct Inner {
    responders: HashMap<String, Responder>,
    results: HashMap<Uuid, Value>,
    sent: Vec<(String, QueueRequest)>,
}

/// A fully in-process [`QueueTransport`].
#[derive(Clone, Default)]
pub struct MemoryTransport {
    inner: Arc<Mutex<Inner>>,
}

impl MemoryTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Script the worker behind `queue_id`.
    pub fn register_responder(&self, queue_id: impl Into<String>, responder: Responder) {
        self.inner.lock().responders.insert(queue_id.into(), responder);
    }

    /// Deposit a result for a handle directly, bypassing responders.
    pub fn push_result(&self, handle: &MessageHandle, payload: Value) {
        self.inner.lock().results.insert(handle.message_id, payload);
    }

    /// Every request enqueued so far, in submission order.
    pub fn sent_messages(&self) -> Vec<(String, QueueRequest)> {
        self.inner.lock().sent.clone()
    }
}

#[async_trait]
impl QueueTransport for MemoryTransport {
    async fn enqueue(
        &self,
        queue_id: &str,
        request: QueueRequest,
    ) -> Result<MessageHandle, TransportError> {
        let handle = MessageHandle::new(queue_id);
        let mut guard = self.inner.lock();
        let inner = &mut *guard;
        inner.sent.push((queue_id.to_string(), request.clone()));
        if let Some(responder) = inner.responders.get_mut(queue_id) {
            if let Some(result) = responder(&request) {
                inner.results.insert(handle.message_id, result);
            }
        }
        Ok(handle)
    }

    async fn try_fetch(&self, handle: &MessageHandle) -> Result<Option<Value>, TransportError> {
        Ok(self.inner.lock().results.get(&handle.message_id).cloned())
    }
}
