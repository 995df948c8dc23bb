//! Single point of contact with the external queue/result infrastructure.
//!
//! The [`Broker`] hides message framing behind "send this opcode+payload to
//! queue X / to all queues" and "wait up to T for every outstanding result".
//! One broker serves exactly one optimization run; sharing it across
//! concurrent runs is unsupported.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeSet, HashMap, HashSet};
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, warn};
use uuid::Uuid;

use an_types::WorkerCommand;

use crate::message::{MessageHandle, MessageLedger, QueueRequest, PONG};
use crate::transport::{QueueTransport, TransportError};

/// Timeouts and polling cadence for broker operations.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BrokerSettings {
    /// Fixed timeout for a single ping round trip.
    pub ping_timeout: Duration,
    /// Lower bound on the pause between result-polling sweeps.
    pub poll_floor: Duration,
}

impl Default for BrokerSettings {
    fn default() -> Self {
        Self {
            ping_timeout: Duration::from_secs(2),
            poll_floor: Duration::from_secs(1),
        }
    }
}

/// Errors specific to broker operations.
///
/// Transport errors pass through unchanged; retrying is the caller's call.
#[derive(Debug, Error)]
pub enum BrokerError {
    #[error("unknown queue: {queue_id}")]
    UnknownQueue { queue_id: String },

    #[error("timed out after {timeout:?} with {pending} result(s) still pending")]
    ResultTimeout { timeout: Duration, pending: usize },

    #[error("transport error: {0}")]
    Transport(#[from] TransportError),
}

/// Result alias for broker operations.
pub type BrokerResult<T> = Result<T, BrokerError>;

/// Broker over an external at-least-once message queue and keyed result
/// store.
///
/// One worker listens per queue id, by convention, so the queue-id set is
/// fixed for the broker's lifetime and doubles as the worker roster. Handles
/// for every sent message are kept in an internal ledger until
/// [`Broker::clear_queue_messages`] drops them.
pub struct Broker<T: QueueTransport> {
    transport: T,
    queue_ids: BTreeSet<String>,
    ledger: MessageLedger,
    settings: BrokerSettings,
}

impl<T: QueueTransport> Broker<T> {
    pub fn new(transport: T, queue_ids: Vec<String>, settings: BrokerSettings) -> Self {
        if queue_ids.is_empty() {
            warn!("constructing broker without queue ids");
        }
        Self {
            transport,
            queue_ids: queue_ids.into_iter().collect(),
            ledger: MessageLedger::new(),
            settings,
        }
    }

    /// Registered queue ids, in sorted order.
    pub fn queue_ids(&self) -> Vec<String> {
        self.queue_ids.iter().cloned().collect()
    }

    /// Number of outstanding message handles.
    pub fn outstanding(&self) -> usize {
        self.ledger.len()
    }

    fn require_queue(&self, queue_id: &str) -> BrokerResult<()> {
        if self.queue_ids.contains(queue_id) {
            Ok(())
        } else {
            Err(BrokerError::UnknownQueue {
                queue_id: queue_id.to_string(),
            })
        }
    }

    /// Probe one queue for liveness.
    ///
    /// Blocks for at most the configured ping timeout for exactly one result.
    /// Returns `true` iff the worker answered with the canonical `"pong"`. An
    /// explicit different answer is `false`; no answer in time is a
    /// [`BrokerError::ResultTimeout`], so callers can tell the two apart.
    pub async fn ping(&mut self, queue_id: &str) -> BrokerResult<bool> {
        self.require_queue(queue_id)?;
        let handle = self
            .transport
            .enqueue(queue_id, QueueRequest::ping())
            .await?;
        debug!(queue_id, message_id = %handle.message_id, "ping");
        self.ledger.append(handle.clone());

        let ping_timeout = self.settings.ping_timeout;
        let pause = poll_pause(ping_timeout, self.settings.poll_floor);
        let transport = &self.transport;
        let reply = tokio::time::timeout(ping_timeout, async {
            loop {
                if let Some(payload) = transport.try_fetch(&handle).await? {
                    return Ok::<Value, TransportError>(payload);
                }
                tokio::time::sleep(pause).await;
            }
        })
        .await
        .map_err(|_| BrokerError::ResultTimeout {
            timeout: ping_timeout,
            pending: 1,
        })??;

        Ok(reply.as_str() == Some(PONG))
    }

    /// Send `command` and `payload` to every registered queue, in sorted
    /// order.
    pub async fn broadcast(&mut self, command: WorkerCommand, payload: Value) -> BrokerResult<()> {
        let queues = self.queue_ids();
        debug!(?command, queues = queues.len(), "broadcast");
        for queue_id in queues {
            self.send_to_queue(&queue_id, command, payload.clone())
                .await?;
        }
        Ok(())
    }

    /// Enqueue one message for `queue_id` and register its handle.
    ///
    /// The returned handle is for diagnostics; the broker keeps its own copy
    /// in the outstanding-message ledger.
    pub async fn send_to_queue(
        &mut self,
        queue_id: &str,
        command: WorkerCommand,
        payload: Value,
    ) -> BrokerResult<MessageHandle> {
        self.require_queue(queue_id)?;
        let handle = self
            .transport
            .enqueue(queue_id, QueueRequest::command(command, payload))
            .await?;
        debug!(queue_id, ?command, message_id = %handle.message_id, "message enqueued");
        self.ledger.append(handle.clone());
        Ok(handle)
    }

    /// Collect results for every outstanding message on the given queues.
    ///
    /// Sweeps the result store non-blockingly; each resolved payload is
    /// appended to its queue's list in the order it was observed to resolve.
    /// No ordering is guaranteed across queues or across sweeps; callers
    /// must key on message content, never on position. Between sweeps the
    /// task suspends for `max(poll_floor, overall_timeout / 10)`.
    ///
    /// Resolved handles stay registered in the ledger until
    /// [`Broker::clear_queue_messages`], so a later call will re-observe
    /// them.
    pub async fn get_results(
        &mut self,
        queues: &[String],
        overall_timeout: Duration,
    ) -> BrokerResult<HashMap<String, Vec<Value>>> {
        for queue_id in queues {
            self.require_queue(queue_id)?;
        }

        let handles: Vec<MessageHandle> = self.ledger.for_queues(queues);
        let mut results: HashMap<String, Vec<Value>> = HashMap::new();
        if handles.is_empty() {
            return Ok(results);
        }

        // "Already appended" is tracked apart from "still registered": the
        // ledger keeps resolved handles until cleared, so only this set
        // prevents a payload from being appended twice within one call.
        let mut resolved: HashSet<Uuid> = HashSet::new();
        let pause = poll_pause(overall_timeout, self.settings.poll_floor);
        let transport = &self.transport;
        let outcome = tokio::time::timeout(overall_timeout, async {
            loop {
                for handle in &handles {
                    if resolved.contains(&handle.message_id) {
                        continue;
                    }
                    if let Some(payload) = transport.try_fetch(handle).await? {
                        resolved.insert(handle.message_id);
                        results
                            .entry(handle.queue_id.clone())
                            .or_default()
                            .push(payload);
                    }
                }
                if resolved.len() == handles.len() {
                    return Ok::<(), TransportError>(());
                }
                debug!(
                    pending = handles.len() - resolved.len(),
                    pause_ms = pause.as_millis() as u64,
                    "results still pending"
                );
                tokio::time::sleep(pause).await;
            }
        })
        .await;

        match outcome {
            Ok(Ok(())) => Ok(results),
            Ok(Err(err)) => Err(err.into()),
            Err(_) => Err(BrokerError::ResultTimeout {
                timeout: overall_timeout,
                pending: handles.len() - resolved.len(),
            }),
        }
    }

    /// [`Broker::get_results`] over every registered queue.
    pub async fn get_all_results(
        &mut self,
        overall_timeout: Duration,
    ) -> BrokerResult<HashMap<String, Vec<Value>>> {
        let queues = self.queue_ids();
        self.get_results(&queues, overall_timeout).await
    }

    /// Forget every outstanding message.
    ///
    /// Called once message intent has been fully consumed (after a successful
    /// deploy or ping round) so stale handles are not re-polled.
    pub fn clear_queue_messages(&mut self) {
        debug!(outstanding = self.ledger.len(), "clearing queue messages");
        self.ledger.clear();
    }
}

fn poll_pause(overall_timeout: Duration, floor: Duration) -> Duration {
    (overall_timeout / 10).max(floor)
}
