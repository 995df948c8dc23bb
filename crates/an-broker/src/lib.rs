//! Broker abstraction over the external message-queue/result-store
//! infrastructure, plus worker liveness tracking.
//!
//! Provides:
//! - [`Broker`]: send commands to worker queues and poll for their results
//! - [`QueueTransport`]: the seam to the actual queue infrastructure
//! - [`MemoryTransport`]: fully in-process transport for development and tests
//! - [`HeartbeatMonitor`]: push-based worker health registry

pub mod broker;
pub mod heartbeat;
pub mod memory;
pub mod message;
pub mod transport;

pub use broker::{Broker, BrokerError, BrokerResult, BrokerSettings};
pub use heartbeat::{HeartbeatMonitor, HeartbeatMonitorConfig, WorkerEvent, WorkerHealth};
pub use memory::{MemoryTransport, Responder};
pub use message::{
    MessageHandle, MessageLedger, QueueRequest, RequestCommand, MODEL_DEPLOYED, PONG,
};
pub use transport::{QueueTransport, TransportError};
