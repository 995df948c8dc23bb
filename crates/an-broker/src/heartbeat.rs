//! Push-based worker liveness tracking.
//!
//! Workers emit heartbeats and stats on their own initiative; the
//! [`HeartbeatMonitor`] records them in a registry and a periodic sweep
//! evicts workers whose last heartbeat is older than the configured max age.
//! Eviction and join events are emitted on a channel.
//!
//! This is supplemental health monitoring only: the ping/join handshake in
//! [`crate::Broker`] remains the authority for deployment readiness, and
//! nothing here feeds back into job submission. The registry has a single
//! owner; the owning task calls [`HeartbeatMonitor::sweep`] itself or hands
//! the monitor to [`HeartbeatMonitor::run_sweeper`].

use chrono::{DateTime, Utc};
use crossbeam_channel::Sender;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{HashMap, VecDeque};
use std::time::Duration;
use tracing::{info, warn};

/// Configuration for the heartbeat monitor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HeartbeatMonitorConfig {
    /// A worker whose last heartbeat is older than this is evicted.
    pub max_heartbeat_age: Duration,
    /// Pause between sweeps in [`HeartbeatMonitor::run_sweeper`].
    pub sweep_interval: Duration,
    /// How many recent stats payloads to keep per worker.
    pub stats_history: usize,
}

impl Default for HeartbeatMonitorConfig {
    fn default() -> Self {
        Self {
            max_heartbeat_age: Duration::from_secs(30),
            sweep_interval: Duration::from_millis(500),
            stats_history: 15,
        }
    }
}

/// Liveness events emitted by the monitor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum WorkerEvent {
    Joined {
        worker_id: String,
    },
    Evicted {
        worker_id: String,
        last_heartbeat: Option<DateTime<Utc>>,
    },
}

/// Registry entry for one worker.
#[derive(Debug, Clone)]
pub struct WorkerHealth {
    pub worker_id: String,
    last_heartbeat: Option<DateTime<Utc>>,
    stats: VecDeque<Value>,
    stats_capacity: usize,
}

impl WorkerHealth {
    fn new(worker_id: String, stats_capacity: usize) -> Self {
        Self {
            worker_id,
            last_heartbeat: None,
            stats: VecDeque::with_capacity(stats_capacity),
            stats_capacity,
        }
    }

    pub fn last_heartbeat(&self) -> Option<DateTime<Utc>> {
        self.last_heartbeat
    }

    /// Most recent stats payload, if any.
    pub fn latest_stats(&self) -> Option<&Value> {
        self.stats.back()
    }

    fn update_heartbeat(&mut self, at: DateTime<Utc>) {
        self.last_heartbeat = Some(at);
    }

    fn add_stats(&mut self, stats: Value) {
        if self.stats.len() == self.stats_capacity {
            self.stats.pop_front();
        }
        self.stats.push_back(stats);
    }

    fn alive(&self, max_age: Duration, now: DateTime<Utc>) -> bool {
        match self.last_heartbeat {
            Some(hb) => {
                now.signed_duration_since(hb).num_milliseconds() <= max_age.as_millis() as i64
            }
            None => false,
        }
    }
}

/// Worker health registry with periodic eviction.
///
/// Heartbeats and stats from workers that never joined are logged and
/// dropped.
pub struct HeartbeatMonitor {
    config: HeartbeatMonitorConfig,
    workers: HashMap<String, WorkerHealth>,
    event_tx: Sender<WorkerEvent>,
}

impl HeartbeatMonitor {
    pub fn new(config: HeartbeatMonitorConfig, event_tx: Sender<WorkerEvent>) -> Self {
        Self {
            config,
            workers: HashMap::new(),
            event_tx,
        }
    }

    /// Record a worker join announcement.
    pub fn record_join(&mut self, worker_id: &str, at: DateTime<Utc>) {
        if self.workers.contains_key(worker_id) {
            warn!(worker_id, "worker tried to join but is already joined");
            return;
        }
        info!(worker_id, "worker joined");
        let mut health = WorkerHealth::new(worker_id.to_string(), self.config.stats_history);
        health.update_heartbeat(at);
        self.workers.insert(worker_id.to_string(), health);
        self.emit(WorkerEvent::Joined {
            worker_id: worker_id.to_string(),
        });
    }

    /// Record a heartbeat for a joined worker.
    pub fn record_heartbeat(&mut self, worker_id: &str, at: DateTime<Utc>) {
        match self.workers.get_mut(worker_id) {
            Some(health) => health.update_heartbeat(at),
            None => warn!(worker_id, "worker sent heartbeat but has not joined"),
        }
    }

    /// Record a stats payload for a joined worker.
    pub fn record_stats(&mut self, worker_id: &str, stats: Value) {
        match self.workers.get_mut(worker_id) {
            Some(health) => health.add_stats(stats),
            None => warn!(worker_id, "worker pushed stats but has not joined"),
        }
    }

    pub fn get(&self, worker_id: &str) -> Option<&WorkerHealth> {
        self.workers.get(worker_id)
    }

    pub fn len(&self) -> usize {
        self.workers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.workers.is_empty()
    }

    pub fn is_alive(&self, worker_id: &str) -> bool {
        self.workers
            .get(worker_id)
            .map(|h| h.alive(self.config.max_heartbeat_age, Utc::now()))
            .unwrap_or(false)
    }

    /// Evict every worker whose last heartbeat is too old.
    ///
    /// Returns the number of evicted workers.
    pub fn sweep(&mut self) -> usize {
        let now = Utc::now();
        let stale: Vec<String> = self
            .workers
            .values()
            .filter(|h| !h.alive(self.config.max_heartbeat_age, now))
            .map(|h| h.worker_id.clone())
            .collect();

        for worker_id in &stale {
            if let Some(health) = self.workers.remove(worker_id) {
                warn!(worker_id = %worker_id, "worker timed out");
                self.emit(WorkerEvent::Evicted {
                    worker_id: worker_id.clone(),
                    last_heartbeat: health.last_heartbeat,
                });
            }
        }
        stale.len()
    }

    /// Drive periodic sweeps, consuming the monitor.
    ///
    /// Runs until the owning task is cancelled.
    pub async fn run_sweeper(mut self) {
        loop {
            tokio::time::sleep(self.config.sweep_interval).await;
            self.sweep();
        }
    }

    fn emit(&self, event: WorkerEvent) {
        // Best-effort send; if the receiver is gone we just keep the registry.
        let _ = self.event_tx.try_send(event);
    }
}
