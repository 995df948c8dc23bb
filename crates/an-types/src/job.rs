//! Optimization jobs and the result payloads workers report back.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::model::ModelBundle;

/// Unique job identifier.
pub type JobId = Uuid;

/// Failure reported by a worker for one job.
///
/// Recorded on the job instead of raised: a worker failing mid-run must not
/// abort sibling jobs on other queues.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobFailure {
    pub queue_id: String,
    pub message: String,
}

/// One optimization request plus its accumulating results.
///
/// Created at submission time and mutated only by result ingestion; the job
/// is held until the caller reads it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Job {
    pub id: JobId,
    pub model: ModelBundle,
    /// Opaque optimization parameters forwarded to the worker.
    pub config: Value,
    /// Queue ids this job was sent to. Set exactly once at submission.
    pub submitted_to: Vec<String>,
    pub completed: bool,
    pub failure: Option<JobFailure>,
    /// Scalar objective values received so far.
    pub values: Vec<f64>,
    /// State vectors corresponding to `values`, index for index.
    pub results: Vec<Vec<f64>>,
    pub created_at: DateTime<Utc>,
}

impl Job {
    pub fn new(model: ModelBundle, config: Value) -> Self {
        Self {
            id: Uuid::new_v4(),
            model,
            config,
            submitted_to: Vec::new(),
            completed: false,
            failure: None,
            values: Vec::new(),
            results: Vec::new(),
            created_at: Utc::now(),
        }
    }

    /// Wire form submitted to workers: id, parameters, and the model name.
    pub fn serialized(&self) -> Value {
        serde_json::json!({
            "id": self.id,
            "config": self.config,
            "model": self.model.name,
        })
    }

    /// Best `(value, state)` pair received so far.
    ///
    /// Minimum objective value wins; on ties the first occurrence is kept.
    /// `None` until at least one result has arrived.
    pub fn best_result(&self) -> Option<(f64, &[f64])> {
        let mut best: Option<(f64, usize)> = None;
        for (idx, &value) in self.values.iter().enumerate() {
            match best {
                Some((best_value, _)) if value >= best_value => {}
                _ => best = Some((value, idx)),
            }
        }
        best.and_then(|(value, idx)| self.results.get(idx).map(|s| (value, s.as_slice())))
    }
}

/// Result payload a worker reports for one job.
///
/// A successful report carries `value` and `state`; a failure report carries
/// `failure` instead.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkerReport {
    pub job_id: JobId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state: Option<Vec<f64>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failure: Option<String>,
}
