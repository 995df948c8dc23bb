//! Stateful coordinator for one optimization run.
//!
//! A [`JobManager`] drives a single [`Broker`] through wait-for-worker-join →
//! deploy-model → submit → wait-for-results, then the collected jobs are
//! scanned for the globally best result. Operations assert their
//! predecessor's state; violating the order is fatal and never retried.

use serde_json::Value;
use thiserror::Error;
use tracing::{debug, info, warn};

use an_broker::{Broker, BrokerError, QueueTransport, MODEL_DEPLOYED};
use an_types::{
    ExecutionType, Job, JobFailure, ModelBundle, PreconditionError, WorkerCommand, WorkerReport,
};

use crate::settings::ManagerSettings;

/// Errors surfaced by job orchestration.
#[derive(Debug, Error)]
pub enum ManagerError {
    #[error("precondition violated: {0}")]
    Precondition(#[from] PreconditionError),

    #[error("model deployment not acknowledged by {rejected:?}: {details}")]
    DeploymentAcknowledgment {
        rejected: Vec<String>,
        details: String,
    },

    #[error("worker join failed after {attempts} attempt(s); unresponsive queues: {unresponsive:?}")]
    WorkerJoin {
        attempts: u32,
        unresponsive: Vec<String>,
    },

    #[error("broker error: {0}")]
    Broker(#[from] BrokerError),
}

/// Result alias for manager operations.
pub type ManagerResult<T> = Result<T, ManagerError>;

/// Coordinates one optimization run over one [`Broker`].
pub struct JobManager<T: QueueTransport> {
    broker: Broker<T>,
    settings: ManagerSettings,
    execution_type: ExecutionType,
    models: Vec<ModelBundle>,
    configs: Vec<Value>,
    models_deployed: bool,
    jobs: Vec<Job>,
}

impl<T: QueueTransport> JobManager<T> {
    /// Create a manager for the given models and configurations.
    ///
    /// Fails immediately if the model/config counts admit no valid fan-out;
    /// the derived execution type is fixed for the manager's lifetime.
    pub fn new(
        broker: Broker<T>,
        models: Vec<ModelBundle>,
        configs: Vec<Value>,
        settings: ManagerSettings,
    ) -> ManagerResult<Self> {
        let execution_type = Self::determine_execution_type(&models, &configs)?;
        info!(
            ?execution_type,
            models = models.len(),
            configs = configs.len(),
            queues = broker.queue_ids().len(),
            "job manager created"
        );
        Ok(Self {
            broker,
            settings,
            execution_type,
            models,
            configs,
            models_deployed: false,
            jobs: Vec::new(),
        })
    }

    /// Derive the fan-out strategy from the input shapes.
    pub fn determine_execution_type(
        models: &[ModelBundle],
        configs: &[Value],
    ) -> Result<ExecutionType, PreconditionError> {
        ExecutionType::from_counts(models.len(), configs.len())
    }

    pub fn execution_type(&self) -> ExecutionType {
        self.execution_type
    }

    pub fn models_deployed(&self) -> bool {
        self.models_deployed
    }

    /// Jobs submitted so far, with any ingested results.
    pub fn jobs(&self) -> &[Job] {
        &self.jobs
    }

    /// Ping every registered queue until all answer, retrying up to the
    /// configured budget.
    ///
    /// Returns the joined queue ids. The ping messages are disposable, so
    /// the outstanding-message ledger is cleared on success.
    pub async fn wait_for_worker_join(&mut self) -> ManagerResult<Vec<String>> {
        let queues = self.broker.queue_ids();
        let mut attempts = 0u32;
        loop {
            attempts += 1;
            let mut unresponsive = Vec::new();
            for queue_id in &queues {
                match self.broker.ping(queue_id).await {
                    Ok(true) => {}
                    Ok(false) => {
                        warn!(%queue_id, "worker answered ping without pong");
                        unresponsive.push(queue_id.clone());
                    }
                    Err(err) => {
                        warn!(%queue_id, %err, "ping failed");
                        unresponsive.push(queue_id.clone());
                    }
                }
            }

            if unresponsive.is_empty() {
                info!(queues = queues.len(), attempts, "all workers joined");
                self.broker.clear_queue_messages();
                return Ok(queues);
            }

            if attempts > self.settings.join_retry_limit {
                return Err(ManagerError::WorkerJoin {
                    attempts,
                    unresponsive,
                });
            }

            debug!(attempts, pending = unresponsive.len(), "retrying worker join");
            tokio::time::sleep(self.settings.join_retry_delay).await;
        }
    }

    /// Ship each model to its worker(s) and require every queue to
    /// acknowledge with `"model_deployed"`.
    ///
    /// Single-model runs broadcast the one model everywhere; multi-model runs
    /// pair models with queues index for index and require matching counts.
    pub async fn deploy_model(&mut self) -> ManagerResult<()> {
        match self.execution_type {
            ExecutionType::SingleModelSingleConfig | ExecutionType::SingleModelMultiConfig => {
                let payload = model_payload(&self.models[0])?;
                self.broker
                    .broadcast(WorkerCommand::DeployModel, payload)
                    .await?;
            }
            ExecutionType::MultiModelSingleConfig | ExecutionType::MultiModelMultiConfig => {
                let queues = self.broker.queue_ids();
                if queues.len() != self.models.len() {
                    return Err(PreconditionError::QueueModelMismatch {
                        queues: queues.len(),
                        models: self.models.len(),
                    }
                    .into());
                }
                for (queue_id, model) in queues.iter().zip(&self.models) {
                    let payload = model_payload(model)?;
                    self.broker
                        .send_to_queue(queue_id, WorkerCommand::DeployModel, payload)
                        .await?;
                }
            }
        }

        let results = self
            .broker
            .get_all_results(self.settings.deploy_timeout)
            .await?;

        let mut rejected = Vec::new();
        let mut details = Vec::new();
        for queue_id in self.broker.queue_ids() {
            let acks = results.get(&queue_id).map(Vec::as_slice).unwrap_or_default();
            let acknowledged =
                !acks.is_empty() && acks.iter().all(|a| a.as_str() == Some(MODEL_DEPLOYED));
            if !acknowledged {
                details.push(format!("{queue_id} answered {acks:?}"));
                rejected.push(queue_id);
            }
        }
        if !rejected.is_empty() {
            warn!(?rejected, "model deployment rejected");
            return Err(ManagerError::DeploymentAcknowledgment {
                rejected,
                details: details.join("; "),
            });
        }

        self.models_deployed = true;
        self.broker.clear_queue_messages();
        info!("models deployed on all queues");
        Ok(())
    }

    /// Build one job per (model, config) pairing and send it to its
    /// queue(s), mirroring the deploy fan-out exactly.
    ///
    /// Returns a snapshot of the submitted jobs; the manager keeps the
    /// authoritative copies that [`JobManager::wait_for_results`] fills in.
    pub async fn submit(&mut self) -> ManagerResult<Vec<Job>> {
        if !self.models_deployed {
            return Err(PreconditionError::ModelsNotDeployed.into());
        }

        let queues = self.broker.queue_ids();
        let mut jobs = Vec::new();

        match self.execution_type {
            ExecutionType::SingleModelSingleConfig => {
                let mut job = Job::new(self.models[0].clone(), self.configs[0].clone());
                self.broker
                    .broadcast(WorkerCommand::RunOptimization, job.serialized())
                    .await?;
                job.submitted_to = queues.clone();
                jobs.push(job);
            }
            ExecutionType::SingleModelMultiConfig => {
                if queues.len() != self.configs.len() {
                    return Err(PreconditionError::QueueConfigMismatch {
                        queues: queues.len(),
                        configs: self.configs.len(),
                    }
                    .into());
                }
                for (queue_id, config) in queues.iter().zip(&self.configs) {
                    let mut job = Job::new(self.models[0].clone(), config.clone());
                    self.broker
                        .send_to_queue(queue_id, WorkerCommand::RunOptimization, job.serialized())
                        .await?;
                    job.submitted_to = vec![queue_id.clone()];
                    jobs.push(job);
                }
            }
            ExecutionType::MultiModelSingleConfig => {
                if queues.len() != self.models.len() {
                    return Err(PreconditionError::QueueModelMismatch {
                        queues: queues.len(),
                        models: self.models.len(),
                    }
                    .into());
                }
                for (queue_id, model) in queues.iter().zip(&self.models) {
                    let mut job = Job::new(model.clone(), self.configs[0].clone());
                    self.broker
                        .send_to_queue(queue_id, WorkerCommand::RunOptimization, job.serialized())
                        .await?;
                    job.submitted_to = vec![queue_id.clone()];
                    jobs.push(job);
                }
            }
            ExecutionType::MultiModelMultiConfig => {
                if queues.len() != self.models.len() {
                    return Err(PreconditionError::QueueModelMismatch {
                        queues: queues.len(),
                        models: self.models.len(),
                    }
                    .into());
                }
                for (idx, queue_id) in queues.iter().enumerate() {
                    let mut job =
                        Job::new(self.models[idx].clone(), self.configs[idx].clone());
                    self.broker
                        .send_to_queue(queue_id, WorkerCommand::RunOptimization, job.serialized())
                        .await?;
                    job.submitted_to = vec![queue_id.clone()];
                    jobs.push(job);
                }
            }
        }

        info!(jobs = jobs.len(), execution_type = ?self.execution_type, "jobs submitted");
        self.jobs = jobs.clone();
        Ok(jobs)
    }

    /// Poll once, under the configured overall timeout, for every
    /// outstanding result and ingest the reports into their jobs.
    ///
    /// A worker-reported failure is recorded on its job and does not abort
    /// sibling jobs. Timeout or transport errors are fatal, and nothing is
    /// ingested unless every outstanding result arrived: the call fully
    /// succeeds or fully fails.
    pub async fn wait_for_results(&mut self) -> ManagerResult<()> {
        if !self.models_deployed {
            return Err(PreconditionError::ModelsNotDeployed.into());
        }
        if self.jobs.is_empty() {
            return Err(PreconditionError::NoJobsSubmitted.into());
        }

        let results = self
            .broker
            .get_all_results(self.settings.result_timeout)
            .await?;

        for job in &mut self.jobs {
            for queue_id in job.submitted_to.clone() {
                let Some(payloads) = results.get(&queue_id) else {
                    continue;
                };
                for payload in payloads {
                    ingest_report(job, &queue_id, payload);
                }
            }
            job.completed = job.failure.is_none();
        }

        info!(jobs = self.jobs.len(), "results collected");
        Ok(())
    }
}

/// Find the globally best `(job, value, state)` across `jobs`.
///
/// Each job contributes its own minimum (first occurrence on ties); the
/// running best is replaced only on strict improvement, so the first job to
/// reach the minimum value wins ties across jobs too.
pub fn scan_for_best_result(jobs: &[Job]) -> ManagerResult<(&Job, f64, &[f64])> {
    if jobs.is_empty() {
        return Err(PreconditionError::NoJobsSubmitted.into());
    }

    let mut best: Option<(&Job, f64, &[f64])> = None;
    for job in jobs {
        let Some((value, state)) = job.best_result() else {
            continue;
        };
        match best {
            Some((_, best_value, _)) if value >= best_value => {}
            _ => best = Some((job, value, state)),
        }
    }

    best.ok_or_else(|| PreconditionError::NoResults.into())
}

fn model_payload(model: &ModelBundle) -> ManagerResult<Value> {
    serde_json::to_value(model)
        .map_err(|err| BrokerError::Transport(err.into()))
        .map_err(ManagerError::from)
}

fn ingest_report(job: &mut Job, queue_id: &str, payload: &Value) {
    match serde_json::from_value::<WorkerReport>(payload.clone()) {
        Ok(report) => {
            if report.job_id != job.id {
                warn!(job_id = %job.id, report_job_id = %report.job_id, queue_id, "report for a different job, skipping");
                return;
            }
            if let Some(message) = report.failure {
                warn!(job_id = %job.id, queue_id, message = %message, "worker reported failure");
                job.failure = Some(JobFailure {
                    queue_id: queue_id.to_string(),
                    message,
                });
            } else if let (Some(value), Some(state)) = (report.value, report.state) {
                job.values.push(value);
                job.results.push(state);
            } else {
                warn!(job_id = %job.id, queue_id, "worker report carried neither result nor failure");
                job.failure = Some(JobFailure {
                    queue_id: queue_id.to_string(),
                    message: "report carried neither result nor failure".to_string(),
                });
            }
        }
        Err(err) => {
            warn!(job_id = %job.id, queue_id, %err, "undecodable worker report");
            job.failure = Some(JobFailure {
                queue_id: queue_id.to_string(),
                message: format!("undecodable report: {err}"),
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use an_broker::{
        BrokerSettings, MemoryTransport, QueueRequest, RequestCommand, Responder, PONG,
    };
    use an_types::{Precision, RandomDistribution};
    use serde_json::json;
    use std::time::Duration;

    fn model(name: &str) -> ModelBundle {
        ModelBundle::new(name, 3, Precision::Float32, RandomDistribution::Uniform)
    }

    fn fast_settings() -> ManagerSettings {
        ManagerSettings::default()
            .with_join_retries(1, Duration::from_millis(10))
            .with_deploy_timeout(Duration::from_millis(300))
            .with_result_timeout(Duration::from_millis(300))
    }

    fn fast_broker_settings() -> BrokerSettings {
        BrokerSettings {
            ping_timeout: Duration::from_millis(100),
            poll_floor: Duration::from_millis(10),
        }
    }

    /// A worker that pongs, acknowledges deployment, and reports `value` for
    /// every optimization run.
    fn obedient_worker(value: f64) -> Responder {
        Box::new(move |request: &QueueRequest| match request.command {
            RequestCommand::Ping => Some(json!(PONG)),
            RequestCommand::DeployModel => Some(json!(MODEL_DEPLOYED)),
            RequestCommand::RunOptimization => Some(json!({
                "job_id": request.payload["id"],
                "value": value,
                "state": [value, 0.0, 0.0],
            })),
        })
    }

    fn manager_with(
        queues: &[&str],
        models: Vec<ModelBundle>,
        configs: Vec<Value>,
    ) -> (JobManager<MemoryTransport>, MemoryTransport) {
        let transport = MemoryTransport::new();
        for (idx, q) in queues.iter().enumerate() {
            transport.register_responder(*q, obedient_worker(idx as f64 + 1.0));
        }
        let broker = Broker::new(
            transport.clone(),
            queues.iter().map(|s| s.to_string()).collect(),
            fast_broker_settings(),
        );
        let manager = JobManager::new(broker, models, configs, fast_settings()).unwrap();
        (manager, transport)
    }

    fn run_messages(transport: &MemoryTransport) -> Vec<(String, QueueRequest)> {
        transport
            .sent_messages()
            .into_iter()
            .filter(|(_, r)| r.command == RequestCommand::RunOptimization)
            .collect()
    }

    #[test]
    fn execution_type_from_inputs() {
        let models = vec![model("a"), model("b")];
        let configs = vec![json!({}), json!({})];
        assert_eq!(
            JobManager::<MemoryTransport>::determine_execution_type(&models, &configs).unwrap(),
            ExecutionType::MultiModelMultiConfig
        );
        assert!(matches!(
            JobManager::<MemoryTransport>::determine_execution_type(&models, &configs[..1].to_vec()),
            Ok(ExecutionType::MultiModelSingleConfig)
        ));
        assert!(
            JobManager::<MemoryTransport>::determine_execution_type(&[], &configs).is_err()
        );
    }

    #[tokio::test]
    async fn submit_before_deploy_is_a_precondition_error() {
        let (mut manager, _) = manager_with(&["q1"], vec![model("m")], vec![json!({})]);
        let err = manager.submit().await.unwrap_err();
        assert!(matches!(
            err,
            ManagerError::Precondition(PreconditionError::ModelsNotDeployed)
        ));
    }

    #[tokio::test]
    async fn wait_for_results_without_jobs_is_a_precondition_error() {
        let (mut manager, _) = manager_with(&["q1"], vec![model("m")], vec![json!({})]);
        let err = manager.wait_for_results().await.unwrap_err();
        assert!(matches!(
            err,
            ManagerError::Precondition(PreconditionError::ModelsNotDeployed)
        ));

        manager.deploy_model().await.unwrap();
        let err = manager.wait_for_results().await.unwrap_err();
        assert!(matches!(
            err,
            ManagerError::Precondition(PreconditionError::NoJobsSubmitted)
        ));
    }

    #[tokio::test]
    async fn worker_join_pings_all_queues_and_clears_ledger() {
        let (mut manager, transport) =
            manager_with(&["q1", "q2"], vec![model("m")], vec![json!({})]);
        let joined = manager.wait_for_worker_join().await.unwrap();
        assert_eq!(joined, vec!["q1".to_string(), "q2".to_string()]);

        let pings: Vec<_> = transport
            .sent_messages()
            .into_iter()
            .filter(|(_, r)| r.command == RequestCommand::Ping)
            .collect();
        assert_eq!(pings.len(), 2);
        assert_eq!(manager.broker.queue_ids().len(), 2);
        assert_eq!(manager.broker.outstanding(), 0);
    }

    #[tokio::test]
    async fn worker_join_retries_then_succeeds() {
        let transport = MemoryTransport::new();
        let mut pings = 0;
        transport.register_responder(
            "q1",
            Box::new(move |request| match request.command {
                RequestCommand::Ping => {
                    pings += 1;
                    // First ping goes unanswered, which forces a retry round.
                    if pings == 1 {
                        None
                    } else {
                        Some(json!(PONG))
                    }
                }
                _ => None,
            }),
        );
        let broker = Broker::new(transport, vec!["q1".into()], fast_broker_settings());
        let mut manager =
            JobManager::new(broker, vec![model("m")], vec![json!({})], fast_settings()).unwrap();

        let joined = manager.wait_for_worker_join().await.unwrap();
        assert_eq!(joined, vec!["q1".to_string()]);
    }

    #[tokio::test]
    async fn worker_join_fails_after_retry_budget() {
        let transport = MemoryTransport::new();
        transport.register_responder("q1", Box::new(|_| Some(json!("not-pong"))));
        let broker = Broker::new(transport, vec!["q1".into()], fast_broker_settings());
        let mut manager =
            JobManager::new(broker, vec![model("m")], vec![json!({})], fast_settings()).unwrap();

        let err = manager.wait_for_worker_join().await.unwrap_err();
        match err {
            ManagerError::WorkerJoin {
                attempts,
                unresponsive,
            } => {
                assert_eq!(attempts, 2); // initial round + one retry
                assert_eq!(unresponsive, vec!["q1".to_string()]);
            }
            other => panic!("expected WorkerJoin, got {other}"),
        }
    }

    #[tokio::test]
    async fn deploy_single_model_broadcasts_and_sets_flag() {
        let (mut manager, transport) =
            manager_with(&["q1", "q2"], vec![model("m")], vec![json!({})]);
        assert!(!manager.models_deployed());

        manager.deploy_model().await.unwrap();
        assert!(manager.models_deployed());
        assert_eq!(manager.broker.outstanding(), 0);

        let deploys: Vec<_> = transport
            .sent_messages()
            .into_iter()
            .filter(|(_, r)| r.command == RequestCommand::DeployModel)
            .collect();
        assert_eq!(deploys.len(), 2);
        assert_eq!(deploys[0].1.payload["name"], "m");
        assert_eq!(deploys[0].1.payload, deploys[1].1.payload);
    }

    #[tokio::test]
    async fn deploy_multi_model_pairs_models_with_queues() {
        let (mut manager, transport) = manager_with(
            &["q1", "q2"],
            vec![model("m1"), model("m2")],
            vec![json!({})],
        );
        manager.deploy_model().await.unwrap();

        let deploys: Vec<_> = transport
            .sent_messages()
            .into_iter()
            .filter(|(_, r)| r.command == RequestCommand::DeployModel)
            .collect();
        assert_eq!(deploys[0].0, "q1");
        assert_eq!(deploys[0].1.payload["name"], "m1");
        assert_eq!(deploys[1].0, "q2");
        assert_eq!(deploys[1].1.payload["name"], "m2");
    }

    #[tokio::test]
    async fn deploy_multi_model_with_wrong_queue_count_fails() {
        let (mut manager, _) = manager_with(
            &["q1", "q2", "q3"],
            vec![model("m1"), model("m2")],
            vec![json!({})],
        );
        let err = manager.deploy_model().await.unwrap_err();
        assert!(matches!(
            err,
            ManagerError::Precondition(PreconditionError::QueueModelMismatch { queues: 3, models: 2 })
        ));
        assert!(!manager.models_deployed());
    }

    #[tokio::test]
    async fn deploy_rejection_names_the_offending_queue() {
        let transport = MemoryTransport::new();
        transport.register_responder("q1", obedient_worker(1.0));
        transport.register_responder(
            "q2",
            Box::new(|request| match request.command {
                RequestCommand::Ping => Some(json!(PONG)),
                RequestCommand::DeployModel => Some(json!("error")),
                RequestCommand::RunOptimization => None,
            }),
        );
        let broker = Broker::new(
            transport,
            vec!["q1".into(), "q2".into()],
            fast_broker_settings(),
        );
        let mut manager =
            JobManager::new(broker, vec![model("m")], vec![json!({})], fast_settings()).unwrap();

        let err = manager.deploy_model().await.unwrap_err();
        match err {
            ManagerError::DeploymentAcknowledgment { rejected, details } => {
                assert_eq!(rejected, vec!["q2".to_string()]);
                assert!(details.contains("q2"));
                assert!(details.contains("error"));
            }
            other => panic!("expected DeploymentAcknowledgment, got {other}"),
        }
        assert!(!manager.models_deployed());
    }

    #[tokio::test]
    async fn submit_single_model_single_config_broadcasts_one_job() {
        let (mut manager, transport) =
            manager_with(&["q1", "q2"], vec![model("m")], vec![json!({"steps": 10})]);
        manager.deploy_model().await.unwrap();

        let jobs = manager.submit().await.unwrap();
        assert_eq!(jobs.len(), 1);
        assert_eq!(jobs[0].submitted_to, vec!["q1".to_string(), "q2".to_string()]);

        let runs = run_messages(&transport);
        assert_eq!(runs.len(), 2); // one broadcast = one send per queue
        assert_eq!(runs[0].1.payload, jobs[0].serialized());
        assert_eq!(runs[1].1.payload, jobs[0].serialized());
    }

    #[tokio::test]
    async fn submit_multi_model_multi_config_pairs_by_index() {
        let (mut manager, transport) = manager_with(
            &["q1", "q2"],
            vec![model("m1"), model("m2")],
            vec![json!({"c": 1}), json!({"c": 2})],
        );
        manager.deploy_model().await.unwrap();

        let jobs = manager.submit().await.unwrap();
        assert_eq!(jobs.len(), 2);
        assert_eq!(jobs[0].submitted_to, vec!["q1".to_string()]);
        assert_eq!(jobs[0].model.name, "m1");
        assert_eq!(jobs[0].config, json!({"c": 1}));
        assert_eq!(jobs[1].submitted_to, vec!["q2".to_string()]);
        assert_eq!(jobs[1].model.name, "m2");
        assert_eq!(jobs[1].config, json!({"c": 2}));

        let runs = run_messages(&transport);
        assert_eq!(runs[0].0, "q1");
        assert_eq!(runs[1].0, "q2");
    }

    #[tokio::test]
    async fn submit_single_model_multi_config_fans_configs_over_queues() {
        let (mut manager, _) = manager_with(
            &["q1", "q2"],
            vec![model("m")],
            vec![json!({"c": 1}), json!({"c": 2})],
        );
        manager.deploy_model().await.unwrap();

        let jobs = manager.submit().await.unwrap();
        assert_eq!(jobs.len(), 2);
        assert_eq!(jobs[0].model.name, "m");
        assert_eq!(jobs[1].model.name, "m");
        assert_eq!(jobs[0].config, json!({"c": 1}));
        assert_eq!(jobs[1].config, json!({"c": 2}));
    }

    #[tokio::test]
    async fn full_run_ingests_values_and_states() {
        let (mut manager, _) = manager_with(
            &["q1", "q2"],
            vec![model("m1"), model("m2")],
            vec![json!({"c": 1}), json!({"c": 2})],
        );
        manager.deploy_model().await.unwrap();
        manager.submit().await.unwrap();
        manager.wait_for_results().await.unwrap();

        let jobs = manager.jobs();
        assert_eq!(jobs[0].values, vec![1.0]);
        assert_eq!(jobs[0].results, vec![vec![1.0, 0.0, 0.0]]);
        assert!(jobs[0].completed);
        assert_eq!(jobs[1].values, vec![2.0]);
        assert!(jobs[1].completed);
    }

    #[tokio::test]
    async fn worker_failure_is_recorded_without_aborting_siblings() {
        let transport = MemoryTransport::new();
        transport.register_responder("q1", obedient_worker(1.0));
        transport.register_responder(
            "q2",
            Box::new(|request| match request.command {
                RequestCommand::Ping => Some(json!(PONG)),
                RequestCommand::DeployModel => Some(json!(MODEL_DEPLOYED)),
                RequestCommand::RunOptimization => Some(json!({
                    "job_id": request.payload["id"],
                    "failure": "kernel diverged",
                })),
            }),
        );
        let broker = Broker::new(
            transport,
            vec!["q1".into(), "q2".into()],
            fast_broker_settings(),
        );
        let mut manager = JobManager::new(
            broker,
            vec![model("m1"), model("m2")],
            vec![json!({}), json!({})],
            fast_settings(),
        )
        .unwrap();

        manager.deploy_model().await.unwrap();
        manager.submit().await.unwrap();
        manager.wait_for_results().await.unwrap();

        let jobs = manager.jobs();
        assert!(jobs[0].completed);
        assert!(jobs[0].failure.is_none());
        assert!(!jobs[1].completed);
        let failure = jobs[1].failure.as_ref().unwrap();
        assert_eq!(failure.queue_id, "q2");
        assert_eq!(failure.message, "kernel diverged");
    }

    #[tokio::test]
    async fn wait_for_results_times_out_when_a_worker_stays_silent() {
        let transport = MemoryTransport::new();
        transport.register_responder("q1", obedient_worker(1.0));
        transport.register_responder(
            "q2",
            Box::new(|request| match request.command {
                RequestCommand::Ping => Some(json!(PONG)),
                RequestCommand::DeployModel => Some(json!(MODEL_DEPLOYED)),
                RequestCommand::RunOptimization => None,
            }),
        );
        let broker = Broker::new(
            transport,
            vec!["q1".into(), "q2".into()],
            fast_broker_settings(),
        );
        let mut manager = JobManager::new(
            broker,
            vec![model("m1"), model("m2")],
            vec![json!({}), json!({})],
            fast_settings(),
        )
        .unwrap();

        manager.deploy_model().await.unwrap();
        manager.submit().await.unwrap();
        let err = manager.wait_for_results().await.unwrap_err();
        assert!(matches!(
            err,
            ManagerError::Broker(BrokerError::ResultTimeout { .. })
        ));
        // Nothing was ingested: all or nothing.
        assert!(manager.jobs().iter().all(|j| j.values.is_empty()));
    }

    #[test]
    fn scan_picks_global_minimum_across_jobs() {
        let mut first = Job::new(model("m"), json!({}));
        first.values = vec![5.0];
        first.results = vec![vec![1.0]];
        let mut second = Job::new(model("m"), json!({}));
        second.values = vec![3.0, 9.0];
        second.results = vec![vec![2.0], vec![3.0]];

        let jobs = vec![first, second];
        let (job, value, state) = scan_for_best_result(&jobs).unwrap();
        assert_eq!(job.id, jobs[1].id);
        assert_eq!(value, 3.0);
        assert_eq!(state, &[2.0]);
    }

    #[test]
    fn scan_tie_across_jobs_keeps_the_first() {
        let mut first = Job::new(model("m"), json!({}));
        first.values = vec![3.0];
        first.results = vec![vec![1.0]];
        let mut second = Job::new(model("m"), json!({}));
        second.values = vec![3.0];
        second.results = vec![vec![2.0]];

        let jobs = vec![first, second];
        let (job, value, _) = scan_for_best_result(&jobs).unwrap();
        assert_eq!(job.id, jobs[0].id);
        assert_eq!(value, 3.0);
    }

    #[test]
    fn scan_rejects_empty_input() {
        assert!(matches!(
            scan_for_best_result(&[]),
            Err(ManagerError::Precondition(PreconditionError::NoJobsSubmitted))
        ));
    }

    #[test]
    fn scan_skips_jobs_without_results() {
        let empty = Job::new(model("m"), json!({}));
        let mut full = Job::new(model("m"), json!({}));
        full.values = vec![7.0];
        full.results = vec![vec![0.5]];

        let jobs = vec![empty, full];
        let (job, value, _) = scan_for_best_result(&jobs).unwrap();
        assert_eq!(job.id, jobs[1].id);
        assert_eq!(value, 7.0);

        let only_empty = vec![Job::new(model("m"), json!({}))];
        assert!(matches!(
            scan_for_best_result(&only_empty),
            Err(ManagerError::Precondition(PreconditionError::NoResults))
        ));
    }
}
