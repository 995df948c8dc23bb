//! End-to-end run against the in-memory transport.
//!
//! Two simulated workers answer pings, acknowledge model deployment, and
//! return annealing results; the manager drives the full join → deploy →
//! submit → collect sequence and the best result is printed at the end.
//!
//! Run with `cargo run --example local_run` (set `RUST_LOG=debug` for the
//! broker's polling chatter).

use an_broker::{
    Broker, BrokerSettings, MemoryTransport, QueueRequest, RequestCommand, Responder,
    MODEL_DEPLOYED, PONG,
};
use an_manager::{scan_for_best_result, JobManager, ManagerSettings};
use an_types::{ModelBundle, Precision, RandomDistribution, WorkerDescriptor};
use serde_json::json;

/// A simulated worker that converges to `best` with the given final state.
fn simulated_worker(best: f64, state: [f64; 3]) -> Responder {
    Box::new(move |request: &QueueRequest| match request.command {
        RequestCommand::Ping => Some(json!(PONG)),
        RequestCommand::DeployModel => Some(json!(MODEL_DEPLOYED)),
        RequestCommand::RunOptimization => Some(json!({
            "job_id": request.payload["id"],
            "value": best,
            "state": state,
        })),
    })
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    // As handed over by the instance-provisioning layer.
    let workers = vec![
        WorkerDescriptor { queue_id: "worker-1".into() },
        WorkerDescriptor { queue_id: "worker-2".into() },
    ];

    let transport = MemoryTransport::new();
    transport.register_responder("worker-1", simulated_worker(3.2, [0.8, -0.1, 1.4]));
    transport.register_responder("worker-2", simulated_worker(-1.7, [0.02, -0.01, 0.05]));

    let queue_ids = workers.iter().map(|w| w.queue_id.clone()).collect();
    let broker = Broker::new(transport, queue_ids, BrokerSettings::default());

    let model = ModelBundle::new("rastrigin", 3, Precision::Float32, RandomDistribution::Uniform)
        .with_globals("NUM_DIMENSIONS = 3")
        .with_function(
            "evaluate",
            "def evaluate(state):\n    return sum(x * x - 10 * cos(2 * pi * x) for x in state)",
        )
        .with_function("cool", "def cool(t):\n    return t * 0.97");

    let configs = vec![json!({ "max_steps": 1000, "initial_temperature": 100.0 })];

    let mut manager = JobManager::new(broker, vec![model], configs, ManagerSettings::default())?;

    let joined = manager.wait_for_worker_join().await?;
    println!("workers joined: {joined:?}");

    manager.deploy_model().await?;
    println!("model deployed on {} queue(s)", joined.len());

    let jobs = manager.submit().await?;
    println!("submitted {} job(s)", jobs.len());

    manager.wait_for_results().await?;

    let (job, value, state) = scan_for_best_result(manager.jobs())?;
    println!(
        "best value {value} for model '{}' (job {}) at state {state:?}",
        job.model.name, job.id
    );

    Ok(())
}
