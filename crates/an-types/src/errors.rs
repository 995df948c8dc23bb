use thiserror::Error;

/// Usage-order and input-shape violations.
///
/// These are fatal and never retried: the caller invoked an operation out of
/// order, or supplied inputs that admit no valid fan-out plan.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PreconditionError {
    #[error("no models/configs provided: {models} model(s), {configs} config(s)")]
    EmptyInputs { models: usize, configs: usize },

    #[error(
        "ambiguous pairing: with {models} models there must be exactly {models} configs or exactly 1, got {configs}"
    )]
    AmbiguousPairing { models: usize, configs: usize },

    #[error("models have not been deployed")]
    ModelsNotDeployed,

    #[error("no jobs have been submitted")]
    NoJobsSubmitted,

    #[error("queue/model count mismatch: {queues} queue(s) for {models} model(s)")]
    QueueModelMismatch { queues: usize, models: usize },

    #[error("queue/config count mismatch: {queues} queue(s) for {configs} config(s)")]
    QueueConfigMismatch { queues: usize, configs: usize },

    #[error("no results available to scan")]
    NoResults,
}
