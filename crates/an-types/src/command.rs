//! Worker commands and the fan-out execution types.

use serde::{Deserialize, Serialize};

use crate::errors::PreconditionError;

/// Opcode half of every job-carrying worker message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkerCommand {
    DeployModel,
    RunOptimization,
}

/// Fan-out strategy derived from the shapes of the inputs.
///
/// Never user-supplied; computed once per run from the model and config
/// counts and fixed afterwards. Every branch point in deployment and
/// submission matches on this exhaustively.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExecutionType {
    SingleModelSingleConfig,
    SingleModelMultiConfig,
    MultiModelSingleConfig,
    MultiModelMultiConfig,
}

impl ExecutionType {
    /// Derive the fan-out strategy from model and config counts.
    ///
    /// With more than one of each, the counts must match exactly: pairing M
    /// models with a different number of configs (other than 1) is ambiguous.
    pub fn from_counts(models: usize, configs: usize) -> Result<Self, PreconditionError> {
        if models < 1 || configs < 1 {
            return Err(PreconditionError::EmptyInputs { models, configs });
        }
        match (models, configs) {
            (1, 1) => Ok(Self::SingleModelSingleConfig),
            (1, _) => Ok(Self::SingleModelMultiConfig),
            (_, 1) => Ok(Self::MultiModelSingleConfig),
            (m, c) if m == c => Ok(Self::MultiModelMultiConfig),
            (m, c) => Err(PreconditionError::AmbiguousPairing {
                models: m,
                configs: c,
            }),
        }
    }
}
