//! Optimization model bundles as produced by the model-loading collaborator.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Numeric precision a model requires on the worker side.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Precision {
    Float32,
    Float64,
}

/// Distribution of the random values fed to the annealing kernel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RandomDistribution {
    Normal,
    Uniform,
}

/// Serialized optimization model.
///
/// Produced by the model-loading collaborator and shipped to workers
/// verbatim. The `globals` blob and the `functions` source texts are opaque
/// here: workers interpret them later, this codebase never parses, validates
/// or executes them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelBundle {
    pub name: String,
    /// Number of dimensions of the optimization domain.
    pub dimensions: usize,
    pub precision: Precision,
    pub distribution: RandomDistribution,
    /// Source-level globals available during optimization.
    pub globals: String,
    /// Required-function-name -> source text, interpreted by workers.
    pub functions: HashMap<String, String>,
}

impl ModelBundle {
    pub fn new(
        name: impl Into<String>,
        dimensions: usize,
        precision: Precision,
        distribution: RandomDistribution,
    ) -> Self {
        Self {
            name: name.into(),
            dimensions,
            precision,
            distribution,
            globals: String::new(),
            functions: HashMap::new(),
        }
    }

    pub fn with_globals(mut self, globals: impl Into<String>) -> Self {
        self.globals = globals.into();
        self
    }

    pub fn with_function(mut self, name: impl Into<String>, source: impl Into<String>) -> Self {
        self.functions.insert(name.into(), source.into());
        self
    }
}

/// Worker descriptor as handed over by the instance-provisioning
/// collaborator. One worker listens on one queue, by convention.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkerDescriptor {
    pub queue_id: String,
}
