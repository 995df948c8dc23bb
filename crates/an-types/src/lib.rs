//! # an-types
//!
//! Core data entities for AnnealNet: optimization model bundles, jobs, worker
//! commands, and the fan-out execution types derived from model/config counts.
//! No I/O lives here; these types are shared by the broker and manager crates.

pub mod command;
pub mod errors;
pub mod job;
pub mod model;

pub use command::{ExecutionType, WorkerCommand};
pub use errors::PreconditionError;
pub use job::{Job, JobFailure, JobId, WorkerReport};
pub use model::{ModelBundle, Precision, RandomDistribution, WorkerDescriptor};
