//! # an-manager
//!
//! Job orchestration for AnnealNet: derives a fan-out strategy from the
//! shapes of the inputs, deploys optimization models to workers, submits
//! jobs, and aggregates the globally best result.

pub mod manager;
pub mod settings;

pub use manager::{scan_for_best_result, JobManager, ManagerError, ManagerResult};
pub use settings::ManagerSettings;
