//! Orchestration timeouts and retry budgets.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Timeouts and retry budget for one optimization run.
///
/// Every externally visible timeout is finite by default.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ManagerSettings {
    /// How many additional join rounds to attempt after the first failure.
    pub join_retry_limit: u32,
    /// Pause between join rounds.
    pub join_retry_delay: Duration,
    /// Overall budget for all deployment acknowledgments to arrive.
    pub deploy_timeout: Duration,
    /// Overall budget for all optimization results to arrive.
    pub result_timeout: Duration,
}

impl Default for ManagerSettings {
    fn default() -> Self {
        Self {
            join_retry_limit: 3,
            join_retry_delay: Duration::from_secs(2),
            deploy_timeout: Duration::from_secs(30),
            result_timeout: Duration::from_secs(300),
        }
    }
}

impl ManagerSettings {
    pub fn with_join_retries(mut self, limit: u32, delay: Duration) -> Self {
        self.join_retry_limit = limit;
        self.join_retry_delay = delay;
        self
    }

    pub fn with_deploy_timeout(mut self, timeout: Duration) -> Self {
        self.deploy_timeout = timeout;
        self
    }

    pub fn with_result_timeout(mut self, timeout: Duration) -> Self {
        self.result_timeout = timeout;
        self
    }
}
