use crate::outcome::ExecutionOutcome;
use serde::Serialize;
use std::time::Duration;

/// Execution statistics for one session
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ExecutionStats {
    pub runs: u64,
    pub successes: u64,
    pub failures: u64,
    pub timeouts: u64,
    pub permission_denials: u64,
    /// Summed over successful runs only
    pub total_elapsed: Duration,
    pub average_elapsed: Duration,
}

impl ExecutionStats {
    pub fn record(&mut self, outcome: &ExecutionOutcome) {
        self.runs += 1;
        match outcome {
            ExecutionOutcome::Success { elapsed_ms, .. } => {
                self.successes += 1;
                self.total_elapsed += Duration::from_millis(*elapsed_ms);
                self.average_elapsed = self.total_elapsed / self.successes as u32;
            }
            ExecutionOutcome::Timeout => self.timeouts += 1,
            ExecutionOutcome::Failure(info) => {
                self.failures += 1;
                if info.is_permission_denied() {
                    self.permission_denials += 1;
                }
            }
        }
    }
}
