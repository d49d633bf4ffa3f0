//! Execution supervision
//!
//! Loads an artifact into a domain, starts its entry point and polls the
//! invocation at a fixed interval until it finishes or the time budget runs
//! out. Every exit path becomes exactly one [`ExecutionOutcome`].

use crate::config::SandboxConfig;
use crate::domain::{InvocationReport, InvocationStatus, IsolationDomain};
use crate::outcome::ExecutionOutcome;
use std::path::Path;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Supervisor {
    time_budget: Duration,
    poll_interval: Duration,
}

impl Supervisor {
    pub fn new(time_budget: Duration, poll_interval: Duration) -> Self {
        Self {
            time_budget,
            poll_interval,
        }
    }

    pub fn from_config(config: &SandboxConfig) -> Self {
        Self::new(config.time_budget(), config.poll_interval())
    }

    pub fn time_budget(&self) -> Duration {
        self.time_budget
    }

    pub fn poll_interval(&self) -> Duration {
        self.poll_interval
    }

    /// Run the artifact at `artifact_path` inside `domain`.
    ///
    /// On timeout the domain is marked abandoned and must be replaced before
    /// it runs anything else.
    pub async fn execute(&self, artifact_path: &Path, domain: &mut IsolationDomain) -> ExecutionOutcome {
        let artifact = match domain.load(artifact_path) {
            Ok(artifact) => artifact,
            Err(failure) => return ExecutionOutcome::Failure(failure),
        };
        let mut invocation = match domain.invoke(artifact) {
            Ok(invocation) => invocation,
            Err(failure) => return ExecutionOutcome::Failure(failure),
        };

        let deadline = Instant::now() + self.time_budget;
        loop {
            match invocation.poll() {
                (InvocationStatus::Finished, Some(report)) => return classify(report, domain),
                (InvocationStatus::Running, _) => {}
                (_, _) => {
                    domain.capture().clear();
                    return ExecutionOutcome::failure(
                        "System.ExecutionEngineException",
                        "The worker ended without reporting a result.",
                        "",
                    );
                }
            }

            let now = Instant::now();
            if now >= deadline {
                domain.abandon();
                warn!(
                    domain_id = %domain.id(),
                    budget_ms = self.time_budget.as_millis() as u64,
                    "execution timed out"
                );
                return ExecutionOutcome::Timeout;
            }
            tokio::time::sleep(self.poll_interval.min(deadline - now)).await;
        }
    }
}

fn classify(report: InvocationReport, domain: &IsolationDomain) -> ExecutionOutcome {
    let capture = domain.capture();
    match report.result {
        Ok(()) => {
            let output = capture.read_to_end();
            capture.clear();
            let elapsed_ms = report.elapsed.as_millis() as u64;
            debug!(domain_id = %domain.id(), elapsed_ms, bytes = output.len(), "execution succeeded");
            ExecutionOutcome::success(output, elapsed_ms)
        }
        Err(failure) => {
            capture.clear();
            debug!(domain_id = %domain.id(), failure = %failure.type_name, "execution failed");
            ExecutionOutcome::Failure(failure)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::permissions::PermissionSet;
    use lang::{Compiler, CompilerOptions};
    use std::path::PathBuf;

    fn supervisor(budget_ms: u64) -> Supervisor {
        Supervisor::new(Duration::from_millis(budget_ms), Duration::from_millis(5))
    }

    fn stage(dir: &Path, source: &str) -> PathBuf {
        let path = dir.join("ConsoleApp_supervised.cbx");
        let outcome = Compiler::new(CompilerOptions::default()).compile(source, &path);
        assert!(outcome.is_ready(), "{:?}", outcome.diagnostics());
        path
    }

    #[tokio::test]
    async fn test_success_drains_capture() {
        let dir = tempfile::tempdir().unwrap();
        let path = stage(dir.path(), "function main() { System.Console.WriteLine(\"Hi\"); }");
        let mut domain = IsolationDomain::new(PermissionSet::sandbox([dir.path()]), 64);

        let outcome = supervisor(2_000).execute(&path, &mut domain).await;
        assert_eq!(outcome.output(), Some("Hi\n"));
        assert!(domain.capture().is_empty());
    }

    #[tokio::test]
    async fn test_failure_discards_partial_output() {
        let dir = tempfile::tempdir().unwrap();
        let path = stage(
            dir.path(),
            "function main() { System.Console.Write(\"partial\"); throw new System.Exception(\"bad\"); }",
        );
        let mut domain = IsolationDomain::new(PermissionSet::sandbox([dir.path()]), 64);

        let outcome = supervisor(2_000).execute(&path, &mut domain).await;
        let failure = outcome.failure_info().unwrap();
        assert_eq!(failure.type_name, "System.Exception");
        assert_eq!(failure.message, "bad");
        assert!(domain.capture().is_empty());
    }

    #[tokio::test]
    async fn test_timeout_abandons_domain() {
        let dir = tempfile::tempdir().unwrap();
        let path = stage(dir.path(), "function main() { while (true) { } }");
        let mut domain = IsolationDomain::new(PermissionSet::sandbox([dir.path()]), 64);

        let started = Instant::now();
        let outcome = supervisor(200).execute(&path, &mut domain).await;
        assert!(outcome.is_timeout());
        assert!(domain.is_abandoned());
        assert!(started.elapsed() < Duration::from_secs(2));
    }
}
