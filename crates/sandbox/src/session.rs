//! Session lifecycle
//!
//! A session owns one isolation domain and at most one staged artifact.
//! `compile` moves it from `Empty` to `Compiled`, `execute` may run the staged
//! artifact any number of times, and `recycle` replaces the domain and
//! returns to `Empty`.

use crate::config::SandboxConfig;
use crate::domain::IsolationDomain;
use crate::error::{Result, SessionError};
use crate::outcome::ExecutionOutcome;
use crate::permissions::PermissionSet;
use crate::stats::ExecutionStats;
use crate::supervisor::Supervisor;
use crate::workspace::ArtifactStore;
use chrono::{DateTime, Utc};
use lang::{CompilationOutcome, Compiler, CompilerOptions, CompletionItem};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tracing::{debug, info};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionState {
    Empty,
    Compiled,
}

pub struct Session {
    id: Uuid,
    config: SandboxConfig,
    compiler: Compiler,
    store: ArtifactStore,
    supervisor: Supervisor,
    domain: IsolationDomain,
    staged: Option<PathBuf>,
    stats: ExecutionStats,
    created_at: DateTime<Utc>,
}

impl Session {
    pub fn new(config: SandboxConfig) -> Result<Self> {
        config.validate()?;
        let store = ArtifactStore::open(&config.work_dir)?;
        let id = Uuid::new_v4();
        let compiler = Compiler::new(CompilerOptions {
            warnings_as_errors: config.warnings_as_errors,
            ..Default::default()
        });
        let domain = create_domain(&config, &store, id);
        info!(session_id = %id, work_dir = %store.root().display(), "session created");

        Ok(Self {
            id,
            supervisor: Supervisor::from_config(&config),
            config,
            compiler,
            store,
            domain,
            staged: None,
            stats: ExecutionStats::default(),
            created_at: Utc::now(),
        })
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn config(&self) -> &SandboxConfig {
        &self.config
    }

    pub fn state(&self) -> SessionState {
        if self.staged.is_some() {
            SessionState::Compiled
        } else {
            SessionState::Empty
        }
    }

    /// Whether an artifact is staged and ready to execute.
    pub fn is_ready(&self) -> bool {
        self.staged.is_some()
    }

    pub fn domain(&self) -> &IsolationDomain {
        &self.domain
    }

    pub fn stats(&self) -> &ExecutionStats {
        &self.stats
    }

    /// Compile and stage `source`.
    ///
    /// Diagnostics are data: a failed compilation is `Ok` with a
    /// `CompilationOutcome::Failed` and leaves the session `Empty`.
    pub fn compile(&mut self, source: &str) -> Result<CompilationOutcome> {
        if self.staged.is_some() {
            return Err(SessionError::AlreadyCompiled);
        }

        let path = self.store.artifact_path(self.id);
        let outcome = self.compiler.compile(source, &path);
        if outcome.is_ready() {
            info!(session_id = %self.id, artifact = %path.display(), "program compiled and staged");
            self.staged = Some(path);
        } else {
            debug!(
                session_id = %self.id,
                diagnostics = outcome.diagnostics().len(),
                "compilation failed"
            );
        }
        Ok(outcome)
    }

    /// Compile without staging anything, for live diagnostics.
    pub fn check(&self, source: &str) -> CompilationOutcome {
        self.compiler.check_only(source)
    }

    /// Completion candidates at `offset`, independent of execution state.
    pub fn complete(&self, source: &str, offset: usize) -> Vec<CompletionItem> {
        lang::complete(source, offset)
    }

    /// Run the staged artifact in the current domain.
    pub async fn execute(&mut self) -> Result<ExecutionOutcome> {
        let Some(path) = self.staged.clone() else {
            return Err(SessionError::NotCompiled);
        };
        if self.domain.is_abandoned() {
            return Err(SessionError::DomainAbandoned(self.domain.id()));
        }

        let outcome = self.supervisor.execute(&path, &mut self.domain).await;
        self.stats.record(&outcome);
        info!(session_id = %self.id, outcome = outcome.kind(), "execution finished");
        Ok(outcome)
    }

    /// Replace the domain, delete the staged artifact and return to `Empty`.
    pub fn recycle(&mut self) {
        let fresh = create_domain(&self.config, &self.store, self.id);
        drop(std::mem::replace(&mut self.domain, fresh));
        if let Some(path) = self.staged.take() {
            self.store.remove(&path);
        }
        info!(
            session_id = %self.id,
            runs = self.stats.runs,
            successes = self.stats.successes,
            failures = self.stats.failures,
            timeouts = self.stats.timeouts,
            "session recycled"
        );
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        if let Some(path) = self.staged.take() {
            self.store.remove(&path);
        }
        debug!(session_id = %self.id, "session released");
    }
}

/// Domains may read only their own session's artifact and the configured dependencies.
fn create_domain(config: &SandboxConfig, store: &ArtifactStore, session_id: Uuid) -> IsolationDomain {
    let read_paths = std::iter::once(store.artifact_path(session_id))
        .chain(config.dependency_paths.iter().cloned());
    IsolationDomain::new(PermissionSet::sandbox(read_paths), config.max_call_depth)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn session(dir: &tempfile::TempDir) -> Session {
        Session::new(SandboxConfig {
            work_dir: dir.path().to_path_buf(),
            poll_interval_ms: 5,
            ..Default::default()
        })
        .unwrap()
    }

    #[tokio::test]
    async fn test_execute_before_compile_is_usage_error() {
        let dir = tempfile::tempdir().unwrap();
        let mut session = session(&dir);
        assert!(matches!(session.execute().await, Err(SessionError::NotCompiled)));
    }

    #[test]
    fn test_compile_twice_is_usage_error() {
        let dir = tempfile::tempdir().unwrap();
        let mut session = session(&dir);
        assert!(session.compile("function main() { }").unwrap().is_ready());
        assert_eq!(session.state(), SessionState::Compiled);
        assert!(matches!(
            session.compile("function main() { }"),
            Err(SessionError::AlreadyCompiled)
        ));
    }

    #[test]
    fn test_failed_compile_stays_empty() {
        let dir = tempfile::tempdir().unwrap();
        let mut session = session(&dir);
        let outcome = session.compile("function main() { nope(); }").unwrap();
        assert!(!outcome.is_ready());
        assert_eq!(session.state(), SessionState::Empty);
    }

    #[test]
    fn test_recycle_deletes_artifact_and_replaces_domain() {
        let dir = tempfile::tempdir().unwrap();
        let mut session = session(&dir);
        session.compile("function main() { }").unwrap();
        let artifact = session.store.artifact_path(session.id());
        let old_domain = session.domain().id();
        assert!(artifact.exists());

        session.recycle();
        assert!(!artifact.exists());
        assert_ne!(session.domain().id(), old_domain);
        assert_eq!(session.state(), SessionState::Empty);

        session.recycle();
        assert_eq!(session.state(), SessionState::Empty);
    }

    #[test]
    fn test_domain_reads_only_own_artifact() {
        use crate::permissions::Permission;

        let dir = tempfile::tempdir().unwrap();
        let mut first = session(&dir);
        let mut second = session(&dir);
        first.compile("function main() { }").unwrap();
        second.compile("function main() { }").unwrap();

        let own = first.store.artifact_path(first.id());
        let other = second.store.artifact_path(second.id());
        let permissions = first.domain().permissions();
        assert!(permissions.allows(Permission::FileRead(&own)));
        assert!(!permissions.allows(Permission::FileRead(&other)));
        assert!(!permissions.allows(Permission::FileRead(first.store.root())));
    }

    #[test]
    fn test_drop_deletes_artifact() {
        let dir = tempfile::tempdir().unwrap();
        let mut session = session(&dir);
        session.compile("function main() { }").unwrap();
        let artifact = session.store.artifact_path(session.id());
        drop(session);
        assert!(!artifact.exists());
    }

    #[test]
    fn test_invalid_config_rejected() {
        let config = SandboxConfig {
            poll_interval_ms: 0,
            ..Default::default()
        };
        assert!(matches!(Session::new(config), Err(SessionError::Config(_))));
    }
}
