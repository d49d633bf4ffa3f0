//! Isolation domains
//!
//! A domain owns a private output capture, an immutable permission set and a
//! cancellation flag. Artifacts are loaded into it (digest verified, host
//! members linked) and their entry point runs on a dedicated worker thread.
//! Dropping the domain cancels whatever is still running inside it.

use crate::capture::OutputCapture;
use crate::outcome::FailureInfo;
use crate::permissions::{Permission, PermissionSet, SECURITY_EXCEPTION};
use crate::vm::host::{HostContext, NativeTable};
use crate::vm::interpreter::{Interpreter, Unwind};
use chrono::{DateTime, Utc};
use lang::ir::Artifact;
use lang::EmitError;
use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::oneshot;
use tracing::{debug, info, warn};
use uuid::Uuid;

const EXECUTION_ENGINE_EXCEPTION: &str = "System.ExecutionEngineException";
const WORKER_STACK_SIZE: usize = 16 * 1024 * 1024;

/// State shared between a domain and its worker threads.
struct DomainShared {
    capture: OutputCapture,
    permissions: PermissionSet,
    cancel: Arc<AtomicBool>,
}

/// How an invocation ended, measured on the worker.
#[derive(Debug)]
pub struct InvocationReport {
    pub result: Result<(), FailureInfo>,
    pub elapsed: Duration,
}

/// Handle to an invocation running on a worker thread.
pub struct Invocation {
    receiver: oneshot::Receiver<InvocationReport>,
}

#[derive(Debug, PartialEq, Eq)]
pub enum InvocationStatus {
    Running,
    Finished,
    /// The worker went away without reporting.
    Lost,
}

impl Invocation {
    /// Non-blocking check; returns the report once the worker has finished.
    pub fn poll(&mut self) -> (InvocationStatus, Option<InvocationReport>) {
        match self.receiver.try_recv() {
            Ok(report) => (InvocationStatus::Finished, Some(report)),
            Err(oneshot::error::TryRecvError::Empty) => (InvocationStatus::Running, None),
            Err(oneshot::error::TryRecvError::Closed) => (InvocationStatus::Lost, None),
        }
    }
}

pub struct IsolationDomain {
    id: Uuid,
    shared: Arc<DomainShared>,
    natives: Arc<NativeTable>,
    max_call_depth: usize,
    loaded: Option<(PathBuf, Arc<Artifact>)>,
    abandoned: bool,
    created_at: DateTime<Utc>,
}

impl IsolationDomain {
    pub fn new(permissions: PermissionSet, max_call_depth: usize) -> Self {
        let id = Uuid::new_v4();
        let cancel = Arc::new(AtomicBool::new(false));
        info!(domain_id = %id, read_paths = permissions.read_paths().len(), "isolation domain created");
        Self {
            id,
            shared: Arc::new(DomainShared {
                capture: OutputCapture::new(Arc::clone(&cancel)),
                permissions,
                cancel,
            }),
            natives: Arc::new(NativeTable::standard()),
            max_call_depth,
            loaded: None,
            abandoned: false,
            created_at: Utc::now(),
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn permissions(&self) -> &PermissionSet {
        &self.shared.permissions
    }

    pub fn capture(&self) -> &OutputCapture {
        &self.shared.capture
    }

    pub fn is_abandoned(&self) -> bool {
        self.abandoned
    }

    /// Mark the domain as holding a timed-out invocation.
    pub fn abandon(&mut self) {
        if !self.abandoned {
            warn!(domain_id = %self.id, "isolation domain abandoned");
        }
        self.abandoned = true;
    }

    /// Load an artifact, verifying its digest and linking its host members.
    ///
    /// Loading the same path again reuses the already loaded artifact.
    pub fn load(&mut self, path: &Path) -> Result<Arc<Artifact>, FailureInfo> {
        if let Some((loaded_path, artifact)) = &self.loaded {
            if loaded_path == path {
                return Ok(Arc::clone(artifact));
            }
        }

        self.shared
            .permissions
            .demand(Permission::FileRead(path))
            .map_err(|denied| FailureInfo::new(SECURITY_EXCEPTION, denied.to_string(), ""))?;

        let bytes = std::fs::read(path).map_err(|error| match error.kind() {
            std::io::ErrorKind::NotFound => FailureInfo::new(
                "System.IO.FileNotFoundException",
                format!("Could not load artifact '{}'.", path.display()),
                "",
            ),
            _ => FailureInfo::new("System.IO.IOException", error.to_string(), ""),
        })?;

        let artifact = lang::decode_artifact(&bytes).map_err(|error| bad_image(path, &error))?;
        if artifact.entry_point >= artifact.functions.len() {
            return Err(FailureInfo::new(
                "System.BadImageFormatException",
                format!("Artifact '{}' has no valid entry point.", artifact.assembly_name),
                "",
            ));
        }
        for reference in artifact.host_references() {
            let name = reference.qualified_name();
            if !self.natives.contains(&name) {
                return Err(FailureInfo::new(
                    "System.MissingMethodException",
                    format!("Method not found: '{}'.", name),
                    "",
                ));
            }
        }

        let artifact = Arc::new(artifact);
        debug!(domain_id = %self.id, assembly = %artifact.assembly_name, "artifact loaded");
        self.loaded = Some((path.to_path_buf(), Arc::clone(&artifact)));
        Ok(artifact)
    }

    /// Start the artifact's entry point on a fresh worker thread.
    pub fn invoke(&self, artifact: Arc<Artifact>) -> Result<Invocation, FailureInfo> {
        self.shared
            .permissions
            .demand(Permission::Execution)
            .map_err(|denied| FailureInfo::new(SECURITY_EXCEPTION, denied.to_string(), ""))?;

        let (sender, receiver) = oneshot::channel();
        let shared = Arc::clone(&self.shared);
        let natives = Arc::clone(&self.natives);
        let max_call_depth = self.max_call_depth;

        std::thread::Builder::new()
            .name(format!("consolebox-domain-{}", self.id.simple()))
            .stack_size(WORKER_STACK_SIZE)
            .spawn(move || {
                let started = Instant::now();
                let result = run_entry_point(&artifact, &natives, &shared, max_call_depth);
                let report = InvocationReport {
                    result,
                    elapsed: started.elapsed(),
                };
                // The supervisor may already have stopped listening.
                let _ = sender.send(report);
            })
            .map_err(|error| {
                FailureInfo::new(
                    EXECUTION_ENGINE_EXCEPTION,
                    format!("Failed to start worker thread: {}", error),
                    "",
                )
            })?;

        Ok(Invocation { receiver })
    }
}

impl Drop for IsolationDomain {
    fn drop(&mut self) {
        self.shared.cancel.store(true, Ordering::SeqCst);
        self.shared.capture.clear();
        self.loaded = None;
        info!(domain_id = %self.id, abandoned = self.abandoned, "isolation domain unloaded");
    }
}

fn run_entry_point(
    artifact: &Artifact,
    natives: &NativeTable,
    shared: &DomainShared,
    max_call_depth: usize,
) -> Result<(), FailureInfo> {
    let host = HostContext {
        capture: &shared.capture,
        permissions: &shared.permissions,
        cancel: shared.cancel.as_ref(),
    };

    let result = panic::catch_unwind(AssertUnwindSafe(|| {
        Interpreter::new(artifact, natives, host, max_call_depth).run()
    }));

    match result {
        Ok(Ok(())) => Ok(()),
        Ok(Err(Unwind::Throw {
            exception,
            stack_trace,
        })) => Err(FailureInfo::new(
            exception.type_name.clone(),
            exception.message.clone(),
            stack_trace,
        )),
        Ok(Err(Unwind::Abort)) => Err(FailureInfo::new(
            "System.Threading.ThreadAbortException",
            "Thread was being aborted.",
            "",
        )),
        Err(payload) => Err(FailureInfo::new(
            EXECUTION_ENGINE_EXCEPTION,
            panic_message(payload.as_ref()),
            "",
        )),
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "Internal error in the execution engine.".to_string()
    }
}

fn bad_image(path: &Path, error: &EmitError) -> FailureInfo {
    FailureInfo::new(
        "System.BadImageFormatException",
        format!("Could not load artifact '{}'. {}", path.display(), error),
        "",
    )
}
